use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Axis-aligned region in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionKind {
    Face,
    Motion,
}

/// A qualifying observation in one frame. Consumed by the event log and the
/// recorder, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub kind: DetectionKind,
    pub bbox: BoundingBox,
    /// Region area in pixels for motion, absent for faces
    pub magnitude: Option<f64>,
    pub timestamp: SystemTime,
}

impl DetectionEvent {
    pub fn motion(bbox: BoundingBox, area: f64, timestamp: SystemTime) -> Self {
        Self {
            kind: DetectionKind::Motion,
            bbox,
            magnitude: Some(area),
            timestamp,
        }
    }

    pub fn face(bbox: BoundingBox, timestamp: SystemTime) -> Self {
        Self {
            kind: DetectionKind::Face,
            bbox,
            magnitude: None,
            timestamp,
        }
    }

    pub fn log_type(&self) -> LogEventType {
        match self.kind {
            DetectionKind::Face => LogEventType::FaceDetected,
            DetectionKind::Motion => LogEventType::MotionDetected,
        }
    }

    /// Detail text written to the event log
    pub fn description(&self) -> String {
        match self.kind {
            DetectionKind::Face => format!(
                "Face found at x={}, y={}, w={}, h={}",
                self.bbox.x, self.bbox.y, self.bbox.width, self.bbox.height
            ),
            DetectionKind::Motion => {
                format!("Motion area: {:.1}", self.magnitude.unwrap_or_default())
            }
        }
    }
}

/// Event categories written to the security log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEventType {
    System,
    Error,
    CriticalError,
    FaceDetected,
    MotionDetected,
    VideoRecording,
}

impl LogEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEventType::System => "System",
            LogEventType::Error => "Error",
            LogEventType::CriticalError => "Critical Error",
            LogEventType::FaceDetected => "Face Detected",
            LogEventType::MotionDetected => "Motion Detected",
            LogEventType::VideoRecording => "Video Recording",
        }
    }
}

impl fmt::Display for LogEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_descriptions() {
        let now = SystemTime::now();
        let face = DetectionEvent::face(BoundingBox::new(10, 20, 30, 40), now);
        assert_eq!(face.description(), "Face found at x=10, y=20, w=30, h=40");
        assert_eq!(face.log_type(), LogEventType::FaceDetected);
        assert_eq!(face.magnitude, None);

        let motion = DetectionEvent::motion(BoundingBox::new(0, 0, 40, 40), 1600.0, now);
        assert_eq!(motion.description(), "Motion area: 1600.0");
        assert_eq!(motion.log_type().to_string(), "Motion Detected");
    }

    #[test]
    fn test_bounding_box_containment() {
        let outer = BoundingBox::new(5, 5, 50, 50);
        assert!(outer.contains(&BoundingBox::new(10, 10, 40, 40)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&BoundingBox::new(0, 10, 20, 20)));
        assert!(!outer.contains(&BoundingBox::new(30, 30, 40, 10)));
        assert_eq!(outer.area(), 2500);
    }
}
