use crate::error::{DisplayError, Result};
use crate::event_log::format_timestamp;
use crate::events::{DetectionEvent, DetectionKind};
use crate::frame::FrameData;

use chrono_tz::Tz;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const MOTION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const OVERLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Draws detection boxes, and optionally the capture time, onto a display
/// copy of a frame
pub struct OverlayRenderer {
    font: Option<Font<'static>>,
    font_size: f32,
    timezone: Option<Tz>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            font: None,
            font_size: 20.0,
            timezone: None,
        }
    }

    /// Enable the timestamp overlay with the TrueType font at `font_path`.
    /// An unreadable font leaves the overlay disabled.
    pub fn with_timestamp(mut self, font_path: &Path, font_size: f32, timezone: Option<Tz>) -> Self {
        self.font_size = font_size;
        self.timezone = timezone;

        match load_font(font_path) {
            Ok(font) => self.font = Some(font),
            Err(e) => warn!("Timestamp overlay disabled: {}", e),
        }
        self
    }

    pub fn has_timestamp(&self) -> bool {
        self.font.is_some()
    }

    /// Render onto a fresh RGB copy; `frame` itself is never touched
    pub fn render(&self, frame: &FrameData, detections: &[DetectionEvent]) -> Result<RgbImage> {
        let mut image = frame.to_rgb_image()?;

        for detection in detections {
            let color = match detection.kind {
                DetectionKind::Face => FACE_COLOR,
                DetectionKind::Motion => MOTION_COLOR,
            };
            draw_box(&mut image, detection, color);
        }

        if let Some(font) = &self.font {
            let text = format_timestamp(frame.timestamp, self.timezone, OVERLAY_TIMESTAMP_FORMAT);
            self.draw_timestamp(&mut image, font, &text);
        }

        Ok(image)
    }

    fn draw_timestamp(&self, image: &mut RgbImage, font: &Font<'static>, text: &str) {
        let scale = Scale::uniform(self.font_size);
        let x: u32 = 10;
        let y: u32 = image
            .height()
            .saturating_sub((self.font_size * 1.5) as u32);

        let (text_width, text_height) = text_size(scale, font, text);

        // Darken the area behind the text
        for dy in 0..(text_height.max(0) as u32 + 10) {
            for dx in 0..(text_width.max(0) as u32 + 10) {
                let px = x.saturating_sub(5) + dx;
                let py = y.saturating_sub(5) + dy;
                if px < image.width() && py < image.height() {
                    let pixel = image.get_pixel(px, py);
                    image.put_pixel(px, py, Rgb([pixel[0] / 3, pixel[1] / 3, pixel[2] / 3]));
                }
            }
        }

        draw_text_mut(
            image,
            Rgb([255, 255, 255]),
            x as i32,
            y as i32,
            scale,
            font,
            text,
        );
        debug!("Drew timestamp overlay: {}", text);
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_box(image: &mut RgbImage, detection: &DetectionEvent, color: Rgb<u8>) {
    let bbox = detection.bbox;
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width.saturating_sub(2 * inset);
        let height = bbox.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(image, rect, color);
    }
}

fn load_font(path: &Path) -> Result<Font<'static>> {
    let font_data = fs::read(path).map_err(|e| DisplayError::Render {
        details: format!("Failed to read font file '{}': {}", path.display(), e),
    })?;

    Font::try_from_vec(font_data).ok_or_else(|| {
        DisplayError::Render {
            details: format!("Failed to parse font file '{}'", path.display()),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BoundingBox;
    use std::time::SystemTime;

    fn gray_frame(width: u32, height: u32) -> FrameData {
        FrameData::from_rgb_image(
            0,
            SystemTime::now(),
            RgbImage::from_pixel(width, height, Rgb([128, 128, 128])),
        )
    }

    #[test]
    fn test_boxes_drawn_in_kind_colors() {
        let frame = gray_frame(100, 100);
        let now = frame.timestamp;
        let detections = vec![
            DetectionEvent::face(BoundingBox::new(10, 10, 30, 30), now),
            DetectionEvent::motion(BoundingBox::new(50, 50, 40, 40), 1600.0, now),
        ];

        let image = OverlayRenderer::new().render(&frame, &detections).unwrap();

        // Two-pixel outline
        assert_eq!(image.get_pixel(10, 10), &FACE_COLOR);
        assert_eq!(image.get_pixel(11, 11), &FACE_COLOR);
        assert_eq!(image.get_pixel(12, 12), &Rgb([128, 128, 128]));
        assert_eq!(image.get_pixel(39, 20), &FACE_COLOR);
        assert_eq!(image.get_pixel(89, 89), &MOTION_COLOR);
        assert_eq!(image.get_pixel(70, 70), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_source_frame_untouched() {
        let frame = gray_frame(20, 20);
        let detections = vec![DetectionEvent::face(
            BoundingBox::new(0, 0, 20, 20),
            frame.timestamp,
        )];

        OverlayRenderer::new().render(&frame, &detections).unwrap();
        assert!(frame.data.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_degenerate_boxes_are_skipped() {
        let frame = gray_frame(10, 10);
        let detections = vec![DetectionEvent::motion(
            BoundingBox::new(2, 2, 0, 5),
            0.0,
            frame.timestamp,
        )];
        let image = OverlayRenderer::new().render(&frame, &detections).unwrap();
        assert!(image.pixels().all(|p| *p == Rgb([128, 128, 128])));
    }

    #[test]
    fn test_missing_font_disables_timestamp() {
        let renderer = OverlayRenderer::new().with_timestamp(Path::new("/nonexistent/font.ttf"), 18.0, None);
        assert!(!renderer.has_timestamp());
    }
}
