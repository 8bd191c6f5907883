use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
}

/// Capture device failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Capture device {index} unavailable: {details}")]
    DeviceUnavailable { index: u32, details: String },

    #[error("Frame capture failed: {details}")]
    CaptureFailure { details: String },
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Failed to load face classifier '{model}': {details}")]
    ClassifierLoad { model: String, details: String },

    #[error("Frame processing failed: {details}")]
    FrameProcessing { details: String },
}

/// Video output failures
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to create output '{path}': {details}")]
    EncodeResource { path: String, details: String },

    #[error("Failed to write frame: {details}")]
    Write { details: String },
}

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Display unavailable: {details}")]
    Unavailable { details: String },

    #[error("Render failed: {details}")]
    Render { details: String },
}

impl WardcamError {
    /// Only a broken capture device stops the monitor loop; every other
    /// error costs at most the current frame
    pub fn is_fatal(&self) -> bool {
        matches!(self, WardcamError::Camera(_))
    }
}

pub type Result<T> = std::result::Result<T, WardcamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_camera_errors_are_fatal() {
        let capture: WardcamError = CameraError::CaptureFailure {
            details: "EOS".to_string(),
        }
        .into();
        assert!(capture.is_fatal());

        let decode: WardcamError = AnalyzerError::FrameProcessing {
            details: "bad JPEG".to_string(),
        }
        .into();
        assert!(!decode.is_fatal());

        let write: WardcamError = RecordingError::Write {
            details: "disk full".to_string(),
        }
        .into();
        assert!(!write.is_fatal());
    }
}
