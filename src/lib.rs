pub mod analyzer;
pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod event_log;
pub mod events;
pub mod frame;

pub use analyzer::{ClassifierProvider, FaceClassifier, FaceDetector, MotionDetector};
pub use app::{install_signal_handlers, ExitStatus, Monitor, MonitorBuilder, MonitorStats, ShutdownReason};
pub use camera::{open_camera, FrameSource, SyntheticFrameSource};
pub use capture::{EncoderFactory, RecordingController, RecordingState, RecordingTransition, VideoEncoder};
pub use config::WardcamConfig;
pub use display::{open_display, DisplaySurface};
pub use error::{Result, WardcamError};
pub use event_log::EventLogger;
pub use events::{BoundingBox, DetectionEvent, DetectionKind, LogEventType};
pub use frame::{FrameData, FrameFormat};
