mod encode;
mod metadata;
mod overlay;
mod recorder;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub use encode::{GstAviEncoder, GstAviEncoderFactory};
pub use encode::{
    encoder_factory, EncoderFactory, MjpegEncoderFactory, MjpegStreamEncoder, VideoEncoder,
};
pub use metadata::{load_metadata, ClipMetadata};
pub use overlay::{OverlayRenderer, FACE_COLOR, MOTION_COLOR};
pub use recorder::{RecordingController, RecordingState, RecordingTransition};
