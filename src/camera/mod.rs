#[cfg(all(feature = "camera", target_os = "linux"))]
mod interface;
mod synthetic;

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use interface::GstCameraSource;
pub use synthetic::SyntheticFrameSource;

use crate::config::CameraConfig;
use crate::error::Result;
use crate::frame::FrameData;
use async_trait::async_trait;

/// A stream of frames from a capture device
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame. An error means the stream is over.
    async fn next_frame(&mut self) -> Result<FrameData>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Nominal frames per second
    fn fps(&self) -> u32;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);
}

/// Open the capture device described by `config`
pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    #[cfg(all(feature = "camera", target_os = "linux"))]
    {
        Ok(Box::new(GstCameraSource::open(config)?))
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    {
        Err(crate::error::CameraError::DeviceUnavailable {
            index: config.index,
            details: "camera support not compiled in (enable the camera feature)".to_string(),
        }
        .into())
    }
}
