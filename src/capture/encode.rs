use crate::config::EncoderBackend;
use crate::error::{RecordingError, Result};
use crate::frame::{FrameData, FrameFormat};

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
use gstreamer::prelude::*;
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
use gstreamer::Pipeline;
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
use gstreamer_app::AppSrc;

const JPEG_QUALITY: u8 = 85;

/// An open video file accepting frames of one fixed size
pub trait VideoEncoder: Send {
    fn write_frame(&mut self, frame: &FrameData) -> Result<()>;

    /// Flush and close the file. Calling it again does nothing.
    fn finish(&mut self) -> Result<()>;
}

/// Creates encoders for new recording sessions
pub trait EncoderFactory: Send {
    /// File extension of the produced clips, without the dot
    fn extension(&self) -> &'static str;

    fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn VideoEncoder>>;
}

/// Compress `frame` to JPEG, passing MJPEG frames through untouched
pub(crate) fn frame_to_jpeg(frame: &FrameData, width: u32, height: u32) -> Result<Vec<u8>> {
    if (frame.width, frame.height) != (width, height) {
        return Err(RecordingError::Write {
            details: format!(
                "frame {} is {}x{}, session expects {}x{}",
                frame.id, frame.width, frame.height, width, height
            ),
        }
        .into());
    }

    if frame.format == FrameFormat::Mjpeg {
        return Ok(frame.data.to_vec());
    }

    let rgb = frame.to_rgb_image()?;
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| RecordingError::Write {
            details: format!("JPEG encoding failed: {}", e),
        })?;
    Ok(jpeg)
}

/// Motion-JPEG stream: every frame appended to one file as a complete JPEG
pub struct MjpegStreamEncoder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    width: u32,
    height: u32,
    frames: u64,
}

impl MjpegStreamEncoder {
    pub fn create(path: &Path, width: u32, height: u32) -> Result<Self> {
        let file = File::create(path).map_err(|e| RecordingError::EncodeResource {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;

        debug!("Opened MJPEG stream {} ({}x{})", path.display(), width, height);

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            width,
            height,
            frames: 0,
        })
    }
}

impl VideoEncoder for MjpegStreamEncoder {
    fn write_frame(&mut self, frame: &FrameData) -> Result<()> {
        let jpeg = frame_to_jpeg(frame, self.width, self.height)?;
        let writer = self.writer.as_mut().ok_or_else(|| RecordingError::Write {
            details: format!("{} is already closed", self.path.display()),
        })?;

        writer.write_all(&jpeg).map_err(|e| RecordingError::Write {
            details: format!("{}: {}", self.path.display(), e),
        })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(
                "Closed MJPEG stream {} ({} frames)",
                self.path.display(),
                self.frames
            );
        }
        Ok(())
    }
}

impl Drop for MjpegStreamEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

pub struct MjpegEncoderFactory;

impl EncoderFactory for MjpegEncoderFactory {
    fn extension(&self) -> &'static str {
        "mjpeg"
    }

    fn create(&self, path: &Path, width: u32, height: u32, _fps: u32) -> Result<Box<dyn VideoEncoder>> {
        Ok(Box::new(MjpegStreamEncoder::create(path, width, height)?))
    }
}

/// AVI (MJPG) file written through `appsrc ! jpegparse ! avimux ! filesink`
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub struct GstAviEncoder {
    path: PathBuf,
    pipeline: Option<Pipeline>,
    appsrc: AppSrc,
    width: u32,
    height: u32,
    fps: u32,
    frames: u64,
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
impl GstAviEncoder {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let resource_error = |details: String| RecordingError::EncodeResource {
            path: path.display().to_string(),
            details,
        };

        gstreamer::init().map_err(|e| resource_error(format!("GStreamer init failed: {}", e)))?;

        let pipeline_desc = format!(
            "appsrc name=src format=time is-live=false \
             caps=image/jpeg,width={},height={},framerate={}/1 ! \
             jpegparse ! avimux ! filesink location=\"{}\"",
            width,
            height,
            fps,
            path.display()
        );
        debug!("Encoder pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| resource_error(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| resource_error("Failed to downcast to Pipeline".to_string()))?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<AppSrc>().ok())
            .ok_or_else(|| resource_error("Failed to get appsrc element".to_string()))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(resource_error(format!("Failed to start pipeline: {}", e)).into());
        }

        info!("Started AVI encoder for {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            pipeline: Some(pipeline),
            appsrc,
            width,
            height,
            fps: fps.max(1),
            frames: 0,
        })
    }
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
impl VideoEncoder for GstAviEncoder {
    fn write_frame(&mut self, frame: &FrameData) -> Result<()> {
        if self.pipeline.is_none() {
            return Err(RecordingError::Write {
                details: format!("{} is already closed", self.path.display()),
            }
            .into());
        }

        let jpeg = frame_to_jpeg(frame, self.width, self.height)?;
        let frame_ns = 1_000_000_000 / self.fps as u64;

        let mut buffer = gstreamer::Buffer::from_mut_slice(jpeg);
        if let Some(buffer_ref) = buffer.get_mut() {
            buffer_ref.set_pts(gstreamer::ClockTime::from_nseconds(self.frames * frame_ns));
            buffer_ref.set_duration(gstreamer::ClockTime::from_nseconds(frame_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RecordingError::Write {
                details: format!("Failed to push buffer: {:?}", e),
            })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };

        let _ = self.appsrc.end_of_stream();

        let mut outcome = Ok(());
        if let Some(bus) = pipeline.bus() {
            for msg in bus.iter_timed(gstreamer::ClockTime::from_seconds(10)) {
                match msg.view() {
                    gstreamer::MessageView::Eos(..) => break,
                    gstreamer::MessageView::Error(err) => {
                        outcome = Err(RecordingError::Write {
                            details: format!(
                                "{}: {} ({})",
                                self.path.display(),
                                err.error(),
                                err.debug().unwrap_or_default()
                            ),
                        }
                        .into());
                        break;
                    }
                    _ => {}
                }
            }
        }

        let _ = pipeline.set_state(gstreamer::State::Null);
        info!(
            "Closed AVI file {} ({} frames)",
            self.path.display(),
            self.frames
        );
        outcome
    }
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
impl Drop for GstAviEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to finalize {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub struct GstAviEncoderFactory;

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
impl EncoderFactory for GstAviEncoderFactory {
    fn extension(&self) -> &'static str {
        "avi"
    }

    fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn VideoEncoder>> {
        Ok(Box::new(GstAviEncoder::create(path, width, height, fps)?))
    }
}

/// Factory for the configured backend, falling back to MJPEG when GStreamer
/// encoding was not compiled in
pub fn encoder_factory(backend: EncoderBackend) -> Box<dyn EncoderFactory> {
    match backend {
        EncoderBackend::Mjpeg => Box::new(MjpegEncoderFactory),
        EncoderBackend::Gstreamer => {
            #[cfg(all(feature = "video_encoding", target_os = "linux"))]
            {
                Box::new(GstAviEncoderFactory)
            }

            #[cfg(not(all(feature = "video_encoding", target_os = "linux")))]
            {
                warn!("GStreamer encoding not compiled in, recording MJPEG streams instead");
                Box::new(MjpegEncoderFactory)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::time::SystemTime;

    fn frame(id: u64, width: u32, height: u32) -> FrameData {
        FrameData::from_rgb_image(
            id,
            SystemTime::now(),
            RgbImage::from_pixel(width, height, Rgb([40, 120, 200])),
        )
    }

    #[test]
    fn test_mjpeg_stream_holds_one_jpeg_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");

        let mut encoder = MjpegEncoderFactory.create(&path, 32, 24, 20).unwrap();
        for id in 0..3 {
            encoder.write_frame(&frame(id, 32, 24)).unwrap();
        }
        encoder.finish().unwrap();
        encoder.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let starts = bytes.windows(2).filter(|w| w == &[0xFF, 0xD8]).count();
        assert!(starts >= 3);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);

        let first = image::load_from_memory(&bytes).unwrap();
        assert_eq!((first.width(), first.height()), (32, 24));
    }

    #[test]
    fn test_frame_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = MjpegEncoderFactory
            .create(&dir.path().join("clip.mjpeg"), 32, 24, 20)
            .unwrap();
        assert!(encoder.write_frame(&frame(0, 16, 16)).is_err());
    }

    #[test]
    fn test_write_after_finish_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = MjpegEncoderFactory
            .create(&dir.path().join("clip.mjpeg"), 8, 8, 20)
            .unwrap();
        encoder.finish().unwrap();
        assert!(encoder.write_frame(&frame(0, 8, 8)).is_err());
    }

    #[test]
    fn test_unwritable_path_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("clip.mjpeg");
        let err = MjpegEncoderFactory.create(&path, 8, 8, 20).err().unwrap();
        assert!(matches!(
            err,
            crate::error::WardcamError::Recording(RecordingError::EncodeResource { .. })
        ));
    }

    #[test]
    fn test_mjpeg_frames_pass_through() {
        let mut jpeg = Vec::new();
        JpegEncoder::new(&mut jpeg)
            .encode(&[0u8; 8 * 8 * 3], 8, 8, ColorType::Rgb8)
            .unwrap();
        let source = FrameData::new(0, SystemTime::now(), jpeg.clone(), 8, 8, FrameFormat::Mjpeg);
        assert_eq!(frame_to_jpeg(&source, 8, 8).unwrap(), jpeg);
    }

    #[cfg(not(all(feature = "video_encoding", target_os = "linux")))]
    #[test]
    fn test_gstreamer_backend_falls_back_to_mjpeg() {
        assert_eq!(encoder_factory(EncoderBackend::Gstreamer).extension(), "mjpeg");
    }
}
