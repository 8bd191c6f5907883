use super::FrameSource;
use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use crate::frame::{strip_row_padding, FrameData, FrameFormat};

use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Pipeline};
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

const START_TIMEOUT: ClockTime = ClockTime::from_seconds(5);
const PULL_TIMEOUT: ClockTime = ClockTime::from_seconds(5);

/// V4L2 camera read through a GStreamer pipeline ending in an appsink
pub struct GstCameraSource {
    config: CameraConfig,
    pipeline: Option<Pipeline>,
    appsink: AppSink,
    format: FrameFormat,
    frame_counter: u64,
}

impl GstCameraSource {
    /// Build and start the capture pipeline for `config.index`
    pub fn open(config: &CameraConfig) -> Result<Self> {
        info!(
            "Opening camera {} ({}x{} @ {}fps, {})",
            config.index, config.resolution.0, config.resolution.1, config.fps, config.format
        );

        let unavailable = |details: String| CameraError::DeviceUnavailable {
            index: config.index,
            details,
        };

        gstreamer::init().map_err(|e| unavailable(format!("Failed to initialize GStreamer: {}", e)))?;

        let (pipeline_desc, format) = Self::build_pipeline_string(config);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| unavailable(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| unavailable("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| unavailable("Pipeline has no appsink".to_string()))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(unavailable(format!("Failed to start pipeline: {}", e)).into());
        }

        // Wait for the device to actually start streaming
        let (state_result, _, _) = pipeline.state(START_TIMEOUT);
        if let Err(e) = state_result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(unavailable(format!("Device did not start: {}", e)).into());
        }

        info!("Camera {} streaming", config.index);

        Ok(Self {
            config: config.clone(),
            pipeline: Some(pipeline),
            appsink,
            format,
            frame_counter: 0,
        })
    }

    fn build_pipeline_string(config: &CameraConfig) -> (String, FrameFormat) {
        let (width, height) = config.resolution;
        let fps = config.fps;
        let device = format!("/dev/video{}", config.index);

        if config.format.eq_ignore_ascii_case("MJPG") || config.format.eq_ignore_ascii_case("MJPEG") {
            let pipeline = format!(
                "v4l2src device={} io-mode=mmap do-timestamp=true ! \
                 image/jpeg,width={},height={},framerate={}/1 ! \
                 queue max-size-buffers=4 leaky=downstream ! \
                 appsink name=sink sync=false max-buffers=2 drop=true",
                device, width, height, fps
            );
            return (pipeline, FrameFormat::Mjpeg);
        }

        let pipeline = format!(
            "v4l2src device={} do-timestamp=true ! \
             decodebin ! videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             appsink name=sink sync=false max-buffers=2 drop=true",
            device, width, height
        );
        (pipeline, FrameFormat::Rgb24)
    }

    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<FrameData> {
        let failure = |details: String| CameraError::CaptureFailure { details };

        let buffer = sample
            .buffer()
            .ok_or_else(|| failure("No buffer in sample".to_string()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| failure("No caps in sample".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|e| failure(format!("Failed to map buffer: {}", e)))?;

        let timestamp = SystemTime::now();
        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        let (width, height, data) = match self.format {
            FrameFormat::Rgb24 => {
                let video_info = VideoInfo::from_caps(caps)
                    .map_err(|e| failure(format!("Failed to get video info: {}", e)))?;
                let width = video_info.width();
                let height = video_info.height();
                let stride = video_info.stride()[0] as usize;
                let data = strip_row_padding(
                    map.as_slice(),
                    width as usize * 3,
                    stride,
                    height as usize,
                );
                (width, height, data)
            }
            _ => {
                let (width, height) = self.config.resolution;
                (width, height, map.as_slice().to_vec())
            }
        };

        trace!(
            "Captured frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            data.len()
        );

        Ok(FrameData::new(frame_id, timestamp, data, width, height, self.format))
    }
}

#[async_trait]
impl FrameSource for GstCameraSource {
    async fn next_frame(&mut self) -> Result<FrameData> {
        if self.pipeline.is_none() {
            return Err(CameraError::CaptureFailure {
                details: "Camera is closed".to_string(),
            }
            .into());
        }

        let appsink = self.appsink.clone();
        let sample = tokio::task::spawn_blocking(move || {
            let sample = appsink.try_pull_sample(PULL_TIMEOUT);
            (sample, appsink.is_eos())
        })
        .await
        .map_err(|e| CameraError::CaptureFailure {
            details: format!("Capture task failed: {}", e),
        })?;

        match sample {
            (Some(sample), _) => self.sample_to_frame(sample),
            (None, true) => Err(CameraError::CaptureFailure {
                details: "Camera stream ended".to_string(),
            }
            .into()),
            (None, false) => Err(CameraError::CaptureFailure {
                details: format!("No frame within {}", PULL_TIMEOUT),
            }
            .into()),
        }
    }

    fn width(&self) -> u32 {
        self.config.resolution.0
    }

    fn height(&self) -> u32 {
        self.config.resolution.1
    }

    fn fps(&self) -> u32 {
        self.config.fps
    }

    fn close(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            debug!("Stopping camera pipeline");
            if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                warn!("Failed to stop camera pipeline: {}", e);
            }
            info!("Camera {} released", self.config.index);
        }
    }
}

impl Drop for GstCameraSource {
    fn drop(&mut self) {
        self.close();
    }
}
