use super::DisplaySurface;
use crate::error::{DisplayError, Result};
use crate::frame::pad_rows;

use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSrc;
use image::RgbImage;
use tracing::{debug, info, warn};

struct WindowPipeline {
    pipeline: Pipeline,
    appsrc: AppSrc,
    dimensions: (u32, u32),
}

/// Desktop window fed through `appsrc ! videoconvert ! autovideosink`
pub struct WindowSurface {
    title: String,
    active: Option<WindowPipeline>,
    frames_presented: u64,
}

impl WindowSurface {
    pub fn open(title: &str) -> Result<Self> {
        if std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none() {
            return Err(DisplayError::Unavailable {
                details: "no DISPLAY or WAYLAND_DISPLAY set".to_string(),
            }
            .into());
        }

        gstreamer::init().map_err(|e| DisplayError::Unavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        info!("Display window '{}' ready", title);
        Ok(Self {
            title: title.to_string(),
            active: None,
            frames_presented: 0,
        })
    }

    fn build_pipeline(&self, width: u32, height: u32) -> Result<WindowPipeline> {
        let pipeline_desc = format!(
            "appsrc name=src format=time is-live=true do-timestamp=true \
             caps=video/x-raw,format=RGB,width={},height={},framerate=0/1 ! \
             queue max-size-buffers=1 leaky=downstream ! \
             videoconvert ! autovideosink sync=false",
            width, height
        );
        info!("Creating GStreamer display pipeline for '{}': {}", self.title, pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| DisplayError::Unavailable {
                details: format!("Failed to create display pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| DisplayError::Unavailable {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<AppSrc>().ok())
            .ok_or_else(|| DisplayError::Unavailable {
                details: "Failed to get appsrc element".to_string(),
            })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DisplayError::Unavailable {
                details: format!("Failed to start display pipeline: {}", e),
            })?;

        Ok(WindowPipeline {
            pipeline,
            appsrc,
            dimensions: (width, height),
        })
    }
}

impl DisplaySurface for WindowSurface {
    fn present(&mut self, image: &RgbImage) -> Result<()> {
        let dimensions = image.dimensions();
        if self.active.as_ref().map(|a| a.dimensions) != Some(dimensions) {
            self.close();
            self.active = Some(self.build_pipeline(dimensions.0, dimensions.1)?);
        }
        let Some(active) = self.active.as_ref() else {
            return Ok(());
        };

        // Raw RGB rows are 4-byte aligned in GStreamer buffers
        let data = pad_rows(
            image.as_raw(),
            dimensions.0 as usize * 3,
            dimensions.1 as usize,
            4,
        );

        active
            .appsrc
            .push_buffer(gstreamer::Buffer::from_mut_slice(data))
            .map_err(|e| DisplayError::Render {
                details: format!("Failed to push buffer to display pipeline: {:?}", e),
            })?;

        // Window closed by the user shows up as an error on the bus
        if let Some(bus) = active.pipeline.bus() {
            if let Some(msg) = bus.pop_filtered(&[gstreamer::MessageType::Error]) {
                if let gstreamer::MessageView::Error(err) = msg.view() {
                    return Err(DisplayError::Render {
                        details: err.error().to_string(),
                    }
                    .into());
                }
            }
        }

        self.frames_presented += 1;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.appsrc.end_of_stream();
            if let Err(e) = active.pipeline.set_state(gstreamer::State::Null) {
                warn!("Failed to stop display pipeline: {}", e);
            }
            debug!("Display window closed after {} frames", self.frames_presented);
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        self.close();
    }
}
