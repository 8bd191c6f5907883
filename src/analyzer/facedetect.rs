use super::face::{ClassifierProvider, FaceClassifier};
use crate::config::FaceConfig;
use crate::error::{AnalyzerError, Result};
use crate::events::BoundingBox;
use crate::frame::pad_rows;

use gstreamer::prelude::*;
use gstreamer::{ClockTime, ElementFactory, MessageType, MessageView, Pipeline};
use gstreamer_app::AppSrc;
use image::GrayImage;
use tracing::{debug, info, warn};

const CLASSIFIER_TIMEOUT: ClockTime = ClockTime::from_seconds(1);

/// Haar cascade classifier backed by the GStreamer `facedetect` element
pub struct GstFacedetectProvider;

impl ClassifierProvider for GstFacedetectProvider {
    fn load(&self, config: &FaceConfig) -> Result<Box<dyn FaceClassifier>> {
        let model = config.model_path.display().to_string();
        let load_error = |details: String| AnalyzerError::ClassifierLoad {
            model: model.clone(),
            details,
        };

        gstreamer::init().map_err(|e| load_error(format!("GStreamer init failed: {}", e)))?;

        if ElementFactory::find("facedetect").is_none() {
            return Err(load_error("facedetect element not installed".to_string()).into());
        }
        if !config.model_path.is_file() {
            return Err(load_error("model file not found".to_string()).into());
        }

        Ok(Box::new(GstFaceClassifier {
            config: config.clone(),
            active: None,
        }))
    }
}

struct ClassifierPipeline {
    pipeline: Pipeline,
    appsrc: AppSrc,
    bus: gstreamer::Bus,
    dimensions: (u32, u32),
    frames: u64,
}

/// Runs each grayscale frame through `appsrc ! videoconvert ! facedetect` and
/// reads the face list back from the element message on the bus.
pub struct GstFaceClassifier {
    config: FaceConfig,
    active: Option<ClassifierPipeline>,
}

impl GstFaceClassifier {
    fn build_pipeline(&self, width: u32, height: u32) -> Result<ClassifierPipeline> {
        let pipeline_desc = format!(
            "appsrc name=src format=time is-live=false \
             caps=video/x-raw,format=GRAY8,width={},height={},framerate=0/1 ! \
             videoconvert ! \
             facedetect name=detector display=false updates=every_frame \
             profile=\"{}\" scale-factor={} min-neighbors={} \
             min-size-width={} min-size-height={} ! \
             fakesink sync=false",
            width,
            height,
            self.config.model_path.display(),
            self.config.scale_factor,
            self.config.min_neighbors,
            self.config.min_size.0,
            self.config.min_size.1
        );

        debug!("Classifier pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| AnalyzerError::FrameProcessing {
                details: format!("Failed to create classifier pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| AnalyzerError::FrameProcessing {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<AppSrc>().ok())
            .ok_or_else(|| AnalyzerError::FrameProcessing {
                details: "Classifier pipeline has no appsrc".to_string(),
            })?;

        let bus = pipeline.bus().ok_or_else(|| AnalyzerError::FrameProcessing {
            details: "Classifier pipeline has no bus".to_string(),
        })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| AnalyzerError::FrameProcessing {
                details: format!("Failed to start classifier pipeline: {}", e),
            })?;

        info!("Face classifier pipeline started for {}x{}", width, height);

        Ok(ClassifierPipeline {
            pipeline,
            appsrc,
            bus,
            dimensions: (width, height),
            frames: 0,
        })
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.appsrc.end_of_stream();
            let _ = active.pipeline.set_state(gstreamer::State::Null);
        }
    }
}

impl FaceClassifier for GstFaceClassifier {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>> {
        let dimensions = gray.dimensions();
        if self.active.as_ref().map(|a| a.dimensions) != Some(dimensions) {
            self.stop();
            self.active = Some(self.build_pipeline(dimensions.0, dimensions.1)?);
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(Vec::new());
        };

        // GStreamer expects GRAY8 rows aligned to 4 bytes
        let data = pad_rows(
            gray.as_raw(),
            dimensions.0 as usize,
            dimensions.1 as usize,
            4,
        );
        let pts = ClockTime::from_mseconds(active.frames);
        let mut buffer = gstreamer::Buffer::from_mut_slice(data);
        if let Some(buffer_ref) = buffer.get_mut() {
            buffer_ref.set_pts(pts);
        }
        active.frames += 1;

        active
            .appsrc
            .push_buffer(buffer)
            .map_err(|e| AnalyzerError::FrameProcessing {
                details: format!("Failed to push frame to classifier: {:?}", e),
            })?;

        loop {
            let Some(message) = active.bus.timed_pop_filtered(
                CLASSIFIER_TIMEOUT,
                &[MessageType::Element, MessageType::Error],
            ) else {
                warn!("Face classifier produced no result within {}", CLASSIFIER_TIMEOUT);
                return Ok(Vec::new());
            };

            match message.view() {
                MessageView::Error(err) => {
                    return Err(AnalyzerError::FrameProcessing {
                        details: format!("Classifier pipeline error: {}", err.error()),
                    }
                    .into());
                }
                MessageView::Element(element) => {
                    let Some(structure) = element.structure() else {
                        continue;
                    };
                    if structure.name() != "facedetect" {
                        continue;
                    }
                    let stamp = structure.get::<u64>("timestamp").ok();
                    if is_stale_result(stamp, pts.nseconds()) {
                        debug!("Discarding late face result for an earlier frame");
                        continue;
                    }
                    return Ok(parse_faces(structure));
                }
                _ => {}
            }
        }
    }
}

impl Drop for GstFaceClassifier {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A result stamped before the frame just pushed belongs to a frame whose
/// wait already timed out
fn is_stale_result(result_stamp: Option<u64>, pushed_pts: u64) -> bool {
    result_stamp.map_or(false, |stamp| stamp < pushed_pts)
}

fn parse_faces(structure: &gstreamer::StructureRef) -> Vec<BoundingBox> {
    let Ok(faces) = structure.get::<gstreamer::List>("faces") else {
        return Vec::new();
    };

    faces
        .iter()
        .filter_map(|value| value.get::<gstreamer::Structure>().ok())
        .filter_map(|face| {
            Some(BoundingBox::new(
                face.get::<u32>("x").ok()?,
                face.get::<u32>("y").ok()?,
                face.get::<u32>("width").ok()?,
                face.get::<u32>("height").ok()?,
            ))
        })
        .collect()
}
