use crate::config::FaceConfig;
use crate::error::{AnalyzerError, Result};
use crate::events::{BoundingBox, DetectionEvent};

use image::GrayImage;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// A loaded frontal-face classifier
pub trait FaceClassifier: Send {
    /// Locate faces in a grayscale frame
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>>;
}

/// Loads a classifier from the model described by a [`FaceConfig`]
pub trait ClassifierProvider {
    fn load(&self, config: &FaceConfig) -> Result<Box<dyn FaceClassifier>>;
}

/// Face detection stage. Only exists when a classifier loaded successfully.
pub struct FaceDetector {
    classifier: Box<dyn FaceClassifier>,
    min_size: (u32, u32),
    frames_processed: u64,
}

impl FaceDetector {
    /// Load the configured model through `provider`
    pub fn load(provider: &dyn ClassifierProvider, config: &FaceConfig) -> Result<Self> {
        let classifier = provider.load(config)?;
        info!(
            "Face classifier loaded from {} (scale {}, neighbors {}, min size {:?})",
            config.model_path.display(),
            config.scale_factor,
            config.min_neighbors,
            config.min_size
        );
        Ok(Self::with_classifier(classifier, config.min_size))
    }

    pub fn with_classifier(classifier: Box<dyn FaceClassifier>, min_size: (u32, u32)) -> Self {
        Self {
            classifier,
            min_size,
            frames_processed: 0,
        }
    }

    /// Report faces in `gray` that meet the minimum size.
    ///
    /// A per-frame classifier failure is logged and treated as "no faces".
    pub fn detect(&mut self, gray: &GrayImage) -> Vec<BoundingBox> {
        self.frames_processed += 1;
        let (min_width, min_height) = self.min_size;

        match self.classifier.detect(gray) {
            Ok(faces) => {
                let faces: Vec<BoundingBox> = faces
                    .into_iter()
                    .filter(|face| face.width >= min_width && face.height >= min_height)
                    .collect();
                if !faces.is_empty() {
                    debug!("Frame {}: {} face(s)", self.frames_processed, faces.len());
                }
                faces
            }
            Err(e) => {
                warn!("Face classifier failed on frame {}: {}", self.frames_processed, e);
                Vec::new()
            }
        }
    }

    pub fn detect_events(&mut self, gray: &GrayImage, timestamp: SystemTime) -> Vec<DetectionEvent> {
        self.detect(gray)
            .into_iter()
            .map(|bbox| DetectionEvent::face(bbox, timestamp))
            .collect()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Provider used when no classifier backend was compiled in
pub struct UnavailableProvider;

impl ClassifierProvider for UnavailableProvider {
    fn load(&self, config: &FaceConfig) -> Result<Box<dyn FaceClassifier>> {
        Err(AnalyzerError::ClassifierLoad {
            model: config.model_path.display().to_string(),
            details: "no face classifier backend compiled in (enable the face_detection feature)"
                .to_string(),
        }
        .into())
    }
}

/// Classifier backend for this build
pub fn default_provider() -> Box<dyn ClassifierProvider> {
    #[cfg(all(feature = "face_detection", target_os = "linux"))]
    {
        Box::new(super::facedetect::GstFacedetectProvider)
    }

    #[cfg(not(all(feature = "face_detection", target_os = "linux")))]
    {
        Box::new(UnavailableProvider)
    }
}
