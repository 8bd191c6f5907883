mod face;
#[cfg(all(feature = "face_detection", target_os = "linux"))]
mod facedetect;
mod motion;

pub use face::{default_provider, ClassifierProvider, FaceClassifier, FaceDetector, UnavailableProvider};
#[cfg(all(feature = "face_detection", target_os = "linux"))]
pub use facedetect::{GstFaceClassifier, GstFacedetectProvider};
pub use motion::{external_regions, MotionDetector, MotionRegion};
