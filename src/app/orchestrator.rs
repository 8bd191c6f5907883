use super::stats::MonitorStats;
use crate::analyzer::{default_provider, ClassifierProvider, FaceDetector, MotionDetector};
use crate::camera::{open_camera, FrameSource};
use crate::capture::{encoder_factory, EncoderFactory, OverlayRenderer, RecordingController, RecordingTransition};
use crate::config::WardcamConfig;
use crate::display::{open_display, DisplaySurface};
use crate::error::Result;
use crate::event_log::{prepare_log_layout, resolve_timezone, EventLogger};
use crate::events::{DetectionEvent, DetectionKind, LogEventType};
use crate::frame::FrameData;

use std::path::Path;
use tracing::{debug, info, warn};

/// The per-frame security pipeline and every resource it owns
pub struct Monitor {
    pub(super) config: WardcamConfig,
    pub(super) logger: EventLogger,
    pub(super) source: Option<Box<dyn FrameSource>>,
    pub(super) motion: Option<MotionDetector>,
    pub(super) face: Option<FaceDetector>,
    pub(super) recorder: RecordingController,
    pub(super) overlay: OverlayRenderer,
    pub(super) display: Option<Box<dyn DisplaySurface>>,
    pub(super) stats: MonitorStats,
    pub(super) shut_down: bool,
}

impl Monitor {
    pub fn builder(config: WardcamConfig) -> MonitorBuilder {
        MonitorBuilder::new(config)
    }

    /// Run one frame through detection, logging, recording and display.
    ///
    /// Returns the detections found in `frame`. A frame that cannot be
    /// analysed is still handed to the recorder as a frame without
    /// detections before the error is returned.
    pub fn process_frame(&mut self, frame: &FrameData) -> Result<Vec<DetectionEvent>> {
        let detections = match self.analyse(frame) {
            Ok(detections) => detections,
            Err(e) => {
                let transitions = self.recorder.update(false, frame);
                for transition in &transitions {
                    self.log_transition(transition);
                }
                self.stats.frames_processed += 1;
                return Err(e);
            }
        };

        for detection in &detections {
            self.logger.record(detection.log_type(), &detection.description());
            match detection.kind {
                DetectionKind::Face => self.stats.face_events += 1,
                DetectionKind::Motion => self.stats.motion_events += 1,
            }
        }

        let transitions = self.recorder.update(!detections.is_empty(), frame);
        for transition in &transitions {
            self.log_transition(transition);
        }

        self.present(frame, &detections);
        self.stats.frames_processed += 1;

        Ok(detections)
    }

    /// Face detection then motion detection on one shared grayscale copy
    fn analyse(&mut self, frame: &FrameData) -> Result<Vec<DetectionEvent>> {
        let mut detections = Vec::new();
        if self.face.is_none() && self.motion.is_none() {
            return Ok(detections);
        }

        let gray = frame.to_gray_image()?;
        if let Some(face) = self.face.as_mut() {
            detections.extend(face.detect_events(&gray, frame.timestamp));
        }
        if let Some(motion) = self.motion.as_mut() {
            detections.extend(motion.detect(&gray, frame.timestamp));
        }
        Ok(detections)
    }

    /// Draw the overlay on a copy of `frame` and show it. A failing surface is
    /// closed and not used again.
    fn present(&mut self, frame: &FrameData, detections: &[DetectionEvent]) {
        let Some(display) = self.display.as_mut() else {
            return;
        };

        let outcome = self
            .overlay
            .render(frame, detections)
            .and_then(|image| display.present(&image));

        if let Err(e) = outcome {
            warn!("Display failed, continuing without it: {}", e);
            display.close();
            self.display = None;
        }
    }

    pub(super) fn log_transition(&self, transition: &RecordingTransition) {
        match transition {
            RecordingTransition::Started { path, .. } => self.logger.record(
                LogEventType::VideoRecording,
                &format!("Started recording to {}", path.display()),
            ),
            RecordingTransition::Stopped { .. } => {
                self.logger.record(LogEventType::VideoRecording, "Stopped recording.")
            }
            RecordingTransition::Failed { error } => self.logger.record(
                LogEventType::Error,
                &format!("Video recording failed: {}", error),
            ),
            RecordingTransition::Extended { session_id } => {
                debug!("Recording {} extended", session_id)
            }
        }
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            sessions_opened: self.recorder.sessions_opened(),
            sessions_closed: self.recorder.sessions_closed(),
            ..self.stats
        }
    }

    pub fn config(&self) -> &WardcamConfig {
        &self.config
    }

    pub fn log_path(&self) -> &Path {
        self.logger.path()
    }

    pub fn face_detection_active(&self) -> bool {
        self.face.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }
}

/// Assembles a [`Monitor`], opening whatever was not supplied explicitly
pub struct MonitorBuilder {
    config: WardcamConfig,
    source: Option<Box<dyn FrameSource>>,
    classifier_provider: Option<Box<dyn ClassifierProvider>>,
    encoder_factory: Option<Box<dyn EncoderFactory>>,
    display: Option<Box<dyn DisplaySurface>>,
    headless: bool,
}

impl MonitorBuilder {
    pub fn new(config: WardcamConfig) -> Self {
        Self {
            config,
            source: None,
            classifier_provider: None,
            encoder_factory: None,
            display: None,
            headless: false,
        }
    }

    pub fn with_frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_classifier_provider(mut self, provider: Box<dyn ClassifierProvider>) -> Self {
        self.classifier_provider = Some(provider);
        self
    }

    pub fn with_encoder_factory(mut self, factory: Box<dyn EncoderFactory>) -> Self {
        self.encoder_factory = Some(factory);
        self
    }

    pub fn with_display(mut self, display: Box<dyn DisplaySurface>) -> Self {
        self.display = Some(display);
        self
    }

    /// Never open a display surface
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Validate the configuration, prepare the log directory and acquire
    /// the capture device. Fails only when the device cannot be opened or
    /// the log directory cannot be created.
    pub fn build(self) -> Result<Monitor> {
        let config = self.config;
        config.validate()?;

        prepare_log_layout(&config.logging, config.recording.enabled)?;
        let logger = EventLogger::new(&config.logging);

        let source = match self.source {
            Some(source) => source,
            None => match open_camera(&config.camera) {
                Ok(source) => source,
                Err(e) => {
                    logger.record(LogEventType::Error, "Cannot open webcam.");
                    return Err(e);
                }
            },
        };
        info!(
            "Frame source ready: {}x{} @ {}fps",
            source.width(),
            source.height(),
            source.fps()
        );

        let face = if config.detection.face_enabled {
            let provider = self.classifier_provider.unwrap_or_else(default_provider);
            match FaceDetector::load(provider.as_ref(), &config.face) {
                Ok(detector) => Some(detector),
                Err(e) => {
                    warn!("Face detection disabled: {}", e);
                    logger.record(
                        LogEventType::Error,
                        "Error loading face cascade classifier. Face detection will be disabled.",
                    );
                    None
                }
            }
        } else {
            None
        };

        let motion = config
            .detection
            .motion_enabled
            .then(|| MotionDetector::new(config.motion.clone()));

        let factory = self
            .encoder_factory
            .unwrap_or_else(|| encoder_factory(config.recording.backend));
        let timezone = resolve_timezone(config.logging.timezone.as_deref());
        let recorder = RecordingController::new(
            config.recording.clone(),
            config.logging.videos_dir(),
            timezone,
            (source.width(), source.height()),
            factory,
        );

        let mut overlay = OverlayRenderer::new();
        if config.display.timestamp_overlay {
            overlay = overlay.with_timestamp(
                Path::new(&config.display.timestamp_font_path),
                config.display.timestamp_font_size,
                timezone,
            );
        }

        let display = if self.headless {
            None
        } else {
            self.display.or_else(|| open_display(&config.display))
        };

        let has_display = display.is_some();
        info!(
            "Monitor assembled (face: {}, motion: {}, recording: {}, display: {})",
            face.is_some(),
            motion.is_some(),
            config.recording.enabled,
            has_display
        );

        Ok(Monitor {
            config,
            logger,
            source: Some(source),
            motion,
            face,
            recorder,
            overlay,
            display,
            stats: MonitorStats::default(),
            shut_down: false,
        })
    }
}
