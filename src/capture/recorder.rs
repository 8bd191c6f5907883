use super::encode::{EncoderFactory, VideoEncoder};
use super::metadata::{save_metadata, ClipMetadata};
use crate::config::RecordingConfig;
use crate::error::Result;
use crate::event_log::format_timestamp;
use crate::frame::FrameData;

use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const PATH_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// What a call to the controller changed
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingTransition {
    Started {
        session_id: Uuid,
        path: PathBuf,
    },
    /// A detection pushed the close deadline back
    Extended { session_id: Uuid },
    Stopped {
        session_id: Uuid,
        path: PathBuf,
        frames_written: u64,
        duration: Duration,
    },
    Failed { error: String },
}

struct RecordingSession {
    id: Uuid,
    path: PathBuf,
    encoder: Box<dyn VideoEncoder>,
    started_at: SystemTime,
    last_reset: SystemTime,
    last_frame_at: SystemTime,
    frames_written: u64,
}

/// Detection-driven clip recorder.
///
/// Opens a clip on the first detected frame, keeps appending every frame, and
/// closes the clip once `duration` has passed since the last detection. Time
/// is taken from frame timestamps.
pub struct RecordingController {
    config: RecordingConfig,
    videos_dir: PathBuf,
    timezone: Option<Tz>,
    dimensions: (u32, u32),
    factory: Box<dyn EncoderFactory>,
    session: Option<RecordingSession>,
    suppressed_until: Option<SystemTime>,
    sessions_opened: u64,
    sessions_closed: u64,
}

impl RecordingController {
    /// `dimensions` is the frame size every clip is opened with
    pub fn new(
        config: RecordingConfig,
        videos_dir: PathBuf,
        timezone: Option<Tz>,
        dimensions: (u32, u32),
        factory: Box<dyn EncoderFactory>,
    ) -> Self {
        info!(
            "Recording {} ({}s timeout, {} fps, .{} clips in {})",
            if config.enabled { "enabled" } else { "disabled" },
            config.duration_seconds,
            config.fps,
            factory.extension(),
            videos_dir.display()
        );

        Self {
            config,
            videos_dir,
            timezone,
            dimensions,
            factory,
            session: None,
            suppressed_until: None,
            sessions_opened: 0,
            sessions_closed: 0,
        }
    }

    /// Advance the state machine with one frame.
    ///
    /// Every frame that arrives while a clip is open is written to it,
    /// including the frame that opens the clip and the one that closes it.
    pub fn update(&mut self, detected: bool, frame: &FrameData) -> Vec<RecordingTransition> {
        let mut transitions = Vec::new();
        if !self.config.enabled {
            return transitions;
        }

        let now = frame.timestamp;

        if detected {
            let suppressed = self.is_suppressed(now);
            match self.session.as_mut() {
                Some(session) => {
                    session.last_reset = now;
                    transitions.push(RecordingTransition::Extended {
                        session_id: session.id,
                    });
                }
                None if suppressed => {
                    debug!("Recording suppressed after an encoder failure");
                }
                None => match self.open_session(now) {
                    Ok(transition) => transitions.push(transition),
                    Err(e) => {
                        error!("Failed to open recording: {}", e);
                        self.suppress_from(now);
                        transitions.push(RecordingTransition::Failed {
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        let Some(session) = self.session.as_mut() else {
            return transitions;
        };

        if let Err(e) = session.encoder.write_frame(frame) {
            error!("Failed to write frame {} to {}: {}", frame.id, session.path.display(), e);
            self.suppress_from(now);
            self.release_session();
            transitions.push(RecordingTransition::Failed {
                error: e.to_string(),
            });
            return transitions;
        }
        session.frames_written += 1;
        session.last_frame_at = now;

        let idle_for = now
            .duration_since(session.last_reset)
            .unwrap_or(Duration::ZERO);
        if idle_for >= self.config.duration() {
            if let Some(transition) = self.close_session() {
                transitions.push(transition);
            }
        }

        transitions
    }

    /// Close any open clip. Safe to call repeatedly.
    pub fn stop(&mut self) -> Option<RecordingTransition> {
        self.close_session()
    }

    pub fn state(&self) -> RecordingState {
        if self.session.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    pub fn sessions_closed(&self) -> u64 {
        self.sessions_closed
    }

    fn is_suppressed(&self, now: SystemTime) -> bool {
        self.suppressed_until.map_or(false, |until| now < until)
    }

    fn suppress_from(&mut self, now: SystemTime) {
        self.suppressed_until = Some(now + self.config.duration());
    }

    fn open_session(&mut self, now: SystemTime) -> Result<RecordingTransition> {
        let path = self.session_path(now);
        let (width, height) = self.dimensions;
        let encoder = self.factory.create(&path, width, height, self.config.fps)?;

        let id = Uuid::new_v4();
        self.session = Some(RecordingSession {
            id,
            path: path.clone(),
            encoder,
            started_at: now,
            last_reset: now,
            last_frame_at: now,
            frames_written: 0,
        });
        self.sessions_opened += 1;
        self.suppressed_until = None;

        info!("Recording session {} started: {}", id, path.display());
        Ok(RecordingTransition::Started {
            session_id: id,
            path,
        })
    }

    fn close_session(&mut self) -> Option<RecordingTransition> {
        let mut session = self.session.take()?;
        if let Err(e) = session.encoder.finish() {
            warn!("Failed to finalize {}: {}", session.path.display(), e);
        }
        self.sessions_closed += 1;

        let duration = session
            .last_frame_at
            .duration_since(session.started_at)
            .unwrap_or(Duration::ZERO);

        info!(
            "Recording session {} stopped: {} frames over {:.1}s",
            session.id,
            session.frames_written,
            duration.as_secs_f64()
        );

        if self.config.save_metadata {
            let metadata = ClipMetadata {
                session_id: session.id,
                video_path: session.path.clone(),
                started_at: session.started_at,
                ended_at: session.last_frame_at,
                frame_count: session.frames_written,
                width: self.dimensions.0,
                height: self.dimensions.1,
                fps: self.config.fps,
            };
            if let Err(e) = save_metadata(&metadata) {
                warn!("Failed to save clip metadata: {}", e);
            }
        }

        Some(RecordingTransition::Stopped {
            session_id: session.id,
            path: session.path,
            frames_written: session.frames_written,
            duration,
        })
    }

    /// Drop a broken session without reporting it as a normal stop
    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.encoder.finish();
            self.sessions_closed += 1;
            warn!("Recording session {} released after a write failure", session.id);
        }
    }

    /// `<videos>/<YYYYMMDD_HHMMSS>.<ext>`, with `_N` appended on collision
    fn session_path(&self, now: SystemTime) -> PathBuf {
        let stamp = format_timestamp(now, self.timezone, PATH_STAMP_FORMAT);
        let extension = self.factory.extension();

        let mut path = self.videos_dir.join(format!("{}.{}", stamp, extension));
        let mut suffix = 1;
        while path.exists() {
            path = self
                .videos_dir
                .join(format!("{}_{}.{}", stamp, suffix, extension));
            suffix += 1;
        }
        path
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Some(RecordingTransition::Stopped { path, .. }) = self.close_session() {
            warn!("Recording {} closed during teardown", path.display());
        }
    }
}
