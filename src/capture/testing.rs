use super::encode::{EncoderFactory, VideoEncoder};
use crate::error::{RecordingError, Result};
use crate::frame::FrameData;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What an in-memory encoder received
#[derive(Debug, Clone, Default)]
pub(crate) struct ClipRecord {
    pub path: PathBuf,
    pub frame_ids: Vec<u64>,
    pub finish_calls: usize,
}

/// Encoder factory that records frame ids instead of encoding. Clip files
/// are created empty so path collisions behave as with real encoders.
#[derive(Clone, Default)]
pub(crate) struct MemoryEncoderFactory {
    clips: Arc<Mutex<Vec<ClipRecord>>>,
    fail_create: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryEncoderFactory {
    pub fn clips(&self) -> Vec<ClipRecord> {
        self.clips.lock().unwrap().clone()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

struct MemoryEncoder {
    index: usize,
    clips: Arc<Mutex<Vec<ClipRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl VideoEncoder for MemoryEncoder {
    fn write_frame(&mut self, frame: &FrameData) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RecordingError::Write {
                details: "disk full".to_string(),
            }
            .into());
        }
        self.clips.lock().unwrap()[self.index].frame_ids.push(frame.id);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.clips.lock().unwrap()[self.index].finish_calls += 1;
        Ok(())
    }
}

impl EncoderFactory for MemoryEncoderFactory {
    fn extension(&self) -> &'static str {
        "avi"
    }

    fn create(&self, path: &Path, _width: u32, _height: u32, _fps: u32) -> Result<Box<dyn VideoEncoder>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RecordingError::EncodeResource {
                path: path.display().to_string(),
                details: "codec unavailable".to_string(),
            }
            .into());
        }

        File::create(path)?;
        let mut clips = self.clips.lock().unwrap();
        clips.push(ClipRecord {
            path: path.to_path_buf(),
            ..ClipRecord::default()
        });

        Ok(Box::new(MemoryEncoder {
            index: clips.len() - 1,
            clips: Arc::clone(&self.clips),
            fail_writes: Arc::clone(&self.fail_writes),
        }))
    }
}
