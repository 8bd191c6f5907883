use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use uuid::Uuid;

/// Sidecar describing one finished clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub session_id: Uuid,
    pub video_path: PathBuf,
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl ClipMetadata {
    /// `<clip stem>.json` next to the clip
    pub fn sidecar_path(&self) -> PathBuf {
        self.video_path.with_extension("json")
    }
}

pub(crate) fn save_metadata(metadata: &ClipMetadata) -> Result<PathBuf> {
    let metadata_json = serde_json::to_string_pretty(metadata)?;
    let metadata_path = metadata.sidecar_path();
    fs::write(&metadata_path, metadata_json)?;

    debug!("Saved metadata to {}", metadata_path.display());
    Ok(metadata_path)
}

pub fn load_metadata(path: &Path) -> Result<ClipMetadata> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
