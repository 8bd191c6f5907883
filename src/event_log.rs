use crate::config::LoggingConfig;
use crate::error::Result;
use crate::events::LogEventType;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Resolve configured timezone, falling back to local time on parse errors
pub(crate) fn resolve_timezone(tz_name: Option<&str>) -> Option<Tz> {
    let name = tz_name?;
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            warn!("Invalid timezone '{}', falling back to local time", name);
            None
        }
    }
}

/// Format `timestamp` with `pattern` in `timezone` (local time when `None`)
pub(crate) fn format_timestamp(timestamp: SystemTime, timezone: Option<Tz>, pattern: &str) -> String {
    let utc = DateTime::<Utc>::from(timestamp);
    match timezone {
        Some(tz) => utc.with_timezone(&tz).format(pattern).to_string(),
        None => utc.with_timezone(&Local).format(pattern).to_string(),
    }
}

/// Append-only security event log.
///
/// Every call opens the file, appends one line and closes it again, so each
/// record is on disk before `log` returns.
#[derive(Debug, Clone)]
pub struct EventLogger {
    path: PathBuf,
    timezone: Option<Tz>,
    echo_stdout: bool,
}

impl EventLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            path: config.log_path(),
            timezone: resolve_timezone(config.timezone.as_deref()),
            echo_stdout: config.echo_stdout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event stamped with the current time
    pub fn log(&self, event_type: LogEventType, detail: &str) -> Result<()> {
        self.log_at(SystemTime::now(), event_type, detail)
    }

    /// Record an event with an explicit timestamp
    pub fn log_at(&self, timestamp: SystemTime, event_type: LogEventType, detail: &str) -> Result<()> {
        let line = self.format_line(timestamp, event_type, detail);

        if self.echo_stdout {
            println!("{}", line);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        Ok(())
    }

    /// Record an event, reporting write failures through tracing instead of the caller
    pub fn record(&self, event_type: LogEventType, detail: &str) {
        if let Err(e) = self.log(event_type, detail) {
            warn!(
                "Failed to append '{}' event to {}: {}",
                event_type,
                self.path.display(),
                e
            );
        }
    }

    pub fn format_line(&self, timestamp: SystemTime, event_type: LogEventType, detail: &str) -> String {
        format!(
            "[{}] {}: {}",
            format_timestamp(timestamp, self.timezone, TIMESTAMP_FORMAT),
            event_type,
            detail
        )
    }
}

/// Create `<log_dir>/` and, when recording is enabled, `<log_dir>/videos/`
pub fn prepare_log_layout(config: &LoggingConfig, recording_enabled: bool) -> Result<()> {
    if !config.log_dir.exists() {
        fs::create_dir_all(&config.log_dir)?;
        info!("Created log directory: {}", config.log_dir.display());
    }

    if recording_enabled {
        let videos_dir = config.videos_dir();
        if !videos_dir.exists() {
            fs::create_dir_all(&videos_dir)?;
            info!("Created video directory: {}", videos_dir.display());
        }
    }

    Ok(())
}
