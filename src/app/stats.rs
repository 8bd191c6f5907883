use std::fmt;

/// Counters for one monitor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub frames_processed: u64,
    pub motion_events: u64,
    pub face_events: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} motion events, {} face events, {} recordings ({} closed)",
            self.frames_processed,
            self.motion_events,
            self.face_events,
            self.sessions_opened,
            self.sessions_closed
        )
    }
}
