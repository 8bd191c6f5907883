/// Why the monitor loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Stop token cancelled (signal or quit key)
    UserRequest,
    /// The frame source stopped delivering frames
    CaptureFailure(String),
    /// A fatal error or panic inside the loop
    Fault(String),
}

impl ShutdownReason {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            ShutdownReason::UserRequest => ExitStatus::Clean,
            ShutdownReason::CaptureFailure(_) | ShutdownReason::Fault(_) => ExitStatus::Failure,
        }
    }
}

/// Process outcome of a monitor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Clean,
    Failure,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Failure => 1,
        }
    }
}
