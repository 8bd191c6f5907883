pub mod keyboard_input;

mod orchestrator;
mod runtime;
mod shutdown;
mod stats;
mod types;


pub use orchestrator::{Monitor, MonitorBuilder};
pub use runtime::install_signal_handlers;
pub use stats::MonitorStats;
pub use types::{ExitStatus, ShutdownReason};
