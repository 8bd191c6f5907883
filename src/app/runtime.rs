use super::orchestrator::Monitor;
use super::types::{ExitStatus, ShutdownReason};
use crate::events::LogEventType;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

impl Monitor {
    /// Process frames until `cancel` fires, the source fails or the loop
    /// faults. Cleanup runs before this returns, whatever the cause.
    pub async fn run(&mut self, cancel: CancellationToken) -> ExitStatus {
        self.logger.record(LogEventType::System, "Security system started.");

        let reason = match AssertUnwindSafe(self.run_loop(&cancel)).catch_unwind().await {
            Ok(reason) => reason,
            Err(panic) => ShutdownReason::Fault(panic_message(panic.as_ref())),
        };

        info!("Shutdown initiated: {:?}", reason);
        match &reason {
            ShutdownReason::UserRequest => {
                self.logger.record(LogEventType::System, "Shutdown requested by user.")
            }
            ShutdownReason::CaptureFailure(details) => {
                warn!("Capture failed: {}", details);
                self.logger.record(LogEventType::Error, "Failed to grab frame.");
            }
            ShutdownReason::Fault(message) => {
                error!("Monitor loop faulted: {}", message);
                self.logger.record(LogEventType::CriticalError, message);
            }
        }

        self.shutdown();
        reason.exit_status()
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> ShutdownReason {
        loop {
            let Some(source) = self.source.as_mut() else {
                return ShutdownReason::Fault("frame source already released".to_string());
            };

            // The stop token wins over a frame that is ready at the same time
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ShutdownReason::UserRequest,
                next = source.next_frame() => next,
            };

            let frame = match next {
                Ok(frame) => frame,
                Err(e) => return ShutdownReason::CaptureFailure(e.to_string()),
            };

            if let Err(e) = self.process_frame(&frame) {
                if e.is_fatal() {
                    return ShutdownReason::Fault(e.to_string());
                }
                warn!("Skipping frame {}: {}", frame.id, e);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Cancel `token` on SIGINT and, on unix, SIGTERM
pub fn install_signal_handlers(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm_token = token.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if sigterm.recv().await.is_some() {
                        info!("Received SIGTERM signal");
                        sigterm_token.cancel();
                    }
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            token.cancel();
        }
    });
}
