use super::orchestrator::Monitor;
use crate::events::LogEventType;
use tracing::info;

impl Monitor {
    /// Release the recorder, frame source and display. Runs once; later
    /// calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Beginning shutdown");

        if let Some(transition) = self.recorder.stop() {
            self.log_transition(&transition);
        }

        if let Some(mut source) = self.source.take() {
            source.close();
        }

        if let Some(mut display) = self.display.take() {
            display.close();
        }

        info!("Run summary: {}", self.stats());
        self.logger.record(LogEventType::System, "Security system stopped.");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
