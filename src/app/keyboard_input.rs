use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Watch the terminal for `q` or `Esc` and cancel `token` when pressed.
///
/// The listener also exits once `token` is cancelled by anything else.
pub fn spawn_quit_listener(token: CancellationToken) -> JoinHandle<()> {
    info!("Keyboard quit enabled - press 'q' or Esc to stop");

    task::spawn_blocking(move || {
        if let Err(e) = enable_raw_mode() {
            error!("Failed to enable raw mode for keyboard input: {}", e);
            return;
        }

        while !token.is_cancelled() {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {
                    if let Ok(Event::Key(key_event)) = event::read() {
                        if is_quit_key(key_event.kind, key_event.code) {
                            info!("Quit key pressed - requesting shutdown");
                            token.cancel();
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Keyboard polling failed: {}", e);
                    break;
                }
            }
        }

        if let Err(e) = disable_raw_mode() {
            error!("Failed to restore terminal mode: {}", e);
        }
        debug!("Keyboard listener stopped");
    })
}

fn is_quit_key(kind: KeyEventKind, code: KeyCode) -> bool {
    kind == KeyEventKind::Press && matches!(code, KeyCode::Char('q') | KeyCode::Esc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(KeyEventKind::Press, KeyCode::Char('q')));
        assert!(is_quit_key(KeyEventKind::Press, KeyCode::Esc));
        assert!(!is_quit_key(KeyEventKind::Release, KeyCode::Char('q')));
        assert!(!is_quit_key(KeyEventKind::Press, KeyCode::Char(' ')));
    }
}
