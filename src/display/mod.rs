mod converter;
mod framebuffer;
#[cfg(all(feature = "display", target_os = "linux"))]
mod window;

pub use converter::DisplayConverter;
pub use framebuffer::FramebufferSurface;
#[cfg(all(feature = "display", target_os = "linux"))]
pub use window::WindowSurface;

use crate::config::{DisplayBackend, DisplayConfig};
use crate::error::Result;
use image::RgbImage;
use std::path::Path;
use tracing::warn;

/// Somewhere to show annotated frames
pub trait DisplaySurface: Send {
    fn present(&mut self, image: &RgbImage) -> Result<()>;

    /// Release the surface. Safe to call more than once.
    fn close(&mut self);
}

/// Open the configured surface, or `None` when display is disabled or
/// unavailable on this machine
pub fn open_display(config: &DisplayConfig) -> Option<Box<dyn DisplaySurface>> {
    if !config.enabled {
        return None;
    }

    let surface: Result<Box<dyn DisplaySurface>> = match config.backend {
        DisplayBackend::Framebuffer => {
            FramebufferSurface::open(Path::new(&config.framebuffer_device), config.resolution)
                .map(|s| Box::new(s) as Box<dyn DisplaySurface>)
        }
        DisplayBackend::Window => open_window(config),
    };

    match surface {
        Ok(surface) => Some(surface),
        Err(e) => {
            warn!("Display disabled: {}", e);
            None
        }
    }
}

#[cfg(all(feature = "display", target_os = "linux"))]
fn open_window(config: &DisplayConfig) -> Result<Box<dyn DisplaySurface>> {
    Ok(Box::new(WindowSurface::open(&config.window_title)?))
}

#[cfg(not(all(feature = "display", target_os = "linux")))]
fn open_window(_config: &DisplayConfig) -> Result<Box<dyn DisplaySurface>> {
    Err(crate::error::DisplayError::Unavailable {
        details: "window display not compiled in (enable the display feature)".to_string(),
    }
    .into())
}
