use super::converter::DisplayConverter;
use super::DisplaySurface;
use crate::error::{DisplayError, Result};

use image::RgbImage;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Linux framebuffer device fed RGB565 pixels
pub struct FramebufferSurface {
    device: PathBuf,
    file: Option<File>,
    resolution: (u32, u32),
    frames_presented: u64,
}

impl FramebufferSurface {
    pub fn open(device: &Path, resolution: (u32, u32)) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(device)
            .map_err(|e| DisplayError::Unavailable {
                details: format!("Failed to open framebuffer {}: {}", device.display(), e),
            })?;

        info!(
            "Framebuffer {} opened at {}x{}",
            device.display(),
            resolution.0,
            resolution.1
        );

        Ok(Self {
            device: device.to_path_buf(),
            file: Some(file),
            resolution,
            frames_presented: 0,
        })
    }
}

impl DisplaySurface for FramebufferSurface {
    fn present(&mut self, image: &RgbImage) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| DisplayError::Render {
            details: format!("{} is closed", self.device.display()),
        })?;

        let (width, height) = self.resolution;
        let data = DisplayConverter::rgb_to_rgb565_scaled(image, width, height);

        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(&data))
            .map_err(|e| DisplayError::Render {
                details: format!("Failed to write framebuffer: {}", e),
            })?;

        self.frames_presented += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(
                "Framebuffer {} closed after {} frames",
                self.device.display(),
                self.frames_presented
            );
        }
    }
}
