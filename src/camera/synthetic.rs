use super::FrameSource;
use crate::error::{CameraError, Result};
use crate::frame::FrameData;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Frame source replaying pre-built images.
///
/// Frame `n` is stamped `start + n * period`. Once the images run out the
/// source either cancels the supplied token or reports a capture failure.
pub struct SyntheticFrameSource {
    frames: VecDeque<RgbImage>,
    dimensions: (u32, u32),
    start: SystemTime,
    period: Duration,
    paced: bool,
    next_id: u64,
    exhausted_token: Option<CancellationToken>,
    closed: bool,
    close_count: Arc<AtomicUsize>,
}

impl SyntheticFrameSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        let dimensions = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            frames: frames.into(),
            dimensions,
            start: SystemTime::now(),
            period: Duration::from_millis(33),
            paced: false,
            next_id: 0,
            exhausted_token: None,
            closed: false,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `count` copies of the same image
    pub fn repeat(image: RgbImage, count: usize) -> Self {
        Self::new(vec![image; count])
    }

    /// A dark scene with a bright square sliding across it
    pub fn moving_block(width: u32, height: u32, count: usize) -> Self {
        let size = (width.min(height) / 4).max(1);
        let travel = width.saturating_sub(size).max(1);
        let frames = (0..count)
            .map(|i| {
                let x0 = (i as u32 * 4) % travel;
                let y0 = height.saturating_sub(size) / 2;
                RgbImage::from_fn(width, height, |x, y| {
                    if x >= x0 && x < x0 + size && y >= y0 && y < y0 + size {
                        Rgb([230, 230, 230])
                    } else {
                        Rgb([20, 20, 20])
                    }
                })
            })
            .collect();
        Self::new(frames)
    }

    pub fn with_start(mut self, start: SystemTime) -> Self {
        self.start = start;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sleep one period before handing out each frame
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Cancel `token` when the last frame is handed out
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.exhausted_token = Some(token);
        self
    }

    /// Counter incremented each time the source is actually released
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&mut self) -> Result<FrameData> {
        if self.closed {
            return Err(CameraError::CaptureFailure {
                details: "Synthetic source is closed".to_string(),
            }
            .into());
        }

        if self.paced {
            tokio::time::sleep(self.period).await;
        } else {
            tokio::task::yield_now().await;
        }

        let Some(image) = self.frames.pop_front() else {
            return Err(CameraError::CaptureFailure {
                details: format!("Synthetic stream exhausted after {} frames", self.next_id),
            }
            .into());
        };

        let id = self.next_id;
        self.next_id += 1;
        let timestamp = self.start + self.period * id as u32;

        if self.frames.is_empty() {
            if let Some(token) = &self.exhausted_token {
                debug!("Synthetic stream handed out its last frame");
                token.cancel();
            }
        }

        Ok(FrameData::from_rgb_image(id, timestamp, image))
    }

    fn width(&self) -> u32 {
        self.dimensions.0
    }

    fn height(&self) -> u32 {
        self.dimensions.1
    }

    fn fps(&self) -> u32 {
        let millis = self.period.as_millis().max(1) as u32;
        (1000 / millis).max(1)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.close_count.fetch_add(1, Ordering::SeqCst);
            info!("Synthetic source closed after {} frames", self.next_id);
        }
    }
}
