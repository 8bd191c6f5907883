use crate::config::MotionConfig;
use crate::events::{BoundingBox, DetectionEvent};

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{
    contrast::threshold,
    distance_transform::Norm,
    filter::gaussian_blur_f32,
    morphology::dilate,
    region_labelling::{connected_components, Connectivity},
};
use std::collections::{HashMap, HashSet};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Frame-differencing motion detector.
///
/// Keeps one smoothed grayscale copy of the previous frame and compares every
/// new frame against it. The very first frame only seeds that reference.
pub struct MotionDetector {
    config: MotionConfig,
    previous: Option<GrayImage>,
    frame_count: u64,
}

/// One external region of the thresholded difference mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRegion {
    pub bbox: BoundingBox,
    /// Pixels enclosed by the region's outer boundary
    pub area: f64,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        info!("Initializing motion detector with config: {:?}", config);
        Self {
            config,
            previous: None,
            frame_count: 0,
        }
    }

    /// Compare a grayscale frame against the stored reference.
    ///
    /// Always replaces the reference with the smoothed `gray`, whether or not
    /// anything was detected.
    pub fn detect(&mut self, gray: &GrayImage, timestamp: SystemTime) -> Vec<DetectionEvent> {
        let smoothed = self.smooth(gray);
        self.frame_count += 1;

        let previous = match self.previous.take() {
            Some(previous) if previous.dimensions() == smoothed.dimensions() => previous,
            Some(previous) => {
                warn!(
                    "Frame size changed from {:?} to {:?}; re-seeding motion reference",
                    previous.dimensions(),
                    smoothed.dimensions()
                );
                self.previous = Some(smoothed);
                return Vec::new();
            }
            None => {
                info!("Initializing motion reference with first frame");
                self.previous = Some(smoothed);
                return Vec::new();
            }
        };

        let diff = frame_difference(&previous, &smoothed);
        let mut mask = threshold(&diff, self.config.delta_threshold);
        if self.config.dilate_iterations > 0 {
            // k passes of a 3x3 dilation equal one pass with an L-inf radius of k
            mask = dilate(&mask, Norm::LInf, self.config.dilate_iterations);
        }

        let regions = external_regions(&mask);
        let events: Vec<DetectionEvent> = regions
            .iter()
            .filter(|region| region.area >= self.config.min_area)
            .map(|region| DetectionEvent::motion(region.bbox, region.area, timestamp))
            .collect();

        debug!(
            "Motion analysis complete: {} regions, {} above {:.1} px",
            regions.len(),
            events.len(),
            self.config.min_area
        );

        self.previous = Some(smoothed);
        events
    }

    /// Grayscale frame with the configured Gaussian smoothing applied
    pub(crate) fn smooth(&self, gray: &GrayImage) -> GrayImage {
        match kernel_sigma(self.config.blur_kernel_size) {
            Some(sigma) => gaussian_blur_f32(gray, sigma),
            None => gray.clone(),
        }
    }

    /// Whether a reference frame has been captured
    pub fn has_reference(&self) -> bool {
        self.previous.is_some()
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.previous.as_ref()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Forget the reference frame; the next frame bootstraps again
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Gaussian sigma for a square kernel, using the usual `0.3 * ((k - 1) / 2 - 1) + 0.8` rule
fn kernel_sigma(kernel_size: u32) -> Option<f32> {
    if kernel_size <= 1 {
        return None;
    }
    let sigma = 0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    Some(sigma.max(0.1))
}

/// Absolute per-pixel difference of two equally sized images
fn frame_difference(previous: &GrayImage, current: &GrayImage) -> GrayImage {
    let (width, height) = previous.dimensions();
    let mut diff_image = GrayImage::new(width, height);

    for ((diff, prev), curr) in diff_image
        .pixels_mut()
        .zip(previous.pixels())
        .zip(current.pixels())
    {
        diff[0] = prev[0].abs_diff(curr[0]);
    }

    diff_image
}

/// Find the outermost connected regions of a binary mask.
///
/// Holes are filled before labelling, so a region's area covers everything
/// inside its outer boundary and anything nested in a hole belongs to the
/// enclosing region. Regions are returned in raster order of their first pixel.
pub fn external_regions(mask: &GrayImage) -> Vec<MotionRegion> {
    let filled = fill_holes(mask);
    let labels = connected_components(&filled, Connectivity::Eight, Luma([0u8]));

    let mut index_of: HashMap<u32, usize> = HashMap::new();
    let mut extents: Vec<(u32, u32, u32, u32, u64)> = Vec::new();

    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let index = *index_of.entry(label).or_insert_with(|| {
            extents.push((x, y, x, y, 0));
            extents.len() - 1
        });
        let entry = &mut extents[index];
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
        entry.4 += 1;
    }

    extents
        .into_iter()
        .map(|(min_x, min_y, max_x, max_y, count)| MotionRegion {
            bbox: BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
            area: count as f64,
        })
        .collect()
}

/// Set every background pixel that cannot reach the image border
fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return mask.clone();
    }

    let inverted = GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    // Background uses 4-connectivity, the dual of the 8-connected foreground
    let background: ImageBuffer<Luma<u32>, Vec<u32>> =
        connected_components(&inverted, Connectivity::Four, Luma([0u8]));

    let mut outside: HashSet<u32> = HashSet::new();
    for x in 0..width {
        outside.insert(background.get_pixel(x, 0)[0]);
        outside.insert(background.get_pixel(x, height - 1)[0]);
    }
    for y in 0..height {
        outside.insert(background.get_pixel(0, y)[0]);
        outside.insert(background.get_pixel(width - 1, y)[0]);
    }

    let mut filled = mask.clone();
    for (x, y, label) in background.enumerate_pixels() {
        let label = label[0];
        if label != 0 && !outside.contains(&label) {
            filled.put_pixel(x, y, Luma([255u8]));
        }
    }
    filled
}
