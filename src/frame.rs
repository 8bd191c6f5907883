use crate::error::{AnalyzerError, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layouts a frame source can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// One captured frame. The pixel buffer is shared and never mutated in place.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Sequential frame identifier within a run
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Build an RGB24 frame from an image buffer
    pub fn from_rgb_image(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(
            id,
            timestamp,
            image.into_raw(),
            width,
            height,
            FrameFormat::Rgb24,
        )
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true, // Compressed formats have variable size
        }
    }

    /// Convert to an 8-bit grayscale image (BT.601 luma weights)
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        if !self.validate_size() {
            return Err(size_mismatch(self));
        }

        match self.format {
            FrameFormat::Mjpeg => {
                let dynamic_image = image::load_from_memory(&self.data).map_err(|e| {
                    AnalyzerError::FrameProcessing {
                        details: format!("MJPEG decode failed: {}", e),
                    }
                })?;
                Ok(dynamic_image.to_luma8())
            }
            FrameFormat::Rgb24 => {
                let rgb_image = self.rgb24_image()?;
                let mut gray_image = GrayImage::new(self.width, self.height);
                for (x, y, rgb) in rgb_image.enumerate_pixels() {
                    gray_image.put_pixel(x, y, Luma([luma(rgb)]));
                }
                Ok(gray_image)
            }
        }
    }

    /// Convert to an RGB image, used as the display copy and for encoding
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        if !self.validate_size() {
            return Err(size_mismatch(self));
        }

        match self.format {
            FrameFormat::Mjpeg => {
                let dynamic_image = image::load_from_memory(&self.data).map_err(|e| {
                    AnalyzerError::FrameProcessing {
                        details: format!("MJPEG decode failed: {}", e),
                    }
                })?;
                Ok(dynamic_image.to_rgb8())
            }
            FrameFormat::Rgb24 => self.rgb24_image(),
        }
    }

    fn rgb24_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.to_vec())
            .ok_or_else(|| size_mismatch(self))
    }
}

/// Copy tightly packed rows into a buffer whose rows are padded to `alignment` bytes
pub(crate) fn pad_rows(data: &[u8], row_bytes: usize, rows: usize, alignment: usize) -> Vec<u8> {
    let stride = row_bytes.div_ceil(alignment) * alignment;
    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }

    let mut padded = vec![0u8; stride * rows];
    for (dst, src) in padded.chunks_exact_mut(stride).zip(data.chunks_exact(row_bytes)) {
        dst[..row_bytes].copy_from_slice(src);
    }
    padded
}

/// Drop per-row padding from a buffer with the given stride
pub(crate) fn strip_row_padding(data: &[u8], row_bytes: usize, stride: usize, rows: usize) -> Vec<u8> {
    if stride == row_bytes {
        return data[..(row_bytes * rows).min(data.len())].to_vec();
    }

    let mut packed = Vec::with_capacity(row_bytes * rows);
    for row in data.chunks(stride).take(rows) {
        packed.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    packed
}

fn luma(rgb: &Rgb<u8>) -> u8 {
    (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32).round() as u8
}

fn size_mismatch(frame: &FrameData) -> crate::error::WardcamError {
    AnalyzerError::FrameProcessing {
        details: format!(
            "Frame {} has {} bytes, expected {:?} for {}x{} {:?}",
            frame.id,
            frame.data.len(),
            frame.expected_size(),
            frame.width,
            frame.height,
            frame.format
        ),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_properties() {
        assert_eq!(FrameFormat::Mjpeg.bytes_per_pixel(), 0);
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);

        assert!(FrameFormat::Mjpeg.is_compressed());
        assert!(!FrameFormat::Rgb24.is_compressed());
    }

    #[test]
    fn test_frame_size_validation() {
        let valid_frame = FrameData::new(
            1,
            SystemTime::now(),
            vec![0u8; 640 * 480 * 3],
            640,
            480,
            FrameFormat::Rgb24,
        );
        assert!(valid_frame.validate_size());

        let invalid_frame = FrameData::new(
            2,
            SystemTime::now(),
            vec![0u8; 100],
            640,
            480,
            FrameFormat::Rgb24,
        );
        assert!(!invalid_frame.validate_size());
        assert!(invalid_frame.to_gray_image().is_err());

        let mjpeg_frame = FrameData::new(
            3,
            SystemTime::now(),
            vec![0u8; 5000],
            640,
            480,
            FrameFormat::Mjpeg,
        );
        assert!(mjpeg_frame.validate_size());
    }

    #[test]
    fn test_rgb_to_gray_uses_luma_weights() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 255, 255]));
        image.put_pixel(1, 0, Rgb([255, 0, 0]));
        let frame = FrameData::from_rgb_image(1, SystemTime::now(), image);

        let gray = frame.to_gray_image().unwrap();
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 76);
    }

    #[test]
    fn test_row_padding_helpers() {
        // 3 bytes per row, padded to 4
        let packed = vec![1, 2, 3, 4, 5, 6];
        let padded = pad_rows(&packed, 3, 2, 4);
        assert_eq!(padded, vec![1, 2, 3, 0, 4, 5, 6, 0]);
        assert_eq!(strip_row_padding(&padded, 3, 4, 2), packed);

        // Already aligned rows are copied unchanged
        let aligned = vec![9u8; 8];
        assert_eq!(pad_rows(&aligned, 4, 2, 4), aligned);
        assert_eq!(strip_row_padding(&aligned, 4, 4, 2), aligned);
    }

    #[test]
    fn test_corrupt_mjpeg_frame_fails_conversion() {
        let frame = FrameData::new(4, SystemTime::now(), vec![0xFF, 0xD8, 0x00, 0x01], 8, 8, FrameFormat::Mjpeg);
        assert!(frame.to_gray_image().is_err());
        assert!(frame.to_rgb_image().is_err());
    }
}
