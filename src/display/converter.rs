use image::RgbImage;

/// Pixel conversions for raw framebuffers
pub struct DisplayConverter;

impl DisplayConverter {
    /// Pack one RGB pixel as little-endian RGB565
    pub fn pack_rgb565(r: u8, g: u8, b: u8) -> [u8; 2] {
        let rgb565 = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
        rgb565.to_le_bytes()
    }

    /// Scale `image` to `dst_width` x `dst_height` (nearest neighbour) and
    /// convert it to RGB565 in one pass
    pub fn rgb_to_rgb565_scaled(image: &RgbImage, dst_width: u32, dst_height: u32) -> Vec<u8> {
        let (src_width, src_height) = image.dimensions();
        let mut rgb565_data = Vec::with_capacity((dst_width * dst_height * 2) as usize);
        if src_width == 0 || src_height == 0 {
            rgb565_data.resize((dst_width * dst_height * 2) as usize, 0);
            return rgb565_data;
        }

        let x_ratio = src_width as f32 / dst_width as f32;
        let y_ratio = src_height as f32 / dst_height as f32;

        for dst_y in 0..dst_height {
            let src_y = (((dst_y as f32) * y_ratio) as u32).min(src_height - 1);
            for dst_x in 0..dst_width {
                let src_x = (((dst_x as f32) * x_ratio) as u32).min(src_width - 1);
                let pixel = image.get_pixel(src_x, src_y);
                rgb565_data.extend_from_slice(&Self::pack_rgb565(pixel[0], pixel[1], pixel[2]));
            }
        }

        rgb565_data
    }
}
