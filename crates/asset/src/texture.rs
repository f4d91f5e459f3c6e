//! Texture loading and data structures.
//! Decodes PNG/JPEG into RGBA8 (sRGB-encoded) pixels.

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureData {
    /// Create a new texture with given dimensions and RGBA8 format.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "Data size doesn't match RGBA8 format"
        );
        Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        }
    }

    /// Decode an encoded image (PNG/JPEG bytes) already read into memory.
    pub fn from_encoded(bytes: &[u8]) -> anyhow::Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
        Ok(Self::from_image(img))
    }

    fn from_image(img: image::DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Self::new_rgba8(width, height, data)
    }

    /// 1x1 opaque texture of a single sRGB color.
    pub fn solid(rgb: [u8; 3]) -> Self {
        Self::new_rgba8(1, 1, vec![rgb[0], rgb[1], rgb[2], 255])
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_texture_is_single_opaque_pixel() {
        let t = TextureData::solid([0xff, 0x66, 0x00]);
        assert!(t.is_valid());
        assert_eq!(t.data, vec![0xff, 0x66, 0x00, 0xff]);
    }

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(2, 3, image::Rgba([1, 2, 3, 4]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let t = TextureData::from_encoded(&png).unwrap();
        assert_eq!((t.width, t.height), (2, 3));
        assert_eq!(&t.data[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(TextureData::from_encoded(b"not an image").is_err());
    }
}
