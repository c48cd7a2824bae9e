use crate::error::Result;
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use std::path::Path;

/// One full-screen raster snapshot
///
/// Frames are immutable after capture; the loop only ever compares them and
/// writes them out.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbaImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Encode the frame as PNG bytes
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        self.image
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)?;
        Ok(png_bytes)
    }

    /// Write the frame to disk as a PNG file
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}
