//! Print Authority System
//!
//! Defines where output print settings come from and writes the final
//! lossless raster tagged with its DPI and color space.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::SpreadError;

/// PrintAuthority determines where print specifications come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    /// Configuration defaults
    System,
    /// Command-line overrides (with validation)
    User,
}

impl Default for PrintAuthority {
    fn default() -> Self {
        Self::System
    }
}

/// Print specifications for the rendered spread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintSpec {
    #[serde(default)]
    pub authority: PrintAuthority,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_dpi() -> u32 { 300 }

impl Default for PrintSpec {
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            dpi: default_dpi(),
        }
    }
}

impl PrintSpec {
    /// Create from user with validation
    pub fn from_user(dpi: u32) -> Result<Self, &'static str> {
        if !(72..=1200).contains(&dpi) {
            return Err("DPI must be between 72 and 1200");
        }
        Ok(Self {
            authority: PrintAuthority::User,
            dpi,
        })
    }

    /// Physical resolution in pixels per meter, as stored in the PNG pHYs chunk
    pub fn pixels_per_meter(&self) -> u32 {
        (self.dpi as f64 / 0.0254).round() as u32
    }
}

/// Write `image` as an opaque 8-bit sRGB PNG at `path`.
pub fn write_png(image: &RgbaImage, spec: &PrintSpec, path: &Path) -> Result<(), SpreadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    encode_png(image, spec, &mut out)?;
    out.flush()?;
    tracing::info!(path = %path.display(), dpi = spec.dpi, "wrote spread");
    Ok(())
}

pub fn encode_png<W: Write>(image: &RgbaImage, spec: &PrintSpec, out: W) -> Result<(), SpreadError> {
    let (width, height) = image.dimensions();
    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_color(png::ColorType::Rgb);
    let data: Vec<u8> = image.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();
    let ppm = spec.pixels_per_meter();
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));
    encoder.set_srgb(png::SrgbRenderingIntent::Perceptual);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_user_dpi_bounds() {
        assert!(PrintSpec::from_user(71).is_err());
        assert!(PrintSpec::from_user(1201).is_err());
        let spec = PrintSpec::from_user(600).unwrap();
        assert_eq!(spec.authority, PrintAuthority::User);
    }

    #[test]
    fn test_png_carries_dpi_and_pixels() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        img.put_pixel(2, 1, Rgba([200, 150, 100, 255]));
        let mut bytes = Vec::new();
        encode_png(&img, &PrintSpec::default(), &mut bytes).unwrap();

        let decoder = png::Decoder::new(std::io::Cursor::new(&bytes));
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(reader.info().color_type, png::ColorType::Rgb);
        assert!(reader.info().srgb.is_some());

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1).0, [200, 150, 100]);
    }

    #[test]
    fn test_write_png_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/spread.png");
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        write_png(&img, &PrintSpec::default(), &path).unwrap();
        assert!(path.exists());
    }
}
