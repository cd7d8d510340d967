//! Canvas - the one piece of mutable state per spread
//!
//! Created once at the geometry's fixed size, mutated in place by merges
//! (which take `&mut self`, so only one writer exists at a time) and handed
//! out as the final raster.

use image::{imageops, RgbaImage};

use crate::color::Color;
use crate::geometry::GeometryModel;

#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    paper: Color,
}

impl Canvas {
    /// Opaque canvas of the geometry's fixed size, filled with `paper`.
    pub fn new(geometry: &GeometryModel, paper: Color) -> Self {
        Self::with_size(geometry.canvas_width, geometry.canvas_height, paper)
    }

    pub(crate) fn with_size(width: u32, height: u32, paper: Color) -> Self {
        let image = RgbaImage::from_pixel(width, height, paper.with_alpha(255).to_rgba());
        Self { image, paper }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn paper(&self) -> Color {
        self.paper
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Alpha-composite `buffer` with its top-left at `position`; anything
    /// outside the canvas is clipped. The buffer is consumed and dropped here.
    pub fn merge(&mut self, buffer: RgbaImage, position: (i64, i64)) {
        imageops::overlay(&mut self.image, &buffer, position.0, position.1);
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_canvas_is_fixed_size_paper() {
        let canvas = Canvas::new(&GeometryModel::standard(), Color::rgb(248, 243, 229));
        assert_eq!((canvas.width(), canvas.height()), (3400, 2200));
        assert_eq!(*canvas.image().get_pixel(0, 0), Rgba([248, 243, 229, 255]));
    }

    #[test]
    fn test_merge_respects_alpha_and_clips() {
        let mut canvas = Canvas::with_size(10, 10, Color::WHITE);
        let mut buffer = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        buffer.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        canvas.merge(buffer, (8, 8));
        assert_eq!(*canvas.image().get_pixel(8, 8), Rgba([255, 255, 255, 255]));
        assert_eq!(*canvas.image().get_pixel(9, 9), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.image().get_pixel(7, 7), Rgba([255, 255, 255, 255]));
    }
}
