//! Asset Transform Stage
//!
//! Fixed order: resample, chaos-rotate (canvas expanded, corners clear),
//! border, hard shadow. Each step is optional and returns a new buffer.

use image::{imageops, Rgba, RgbaImage};
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::chaos::rotation_for;
use crate::color::BorderSpec;
use crate::error::SpreadError;
use crate::geometry::rotated_extent;
use crate::layout::{ElementSpec, ShadowSpec};

/// Everything the stage needs to know about one element.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub id: &'a str,
    pub dims: Option<(u32, u32)>,
    pub rotation_bound: f64,
    pub border: Option<BorderSpec>,
    pub shadow: Option<ShadowSpec>,
}

impl<'a> From<&'a ElementSpec> for TransformRequest<'a> {
    fn from(spec: &'a ElementSpec) -> Self {
        Self {
            id: &spec.id,
            dims: Some(spec.dimensions),
            rotation_bound: spec.rotation_bound,
            border: spec.border,
            shadow: spec.shadow,
        }
    }
}

#[derive(Debug)]
pub struct Transformed {
    pub buffer: RgbaImage,
    pub rotation: f64,
}

pub fn transform(raster: RgbaImage, request: &TransformRequest<'_>) -> Result<Transformed, SpreadError> {
    let mut buffer = match request.dims {
        Some(dims) => resample(raster, dims),
        None => raster,
    };

    let rotation = rotation_for(request.id, request.rotation_bound);
    if rotation != 0.0 {
        buffer = rotate_expanded(&buffer, rotation)?;
    }
    if let Some(border) = request.border {
        buffer = add_border(&buffer, border);
    }
    if let Some(shadow) = request.shadow {
        buffer = add_hard_shadow(&buffer, shadow);
    }

    tracing::debug!(
        element_id = request.id,
        rotation,
        width = buffer.width(),
        height = buffer.height(),
        "transformed asset"
    );
    Ok(Transformed { buffer, rotation })
}

/// Lanczos resample to exactly `dims`; a no-op when already that size.
pub fn resample(raster: RgbaImage, dims: (u32, u32)) -> RgbaImage {
    if raster.dimensions() == dims {
        return raster;
    }
    imageops::resize(&raster, dims.0, dims.1, imageops::FilterType::Lanczos3)
}

/// Rotate counter-clockwise by `degrees` about the center, growing the
/// buffer to the rotated bounding box. Exposed corners are fully transparent.
pub fn rotate_expanded(raster: &RgbaImage, degrees: f64) -> Result<RgbaImage, SpreadError> {
    let (w, h) = raster.dimensions();
    let (tw, th) = rotated_extent(w, h, degrees);
    let source = to_pixmap(raster)?;
    let mut target = Pixmap::new(tw, th)
        .ok_or_else(|| SpreadError::Render(format!("cannot allocate {tw}x{th} rotation target")))?;

    // y points down, so a positive tiny-skia angle turns clockwise on screen
    let placement = Transform::from_translate(-(w as f32) / 2.0, -(h as f32) / 2.0)
        .post_concat(Transform::from_rotate(-degrees as f32))
        .post_concat(Transform::from_translate(tw as f32 / 2.0, th as f32 / 2.0));
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    target.draw_pixmap(0, 0, source.as_ref(), &paint, placement, None);
    Ok(from_pixmap(&target))
}

/// Pad by `border.width` on every side; the padding is the border color at
/// full opacity and the asset is composited over it.
pub fn add_border(raster: &RgbaImage, border: BorderSpec) -> RgbaImage {
    let pad = border.width;
    let (w, h) = raster.dimensions();
    let span = pad.saturating_mul(2);
    let mut out = RgbaImage::from_pixel(
        w.saturating_add(span),
        h.saturating_add(span),
        border.color.with_alpha(255).to_rgba(),
    );
    imageops::overlay(&mut out, raster, pad as i64, pad as i64);
    out
}

/// Unblurred silhouette of the alpha channel, offset by the shadow vector
/// and composited beneath the original.
pub fn add_hard_shadow(raster: &RgbaImage, shadow: ShadowSpec) -> RgbaImage {
    let (w, h) = raster.dimensions();
    let (dx, dy) = (shadow.offset_x, shadow.offset_y);
    let mut out = RgbaImage::new(w.saturating_add(dx.unsigned_abs()), h.saturating_add(dy.unsigned_abs()));

    let shadow_origin = (dx.max(0) as u32, dy.max(0) as u32);
    let image_origin = ((-dx).max(0) as i64, (-dy).max(0) as i64);
    let color = shadow.color;
    for (x, y, px) in raster.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        let alpha = (px[3] as u32 * color.a as u32 + 127) / 255;
        out.put_pixel(
            x + shadow_origin.0,
            y + shadow_origin.1,
            Rgba([color.r, color.g, color.b, alpha as u8]),
        );
    }
    imageops::overlay(&mut out, raster, image_origin.0, image_origin.1);
    out
}

fn to_pixmap(raster: &RgbaImage) -> Result<Pixmap, SpreadError> {
    let (w, h) = raster.dimensions();
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| SpreadError::Render(format!("cannot allocate {w}x{h} pixmap")))?;
    for (src, dst) in raster.as_raw().chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

pub(crate) fn from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (src, dst) in pixmap.pixels().iter().zip(out.pixels_mut()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::footprint;

    fn solid(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([30, 90, 160, 255]))
    }

    #[test]
    fn test_resample_to_dims() {
        let out = resample(solid(40, 20), (10, 5));
        assert_eq!(out.dimensions(), (10, 5));
    }

    #[test]
    fn test_rotation_expands_with_clear_corners() {
        let out = rotate_expanded(&solid(100, 100), 30.0).unwrap();
        assert_eq!(out.dimensions(), rotated_extent(100, 100, 30.0));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        let (cx, cy) = (out.width() / 2, out.height() / 2);
        assert!(out.get_pixel(cx, cy)[3] >= 250);
    }

    #[test]
    fn test_border_pads_and_fills() {
        let border = BorderSpec { width: 4, color: Color::rgb(255, 102, 0) };
        let out = add_border(&solid(10, 6), border);
        assert_eq!(out.dimensions(), (18, 14));
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 102, 0, 255]));
        assert_eq!(*out.get_pixel(4, 4), Rgba([30, 90, 160, 255]));
    }

    #[test]
    fn test_hard_shadow_is_offset_and_unblurred() {
        let shadow = ShadowSpec::default();
        let out = add_hard_shadow(&solid(10, 10), shadow);
        assert_eq!(out.dimensions(), (13, 13));
        assert_eq!(*out.get_pixel(0, 0), Rgba([30, 90, 160, 255]));
        assert_eq!(*out.get_pixel(12, 12), Rgba([0, 0, 0, 255]));
        // outside both the image and the shadow
        assert_eq!(out.get_pixel(12, 0)[3], 0);
        assert_eq!(out.get_pixel(0, 12)[3], 0);
    }

    #[test]
    fn test_negative_shadow_offset_moves_image() {
        let shadow = ShadowSpec { offset_x: -2, offset_y: 0, color: Color::BLACK };
        let out = add_hard_shadow(&solid(5, 5), shadow);
        assert_eq!(out.dimensions(), (7, 5));
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(6, 0), Rgba([30, 90, 160, 255]));
    }

    #[test]
    fn test_full_transform_matches_footprint() {
        let request = TransformRequest {
            id: "L_photo_01",
            dims: Some((120, 80)),
            rotation_bound: 10.0,
            border: Some(BorderSpec { width: 4, color: Color::rgb(255, 102, 0) }),
            shadow: Some(ShadowSpec::default()),
        };
        let out = transform(solid(300, 200), &request).unwrap();
        let expected = footprint((120, 80), out.rotation, 4, Some((3, 3)));
        assert_eq!(out.buffer.dimensions(), expected);
        assert_eq!(out.rotation, rotation_for("L_photo_01", 10.0));
    }
}
