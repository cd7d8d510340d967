//! Text Layout Stage
//!
//! Greedy word wrap against measured glyph widths, then rasterization onto a
//! fully transparent buffer so the block composites over anything.

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use crate::color::Color;
use crate::config::TypographyConfig;
use crate::layout::TextSpec;

/// Width of a run of text in pixels.
pub trait TextMeasure {
    fn width(&self, text: &str) -> f32;
}

pub struct FontMeasure<'f> {
    font: &'f Font<'static>,
    scale: Scale,
}

impl<'f> FontMeasure<'f> {
    pub fn new(font: &'f Font<'static>, size: f32) -> Self {
        Self { font, scale: Scale::uniform(size) }
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn width(&self, text: &str) -> f32 {
        self.font
            .layout(text, self.scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }
}

/// Wrap logical lines (explicit breaks already split) to `max_width`.
///
/// Blank logical lines are kept. A single word wider than `max_width`
/// gets a line of its own rather than being broken.
pub fn wrap_lines<M: TextMeasure + ?Sized>(lines: &[String], measure: &M, max_width: f32) -> Vec<String> {
    let mut wrapped = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            wrapped.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in line.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure.width(&candidate) <= max_width {
                current = candidate;
            } else {
                if !current.is_empty() {
                    wrapped.push(std::mem::take(&mut current));
                }
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            wrapped.push(current);
        }
    }
    wrapped
}

/// Geometry of a text block before any pixel is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlan {
    pub lines: Vec<String>,
    pub line_height: f32,
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

pub fn plan_text<M: TextMeasure + ?Sized>(spec: &TextSpec, measure: &M, typography: &TypographyConfig) -> TextPlan {
    let padding = typography.word_wrap_padding;
    let usable = spec.dimensions.0 as f32 - 2.0 * padding as f32;
    let lines = wrap_lines(&spec.lines, measure, usable);
    let line_height = spec.leading.unwrap_or(spec.font_size + typography.default_leading);
    let height = ((lines.len() as f32 * line_height).ceil() as u32).saturating_add(padding.saturating_mul(2));
    TextPlan {
        lines,
        line_height,
        width: spec.dimensions.0,
        height: height.max(1),
        padding,
    }
}

/// Word-wrap and rasterize `spec` with `font`.
pub fn layout_text(spec: &TextSpec, font: &Font<'static>, typography: &TypographyConfig) -> RgbaImage {
    let measure = FontMeasure::new(font, spec.font_size);
    let plan = plan_text(spec, &measure, typography);
    let scale = Scale::uniform(spec.font_size);
    let ascent = font.v_metrics(scale).ascent;

    let mut buffer = RgbaImage::from_pixel(plan.width, plan.height, Rgba([0, 0, 0, 0]));
    for (i, line) in plan.lines.iter().enumerate() {
        let baseline = plan.padding as f32 + i as f32 * plan.line_height + ascent;
        for glyph in font.layout(line, scale, point(plan.padding as f32, baseline)) {
            let Some(bb) = glyph.pixel_bounding_box() else { continue };
            glyph.draw(|gx, gy, coverage| {
                let x = bb.min.x + gx as i32;
                let y = bb.min.y + gy as i32;
                if x >= 0 && y >= 0 && (x as u32) < plan.width && (y as u32) < plan.height {
                    blend_over(buffer.get_pixel_mut(x as u32, y as u32), spec.color, coverage);
                }
            });
        }
    }
    tracing::debug!(element_id = %spec.id, lines = plan.lines.len(), height = plan.height, "rendered text block");
    buffer
}

/// Source-over of `color` at `coverage` onto a straight-alpha pixel.
pub(crate) fn blend_over(dst: &mut Rgba<u8>, color: Color, coverage: f32) {
    let sa = coverage.clamp(0.0, 1.0) * color.a as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mix = |s: u8, d: u8| {
        ((s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        mix(color.r, dst[0]),
        mix(color.g, dst[1]),
        mix(color.b, dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character, space included, is 10px wide.
    struct Monospace;

    impl TextMeasure for Monospace {
        fn width(&self, text: &str) -> f32 {
            text.chars().count() as f32 * 10.0
        }
    }

    fn spec(content: &str, box_width: u32, leading: Option<f32>) -> TextSpec {
        TextSpec {
            id: "t".into(),
            type_tag: "text_body".into(),
            position: (200, 200),
            dimensions: (box_width, 100),
            rotation_bound: 0.0,
            lines: content.split('\n').map(String::from).collect(),
            font_family: "Chicago".into(),
            font_size: 24.0,
            leading,
            color: Color::BLACK,
        }
    }

    #[test]
    fn test_wrap_example_three_words_then_one() {
        // word widths 120, 120, 120, 60 with a 10px space; usable width 380
        let words = "aaaaaaaaaaaa bbbbbbbbbbbb cccccccccccc dddddd".to_string();
        let wrapped = wrap_lines(&[words], &Monospace, 380.0);
        assert_eq!(wrapped, vec!["aaaaaaaaaaaa bbbbbbbbbbbb cccccccccccc", "dddddd"]);
    }

    #[test]
    fn test_explicit_breaks_and_blank_lines_preserved() {
        let lines = vec!["one two".to_string(), String::new(), "three".to_string()];
        assert_eq!(wrap_lines(&lines, &Monospace, 1000.0), vec!["one two", "", "three"]);
    }

    #[test]
    fn test_overlong_word_gets_own_line() {
        let wrapped = wrap_lines(&["a supercalifragilistic b".to_string()], &Monospace, 50.0);
        assert_eq!(wrapped, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_plan_dimensions() {
        let typography = TypographyConfig { word_wrap_padding: 10, default_leading: 8.0 };
        let words = "aaaaaaaaaaaa bbbbbbbbbbbb cccccccccccc dddddd";
        let plan = plan_text(&spec(words, 400, None), &Monospace, &typography);
        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.line_height, 32.0);
        assert_eq!(plan.height, 2 * 32 + 20);
        assert_eq!(plan.width, 400);

        let plan = plan_text(&spec("x\ny\nz", 400, Some(40.0)), &Monospace, &typography);
        assert_eq!(plan.height, 3 * 40 + 20);
    }

    fn mono() -> Font<'static> {
        Font::try_from_bytes(include_bytes!("../tests/fixtures/DejaVuSansMono.ttf")).unwrap()
    }

    #[test]
    fn test_layout_text_on_transparent_buffer() {
        let typography = TypographyConfig { word_wrap_padding: 10, default_leading: 8.0 };
        let mut block = spec("Hello world", 400, None);
        block.color = Color::rgb(200, 30, 40);
        let font = mono();

        let plan = plan_text(&block, &FontMeasure::new(&font, 24.0), &typography);
        assert_eq!(plan.lines, vec!["Hello world"]);
        let buffer = layout_text(&block, &font, &typography);
        assert_eq!(buffer.dimensions(), (400, 32 + 2 * 10));

        assert_eq!(buffer.get_pixel(0, 0)[3], 0);
        assert_eq!(buffer.get_pixel(399, 51)[3], 0);

        let inked: Vec<_> = buffer.enumerate_pixels().filter(|(_, _, px)| px[3] > 0).collect();
        assert!(inked.iter().any(|(_, _, px)| px[3] > 128));
        for (x, y, px) in &inked {
            assert_eq!([px[0], px[1], px[2]], [200, 30, 40], "pixel ({x}, {y})");
            // glyphs start inside the padding box
            assert!(*x >= 10 && *y >= 10, "ink at ({x}, {y})");
        }
    }

    #[test]
    fn test_layout_text_height_follows_lines_and_leading() {
        let typography = TypographyConfig { word_wrap_padding: 10, default_leading: 8.0 };
        let buffer = layout_text(&spec("A\nB\nC", 200, Some(40.0)), &mono(), &typography);
        assert_eq!(buffer.dimensions(), (200, 3 * 40 + 20));
        // default color is opaque black
        assert!(buffer.pixels().filter(|px| px[3] > 0).all(|px| px[0] == 0 && px[1] == 0 && px[2] == 0));
        // the third line's ink sits in the third band
        assert!((90..130).any(|y| (0..200).any(|x| buffer.get_pixel(x, y)[3] > 0)));
    }

    #[test]
    fn test_font_measure_wraps_real_glyphs() {
        let font = mono();
        let measure = FontMeasure::new(&font, 24.0);
        // monospace: every advance is equal
        let one = measure.width("a");
        assert!(one > 0.0);
        assert!((measure.width("abcd") - 4.0 * one).abs() < 0.5);
        let wrapped = wrap_lines(&["aaaa bbbb cccc".to_string()], &measure, one * 9.5);
        assert_eq!(wrapped, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn test_blend_over_transparent() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend_over(&mut px, Color::rgb(200, 100, 50), 1.0);
        assert_eq!(px, Rgba([200, 100, 50, 255]));

        let mut px = Rgba([0, 0, 0, 0]);
        blend_over(&mut px, Color::rgb(200, 100, 50), 0.5);
        assert_eq!(px, Rgba([200, 100, 50, 128]));
    }
}
