//! Print-Artifact Simulator
//!
//! Six passes that make a clean composite read as a mid-90s offset print.
//! Substrate passes (texture, binding, spine curvature) build the paper the
//! elements land on; ink passes (misregistration, dot gain, vignette) run on
//! the finished canvas. Each pass consumes the previous pass's output.

use image::{imageops, GrayImage, Luma, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::canvas::Canvas;
use crate::color::{Cmyk, Color};
use crate::error::SpreadError;
use crate::geometry::{DeadZone, GeometryModel};
use crate::hashing::seed_from_id;
use crate::transform::from_pixmap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub texture: TextureConfig,
    #[serde(default)]
    pub binding: BindingConfig,
    #[serde(default)]
    pub spine_shadow: SpineShadowConfig,
    #[serde(default)]
    pub misregistration: MisregistrationConfig,
    #[serde(default)]
    pub dot_gain: DotGainConfig,
    #[serde(default)]
    pub vignette: VignetteConfig,
}

fn enabled() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_texture_opacity")]
    pub opacity: f32,
    #[serde(default = "default_noise_mean")]
    pub mean: f32,
    #[serde(default = "default_noise_std_dev")]
    pub std_dev: f32,
    /// Horizontal averaging radius in pixels; fibers run across the page.
    #[serde(default = "default_grain_length")]
    pub grain_length: u32,
    #[serde(default = "default_grain_blur")]
    pub grain_blur: f32,
}

fn default_texture_opacity() -> f32 { 0.08 }
fn default_noise_mean() -> f32 { 128.0 }
fn default_noise_std_dev() -> f32 { 20.0 }
fn default_grain_length() -> u32 { 3 }
fn default_grain_blur() -> f32 { 0.5 }

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            opacity: default_texture_opacity(),
            mean: default_noise_mean(),
            std_dev: default_noise_std_dev(),
            grain_length: default_grain_length(),
            grain_blur: default_grain_blur(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_hole_diameter")]
    pub hole_diameter: u32,
    #[serde(default = "default_hole_spacing")]
    pub hole_spacing: u32,
    #[serde(default = "default_ring_width")]
    pub ring_width: u32,
    #[serde(default = "default_coil_color")]
    pub coil_color: Color,
}

fn default_hole_diameter() -> u32 { 57 }
fn default_hole_spacing() -> u32 { 18 }
fn default_ring_width() -> u32 { 3 }
fn default_coil_color() -> Color { Color::rgb(0x2A, 0x2A, 0x2E) }

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hole_diameter: default_hole_diameter(),
            hole_spacing: default_hole_spacing(),
            ring_width: default_ring_width(),
            coil_color: default_coil_color(),
        }
    }
}

impl BindingConfig {
    pub fn pitch(&self) -> u32 {
        self.hole_diameter + self.hole_spacing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpineShadowConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_spine_shadow_opacity")]
    pub opacity: f32,
    /// Falloff width as a fraction of the spine width.
    #[serde(default = "default_width_ratio")]
    pub width_ratio: f32,
}

fn default_spine_shadow_opacity() -> f32 { 0.3 }
fn default_width_ratio() -> f32 { 0.75 }

impl Default for SpineShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            opacity: default_spine_shadow_opacity(),
            width_ratio: default_width_ratio(),
        }
    }
}

/// Per-plate (dx, dy) shift in whole pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisregistrationConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub cyan: (i32, i32),
    #[serde(default = "default_magenta_shift")]
    pub magenta: (i32, i32),
    #[serde(default = "default_yellow_shift")]
    pub yellow: (i32, i32),
    #[serde(default)]
    pub black: (i32, i32),
}

fn default_magenta_shift() -> (i32, i32) { (1, 0) }
fn default_yellow_shift() -> (i32, i32) { (0, -1) }

impl Default for MisregistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cyan: (0, 0),
            magenta: default_magenta_shift(),
            yellow: default_yellow_shift(),
            black: (0, 0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotGainConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_gamma")]
    pub gamma: f32,
}

fn default_gamma() -> f32 { 0.95 }

impl Default for DotGainConfig {
    fn default() -> Self {
        Self { enabled: true, gamma: default_gamma() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VignetteConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_vignette_strength")]
    pub strength: f32,
}

fn default_vignette_strength() -> f32 { 0.15 }

impl Default for VignetteConfig {
    fn default() -> Self {
        Self { enabled: true, strength: default_vignette_strength() }
    }
}

/// Measured uncoated-stock dot gain: ink coverage in, printed coverage out.
const DOT_GAIN_PROFILE: [(f32, f32); 9] = [
    (0.0, 0.0),
    (0.1, 0.14),
    (0.25, 0.33),
    (0.4, 0.50),
    (0.5, 0.60),
    (0.6, 0.69),
    (0.75, 0.82),
    (0.9, 0.94),
    (1.0, 1.0),
];

pub struct PrintSimulator {
    config: ArtifactConfig,
    geometry: GeometryModel,
}

impl PrintSimulator {
    pub fn new(config: ArtifactConfig, geometry: GeometryModel) -> Self {
        Self { config, geometry }
    }

    pub fn config(&self) -> &ArtifactConfig {
        &self.config
    }

    /// Passes 1-3 on a fresh canvas. `texture_opacity` overrides the
    /// configured opacity for this spread only.
    pub fn substrate(
        &self,
        canvas: &mut Canvas,
        spread_id: &str,
        texture_opacity: Option<f32>,
    ) -> Result<(), SpreadError> {
        let paper = canvas.paper();
        self.substrate_image(canvas.image_mut(), paper, spread_id, texture_opacity)
    }

    /// Passes 4-6 on a finished canvas.
    pub fn ink(&self, image: RgbaImage) -> RgbaImage {
        let mut image = if self.config.misregistration.enabled {
            tracing::debug!("cmyk misregistration");
            misregister(&image, &self.config.misregistration)
        } else {
            image
        };
        if self.config.dot_gain.enabled {
            tracing::debug!(gamma = self.config.dot_gain.gamma, "dot gain");
            apply_dot_gain(&mut image, &self.config.dot_gain);
        }
        if self.config.vignette.enabled {
            tracing::debug!(strength = self.config.vignette.strength, "vignette");
            apply_vignette(&mut image, &self.config.vignette);
        }
        image
    }

    /// All six passes on an already composed raster. Binding and spine
    /// curvature are skipped unless the raster is a full spread.
    pub fn run_all(&self, mut image: RgbaImage, paper: Color, seed_id: &str) -> Result<RgbaImage, SpreadError> {
        self.substrate_image(&mut image, paper, seed_id, None)?;
        Ok(self.ink(image))
    }

    fn substrate_image(
        &self,
        image: &mut RgbaImage,
        paper: Color,
        seed_id: &str,
        texture_opacity: Option<f32>,
    ) -> Result<(), SpreadError> {
        let texture = &self.config.texture;
        if texture.enabled {
            let opacity = texture_opacity.unwrap_or(texture.opacity);
            tracing::debug!(seed_id, opacity, "paper texture");
            apply_paper_texture(image, texture, seed_from_id(seed_id), opacity);
        }

        let full_spread = image.dimensions() == (self.geometry.canvas_width, self.geometry.canvas_height);
        if !full_spread {
            tracing::debug!(
                width = image.width(),
                height = image.height(),
                "raster is not a full spread, skipping binding and spine curvature"
            );
            return Ok(());
        }
        if self.config.binding.enabled {
            draw_binding(image, &self.config.binding, self.geometry.spine_center(), paper)?;
        }
        if self.config.spine_shadow.enabled {
            tracing::debug!("spine curvature shadow");
            apply_spine_shadow(image, &self.config.spine_shadow, self.geometry.dead_zone());
        }
        Ok(())
    }
}

/// Pass 1: seeded gaussian grain, streaked horizontally, blended in.
pub fn apply_paper_texture(image: &mut RgbaImage, config: &TextureConfig, seed: u64, opacity: f32) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || opacity <= 0.0 {
        return;
    }
    let noise = grain_field(w, h, config, seed);

    let data: &mut [u8] = image;
    data.par_chunks_mut(w as usize * 4)
        .zip(noise.par_chunks(w as usize))
        .for_each(|(row, grain)| {
            for (px, g) in row.chunks_exact_mut(4).zip(grain) {
                let g = *g as f32;
                for c in &mut px[..3] {
                    *c = (*c as f32 * (1.0 - opacity) + g * opacity).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}

fn grain_field(w: u32, h: u32, config: &TextureConfig, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = w as usize * h as usize;
    let mut field = Vec::with_capacity(len + 1);
    while field.len() < len {
        // Box-Muller; 1 - u keeps the log argument in (0, 1].
        let u1: f32 = 1.0 - rng.gen::<f32>();
        let u2: f32 = rng.gen();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f32::consts::TAU * u2;
        field.push(config.mean + config.std_dev * radius * theta.cos());
        field.push(config.mean + config.std_dev * radius * theta.sin());
    }
    field.truncate(len);

    let radius = config.grain_length as usize;
    let mut streaked = vec![0u8; len];
    streaked
        .par_chunks_mut(w as usize)
        .zip(field.par_chunks(w as usize))
        .for_each(|(out, row)| {
            let mut prefix = Vec::with_capacity(row.len() + 1);
            prefix.push(0.0f32);
            for v in row {
                let last = prefix[prefix.len() - 1];
                prefix.push(last + v);
            }
            for (x, o) in out.iter_mut().enumerate() {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius + 1).min(row.len());
                let mean = (prefix[hi] - prefix[lo]) / (hi - lo) as f32;
                *o = mean.round().clamp(0.0, 255.0) as u8;
            }
        });

    let gray = GrayImage::from_raw(w, h, streaked).unwrap_or_else(|| GrayImage::from_pixel(w, h, Luma([128])));
    if config.grain_blur > 0.0 {
        imageops::blur(&gray, config.grain_blur)
    } else {
        gray
    }
}

/// Hole count and top edge of the first hole, centered on the page height.
pub fn binding_layout(canvas_height: u32, config: &BindingConfig) -> (u32, u32) {
    let pitch = config.pitch().max(1);
    let count = canvas_height / pitch;
    let used = count * pitch;
    let start_y = (canvas_height + config.hole_spacing).saturating_sub(used) / 2;
    (count, start_y)
}

/// Pass 2: punch holes and coil segments down the spine.
pub fn draw_binding(
    image: &mut RgbaImage,
    config: &BindingConfig,
    center_x: i64,
    paper: Color,
) -> Result<(), SpreadError> {
    let height = image.height();
    let (count, start_y) = binding_layout(height, config);
    if count == 0 {
        return Ok(());
    }
    let diameter = config.hole_diameter as f32;
    let radius = diameter / 2.0;
    let ring = config.ring_width as f32;
    let strip_width = config.hole_diameter + 2 * config.ring_width + 4;
    let mut strip = Pixmap::new(strip_width, height)
        .ok_or_else(|| SpreadError::Render(format!("cannot allocate {strip_width}x{height} binding strip")))?;
    let cx = strip_width as f32 / 2.0;

    let ring_paint = paint(paper.scaled(0.78).with_alpha(160));
    let hole_paint = paint(paper.with_alpha(255));
    let depth_paint = paint(Color::rgba(180, 180, 180, 200));
    let coil_paint = paint(config.coil_color);
    let coil_radius = radius - 5.0;

    tracing::debug!(holes = count, start_y, "spiral binding");
    for i in 0..count {
        let cy = (start_y + i * config.pitch()) as f32 + radius;

        if let Some(path) = PathBuilder::from_circle(cx, cy, radius + ring / 2.0) {
            strip.stroke_path(&path, &ring_paint, &stroke(ring), Transform::identity(), None);
        }
        if let Some(path) = PathBuilder::from_circle(cx, cy, radius) {
            strip.fill_path(&path, &hole_paint, FillRule::Winding, Transform::identity(), None);
        }
        // Strokes sit inside their box, as a punched edge would.
        if let Some(path) = arc(cx, cy, radius - 1.5, 135.0, 315.0) {
            strip.stroke_path(&path, &depth_paint, &stroke(3.0), Transform::identity(), None);
        }
        if let Some(path) = arc(cx, cy, coil_radius - 5.0, 45.0, 225.0) {
            strip.stroke_path(&path, &coil_paint, &stroke(10.0), Transform::identity(), None);
        }
    }

    let layer = from_pixmap(&strip);
    imageops::overlay(image, &layer, center_x - (strip_width / 2) as i64, 0);
    Ok(())
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn stroke(width: f32) -> Stroke {
    Stroke { width, ..Stroke::default() }
}

/// Open arc from `start` to `end` degrees, clockwise from +x in y-down space.
fn arc(cx: f32, cy: f32, radius: f32, start: f32, end: f32) -> Option<Path> {
    const STEPS: u32 = 48;
    let mut pb = PathBuilder::new();
    for i in 0..=STEPS {
        let angle = (start + (end - start) * i as f32 / STEPS as f32).to_radians();
        let (sin, cos) = angle.sin_cos();
        let (x, y) = (cx + radius * cos, cy + radius * sin);
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }
    pb.finish()
}

/// Darkening per column. Inside the dead zone only: strongest at each edge,
/// fading quadratically toward the spine center over `width_ratio` of the
/// spine width. The right-edge gradient is laid down last, so it wins where
/// the two overlap.
pub fn spine_shadow_profile(width: u32, config: &SpineShadowConfig, zone: DeadZone) -> Vec<f32> {
    let falloff = (config.width_ratio * zone.width as f32).floor() as i64;
    let mut profile = vec![0.0f32; width as usize];
    let strength = |i: i64| config.opacity * (1.0 - i as f32 / falloff as f32).powi(2);
    let mut set = |x: i64, v: f32| {
        if (0..width as i64).contains(&x) {
            profile[x as usize] = v;
        }
    };
    for i in 0..falloff.max(0) {
        set(zone.start() + i, strength(i));
    }
    for i in 0..falloff.max(0) {
        set(zone.end() - i, strength(i));
    }
    profile
}

/// Pass 3: page curvature shadow toward the spine.
pub fn apply_spine_shadow(image: &mut RgbaImage, config: &SpineShadowConfig, zone: DeadZone) {
    let w = image.width();
    let profile = spine_shadow_profile(w, config, zone);
    let data: &mut [u8] = image;
    data.par_chunks_mut(w as usize * 4).for_each(|row| {
        for (px, shade) in row.chunks_exact_mut(4).zip(&profile) {
            if *shade == 0.0 {
                continue;
            }
            for c in &mut px[..3] {
                *c = (*c as f32 * (1.0 - shade)).round() as u8;
            }
        }
    });
}

/// Pass 4: separate into plates, shift each, recombine.
pub fn misregister(source: &RgbaImage, config: &MisregistrationConfig) -> RgbaImage {
    let (w, h) = source.dimensions();
    let mut out = RgbaImage::new(w, h);
    let ink_at = |x: i64, y: i64, shift: (i32, i32)| -> Option<Cmyk> {
        let (sx, sy) = (x - shift.0 as i64, y - shift.1 as i64);
        if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
            return None;
        }
        let p = source.get_pixel(sx as u32, sy as u32);
        Some(Cmyk::from_rgb(p[0], p[1], p[2]))
    };

    let data: &mut [u8] = &mut out;
    data.par_chunks_mut(w as usize * 4).enumerate().for_each(|(y, row)| {
        let y = y as i64;
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let x = x as i64;
            let ink = Cmyk {
                c: ink_at(x, y, config.cyan).map_or(0.0, |i| i.c),
                m: ink_at(x, y, config.magenta).map_or(0.0, |i| i.m),
                y: ink_at(x, y, config.yellow).map_or(0.0, |i| i.y),
                k: ink_at(x, y, config.black).map_or(0.0, |i| i.k),
            };
            let [r, g, b] = ink.to_rgb();
            px[0] = r;
            px[1] = g;
            px[2] = b;
            px[3] = source.get_pixel(x as u32, y as u32)[3];
        }
    });
    out
}

/// Tone curve for one 8-bit channel: dot gain on ink coverage, then gamma.
pub fn dot_gain_lut(gamma: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let exponent = 1.0 / gamma;
    for (v, slot) in lut.iter_mut().enumerate() {
        let coverage = 1.0 - v as f32 / 255.0;
        let printed = interpolate_profile(coverage);
        let value = (1.0 - printed).clamp(0.0, 1.0).powf(exponent);
        *slot = (value * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

fn interpolate_profile(coverage: f32) -> f32 {
    for pair in DOT_GAIN_PROFILE.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        if coverage <= x1 {
            let t = (coverage - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    1.0
}

/// Pass 5
pub fn apply_dot_gain(image: &mut RgbaImage, config: &DotGainConfig) {
    let lut = dot_gain_lut(config.gamma);
    let data: &mut [u8] = image;
    data.par_chunks_mut(4).for_each(|px| {
        px[0] = lut[px[0] as usize];
        px[1] = lut[px[1] as usize];
        px[2] = lut[px[2] as usize];
    });
}

/// Pass 6: radial edge darkening.
pub fn apply_vignette(image: &mut RgbaImage, config: &VignetteConfig) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let d_max = cx.hypot(cy);
    let data: &mut [u8] = image;
    data.par_chunks_mut(w as usize * 4).enumerate().for_each(|(y, row)| {
        let dy = y as f32 + 0.5 - cy;
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let dx = x as f32 + 0.5 - cx;
            let d = dx.hypot(dy) / d_max;
            let factor = 1.0 - config.strength * d * d;
            for c in &mut px[..3] {
                *c = (*c as f32 * factor).round().clamp(0.0, 255.0) as u8;
            }
        }
    });
}
