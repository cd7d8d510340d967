//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations; severity is the policy. Errors
//! block acceptance of a composed spread, warnings are recorded only.
//! Validation never mutates its input and carries no global state: every
//! validator is built from an explicit `ValidationConfig`.

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chaos::rotation_for;
use crate::color::Color;
use crate::error::{AssetLoadError, SpreadError};
use crate::geometry::{footprint, GeometryModel, Page, Rect};
use crate::layout::{Element, ElementCategory, LayoutSpread};
use crate::qa::{QaConfig, QaReport, QualityChecker};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationViolation {
    pub rule: String,
    /// `None` for raster-wide findings.
    pub element_id: Option<String>,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Ordered violations for one subject; empty means pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub subject: String,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), violations: vec![] }
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Acceptance gate: any error-severity violation rejects the artifact.
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations.iter().filter(|v| v.severity == ViolationSeverity::Error)
    }

    /// `"<id>: <message>"` per violation, in rule order.
    pub fn messages(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.element_id.as_deref().unwrap_or(&self.subject), v.message))
            .collect()
    }
}

/// A reserved accent color and the largest share of the page it may cover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccentBudget {
    pub name: String,
    pub color: Color,
    pub max_ratio: f64,
}

/// Maximum rotation magnitude in degrees, per element category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationLimits {
    #[serde(default = "default_text_limit")]
    pub text: f64,
    #[serde(default = "default_container_limit")]
    pub container: f64,
    #[serde(default = "default_photo_limit")]
    pub photographic: f64,
}

fn default_text_limit() -> f64 { 5.0 }
fn default_container_limit() -> f64 { 15.0 }
fn default_photo_limit() -> f64 { 10.0 }

impl Default for RotationLimits {
    fn default() -> Self {
        Self {
            text: default_text_limit(),
            container: default_container_limit(),
            photographic: default_photo_limit(),
        }
    }
}

impl RotationLimits {
    pub fn for_category(&self, category: ElementCategory) -> Option<f64> {
        match category {
            ElementCategory::Text => Some(self.text),
            ElementCategory::Container => Some(self.container),
            ElementCategory::Photographic => Some(self.photographic),
            ElementCategory::Other => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub rotation_limits: RotationLimits,
    #[serde(default = "default_accent_budgets")]
    pub accent_budgets: Vec<AccentBudget>,
    /// Euclidean RGB distance below which a pixel counts as the accent.
    #[serde(default = "default_tolerance")]
    pub color_tolerance: f64,
    #[serde(default = "default_sample_stride")]
    pub sample_stride: usize,
    #[serde(default = "default_max_asset_dimension")]
    pub max_asset_dimension: u32,
    /// Largest rotation an asset may declare in its own metadata.
    #[serde(default = "default_max_asset_rotation")]
    pub max_asset_rotation: f64,
    #[serde(default)]
    pub qa: QaConfig,
}

pub fn default_accent_budgets() -> Vec<AccentBudget> {
    vec![
        AccentBudget {
            name: "nickelodeon_orange".to_string(),
            color: Color::rgb(0xF5, 0x7D, 0x0D),
            max_ratio: 0.30,
        },
        AccentBudget {
            name: "goosebumps_acid".to_string(),
            color: Color::rgb(0x95, 0xC1, 0x20),
            max_ratio: 0.10,
        },
    ]
}

fn default_tolerance() -> f64 { 30.0 }
fn default_sample_stride() -> usize { 1 }
fn default_max_asset_dimension() -> u32 { 10000 }
fn default_max_asset_rotation() -> f64 { 15.0 }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            rotation_limits: RotationLimits::default(),
            accent_budgets: default_accent_budgets(),
            color_tolerance: default_tolerance(),
            sample_stride: default_sample_stride(),
            max_asset_dimension: default_max_asset_dimension(),
            max_asset_rotation: default_max_asset_rotation(),
            qa: QaConfig::default(),
        }
    }
}

/// What a rule looks at.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Layout(&'a LayoutSpread),
    /// A finished, opaque spread raster.
    Raster(&'a RgbaImage),
    /// A single generated asset as decoded from disk, with any rotation it
    /// declares in its text metadata.
    Asset { image: &'a DynamicImage, format: Option<ImageFormat>, rotation: Option<f64> },
}

/// Validation rule trait - produces violations
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation>;
}

/// Rendered bounding box of an element at its declared position: the same
/// rotation, border and shadow growth the transform stage applies.
pub fn element_footprint(element: &Element) -> Rect {
    let rotation = rotation_for(element.id(), element.rotation_bound());
    let border = element.border().map_or(0, |b| b.width);
    let shadow = element.shadow().map(|s| (s.offset_x, s.offset_y));
    let (w, h) = footprint(element.dimensions(), rotation, border, shadow);
    let (x, y) = element.position();
    Rect::new(x, y, w as i64, h as i64)
}

fn violation(
    rule: &str,
    element_id: Option<&str>,
    severity: ViolationSeverity,
    message: String,
    expected: Option<String>,
    actual: Option<String>,
) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        element_id: element_id.map(str::to_string),
        severity,
        message,
        expected,
        actual,
    }
}

// --- Concrete Rules ---

/// Footprint against the spine dead zone. A warning only: the resolver
/// moves intruding elements at composition time.
pub struct SpineIntrusionRule {
    geometry: GeometryModel,
}

impl ValidationRule for SpineIntrusionRule {
    fn name(&self) -> &'static str { "spine_intrusion" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Layout(layout) = subject else {
            return vec![];
        };
        let zone = self.geometry.dead_zone();
        layout
            .pages()
            .iter()
            .flat_map(|(_, elements)| elements.iter())
            .filter_map(|element| {
                let rect = element_footprint(element);
                if !self.geometry.overlaps_dead_zone(rect.x, rect.y, rect.w, rect.h) {
                    return None;
                }
                tracing::warn!(element_id = element.id(), x = rect.x, right = rect.right(), "spine intrusion");
                Some(violation(
                    self.name(),
                    Some(element.id()),
                    ViolationSeverity::Warning,
                    format!("Spine intrusion: spans x {}..{} across the binding", rect.x, rect.right()),
                    Some(format!("clear of {}..{}", zone.start(), zone.end())),
                    Some(format!("{}..{}", rect.x, rect.right())),
                ))
            })
            .collect()
    }
}

/// Actual chaos rotation against the category maximum.
pub struct RotationLimitRule {
    limits: RotationLimits,
}

impl ValidationRule for RotationLimitRule {
    fn name(&self) -> &'static str { "rotation_limit" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Layout(layout) = subject else {
            return vec![];
        };
        let mut violations = vec![];
        for (_, elements) in layout.pages() {
            for element in elements {
                let Some(max) = self.limits.for_category(element.category()) else {
                    continue;
                };
                let actual = rotation_for(element.id(), element.rotation_bound());
                if actual.abs() > max {
                    violations.push(violation(
                        self.name(),
                        Some(element.id()),
                        ViolationSeverity::Error,
                        format!("Rotation {:.2} degrees exceeds the {:?} limit", actual, element.category()),
                        Some(format!("<= {max} degrees")),
                        Some(format!("{actual:.2} degrees")),
                    ));
                }
            }
        }
        violations
    }
}

/// Footprint inside the page's safe zone on both axes.
pub struct SafeZoneRule {
    geometry: GeometryModel,
}

impl ValidationRule for SafeZoneRule {
    fn name(&self) -> &'static str { "safe_zone" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Layout(layout) = subject else {
            return vec![];
        };
        let mut violations = vec![];
        for (page, elements) in layout.pages() {
            let zone = self.geometry.safe_zone(page);
            for element in elements {
                let rect = element_footprint(element);
                if zone.contains(&rect) {
                    continue;
                }
                let side = match page {
                    Page::Left => "left",
                    Page::Right => "right",
                };
                violations.push(violation(
                    self.name(),
                    Some(element.id()),
                    ViolationSeverity::Error,
                    format!("Safe zone violation on the {side} page"),
                    Some(format!("x {}..{}, y {}..{}", zone.x.0, zone.x.1, zone.y.0, zone.y.1)),
                    Some(format!("x {}..{}, y {}..{}", rect.x, rect.right(), rect.y, rect.bottom())),
                ));
            }
        }
        violations
    }
}

/// Share of sampled pixels near each reserved accent color.
pub struct AccentBudgetRule {
    budgets: Vec<AccentBudget>,
    tolerance: f64,
    stride: usize,
}

impl AccentBudgetRule {
    pub fn new(budgets: Vec<AccentBudget>, tolerance: f64, stride: usize) -> Self {
        Self { budgets, tolerance, stride }
    }

    /// Matched fraction per budget, in budget order.
    pub fn coverage(&self, image: &RgbaImage, flatten: bool) -> Vec<f64> {
        let mut matched = vec![0usize; self.budgets.len()];
        let mut sampled = 0usize;
        for px in image.pixels().step_by(self.stride.max(1)) {
            let [r, g, b] = if flatten { over_white(px.0) } else { [px[0], px[1], px[2]] };
            sampled += 1;
            for (count, budget) in matched.iter_mut().zip(&self.budgets) {
                if budget.color.distance(r, g, b) < self.tolerance {
                    *count += 1;
                }
            }
        }
        if sampled == 0 {
            return vec![0.0; self.budgets.len()];
        }
        matched.into_iter().map(|m| m as f64 / sampled as f64).collect()
    }
}

fn over_white(px: [u8; 4]) -> [u8; 3] {
    let a = px[3] as u32;
    let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
    [blend(px[0]), blend(px[1]), blend(px[2])]
}

impl ValidationRule for AccentBudgetRule {
    fn name(&self) -> &'static str { "accent_budget" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let ratios = match subject {
            Subject::Raster(image) => self.coverage(image, false),
            Subject::Asset { image, .. } => self.coverage(&image.to_rgba8(), true),
            Subject::Layout(_) => return vec![],
        };
        let mut violations = vec![];
        for (budget, ratio) in self.budgets.iter().zip(ratios) {
            tracing::debug!(accent = %budget.name, ratio, max = budget.max_ratio, "accent coverage");
            if ratio > budget.max_ratio {
                violations.push(violation(
                    self.name(),
                    None,
                    ViolationSeverity::Error,
                    format!(
                        "Excessive {} usage: {:.2}% of the page",
                        budget.name,
                        ratio * 100.0
                    ),
                    Some(format!("<= {:.0}%", budget.max_ratio * 100.0)),
                    Some(format!("{:.2}%", ratio * 100.0)),
                ));
            }
        }
        violations
    }
}

/// Basic sanity of a single generated asset file.
pub struct AssetIntegrityRule {
    max_dimension: u32,
    max_rotation: f64,
}

impl ValidationRule for AssetIntegrityRule {
    fn name(&self) -> &'static str { "asset_integrity" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Asset { image, format, rotation } = subject else {
            return vec![];
        };
        let mut violations = vec![];
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            violations.push(violation(
                self.name(),
                None,
                ViolationSeverity::Error,
                "Image has zero dimensions".to_string(),
                Some("non-empty".to_string()),
                Some(format!("{w}x{h}")),
            ));
        }
        if w > self.max_dimension || h > self.max_dimension {
            violations.push(violation(
                self.name(),
                None,
                ViolationSeverity::Error,
                format!("Image dimensions {w}x{h} exceed the maximum"),
                Some(format!("<= {}px per side", self.max_dimension)),
                Some(format!("{w}x{h}")),
            ));
        }
        if *format != Some(ImageFormat::Png) {
            violations.push(violation(
                self.name(),
                None,
                ViolationSeverity::Error,
                "Only PNG assets are supported".to_string(),
                Some("png".to_string()),
                Some(format.map_or_else(|| "unknown".to_string(), |f| format!("{f:?}").to_lowercase())),
            ));
        }
        if !image.color().has_alpha() {
            violations.push(violation(
                self.name(),
                None,
                ViolationSeverity::Error,
                "No alpha channel: assets must support transparency".to_string(),
                Some("rgba".to_string()),
                Some(format!("{:?}", image.color()).to_lowercase()),
            ));
        }
        if let Some(rotation) = (*rotation).filter(|r| r.abs() > self.max_rotation) {
            tracing::warn!(rotation, max = self.max_rotation, "excessive rotation in asset metadata");
            violations.push(violation(
                self.name(),
                None,
                ViolationSeverity::Error,
                format!("Excessive rotation in metadata: {rotation} degrees"),
                Some(format!("<= {} degrees", self.max_rotation)),
                Some(format!("{rotation} degrees")),
            ));
        }
        violations
    }
}

/// Validator orchestrates rules; each rule ignores subjects it does not apply to.
pub struct Validator {
    config: ValidationConfig,
    geometry: GeometryModel,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(config: ValidationConfig, geometry: GeometryModel) -> Self {
        let rules: Vec<Box<dyn ValidationRule>> = vec![
            Box::new(SpineIntrusionRule { geometry }),
            Box::new(RotationLimitRule { limits: config.rotation_limits.clone() }),
            Box::new(SafeZoneRule { geometry }),
            Box::new(AccentBudgetRule {
                budgets: config.accent_budgets.clone(),
                tolerance: config.color_tolerance,
                stride: config.sample_stride,
            }),
            Box::new(AssetIntegrityRule {
                max_dimension: config.max_asset_dimension,
                max_rotation: config.max_asset_rotation,
            }),
        ];
        Self { config, geometry, rules }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Same rules with a spread's own accent budgets.
    pub fn with_accent_budgets(&self, budgets: Vec<AccentBudget>) -> Self {
        let config = ValidationConfig { accent_budgets: budgets, ..self.config.clone() };
        Self::new(config, self.geometry)
    }

    pub fn validate(&self, subject: &Subject<'_>, label: &str) -> ValidationReport {
        let mut report = ValidationReport::new(label);
        for rule in &self.rules {
            report.violations.extend(rule.validate(subject));
        }
        if report.passed() {
            tracing::info!(subject = label, "validation passed");
        } else {
            tracing::info!(
                subject = label,
                violations = report.violations.len(),
                errors = report.errors().count(),
                "validation finished with violations"
            );
        }
        report
    }

    pub fn validate_layout(&self, layout: &LayoutSpread) -> ValidationReport {
        self.validate(&Subject::Layout(layout), &layout.spread_id)
    }

    pub fn validate_raster(&self, image: &RgbaImage, label: &str) -> ValidationReport {
        self.validate(&Subject::Raster(image), label)
    }

    /// Decode and check one generated asset file.
    pub fn validate_asset_file(&self, path: &Path) -> Result<ValidationReport, SpreadError> {
        let label = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let bytes = std::fs::read(path).map_err(|e| AssetLoadError::new(&label, path, e))?;
        let format = image::guess_format(&bytes).ok();
        let image = image::load_from_memory(&bytes).map_err(|e| AssetLoadError::new(&label, path, e))?;
        let rotation = match format {
            Some(ImageFormat::Png) => png_rotation_metadata(&bytes),
            _ => None,
        };
        Ok(self.validate(&Subject::Asset { image: &image, format, rotation }, &label))
    }

    /// Scored QA pass over a finished raster, using this validator's budgets.
    pub fn quality_report(&self, image: &RgbaImage, label: &str) -> QaReport {
        QualityChecker::new(&self.config).report(image, label)
    }
}

/// `rotation` keyword from a PNG's tEXt or iTXt chunks, when it parses as degrees.
fn png_rotation_metadata(bytes: &[u8]) -> Option<f64> {
    let reader = png::Decoder::new(std::io::Cursor::new(bytes)).read_info().ok()?;
    let info = reader.info();
    let latin1 = info
        .uncompressed_latin1_text
        .iter()
        .filter(|chunk| chunk.keyword == "rotation")
        .map(|chunk| chunk.text.clone());
    let utf8 = info
        .utf8_text
        .iter()
        .filter(|chunk| chunk.keyword == "rotation")
        .filter_map(|chunk| chunk.get_text().ok());
    latin1.chain(utf8).find_map(|text| text.trim().parse::<f64>().ok())
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default(), GeometryModel::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const ORANGE: Rgba<u8> = Rgba([245, 125, 13, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn striped(orange_rows: u32) -> RgbaImage {
        RgbaImage::from_fn(100, 100, |_, y| if y < orange_rows { ORANGE } else { WHITE })
    }

    fn layout(elements: &str) -> LayoutSpread {
        LayoutSpread::from_json_str(&format!(
            r#"{{"spread_id": "spread_test", "left_page": {{"elements": [{elements}]}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_accent_budget_thresholds() {
        let validator = Validator::default();
        let over = validator.validate_raster(&striped(35), "spread_test");
        assert!(over.has_errors());
        assert_eq!(over.violations[0].rule, "accent_budget");
        assert!(over.messages()[0].starts_with("spread_test: Excessive nickelodeon_orange"));

        let under = validator.validate_raster(&striped(25), "spread_test");
        assert!(under.passed());
    }

    #[test]
    fn test_accent_tolerance_is_exclusive() {
        let rule = AccentBudgetRule { budgets: default_accent_budgets(), tolerance: 30.0, stride: 1 };
        let near = RgbaImage::from_pixel(2, 2, Rgba([245, 125, 42, 255]));
        let edge = RgbaImage::from_pixel(2, 2, Rgba([245, 125, 43, 255]));
        assert_eq!(rule.coverage(&near, false)[0], 1.0);
        assert_eq!(rule.coverage(&edge, false)[0], 0.0);
    }

    #[test]
    fn test_transparent_asset_flattens_to_white() {
        let rule = AccentBudgetRule { budgets: default_accent_budgets(), tolerance: 30.0, stride: 1 };
        let clear = RgbaImage::from_pixel(4, 4, Rgba([245, 125, 13, 0]));
        assert_eq!(rule.coverage(&clear, true)[0], 0.0);
        assert_eq!(rule.coverage(&clear, false)[0], 1.0);
    }

    #[test]
    fn test_spine_intrusion_is_a_warning() {
        let spread = layout(
            r#"{"id": "L_box", "type": "container_featurebox", "asset": "box.png",
                "position": [1000, 400], "dimensions": [600, 300]}"#,
        );
        let report = Validator::default().validate_layout(&spread);
        let spine: Vec<_> = report.violations.iter().filter(|v| v.rule == "spine_intrusion").collect();
        assert_eq!(spine.len(), 1);
        assert_eq!(spine[0].severity, ViolationSeverity::Warning);
        assert_eq!(spine[0].element_id.as_deref(), Some("L_box"));
    }

    #[test]
    fn test_safe_zone_uses_footprint() {
        // 1300 + 160 + 3px shadow = 1463 is inside; a 4px border pushes it past 1469
        let inside = layout(
            r#"{"id": "L_a", "type": "sticker", "asset": "a.png",
                "position": [1300, 400], "dimensions": [160, 100], "shadow": {"offset_x": 3, "offset_y": 3}}"#,
        );
        assert!(Validator::default().validate_layout(&inside).passed());

        let outside = layout(
            r#"{"id": "L_a", "type": "sticker", "asset": "a.png", "border": "4px solid #000000",
                "position": [1300, 400], "dimensions": [160, 100], "shadow": {"offset_x": 3, "offset_y": 3}}"#,
        );
        let report = Validator::default().validate_layout(&outside);
        assert!(report.violations.iter().any(|v| v.rule == "safe_zone"));
        assert!(report.has_errors());
    }

    #[test]
    fn test_rotation_limit_checks_actual_rotation() {
        // A bound far over the text limit still passes when the drawn angle is small,
        // and fails when it is large.
        let bound = 40.0;
        let id = (0..200)
            .map(|i| format!("L_text_{i}"))
            .find(|id| rotation_for(id, bound).abs() > 5.0)
            .unwrap();
        let spread = layout(&format!(
            r#"{{"id": "{id}", "type": "text_body", "content": "hi", "font": "Chicago", "size": 20,
                "position": [300, 300], "dimensions": [400, 100], "rotation": {bound}}}"#
        ));
        let report = Validator::default().validate_layout(&spread);
        assert!(report.violations.iter().any(|v| v.rule == "rotation_limit" && v.element_id.as_deref() == Some(id.as_str())));

        let calm = (0..200)
            .map(|i| format!("L_text_{i}"))
            .find(|id| rotation_for(id, bound).abs() < 5.0)
            .unwrap();
        let spread = layout(&format!(
            r#"{{"id": "{calm}", "type": "text_body", "content": "hi", "font": "Chicago", "size": 20,
                "position": [300, 300], "dimensions": [400, 100], "rotation": {bound}}}"#
        ));
        let report = Validator::default().validate_layout(&spread);
        assert!(!report.violations.iter().any(|v| v.rule == "rotation_limit"));
    }

    #[test]
    fn test_asset_integrity_flags_jpeg_without_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30])).save(&path).unwrap();
        let report = Validator::default().validate_asset_file(&path).unwrap();
        let rules: Vec<_> = report.violations.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(report.violations.len(), 2, "{rules:?}");
        assert!(report.violations.iter().all(|v| v.rule == "asset_integrity"));
    }

    #[test]
    fn test_clean_png_asset_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sticker.png");
        RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0])).save(&path).unwrap();
        let report = Validator::default().validate_asset_file(&path).unwrap();
        assert!(report.passed(), "{:?}", report.messages());
    }

    fn png_with_rotation(path: &Path, rotation: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), 4, 4);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.add_text_chunk("rotation".to_string(), rotation.to_string()).unwrap();
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0u8; 4 * 4 * 4]).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_asset_rotation_metadata_limit() {
        let dir = tempfile::tempdir().unwrap();
        let tilted = dir.path().join("tilted.png");
        png_with_rotation(&tilted, "22.5");
        let report = Validator::default().validate_asset_file(&tilted).unwrap();
        assert_eq!(report.violations.len(), 1, "{:?}", report.messages());
        assert!(report.violations[0].message.contains("rotation"));
        assert_eq!(report.violations[0].actual.as_deref(), Some("22.5 degrees"));

        let mild = dir.path().join("mild.png");
        png_with_rotation(&mild, "-12");
        assert!(Validator::default().validate_asset_file(&mild).unwrap().passed());
    }

    #[test]
    fn test_hand_built_oversized_border_does_not_panic() {
        let mut spread = layout(
            r#"{"id": "L_a", "type": "sticker", "asset": "a.png", "position": [200, 200], "dimensions": [100, 100]}"#,
        );
        if let Element::Raster(spec) = &mut spread.left_page[0] {
            spec.border = Some(crate::color::BorderSpec { width: u32::MAX, color: Color::BLACK });
            spec.shadow = Some(crate::layout::ShadowSpec { offset_x: i32::MIN, ..Default::default() });
        }
        let report = Validator::default().validate_layout(&spread);
        assert!(report.violations.iter().any(|v| v.rule == "spine_intrusion"));
        assert!(report.violations.iter().any(|v| v.rule == "safe_zone"));
    }

    #[test]
    fn test_missing_asset_file_is_load_error() {
        let err = Validator::default().validate_asset_file(Path::new("/nonexistent/x.png")).unwrap_err();
        assert!(matches!(err, SpreadError::AssetLoad(_)));
    }

    #[test]
    fn test_spread_budget_override() {
        let strict = Validator::default().with_accent_budgets(vec![AccentBudget {
            name: "nickelodeon_orange".into(),
            color: Color::rgb(245, 125, 13),
            max_ratio: 0.20,
        }]);
        assert!(strict.validate_raster(&striped(25), "s").has_errors());
    }
}
