//! Quality Assurance - scored checks on a finished spread
//!
//! Three checks, each backed by raster rules: accent distribution, global
//! legibility contrast and period authenticity (smooth gradients, modern
//! flat-design colors). Acceptance never depends on this report; it is an
//! advisory score for reviewing output.

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::color::Color;
use crate::validation::{
    AccentBudgetRule, Subject, ValidationConfig, ValidationRule, ValidationViolation, ViolationSeverity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Minimum contrast ratio (WCAG AA body text is 4.5).
    #[serde(default = "default_min_contrast")]
    pub min_contrast: f64,
    /// Every n-th row is scanned for gradients.
    #[serde(default = "default_gradient_row_step")]
    pub gradient_row_step: u32,
    /// More distinct colors than this in one row reads as a smooth gradient.
    #[serde(default = "default_gradient_max_unique")]
    pub gradient_max_unique: usize,
    #[serde(default = "default_modern_palette")]
    pub modern_palette: Vec<Color>,
    /// Per-channel distance, exclusive, for a pixel to match a palette color.
    #[serde(default = "default_modern_tolerance")]
    pub modern_tolerance: u8,
    #[serde(default = "default_modern_max_ratio")]
    pub modern_max_ratio: f64,
}

fn default_min_contrast() -> f64 { 4.5 }
fn default_gradient_row_step() -> u32 { 20 }
fn default_gradient_max_unique() -> usize { 50 }
fn default_modern_tolerance() -> u8 { 10 }
fn default_modern_max_ratio() -> f64 { 0.01 }

/// iOS and Material primaries; too pure for mid-90s offset print.
pub fn default_modern_palette() -> Vec<Color> {
    vec![
        Color::rgb(0, 122, 255),
        Color::rgb(52, 199, 89),
        Color::rgb(255, 59, 48),
        Color::rgb(33, 150, 243),
        Color::rgb(76, 175, 80),
    ]
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            min_contrast: default_min_contrast(),
            gradient_row_step: default_gradient_row_step(),
            gradient_max_unique: default_gradient_max_unique(),
            modern_palette: default_modern_palette(),
            modern_tolerance: default_modern_tolerance(),
            modern_max_ratio: default_modern_max_ratio(),
        }
    }
}

fn raster_violation(rule: &str, message: String, expected: String, actual: String) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        element_id: None,
        severity: ViolationSeverity::Error,
        message,
        expected: Some(expected),
        actual: Some(actual),
    }
}

/// RMS contrast of the luma channel mapped onto a rough 1..21 ratio scale:
/// `min(1 + 10 * std / mean, 21)`, or 0 for an all-black raster.
pub fn contrast_ratio(image: &RgbaImage) -> f64 {
    let n = image.width() as f64 * image.height() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let (sum, sum_sq) = image
        .as_raw()
        .par_chunks_exact(4)
        .map(|px| {
            let y = luma(px[0], px[1], px[2]) as f64;
            (y, y * y)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
    let mean = sum / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let std_dev = (sum_sq / n - mean * mean).max(0.0).sqrt();
    (1.0 + 10.0 * std_dev / mean).min(21.0)
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}

pub struct ContrastRule {
    min_contrast: f64,
}

impl ValidationRule for ContrastRule {
    fn name(&self) -> &'static str { "text_legibility" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Raster(image) = subject else {
            return vec![];
        };
        let ratio = contrast_ratio(image);
        tracing::debug!(ratio, min = self.min_contrast, "contrast ratio");
        if ratio >= self.min_contrast {
            return vec![];
        }
        vec![raster_violation(
            self.name(),
            format!("Low contrast: {ratio:.2} < {}", self.min_contrast),
            format!(">= {}", self.min_contrast),
            format!("{ratio:.2}"),
        )]
    }
}

/// Smooth gradients: too many distinct colors along a sampled row.
pub struct GradientRule {
    row_step: u32,
    max_unique: usize,
}

impl ValidationRule for GradientRule {
    fn name(&self) -> &'static str { "smooth_gradient" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Raster(image) = subject else {
            return vec![];
        };
        for y in (0..image.height()).step_by(self.row_step.max(1) as usize) {
            let unique: HashSet<[u8; 3]> = (0..image.width())
                .map(|x| {
                    let px = image.get_pixel(x, y);
                    [px[0], px[1], px[2]]
                })
                .collect();
            if unique.len() > self.max_unique {
                return vec![raster_violation(
                    self.name(),
                    format!("Smooth gradient detected: row {y} has {} distinct colors", unique.len()),
                    format!("<= {} colors per row", self.max_unique),
                    unique.len().to_string(),
                )];
            }
        }
        vec![]
    }
}

/// Modern flat-design primaries covering more than a sliver of the page.
pub struct ModernPaletteRule {
    palette: Vec<Color>,
    tolerance: u8,
    max_ratio: f64,
}

impl ModernPaletteRule {
    fn matches(&self, color: &Color, px: &[u8]) -> bool {
        let near = |a: u8, b: u8| a.abs_diff(b) < self.tolerance;
        near(color.r, px[0]) && near(color.g, px[1]) && near(color.b, px[2])
    }
}

impl ValidationRule for ModernPaletteRule {
    fn name(&self) -> &'static str { "modern_palette" }

    fn validate(&self, subject: &Subject<'_>) -> Vec<ValidationViolation> {
        let Subject::Raster(image) = subject else {
            return vec![];
        };
        let total = image.width() as f64 * image.height() as f64;
        self.palette
            .iter()
            .filter_map(|color| {
                let count = image
                    .as_raw()
                    .par_chunks_exact(4)
                    .filter(|px| self.matches(color, px))
                    .count();
                let ratio = if total > 0.0 { count as f64 / total } else { 0.0 };
                (ratio > self.max_ratio).then(|| {
                    raster_violation(
                        self.name(),
                        format!("Modern flat design color {} covers {:.2}%", color.to_hex(), ratio * 100.0),
                        format!("<= {:.0}%", self.max_ratio * 100.0),
                        format!("{:.2}%", ratio * 100.0),
                    )
                })
            })
            .collect()
    }
}

/// Outcome of one named check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaCheck {
    pub check_name: String,
    pub passed: bool,
    /// 1.0 on pass; a fixed partial score on failure.
    pub score: f64,
    pub message: String,
    pub violations: Vec<ValidationViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaReport {
    pub subject: String,
    pub checks: Vec<QaCheck>,
    pub overall_passed: bool,
    /// Mean of the check scores.
    pub score: f64,
}

struct CheckGroup {
    name: &'static str,
    fail_score: f64,
    pass_message: &'static str,
    rules: Vec<Box<dyn ValidationRule>>,
}

pub struct QualityChecker {
    groups: Vec<CheckGroup>,
}

impl QualityChecker {
    pub fn new(config: &ValidationConfig) -> Self {
        let qa = &config.qa;
        let groups = vec![
            CheckGroup {
                name: "color_distribution",
                fail_score: 0.5,
                pass_message: "Color distribution within limits",
                rules: vec![Box::new(AccentBudgetRule::new(
                    config.accent_budgets.clone(),
                    config.color_tolerance,
                    config.sample_stride,
                ))],
            },
            CheckGroup {
                name: "text_legibility",
                fail_score: 0.6,
                pass_message: "Text is legible",
                rules: vec![Box::new(ContrastRule { min_contrast: qa.min_contrast })],
            },
            CheckGroup {
                name: "period_authenticity",
                fail_score: 0.4,
                pass_message: "No anachronisms detected",
                rules: vec![
                    Box::new(GradientRule { row_step: qa.gradient_row_step, max_unique: qa.gradient_max_unique }),
                    Box::new(ModernPaletteRule {
                        palette: qa.modern_palette.clone(),
                        tolerance: qa.modern_tolerance,
                        max_ratio: qa.modern_max_ratio,
                    }),
                ],
            },
        ];
        Self { groups }
    }

    pub fn report(&self, image: &RgbaImage, label: &str) -> QaReport {
        let subject = Subject::Raster(image);
        let checks: Vec<QaCheck> = self
            .groups
            .iter()
            .map(|group| {
                let violations: Vec<_> = group.rules.iter().flat_map(|r| r.validate(&subject)).collect();
                let passed = violations.is_empty();
                let message = if passed {
                    group.pass_message.to_string()
                } else {
                    violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>().join("; ")
                };
                QaCheck {
                    check_name: group.name.to_string(),
                    passed,
                    score: if passed { 1.0 } else { group.fail_score },
                    message,
                    violations,
                }
            })
            .collect();

        let score = checks.iter().map(|c| c.score).sum::<f64>() / checks.len().max(1) as f64;
        let overall_passed = checks.iter().all(|c| c.passed);
        tracing::info!(subject = label, score, passed = overall_passed, "QA report complete");
        QaReport { subject: label.to_string(), checks, overall_passed, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn halves() -> RgbaImage {
        RgbaImage::from_fn(100, 40, |x, _| if x < 50 { BLACK } else { WHITE })
    }

    fn ramp() -> RgbaImage {
        RgbaImage::from_fn(256, 40, |x, _| Rgba([x as u8, x as u8, x as u8, 255]))
    }

    #[test]
    fn test_contrast_ratio() {
        // mean 127.5, std 127.5
        assert!((contrast_ratio(&halves()) - 11.0).abs() < 1e-9);
        assert_eq!(contrast_ratio(&RgbaImage::from_pixel(8, 8, Rgba([200, 190, 170, 255]))), 1.0);
        assert_eq!(contrast_ratio(&RgbaImage::from_pixel(8, 8, BLACK)), 0.0);
    }

    #[test]
    fn test_flat_paper_is_low_contrast() {
        let rule = ContrastRule { min_contrast: 4.5 };
        let paper = RgbaImage::from_pixel(20, 20, Rgba([248, 243, 229, 255]));
        let violations = rule.validate(&Subject::Raster(&paper));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "text_legibility");
        assert!(rule.validate(&Subject::Raster(&halves())).is_empty());
    }

    #[test]
    fn test_gradient_detection() {
        let rule = GradientRule { row_step: 20, max_unique: 50 };
        assert_eq!(rule.validate(&Subject::Raster(&ramp())).len(), 1);
        assert!(rule.validate(&Subject::Raster(&halves())).is_empty());
    }

    #[test]
    fn test_modern_palette_share() {
        let rule = ModernPaletteRule { palette: default_modern_palette(), tolerance: 10, max_ratio: 0.01 };
        // 200 of 10000 pixels near iOS blue
        let heavy = RgbaImage::from_fn(100, 100, |_, y| if y < 2 { Rgba([5, 125, 250, 255]) } else { WHITE });
        let violations = rule.validate(&Subject::Raster(&heavy));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("#007AFF"));

        let light = RgbaImage::from_fn(100, 100, |x, y| if y == 0 && x < 50 { Rgba([5, 125, 250, 255]) } else { WHITE });
        assert!(rule.validate(&Subject::Raster(&light)).is_empty());

        // 10 away on a channel is not a match
        let off = RgbaImage::from_pixel(10, 10, Rgba([10, 122, 255, 255]));
        assert!(rule.validate(&Subject::Raster(&off)).is_empty());
    }

    #[test]
    fn test_report_scores() {
        let checker = QualityChecker::new(&ValidationConfig::default());
        let clean = checker.report(&halves(), "clean");
        assert!(clean.overall_passed);
        assert_eq!(clean.score, 1.0);
        assert_eq!(clean.checks.len(), 3);

        let ramped = checker.report(&ramp(), "ramp");
        assert!(!ramped.overall_passed);
        let failed: Vec<_> = ramped.checks.iter().filter(|c| !c.passed).map(|c| c.check_name.as_str()).collect();
        assert_eq!(failed, vec!["period_authenticity"]);
        assert!((ramped.score - (1.0 + 1.0 + 0.4) / 3.0).abs() < 1e-9);
        assert!(ramped.checks[2].message.contains("gradient"));
    }
}
