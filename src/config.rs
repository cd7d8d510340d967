//! Compositor configuration
//!
//! Every field has a default, so an empty JSON object is a complete config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::ArtifactConfig;
use crate::color::Color;
use crate::error::SpreadError;
use crate::print::PrintSpec;
use crate::validation::ValidationConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositorConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub typography: TypographyConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub print: PrintSpec,
}

impl CompositorConfig {
    pub fn load(path: &Path) -> Result<Self, SpreadError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Reject values no pass can work with.
    pub fn check(&self) -> Result<(), SpreadError> {
        let a = &self.artifacts;
        if !(0.0..=1.0).contains(&a.texture.opacity) {
            return Err(SpreadError::Config(format!("texture opacity {} is outside 0..=1", a.texture.opacity)));
        }
        if a.binding.hole_diameter == 0 {
            return Err(SpreadError::Config("binding hole diameter must be positive".into()));
        }
        if !(a.dot_gain.gamma > 0.0) {
            return Err(SpreadError::Config(format!("dot gain gamma {} must be positive", a.dot_gain.gamma)));
        }
        if !(0.0..=1.0).contains(&a.vignette.strength) {
            return Err(SpreadError::Config(format!("vignette strength {} is outside 0..=1", a.vignette.strength)));
        }
        if self.validation.sample_stride == 0 {
            return Err(SpreadError::Config("validation sample stride must be at least 1".into()));
        }
        let qa = &self.validation.qa;
        if !(qa.min_contrast.is_finite() && qa.min_contrast >= 0.0) {
            return Err(SpreadError::Config(format!("QA minimum contrast {} must be non-negative", qa.min_contrast)));
        }
        if qa.gradient_row_step == 0 {
            return Err(SpreadError::Config("QA gradient row step must be at least 1".into()));
        }
        if !self.paper.colors.contains_key(&self.paper.default_template) {
            return Err(SpreadError::Config(format!("unknown default paper '{}'", self.paper.default_template)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_assets_dir")]
    pub assets: PathBuf,
    #[serde(default = "default_fonts_dir")]
    pub fonts: PathBuf,
}

fn default_assets_dir() -> PathBuf { PathBuf::from("assets/generated") }
fn default_fonts_dir() -> PathBuf { PathBuf::from("assets/fonts") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self { assets: default_assets_dir(), fonts: default_fonts_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_colors")]
    pub colors: BTreeMap<String, Color>,
    #[serde(default = "default_paper_template")]
    pub default_template: String,
}

fn default_paper_colors() -> BTreeMap<String, Color> {
    BTreeMap::from([
        ("aged_newsprint".to_string(), Color::rgb(248, 243, 229)),
        ("white".to_string(), Color::WHITE),
        ("kraft".to_string(), Color::rgb(216, 195, 160)),
    ])
}

fn default_paper_template() -> String { "aged_newsprint".to_string() }

impl Default for PaperConfig {
    fn default() -> Self {
        Self { colors: default_paper_colors(), default_template: default_paper_template() }
    }
}

impl PaperConfig {
    /// Resolve a layout's paper: a named template, a literal `#RRGGBB`, or the default.
    pub fn resolve(&self, paper: Option<&str>) -> Result<Color, SpreadError> {
        let name = paper.unwrap_or(&self.default_template);
        if let Some(color) = self.colors.get(name) {
            return Ok(*color);
        }
        Color::from_hex(name).map_err(|_| {
            SpreadError::Layout(crate::error::LayoutError::spread(
                "paper",
                format!("'{name}' is neither a known paper template nor a hex color"),
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypographyConfig {
    #[serde(default = "default_wrap_padding")]
    pub word_wrap_padding: u32,
    /// Added to the font size when a text block gives no leading.
    #[serde(default = "default_leading")]
    pub default_leading: f32,
}

fn default_wrap_padding() -> u32 { 10 }
fn default_leading() -> f32 { 8.0 }

impl Default for TypographyConfig {
    fn default() -> Self {
        Self { word_wrap_padding: default_wrap_padding(), default_leading: default_leading() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default = "default_spine_buffer")]
    pub spine_intrusion_buffer: i64,
}

fn default_spine_buffer() -> i64 { 10 }

impl Default for PlacementConfig {
    fn default() -> Self {
        Self { spine_intrusion_buffer: default_spine_buffer() }
    }
}
