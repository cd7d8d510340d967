//! Layout System - Declarative Spread Descriptions
//!
//! A layout file is parsed into loose `*Decl` records first, then converted
//! into typed specs. Conversion is where malformed fields become
//! `LayoutError`s, so composition never starts on an invalid layout.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::color::{BorderSpec, Color};
use crate::error::{LayoutError, SpreadError};
use crate::geometry::{Page, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::validation::AccentBudget;

pub const DEFAULT_SHADOW_OFFSET: (i32, i32) = (3, 3);

// --- Declarations (as written in the layout file) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub spread_id: String,
    #[serde(default)]
    pub engine_min_version: Option<String>,
    #[serde(default)]
    pub paper: Option<String>,
    #[serde(default)]
    pub settings: SpreadSettings,
    #[serde(default)]
    pub left_page: PageDecl,
    #[serde(default)]
    pub right_page: PageDecl,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDecl {
    #[serde(default)]
    pub elements: Vec<ElementDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDecl {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub position: Option<Vec<f64>>,
    #[serde(default)]
    pub dimensions: Option<Vec<f64>>,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub border: Option<String>,
    #[serde(default)]
    pub shadow: Option<ShadowDecl>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub leading: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowDecl {
    #[serde(default = "default_shadow_x")]
    pub offset_x: i32,
    #[serde(default = "default_shadow_y")]
    pub offset_y: i32,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_shadow_x() -> i32 { DEFAULT_SHADOW_OFFSET.0 }
fn default_shadow_y() -> i32 { DEFAULT_SHADOW_OFFSET.1 }

/// Spread-level overrides of the compositor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpreadSettings {
    #[serde(default)]
    pub texture_opacity: Option<f32>,
    #[serde(default)]
    pub accent_budgets: Option<Vec<AccentBudget>>,
}

// --- Typed specs ---

/// Rotation-limit category derived from an element's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Text,
    Container,
    Photographic,
    Other,
}

impl ElementCategory {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "text" | "text_headline" | "text_body" => return Self::Text,
            "containers" | "container_featurebox" => return Self::Container,
            "photos" | "graphic_photo_instructional" => return Self::Photographic,
            _ => {}
        }
        let lower = tag.to_ascii_lowercase();
        if lower.contains("text") {
            Self::Text
        } else if lower.contains("container") {
            Self::Container
        } else if lower.contains("photo") || lower.contains("graphic") {
            Self::Photographic
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSpec {
    pub offset_x: i32,
    pub offset_y: i32,
    pub color: Color,
}

impl Default for ShadowSpec {
    fn default() -> Self {
        Self {
            offset_x: DEFAULT_SHADOW_OFFSET.0,
            offset_y: DEFAULT_SHADOW_OFFSET.1,
            color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementSpec {
    pub id: String,
    pub type_tag: String,
    pub category: ElementCategory,
    pub position: (i64, i64),
    pub dimensions: (u32, u32),
    pub rotation_bound: f64,
    pub border: Option<BorderSpec>,
    pub shadow: Option<ShadowSpec>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextSpec {
    pub id: String,
    pub type_tag: String,
    pub position: (i64, i64),
    /// Box dimensions; the rendered height follows the line count.
    pub dimensions: (u32, u32),
    pub rotation_bound: f64,
    pub lines: Vec<String>,
    pub font_family: String,
    pub font_size: f32,
    pub leading: Option<f32>,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Raster(ElementSpec),
    Text(TextSpec),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Raster(e) => &e.id,
            Element::Text(t) => &t.id,
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            Element::Raster(e) => &e.type_tag,
            Element::Text(t) => &t.type_tag,
        }
    }

    pub fn category(&self) -> ElementCategory {
        match self {
            Element::Raster(e) => e.category,
            Element::Text(_) => ElementCategory::Text,
        }
    }

    pub fn position(&self) -> (i64, i64) {
        match self {
            Element::Raster(e) => e.position,
            Element::Text(t) => t.position,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Element::Raster(e) => e.dimensions,
            Element::Text(t) => t.dimensions,
        }
    }

    pub fn rotation_bound(&self) -> f64 {
        match self {
            Element::Raster(e) => e.rotation_bound,
            Element::Text(t) => t.rotation_bound,
        }
    }

    pub fn border(&self) -> Option<BorderSpec> {
        match self {
            Element::Raster(e) => e.border,
            Element::Text(_) => None,
        }
    }

    pub fn shadow(&self) -> Option<ShadowSpec> {
        match self {
            Element::Raster(e) => e.shadow,
            Element::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutSpread {
    pub spread_id: String,
    pub engine_min_version: Option<String>,
    pub paper: Option<String>,
    pub settings: SpreadSettings,
    pub left_page: Vec<Element>,
    pub right_page: Vec<Element>,
}

impl LayoutSpread {
    /// Load a layout file; `.yaml`/`.yml` parse as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, SpreadError> {
        let content = fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .map_or(false, |e| e == "yaml" || e == "yml");
        let document: LayoutDocument = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(Self::from_document(document)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, SpreadError> {
        let document: LayoutDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, SpreadError> {
        let document: LayoutDocument = serde_yaml::from_str(yaml)?;
        Ok(Self::from_document(document)?)
    }

    pub fn from_document(document: LayoutDocument) -> Result<Self, LayoutError> {
        if document.spread_id.trim().is_empty() {
            return Err(LayoutError::spread("spread_id", "must not be empty"));
        }
        if let Some(opacity) = document.settings.texture_opacity {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(LayoutError::spread(
                    "settings.texture_opacity",
                    format!("{opacity} is outside 0..=1"),
                ));
            }
        }

        let mut seen = HashSet::new();
        let mut convert = |decls: &[ElementDecl]| -> Result<Vec<Element>, LayoutError> {
            decls
                .iter()
                .map(|decl| {
                    if !seen.insert(decl.id.clone()) {
                        return Err(LayoutError::element(&decl.id, "id", "duplicate element id in spread"));
                    }
                    convert_element(decl)
                })
                .collect()
        };
        let left_page = convert(&document.left_page.elements)?;
        let right_page = convert(&document.right_page.elements)?;

        Ok(Self {
            spread_id: document.spread_id,
            engine_min_version: document.engine_min_version,
            paper: document.paper,
            settings: document.settings,
            left_page,
            right_page,
        })
    }

    pub fn page(&self, page: Page) -> &[Element] {
        match page {
            Page::Left => &self.left_page,
            Page::Right => &self.right_page,
        }
    }

    pub fn pages(&self) -> [(Page, &[Element]); 2] {
        [(Page::Left, &self.left_page), (Page::Right, &self.right_page)]
    }

    pub fn element_count(&self) -> usize {
        self.left_page.len() + self.right_page.len()
    }
}

fn convert_element(decl: &ElementDecl) -> Result<Element, LayoutError> {
    let id = decl.id.as_str();
    if id.trim().is_empty() {
        return Err(LayoutError::spread("id", "element id must not be empty"));
    }
    let position = pair(id, "position", decl.position.as_deref())?;
    if position.0 < 0 || position.1 < 0 {
        return Err(LayoutError::element(id, "position", "coordinates must not be negative"));
    }
    let dimensions = pair(id, "dimensions", decl.dimensions.as_deref())?;
    if dimensions.0 <= 0 || dimensions.1 <= 0 {
        return Err(LayoutError::element(id, "dimensions", "width and height must be positive"));
    }
    if dimensions.0 > CANVAS_WIDTH as i64 || dimensions.1 > CANVAS_HEIGHT as i64 {
        return Err(LayoutError::element(
            id,
            "dimensions",
            format!("{}x{} exceeds the {CANVAS_WIDTH}x{CANVAS_HEIGHT} canvas", dimensions.0, dimensions.1),
        ));
    }
    let dimensions = (dimensions.0 as u32, dimensions.1 as u32);
    let rotation_bound = match decl.rotation {
        None => 0.0,
        Some(r) if r.is_finite() && r >= 0.0 => r,
        Some(r) => {
            return Err(LayoutError::element(id, "rotation", format!("bound {r} must be a finite non-negative number of degrees")))
        }
    };

    if decl.type_tag.starts_with("text_") {
        let content = decl
            .content
            .as_deref()
            .ok_or_else(|| LayoutError::element(id, "content", "text block has no content"))?;
        let font_family = decl
            .font
            .clone()
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| LayoutError::element(id, "font", "text block has no font"))?;
        let font_size = match decl.size {
            Some(s) if s.is_finite() && s > 0.0 && s <= CANVAS_HEIGHT as f64 => s as f32,
            Some(s) => {
                return Err(LayoutError::element(id, "size", format!("font size {s} must be in 0..={CANVAS_HEIGHT}")))
            }
            None => return Err(LayoutError::element(id, "size", "text block has no font size")),
        };
        let leading = match decl.leading {
            Some(l) if l.is_finite() && l > 0.0 && l <= CANVAS_HEIGHT as f64 => Some(l as f32),
            Some(l) => {
                return Err(LayoutError::element(id, "leading", format!("leading {l} must be in 0..={CANVAS_HEIGHT}")))
            }
            None => None,
        };
        let color = match &decl.color {
            Some(c) => Color::from_hex(c).map_err(|e| LayoutError::element(id, "color", e.to_string()))?,
            None => Color::BLACK,
        };
        return Ok(Element::Text(TextSpec {
            id: id.to_string(),
            type_tag: decl.type_tag.clone(),
            position,
            dimensions,
            rotation_bound,
            lines: content.trim().split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect(),
            font_family,
            font_size,
            leading,
            color,
        }));
    }

    let source = decl
        .asset
        .clone()
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| LayoutError::element(id, "asset", "raster element has no asset reference"))?;
    let border = decl
        .border
        .as_deref()
        .map(|b| b.parse::<BorderSpec>().map_err(|e| LayoutError::element(id, "border", e)))
        .transpose()?;
    if let Some(border) = border {
        if border.width > CANVAS_WIDTH {
            return Err(LayoutError::element(
                id,
                "border",
                format!("{}px is wider than the canvas", border.width),
            ));
        }
    }
    let shadow = decl
        .shadow
        .as_ref()
        .map(|s| -> Result<ShadowSpec, LayoutError> {
            let color = match &s.color {
                Some(c) => Color::from_hex(c).map_err(|e| LayoutError::element(id, "shadow.color", e.to_string()))?,
                None => Color::BLACK,
            };
            if s.offset_x.unsigned_abs() > CANVAS_WIDTH || s.offset_y.unsigned_abs() > CANVAS_HEIGHT {
                return Err(LayoutError::element(
                    id,
                    "shadow",
                    format!("offset ({}, {}) reaches past the canvas", s.offset_x, s.offset_y),
                ));
            }
            Ok(ShadowSpec { offset_x: s.offset_x, offset_y: s.offset_y, color })
        })
        .transpose()?;

    Ok(Element::Raster(ElementSpec {
        id: id.to_string(),
        type_tag: decl.type_tag.clone(),
        category: ElementCategory::from_type_tag(&decl.type_tag),
        position,
        dimensions,
        rotation_bound,
        border,
        shadow,
        source,
    }))
}

fn pair(id: &str, field: &str, values: Option<&[f64]>) -> Result<(i64, i64), LayoutError> {
    let values = values.ok_or_else(|| LayoutError::element(id, field, "missing"))?;
    let [a, b] = values else {
        return Err(LayoutError::element(id, field, format!("expected two numbers, got {}", values.len())));
    };
    let integral = |v: f64| -> Result<i64, LayoutError> {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e9 {
            Ok(v as i64)
        } else {
            Err(LayoutError::element(id, field, format!("{v} is not a whole pixel value")))
        }
    };
    Ok((integral(*a)?, integral(*b)?))
}
