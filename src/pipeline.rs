//! Spread Compositor - Single Entry Point
//!
//! Layout validation is always run and recorded before any pixel is drawn.
//! Raster validation always runs on the finished canvas. Neither blocks
//! composition; `ComposedSpread::accepted` is the downstream gate.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::artifacts::PrintSimulator;
use crate::assets::AssetStore;
use crate::canvas::Canvas;
use crate::chaos::rotation_for;
use crate::config::CompositorConfig;
use crate::error::{LayoutError, SpreadError};
use crate::geometry::{GeometryModel, Page};
use crate::hashing::{compute_layout_hash, compute_raster_hash};
use crate::layout::{Element, LayoutSpread};
use crate::placement::{SpineIntrusionWarning, SpineResolver};
use crate::print::write_png;
use crate::text::layout_text;
use crate::transform::{rotate_expanded, transform, TransformRequest};
use crate::validation::{ValidationReport, Validator};
use crate::ENGINE_VERSION;

/// Where one element finally landed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    pub element_id: String,
    pub page: Page,
    pub requested: (i64, i64),
    pub position: (i64, i64),
    pub size: (u32, u32),
    pub rotation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadManifest {
    pub id: String,
    pub spread_id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub layout_hash: String,
    pub raster_hash: String,
    pub placements: Vec<Placement>,
    pub warnings: Vec<SpineIntrusionWarning>,
}

#[derive(Debug, Clone)]
pub struct ComposedSpread {
    pub canvas: RgbaImage,
    pub placements: Vec<Placement>,
    pub warnings: Vec<SpineIntrusionWarning>,
    pub layout_report: ValidationReport,
    pub raster_report: ValidationReport,
    pub manifest: SpreadManifest,
}

impl ComposedSpread {
    /// True when neither report carries an error-severity violation.
    pub fn accepted(&self) -> bool {
        !self.layout_report.has_errors() && !self.raster_report.has_errors()
    }
}

/// An element buffer ready to merge.
struct Prepared {
    element_id: String,
    requested: (i64, i64),
    buffer: RgbaImage,
    rotation: f64,
}

pub struct SpreadCompositor {
    config: CompositorConfig,
    assets: AssetStore,
    geometry: GeometryModel,
    validator: Validator,
    simulator: PrintSimulator,
    resolver: SpineResolver,
}

impl SpreadCompositor {
    pub fn new(config: CompositorConfig) -> Result<Self, SpreadError> {
        config.check()?;
        let geometry = GeometryModel::standard();
        Ok(Self {
            assets: AssetStore::new(&config.paths.assets, &config.paths.fonts),
            validator: Validator::new(config.validation.clone(), geometry),
            simulator: PrintSimulator::new(config.artifacts.clone(), geometry),
            resolver: SpineResolver::new(geometry, config.placement.spine_intrusion_buffer),
            geometry,
            config,
        })
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GeometryModel {
        &self.geometry
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn validate_layout(&self, layout: &LayoutSpread) -> ValidationReport {
        self.validator.validate_layout(layout)
    }

    /// Build one spread end to end.
    pub fn compose(&self, layout: &LayoutSpread) -> Result<ComposedSpread, SpreadError> {
        self.check_engine_version(layout)?;
        let spread_id = layout.spread_id.as_str();
        let layout_hash = compute_layout_hash(layout)?;

        let layout_report = self.validator.validate_layout(layout);

        let paper = self.config.paper.resolve(layout.paper.as_deref())?;
        let mut canvas = Canvas::new(&self.geometry, paper);
        tracing::info!(
            spread_id,
            width = canvas.width(),
            height = canvas.height(),
            paper = %paper.to_hex(),
            "canvas created"
        );
        self.simulator.substrate(&mut canvas, spread_id, layout.settings.texture_opacity)?;

        let mut placements = Vec::with_capacity(layout.element_count());
        let mut warnings = vec![];
        for (page, elements) in layout.pages() {
            // Buffers are independent, so they can be built in parallel; merges
            // stay in declaration order so later elements layer on top.
            let prepared = elements
                .par_iter()
                .map(|element| self.prepare(element))
                .collect::<Result<Vec<_>, _>>()?;

            for item in prepared {
                let size = item.buffer.dimensions();
                let (position, warning) = self.resolver.place(&item.element_id, size, item.requested);
                if let Some(warning) = warning {
                    warnings.push(warning);
                }
                canvas.merge(item.buffer, position);
                tracing::debug!(
                    spread_id,
                    element_id = %item.element_id,
                    page = page.key(),
                    x = position.0,
                    y = position.1,
                    "element merged"
                );
                placements.push(Placement {
                    element_id: item.element_id,
                    page,
                    requested: item.requested,
                    position,
                    size,
                    rotation: item.rotation,
                });
            }
        }

        let image = self.simulator.ink(canvas.into_image());

        let raster_report = match &layout.settings.accent_budgets {
            Some(budgets) => self.validator.with_accent_budgets(budgets.clone()).validate_raster(&image, spread_id),
            None => self.validator.validate_raster(&image, spread_id),
        };

        let manifest = SpreadManifest {
            id: Uuid::new_v4().to_string(),
            spread_id: spread_id.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            layout_hash,
            raster_hash: compute_raster_hash(image.width(), image.height(), image.as_raw()),
            placements: placements.clone(),
            warnings: warnings.clone(),
        };

        let composed = ComposedSpread {
            canvas: image,
            placements,
            warnings,
            layout_report,
            raster_report,
            manifest,
        };
        if composed.accepted() {
            tracing::info!(spread_id, elements = composed.placements.len(), "spread composed");
        } else {
            tracing::warn!(
                spread_id,
                layout_errors = composed.layout_report.errors().count(),
                raster_errors = composed.raster_report.errors().count(),
                "spread composed but rejected by validation"
            );
        }
        Ok(composed)
    }

    /// Compose and write the lossless raster to `output`.
    pub fn compose_to_file(&self, layout: &LayoutSpread, output: &Path) -> Result<ComposedSpread, SpreadError> {
        let composed = self.compose(layout)?;
        write_png(&composed.canvas, &self.config.print, output)?;
        Ok(composed)
    }

    /// Independent spreads in parallel; one result per layout, in input order.
    pub fn compose_batch(&self, layouts: &[LayoutSpread]) -> Vec<Result<ComposedSpread, SpreadError>> {
        layouts
            .par_iter()
            .map(|layout| {
                self.compose(layout).map_err(|e| {
                    tracing::error!(spread_id = %layout.spread_id, error = %e, "spread abandoned");
                    e
                })
            })
            .collect()
    }

    /// All six artifact passes on an existing raster.
    pub fn post_process(&self, image: RgbaImage, seed_id: &str) -> Result<RgbaImage, SpreadError> {
        let paper = self.config.paper.resolve(None)?;
        self.simulator.run_all(image, paper, seed_id)
    }

    fn prepare(&self, element: &Element) -> Result<Prepared, SpreadError> {
        match element {
            Element::Raster(spec) => {
                let raster = self.assets.load_raster(&spec.id, &spec.source)?;
                let out = transform(raster, &TransformRequest::from(spec))?;
                Ok(Prepared {
                    element_id: spec.id.clone(),
                    requested: spec.position,
                    buffer: out.buffer,
                    rotation: out.rotation,
                })
            }
            Element::Text(spec) => {
                let font = self.assets.font(&spec.id, &spec.font_family)?;
                let mut buffer = layout_text(spec, &font, &self.config.typography);
                let rotation = rotation_for(&spec.id, spec.rotation_bound);
                if rotation != 0.0 {
                    buffer = rotate_expanded(&buffer, rotation)?;
                }
                Ok(Prepared {
                    element_id: spec.id.clone(),
                    requested: spec.position,
                    buffer,
                    rotation,
                })
            }
        }
    }

    fn check_engine_version(&self, layout: &LayoutSpread) -> Result<(), SpreadError> {
        let Some(required) = layout.engine_min_version.as_deref() else {
            return Ok(());
        };
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|e| SpreadError::Config(format!("invalid engine version: {e}")))?;
        let min_ver = semver::Version::parse(required)
            .map_err(|e| LayoutError::spread("engine_min_version", format!("'{required}' is not a semantic version: {e}")))?;

        if engine_ver < min_ver {
            return Err(SpreadError::EngineVersionMismatch {
                required: required.to_string(),
                current: ENGINE_VERSION.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactConfig;
    use image::Rgba;

    fn quiet_config(assets: &Path) -> CompositorConfig {
        let mut config = CompositorConfig::default();
        config.paths.assets = assets.to_path_buf();
        config.paths.fonts = assets.join("fonts");
        let mut artifacts = ArtifactConfig::default();
        artifacts.texture.enabled = false;
        artifacts.binding.enabled = false;
        artifacts.spine_shadow.enabled = false;
        artifacts.misregistration.enabled = false;
        artifacts.dot_gain.enabled = false;
        artifacts.vignette.enabled = false;
        config.artifacts = artifacts;
        config
    }

    fn write_asset(dir: &Path, name: &str, w: u32, h: u32, color: Rgba<u8>) {
        RgbaImage::from_pixel(w, h, color).save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_compose_moves_intruding_element() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "box.png", 600, 300, Rgba([20, 40, 200, 255]));
        let layout = LayoutSpread::from_json_str(
            r#"{"spread_id": "spread_t", "left_page": {"elements": [
                {"id": "L_box", "type": "sticker", "asset": "box.png",
                 "position": [1000, 400], "dimensions": [600, 300]}
            ]}}"#,
        )
        .unwrap();

        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        let composed = compositor.compose(&layout).unwrap();
        assert_eq!(composed.canvas.dimensions(), (3400, 2200));
        assert_eq!(composed.placements[0].position, (859, 400));
        assert_eq!(composed.warnings.len(), 1);
        assert_eq!(composed.manifest.warnings, composed.warnings);
        assert_eq!(*composed.canvas.get_pixel(860, 401), Rgba([20, 40, 200, 255]));
        // the requested spot past the new right edge is bare paper
        assert_eq!(*composed.canvas.get_pixel(1500, 401), Rgba([248, 243, 229, 255]));
        // the layout report recorded the intrusion; it does not block acceptance
        assert!(composed.layout_report.violations.iter().any(|v| v.rule == "spine_intrusion"));
    }

    fn install_font(dir: &Path, family: &str) {
        let fonts = dir.join("fonts");
        std::fs::create_dir_all(&fonts).unwrap();
        std::fs::copy(
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSansMono.ttf"),
            fonts.join(format!("{family}.ttf")),
        )
        .unwrap();
    }

    #[test]
    fn test_compose_text_block_moves_off_spine() {
        let dir = tempfile::tempdir().unwrap();
        install_font(dir.path(), "Mono");
        let layout = LayoutSpread::from_json_str(
            r##"{"spread_id": "spread_text", "left_page": {"elements": [
                {"id": "L_caption", "type": "text_body", "content": "Spine test", "font": "Mono",
                 "size": 32, "color": "#C81E28", "position": [1300, 500], "dimensions": [400, 100]}
            ]}, "right_page": {"elements": [
                {"id": "R_note", "type": "text_body", "content": "Tilted", "font": "Mono",
                 "size": 24, "rotation": 5, "position": [2200, 900], "dimensions": [300, 80]}
            ]}}"##,
        )
        .unwrap();
        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        let composed = compositor.compose(&layout).unwrap();

        // one line of 32 + 8 leading, plus 10px padding per side
        let caption = &composed.placements[0];
        assert_eq!(caption.size, (400, 60));
        assert_eq!(caption.position, (1469 - 400 - 10, 500));
        assert_eq!(composed.warnings.len(), 1);
        assert_eq!(composed.warnings[0].element_id, "L_caption");

        let paper = Rgba([248, 243, 229, 255]);
        // transparent background: the box corner shows paper, the glyphs show ink
        assert_eq!(*composed.canvas.get_pixel(1059, 500), paper);
        let inked = (1059..1459)
            .flat_map(|x| (500..560).map(move |y| (x, y)))
            .filter(|&(x, y)| {
                let px = composed.canvas.get_pixel(x, y);
                px[0] > 190 && px[1] < 60 && px[2] < 70
            })
            .count();
        assert!(inked > 0);
        // nothing drawn where the block was requested past the dead-zone edge
        assert!((500..560).all(|y| *composed.canvas.get_pixel(1500, y) == paper));

        let note = &composed.placements[1];
        assert_eq!(note.rotation, rotation_for("R_note", 5.0));
        assert!(note.rotation.abs() <= 5.0);
        let (w, h) = crate::geometry::rotated_extent(300, 24 + 8 + 20, note.rotation);
        assert_eq!(note.size, (w, h));
        assert_eq!(note.position, (2200, 900));
    }

    #[test]
    fn test_missing_asset_abandons_spread() {
        let dir = tempfile::tempdir().unwrap();
        let layout = LayoutSpread::from_json_str(
            r#"{"spread_id": "spread_t", "right_page": {"elements": [
                {"id": "R_gone", "type": "photos", "asset": "gone.png",
                 "position": [2000, 400], "dimensions": [100, 100]}
            ]}}"#,
        )
        .unwrap();
        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        match compositor.compose(&layout) {
            Err(SpreadError::AssetLoad(err)) => {
                assert_eq!(err.element_id, "R_gone");
                assert!(err.path.ends_with("gone.png"));
            }
            other => panic!("expected asset load error, got {:?}", other.map(|c| c.manifest)),
        }
    }

    #[test]
    fn test_missing_font_abandons_spread() {
        let dir = tempfile::tempdir().unwrap();
        let layout = LayoutSpread::from_json_str(
            r#"{"spread_id": "spread_t", "left_page": {"elements": [
                {"id": "L_head", "type": "text_headline", "content": "Hi", "font": "NoSuchFace",
                 "size": 40, "position": [200, 200], "dimensions": [400, 100]}
            ]}}"#,
        )
        .unwrap();
        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        let err = compositor.compose(&layout).unwrap_err();
        assert!(err.to_string().contains("L_head"));
    }

    #[test]
    fn test_engine_version_gate() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        let layout = LayoutSpread::from_json_str(r#"{"spread_id": "s", "engine_min_version": "99.0.0"}"#).unwrap();
        assert!(matches!(compositor.compose(&layout), Err(SpreadError::EngineVersionMismatch { .. })));

        let layout = LayoutSpread::from_json_str(r#"{"spread_id": "s", "engine_min_version": "one"}"#).unwrap();
        assert!(matches!(compositor.compose(&layout), Err(SpreadError::Layout(_))));
    }

    #[test]
    fn test_layout_hash_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        let layout = LayoutSpread::from_json_str(r#"{"spread_id": "s"}"#).unwrap();
        let a = compositor.compose(&layout).unwrap();
        let b = compositor.compose(&layout).unwrap();
        assert_eq!(a.manifest.layout_hash, b.manifest.layout_hash);
        assert_eq!(a.manifest.raster_hash, b.manifest.raster_hash);
        assert_ne!(a.manifest.id, b.manifest.id);
        assert!(a.accepted());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "ok.png", 10, 10, Rgba([0, 0, 0, 255]));
        let good = LayoutSpread::from_json_str(
            r#"{"spread_id": "good", "right_page": {"elements": [
                {"id": "R_ok", "type": "photos", "asset": "ok.png", "position": [2000, 300], "dimensions": [10, 10]}
            ]}}"#,
        )
        .unwrap();
        let bad = LayoutSpread::from_json_str(
            r#"{"spread_id": "bad", "right_page": {"elements": [
                {"id": "R_bad", "type": "photos", "asset": "missing.png", "position": [2000, 300], "dimensions": [10, 10]}
            ]}}"#,
        )
        .unwrap();
        let compositor = SpreadCompositor::new(quiet_config(dir.path())).unwrap();
        let results = compositor.compose_batch(&[good.clone(), bad, good]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().manifest.spread_id, "good");
    }

    #[test]
    fn test_spread_accent_budget_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quiet_config(dir.path());
        config.paper.colors.insert("orange".into(), crate::color::Color::rgb(245, 125, 13));
        let compositor = SpreadCompositor::new(config).unwrap();
        let layout = LayoutSpread::from_json_str(r#"{"spread_id": "s", "paper": "orange"}"#).unwrap();
        let composed = compositor.compose(&layout).unwrap();
        assert!(!composed.accepted());
        assert!(composed.raster_report.has_errors());
    }
}
