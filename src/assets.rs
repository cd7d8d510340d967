//! Asset store - loads source rasters and fonts
//!
//! Files are read whole with `fs::read`, so no handle outlives the call on
//! any path. Parsed fonts are cached by family for the life of the store.

use image::RgbaImage;
use rusttype::Font;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::AssetLoadError;

pub struct AssetStore {
    assets_dir: PathBuf,
    fonts_dir: PathBuf,
    fonts: RwLock<HashMap<String, Arc<Font<'static>>>>,
}

impl AssetStore {
    pub fn new(assets_dir: impl Into<PathBuf>, fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            fonts_dir: fonts_dir.into(),
            fonts: RwLock::new(HashMap::new()),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.assets_dir.join(name)
    }

    /// Decode `name` from the assets directory into straight RGBA8.
    pub fn load_raster(&self, element_id: &str, name: &str) -> Result<RgbaImage, AssetLoadError> {
        let path = self.asset_path(name);
        tracing::debug!(element_id, path = %path.display(), "loading asset");
        let bytes = fs::read(&path).map_err(|e| AssetLoadError::new(element_id, &path, e))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| AssetLoadError::new(element_id, &path, format!("decode failed: {e}")))?;
        Ok(decoded.to_rgba8())
    }

    /// Parsed face for `family`, looked up as `<family>.ttf` then `<family>.otf`.
    pub fn font(&self, element_id: &str, family: &str) -> Result<Arc<Font<'static>>, AssetLoadError> {
        if let Ok(cache) = self.fonts.read() {
            if let Some(font) = cache.get(family) {
                return Ok(Arc::clone(font));
            }
        }

        let ttf = self.fonts_dir.join(format!("{family}.ttf"));
        let otf = self.fonts_dir.join(format!("{family}.otf"));
        let path = if !ttf.exists() && otf.exists() { otf } else { ttf };
        tracing::debug!(element_id, family, path = %path.display(), "loading font");

        let bytes = fs::read(&path).map_err(|e| AssetLoadError::new(element_id, &path, e))?;
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| AssetLoadError::new(element_id, &path, "not a parseable TrueType/OpenType font"))?;
        let font = Arc::new(font);

        if let Ok(mut cache) = self.fonts.write() {
            cache.insert(family.to_string(), Arc::clone(&font));
        }
        Ok(font)
    }
}
