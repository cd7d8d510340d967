//! SpreadForge Core - Print-Resolution Spread Compositor
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Geometry Is Constant: canvas and spine never vary per spread
//! 2. The Spine Is Sacred: no element finally lands in the dead zone
//! 3. Chaos Is Deterministic: rotation is a pure function of the element id
//! 4. Validation Is Protective: always run, never bypassed, never mutating
//! 5. Manifests Enable Reproduction

pub mod artifacts;
pub mod assets;
pub mod canvas;
pub mod chaos;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hashing;
pub mod layout;
pub mod pipeline;
pub mod placement;
pub mod print;
pub mod qa;
pub mod text;
pub mod transform;
pub mod validation;

pub use artifacts::{ArtifactConfig, PrintSimulator};
pub use assets::AssetStore;
pub use canvas::Canvas;
pub use chaos::rotation_for;
pub use color::{BorderSpec, Cmyk, Color};
pub use config::CompositorConfig;
pub use error::{AssetLoadError, LayoutError, SpreadError};
pub use geometry::{DeadZone, GeometryModel, Page, Rect, SafeZone};
pub use hashing::{canonical_json, compute_layout_hash, seed_from_id};
pub use layout::{Element, ElementCategory, ElementSpec, LayoutSpread, TextSpec};
pub use pipeline::{ComposedSpread, Placement, SpreadCompositor, SpreadManifest};
pub use placement::{SpineIntrusionWarning, SpineResolver};
pub use print::{PrintAuthority, PrintSpec};
pub use qa::{QaCheck, QaConfig, QaReport, QualityChecker};
pub use validation::{
    AccentBudget, ValidationConfig, ValidationReport, ValidationRule, ValidationViolation, Validator,
    ViolationSeverity,
};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
