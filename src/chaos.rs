//! Deterministic Perturbation Generator
//!
//! "Chaos rotation": every element gets a tilt that looks random but is a
//! pure function of its identifier, so re-rendering part of a spread never
//! reshuffles the rest of it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::hashing::seed_from_id;

/// Rotation in degrees within `[-max_degrees, max_degrees]` for `id`.
///
/// The generator is local to the call; no process-wide RNG is touched.
pub fn rotation_for(id: &str, max_degrees: f64) -> f64 {
    let bound = max_degrees.abs();
    if bound == 0.0 || !bound.is_finite() {
        return 0.0;
    }
    let mut rng = StdRng::seed_from_u64(seed_from_id(id));
    let rotation = rng.gen_range(-bound..=bound);
    tracing::debug!(element_id = id, rotation, "chaos rotation");
    rotation
}
