//! Deterministic noise source.
//!
//! Wraps `ChaCha8Rng` so that every stochastic path in the engine (fallback
//! noise, climatology jitter, flood grids, ensemble confidence) can be
//! reproduced from a seed. Components never call `rand::rng()` themselves;
//! they take `&mut R where R: Rng` and the caller decides where it comes from.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default seed used when no explicit seed is provided.
pub const DEFAULT_SEED: u64 = 42;

pub struct NoiseSource(pub ChaCha8Rng);

impl Default for NoiseSource {
    fn default() -> Self {
        Self(ChaCha8Rng::seed_from_u64(DEFAULT_SEED))
    }
}

impl NoiseSource {
    pub fn from_seed_u64(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

// ---------------------------------------------------------------------------
// Sampling helpers
// ---------------------------------------------------------------------------

/// Zero-mean Gaussian sample with standard deviation `std` (Box-Muller).
///
/// Returns exactly 0.0 for a non-positive or non-finite `std`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, std: f64) -> f64 {
    if !(std.is_finite() && std > 0.0) {
        return 0.0;
    }
    // 1 - [0, 1) keeps u1 away from zero.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z * std
}

/// Exponential sample with mean `scale` (inverse CDF).
pub fn exponential<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    if !(scale.is_finite() && scale > 0.0) {
        return 0.0;
    }
    let u: f64 = 1.0 - rng.random::<f64>();
    -scale * u.ln()
}

/// Uniform sample in `[lo, hi)`; returns `lo` for an empty range.
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    lo + rng.random::<f64>() * (hi - lo)
}
