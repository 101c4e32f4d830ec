//! Deterministic per-sampler seed derivation.
//!
//! Every sampler owns its own RNG stream. Streams are derived from one root
//! seed and a key naming the sampler (`"joint:arm"`, `"ik:arm:wrist"`), so a
//! selection call is reproducible from the root seed alone:
//!
//! ```text
//! Root seed
//! └── Sampler seed (per group / link key)
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive a child seed from a parent seed and a string key.
///
/// Uses `DefaultHasher` (SipHash-1-3) for fast, deterministic mixing.
///
/// # Example
///
/// ```
/// use clankers_core::seed::derive_seed;
///
/// let child = derive_seed(42, "joint:arm");
/// assert_ne!(child, 42);
/// assert_eq!(child, derive_seed(42, "joint:arm"));
/// ```
#[must_use]
pub fn derive_seed(parent: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Create the `ChaCha8Rng` stream for the sampler named `key`.
#[must_use]
pub fn sampler_rng(root: u64, key: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_seed(root, key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn derive_seed_deterministic() {
        assert_eq!(derive_seed(42, "hello"), derive_seed(42, "hello"));
    }

    #[test]
    fn derive_seed_different_keys() {
        assert_ne!(derive_seed(42, "ik:arm:a"), derive_seed(42, "ik:arm:b"));
    }

    #[test]
    fn derive_seed_different_parents() {
        assert_ne!(derive_seed(1, "key"), derive_seed(2, "key"));
    }

    #[test]
    fn sampler_rng_deterministic() {
        let mut rng1 = sampler_rng(42, "joint:arm");
        let mut rng2 = sampler_rng(42, "joint:arm");
        let v1: f64 = rng1.r#gen();
        let v2: f64 = rng2.r#gen();
        assert!((v1 - v2).abs() < f64::EPSILON);
        assert!((0.0..1.0).contains(&v1));
    }

    #[test]
    fn sampler_rng_streams_differ() {
        let mut a = sampler_rng(42, "joint:arm");
        let mut b = sampler_rng(42, "joint:hand");
        let va: u64 = a.r#gen();
        let vb: u64 = b.r#gen();
        assert_ne!(va, vb);
    }
}
