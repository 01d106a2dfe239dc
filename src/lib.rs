//! A fixed-capacity map combining Swiss Tables-style slot metadata and SIMD
//! group scans with an elastic (non-greedy) placement policy that bounds the
//! worst-case probe length at high load factors.

use core::hash::{BuildHasher, Hasher};

mod error;
mod group;
pub mod map;
mod metadata;
mod probe;

pub use error::BuildError;
pub use map::{Map as ElasticMap, DEFAULT_DELTA};

/// Hash builder for the default hasher.
pub type DefaultHashBuilder = ahash::RandomState;

/// Convenience function for hashing a key.
fn make_hash<S, K>(build_hasher: &S, key: &K) -> u64
where
    S: BuildHasher,
    K: core::hash::Hash,
{
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}
