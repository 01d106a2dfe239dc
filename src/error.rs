//! Construction errors.

use thiserror::Error;

/// Reasons a map cannot be built.
///
/// Both variants are reported at construction time; a successfully
/// constructed map never becomes unusable afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Requested capacity was zero.
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    /// The spare-capacity fraction was outside the open interval `(0, 1)`.
    #[error("spare-capacity fraction must lie in (0, 1), got {0}")]
    InvalidDelta(f64),
}
