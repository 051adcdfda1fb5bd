//! Failures surfaced by filter construction and deserialization.

use thiserror::Error;

/// The error type for filter construction and deserialization.
///
/// Lookups are infallible; everything recoverable (an unlucky seed, duplicate
/// keys, hash collisions) is retried internally and never reaches the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Construction was given zero keys by a filter family that requires at
    /// least one. Xor filters reject empty input; Binary Fuse filters accept
    /// it and build an empty filter instead.
    #[error("provide a non-empty key set")]
    EmptySet,

    /// No peelable seed was found within [`MAX_ITERATIONS`] attempts. On
    /// valid input the probability of this is vanishingly small; it almost
    /// always indicates pathological input.
    ///
    /// [`MAX_ITERATIONS`]: crate::MAX_ITERATIONS
    #[error("too many iterations")]
    TooManyIterations,

    /// A serialized filter ended before all of its fields could be read.
    #[error("serialized filter is truncated")]
    Truncated,
}
