//! This library implements Xor and Binary Fuse filters -- data structures
//! for fast approximation of set membership using little memory. Probabilistic
//! filters like these are useful for quickly estimating the existence of an
//! entity to avoid using an expensive resource. For example, they can be used
//! to [reduce disk writes] in a cache or [identify malicious URLs].
//!
//! Two related families are provided, both keyed on sets of 64-bit unsigned
//! integers and both guaranteeing no false negatives:
//!
//! - [`Xor8`]/[`Xor16`]/[`Xor32`]: the construction of the xor filter paper,
//!   three disjoint table blocks, ≈9.84 bits per entry at a ≈0.39% false
//!   positive rate for the 8-bit variant.
//! - [`BinaryFuse8`]/[`BinaryFuse16`]/[`BinaryFuse32`]: overlapping-segment
//!   layout, ≈9.0 bits per entry at the same false positive rate, and about
//!   twice as fast to build. Binary Fuse filters serialize to a fixed
//!   little-endian byte layout and support scratch reuse across builds via
//!   [`BinaryFuseBuilder`].
//!
//! Filters are immutable once constructed: there is no insertion or removal
//! of individual keys. Duplicate input keys are detected and pruned during
//! construction. Lookups are read-only and safe for any number of concurrent
//! readers without synchronization. This library is `no_std`.
//!
//! Construction is deterministic: seeds are drawn from a counter-based
//! stream that restarts for every build, so the same input produces the same
//! filter in every process and on every platform.
//!
//! Filters are implemented as described in the papers
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters] and
//! [Binary Fuse Filters: Fast and Smaller Than Xor Filters], and in Daniel
//! Lemire's [go] and [c] implementations. All are useful references on the
//! theory behind the constructions.
//!
//! [reduce disk writes]: https://en.wikipedia.org/wiki/Bloom_filter#Cache_filtering
//! [identify malicious URLs]: https://en.wikipedia.org/wiki/Bloom_filter#Examples
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters]: https://arxiv.org/abs/1912.08258
//! [Binary Fuse Filters: Fast and Smaller Than Xor Filters]: https://arxiv.org/abs/2201.01174
//! [go]: https://github.com/FastFilter/xorfilter
//! [c]: https://github.com/FastFilter/xor_singleheader

#![no_std]
#![cfg_attr(feature = "nightly", feature(allocator_internals), needs_allocator)]
// Configuration attributes
#![warn(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::len_without_is_empty)]

extern crate alloc;

mod error;
#[doc(hidden)]
pub mod hash;
#[doc(hidden)]
pub mod prelude;

#[cfg(feature = "binary-fuse")]
pub mod builder;

mod hash_proxy;
mod xor16;
mod xor32;
mod xor8;

#[cfg(feature = "binary-fuse")]
mod bfuse16;
#[cfg(feature = "binary-fuse")]
mod bfuse32;
#[cfg(feature = "binary-fuse")]
mod bfuse8;

pub use error::Error;
pub use hash_proxy::HashProxy;
pub use xor16::Xor16;
pub use xor32::Xor32;
pub use xor8::Xor8;

#[cfg(feature = "binary-fuse")]
pub use bfuse16::{BinaryFuse16, BinaryFuse16Ref};
#[cfg(feature = "binary-fuse")]
pub use bfuse32::{BinaryFuse32, BinaryFuse32Ref};
#[cfg(feature = "binary-fuse")]
pub use bfuse8::{BinaryFuse8, BinaryFuse8Ref};
#[cfg(feature = "binary-fuse")]
pub use builder::BinaryFuseBuilder;

/// Maximum construction attempts before a build fails with
/// [`Error::TooManyIterations`].
///
/// Every attempt reseeds the hash; on valid input the first attempt
/// overwhelmingly succeeds, and the probability of exhausting this cap is
/// smaller than that of a cosmic ray corrupting the build.
pub const MAX_ITERATIONS: usize = 1024;

/// Methods common to all filters.
pub trait Filter<Type> {
    /// Returns `true` if the filter probably contains the specified key.
    ///
    /// There can never be a false negative, but there is a small possibility
    /// of false positives. Refer to individual filters' documentation for
    /// false positive rates.
    fn contains(&self, key: &Type) -> bool;

    /// Returns the number of fingerprints in the filter.
    fn len(&self) -> usize;
}

/// Serialization of a filter as a fixed-size geometry descriptor plus a raw
/// view of its fingerprint array.
///
/// Both pieces are in host byte order: round-tripping through
/// [`FilterRef::from_dma`] is only valid on an architecture with the same
/// endianness as the writer. For a portable format, use the filters'
/// `to_bytes`/`from_bytes` methods instead, which are fixed little-endian.
pub trait DmaSerializable {
    /// Byte length of the buffer `dma_copy_descriptor_to` writes.
    const DESCRIPTOR_LEN: usize;

    /// Copies the filter's geometry descriptor into `out`, which must hold
    /// at least [`Self::DESCRIPTOR_LEN`] bytes.
    ///
    /// [`Self::DESCRIPTOR_LEN`]: DmaSerializable::DESCRIPTOR_LEN
    fn dma_copy_descriptor_to(&self, out: &mut [u8]);

    /// Raw view of the fingerprint array, suitable for writing to storage
    /// alongside the descriptor.
    fn dma_fingerprints(&self) -> &[u8];
}

/// Zero-copy reconstruction of a filter from buffers produced via
/// [`DmaSerializable`].
pub trait FilterRef<'a, Type>: Filter<Type> {
    /// Required pointer alignment of the fingerprint buffer.
    const FINGERPRINT_ALIGNMENT: usize;

    /// Builds a filter view borrowing `fingerprints` directly.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor is shorter than the filter's descriptor
    /// length, or if the fingerprint buffer is misaligned or has a length
    /// that is not a multiple of the fingerprint width.
    fn from_dma(descriptor: &[u8], fingerprints: &'a [u8]) -> Self;
}
