//! Implements BinaryFuse16 filters.

use crate::{
    bfuse_build_impl, bfuse_contains_impl, bfuse_from_bytes_impl, bfuse_to_bytes_impl,
    builder::BinaryFuseBuilder,
    prelude::bfuse::Descriptor,
    DmaSerializable, Error, Filter, FilterRef,
};
use alloc::{boxed::Box, vec::Vec};

#[cfg(feature = "bincode")]
use bincode::{Decode, Encode};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `BinaryFuse16` filter is an Xor-like filter with 16-bit fingerprints
/// arranged in overlapping segments. Compared to a [`BinaryFuse8`] it
/// doubles the space (≈18 bits per entry) to push the false positive rate
/// down to ≈2^-16 (<0.002%).
///
/// A `BinaryFuse16` is constructed from a set of 64-bit unsigned integers
/// and is immutable. Duplicate keys are tolerated (and represented once),
/// but construction is faster without them.
///
/// ```
/// # extern crate alloc;
/// use xorfuse::{BinaryFuse16, Filter};
/// # use alloc::vec::Vec;
/// # use rand::Rng;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 1_000_000;
/// let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// let filter = BinaryFuse16::try_from(&keys).unwrap();
///
/// // no false negatives
/// for key in keys {
///     assert!(filter.contains(&key));
/// }
///
/// // bits per entry
/// let bpe = (filter.len() as f64) * 16.0 / (SAMPLE_SIZE as f64);
/// assert!(bpe < 18.202, "Bits per entry is {}", bpe);
/// ```
///
/// Byte serialization is always available through
/// [`BinaryFuse16::to_bytes`] and [`BinaryFuse16::from_bytes`]; [`serde`]
/// and `bincode` support can be enabled with the features of the same
/// names.
///
/// [`BinaryFuse8`]: crate::BinaryFuse8
/// [`serde`]: http://serde.rs
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone)]
pub struct BinaryFuse16 {
    descriptor: Descriptor,
    /// The fingerprints for the filter
    pub fingerprints: Box<[u16]>,
}

impl Filter<u64> for BinaryFuse16 {
    /// Returns `true` if the filter contains the specified key.
    /// Has a false positive rate of <0.002%.
    /// Has no false negatives.
    fn contains(&self, key: &u64) -> bool {
        bfuse_contains_impl!(*key, self, fingerprint u16)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl BinaryFuse16 {
    /// Tries to construct the filter from a slice of keys.
    ///
    /// If duplicate keys keep an attempt from succeeding, the slice is
    /// sorted and deduplicated in place; with distinct keys it is left
    /// untouched. An empty slice yields an empty filter that answers `false`
    /// for (nearly) every key.
    pub fn try_from_keys(keys: &mut [u64]) -> Result<Self, Error> {
        Self::build_with(&mut BinaryFuseBuilder::new(), keys)
    }

    /// Like [`BinaryFuse16::try_from_keys`], but reuses `builder`'s scratch
    /// memory instead of allocating fresh buffers. Building many filters
    /// through one builder amortizes nearly all construction allocations.
    pub fn build_with(builder: &mut BinaryFuseBuilder, keys: &mut [u64]) -> Result<Self, Error> {
        bfuse_build_impl!(builder, keys, fingerprint u16)
    }

    /// Serializes the filter to a packed little-endian byte layout, portable
    /// across architectures.
    pub fn to_bytes(&self) -> Vec<u8> {
        bfuse_to_bytes_impl!(self, fingerprint u16)
    }

    /// Deserializes a filter written by [`BinaryFuse16::to_bytes`]. Trailing
    /// bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        bfuse_from_bytes_impl!(bytes, fingerprint u16)
    }
}

impl TryFrom<&[u64]> for BinaryFuse16 {
    type Error = Error;

    /// Copies the keys once so duplicates can be pruned in place; use
    /// [`BinaryFuse16::try_from_keys`] to avoid the copy.
    fn try_from(keys: &[u64]) -> Result<Self, Self::Error> {
        let mut keys = keys.to_vec();
        Self::try_from_keys(&mut keys)
    }
}

impl TryFrom<&Vec<u64>> for BinaryFuse16 {
    type Error = Error;

    fn try_from(v: &Vec<u64>) -> Result<Self, Self::Error> {
        Self::try_from(v.as_slice())
    }
}

impl TryFrom<Vec<u64>> for BinaryFuse16 {
    type Error = Error;

    fn try_from(mut v: Vec<u64>) -> Result<Self, Self::Error> {
        Self::try_from_keys(&mut v)
    }
}

impl DmaSerializable for BinaryFuse16 {
    const DESCRIPTOR_LEN: usize = Descriptor::BYTE_LEN;

    fn dma_copy_descriptor_to(&self, out: &mut [u8]) {
        self.descriptor.write_ne(out)
    }

    fn dma_fingerprints(&self) -> &[u8] {
        let fingerprints = self.fingerprints.as_ref();
        let len = core::mem::size_of_val(fingerprints);
        unsafe { core::slice::from_raw_parts(fingerprints.as_ptr() as *const u8, len) }
    }
}

/// Like [`BinaryFuse16`] except that it can be constructed 0-copy from
/// external buffers.
#[derive(Debug, Clone)]
pub struct BinaryFuse16Ref<'a> {
    descriptor: Descriptor,
    fingerprints: &'a [u16],
}

impl Filter<u64> for BinaryFuse16Ref<'_> {
    /// Returns `true` if the filter contains the specified key.
    /// Has a false positive rate of <0.002%.
    /// Has no false negatives.
    fn contains(&self, key: &u64) -> bool {
        bfuse_contains_impl!(*key, self, fingerprint u16)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl<'a> FilterRef<'a, u64> for BinaryFuse16Ref<'a> {
    const FINGERPRINT_ALIGNMENT: usize = 2;

    fn from_dma(descriptor: &[u8], fingerprints: &'a [u8]) -> Self {
        assert_eq!(
            fingerprints
                .as_ptr()
                .align_offset(core::mem::align_of::<u16>()),
            0,
            "Invalid fingerprint pointer provided - must be u16 aligned"
        );
        assert_eq!(
            fingerprints.len() % core::mem::size_of::<u16>(),
            0,
            "Invalid fingerprint buffer provided - length must be a multiple of u16"
        );

        let len = fingerprints.len() / core::mem::size_of::<u16>();
        let fingerprints =
            unsafe { core::slice::from_raw_parts(fingerprints.as_ptr() as *const u16, len) };

        Self {
            descriptor: Descriptor::read_ne(descriptor),
            fingerprints,
        }
    }
}
