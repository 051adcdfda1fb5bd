//! Implements BinaryFuse8 filters.

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

/// A `BinaryFuse8` filter is an Xor-like filter with 8-bit fingerprints
/// arranged in overlapping segments. It is smaller than an [`Xor8`] (≈9.0
/// vs ≈9.84 bits per entry) and roughly twice as fast to construct, at the
/// same ≈0.39% false positive rate.
///
/// A `BinaryFuse8` is constructed from a set of 64-bit unsigned integers and
/// is immutable. Duplicate keys are tolerated (and represented once), but
/// construction is faster without them.
///
/// ```
/// # extern crate alloc;
/// use xorfuse::{BinaryFuse8, Filter};
/// # use alloc::vec::Vec;
/// # use rand::Rng;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 1_000_000;
/// let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// let filter = BinaryFuse8::try_from(&keys).unwrap();
///
/// // no false negatives
/// for key in keys {
///     assert!(filter.contains(&key));
/// }
///
/// // bits per entry
/// let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);
/// assert!(bpe < 9.101, "Bits per entry is {}", bpe);
/// ```
///
/// Byte serialization is always available through [`BinaryFuse8::to_bytes`]
/// and [`BinaryFuse8::from_bytes`]; [`serde`] and `bincode` support can be
/// enabled with the features of the same names.
///
/// [`Xor8`]: crate::Xor8
/// [`serde`]: http://serde.rs
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone)]
pub struct BinaryFuse8 {
    descriptor: Descriptor,
    /// The fingerprints for the filter
    pub fingerprints: Box<[u8]>,
}

impl Filter<u64> for BinaryFuse8 {
    /// Returns `true` if the filter contains the specified key.
    /// Has a false positive rate of <0.4%.
    /// Has no false negatives.
    fn contains(&self, key: &u64) -> bool {
        bfuse_contains_impl!(*key, self, fingerprint u8)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl BinaryFuse8 {
    /// Tries to construct the filter from a slice of keys.
    ///
    /// If duplicate keys keep an attempt from succeeding, the slice is
    /// sorted and deduplicated in place; with distinct keys it is left
    /// untouched. An empty slice yields an empty filter that answers `false`
    /// for (nearly) every key.
    pub fn try_from_keys(keys: &mut [u64]) -> Result<Self, Error> {
        Self::build_with(&mut BinaryFuseBuilder::new(), keys)
    }

    /// Like [`BinaryFuse8::try_from_keys`], but reuses `builder`'s scratch
    /// memory instead of allocating fresh buffers. Building many filters
    /// through one builder amortizes nearly all construction allocations.
    pub fn build_with(builder: &mut BinaryFuseBuilder, keys: &mut [u64]) -> Result<Self, Error> {
        bfuse_build_impl!(builder, keys, fingerprint u8)
    }

    /// Serializes the filter to a packed little-endian byte layout, portable
    /// across architectures.
    pub fn to_bytes(&self) -> Vec<u8> {
        bfuse_to_bytes_impl!(self, fingerprint u8)
    }

    /// Deserializes a filter written by [`BinaryFuse8::to_bytes`]. Trailing
    /// bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        bfuse_from_bytes_impl!(bytes, fingerprint u8)
    }
}

impl TryFrom<&[u64]> for BinaryFuse8 {
    type Error = Error;

    /// Copies the keys once so duplicates can be pruned in place; use
    /// [`BinaryFuse8::try_from_keys`] to avoid the copy.
    fn try_from(keys: &[u64]) -> Result<Self, Self::Error> {
        let mut keys = keys.to_vec();
        Self::try_from_keys(&mut keys)
    }
}

impl TryFrom<&Vec<u64>> for BinaryFuse8 {
    type Error = Error;

    fn try_from(v: &Vec<u64>) -> Result<Self, Self::Error> {
        Self::try_from(v.as_slice())
    }
}

impl TryFrom<Vec<u64>> for BinaryFuse8 {
    type Error = Error;

    fn try_from(mut v: Vec<u64>) -> Result<Self, Self::Error> {
        Self::try_from_keys(&mut v)
    }
}

impl DmaSerializable for BinaryFuse8 {
    const DESCRIPTOR_LEN: usize = Descriptor::BYTE_LEN;

    fn dma_copy_descriptor_to(&self, out: &mut [u8]) {
        self.descriptor.write_ne(out)
    }

    fn dma_fingerprints(&self) -> &[u8] {
        &self.fingerprints
    }
}

/// Like [`BinaryFuse8`] except that it can be constructed 0-copy from
/// external buffers.
#[derive(Debug, Clone)]
pub struct BinaryFuse8Ref<'a> {
    descriptor: Descriptor,
    fingerprints: &'a [u8],
}

impl Filter<u64> for BinaryFuse8Ref<'_> {
    /// Returns `true` if the filter contains the specified key.
    /// Has a false positive rate of <0.4%.
    /// Has no false negatives.
    fn contains(&self, key: &u64) -> bool {
        bfuse_contains_impl!(*key, self, fingerprint u8)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl<'a> FilterRef<'a, u64> for BinaryFuse8Ref<'a> {
    const FINGERPRINT_ALIGNMENT: usize = 1;

    fn from_dma(descriptor: &[u8], fingerprints: &'a [u8]) -> Self {
        Self {
            descriptor: Descriptor::read_ne(descriptor),
            fingerprints,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        bfuse8::BinaryFuse8Ref, BinaryFuse8, BinaryFuseBuilder, DmaSerializable, Error, Filter,
        FilterRef,
    };

    use alloc::vec::Vec;
    use rand::Rng;

    #[test]
    fn test_initialization() {
        const SAMPLE_SIZE: usize = 1_000_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = BinaryFuse8::try_from(&keys).unwrap();

        for key in keys {
            assert!(filter.contains(&key));
        }
    }

    #[test]
    fn test_bits_per_entry() {
        const SAMPLE_SIZE: usize = 1_000_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = BinaryFuse8::try_from(&keys).unwrap();
        let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);

        assert!(bpe < 9.101, "Bits per entry is {}", bpe);
    }

    #[test]
    fn test_false_positives() {
        const SAMPLE_SIZE: usize = 1_000_000;
        const NEGATIVES: usize = 10_000_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = BinaryFuse8::try_from(&keys).unwrap();

        let false_positives: usize = (0..NEGATIVES)
            .map(|_| rng.gen())
            .filter(|n| filter.contains(n))
            .count();
        let fp_rate: f64 = (false_positives * 100) as f64 / NEGATIVES as f64;
        assert!(fp_rate < 0.4, "False positive rate is {}", fp_rate);
    }

    #[test]
    fn test_boundary_sizes() {
        let mut rng = rand::thread_rng();
        for n in [0usize, 1, 2, 3, 4, 5, 100, 11_500] {
            let keys: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
            let filter = BinaryFuse8::try_from(&keys)
                .unwrap_or_else(|e| panic!("construction failed for {} keys: {}", n, e));
            for key in keys {
                assert!(filter.contains(&key));
            }
        }
    }

    #[test]
    fn test_empty_set() {
        let filter = BinaryFuse8::try_from_keys(&mut []).unwrap();
        assert!(filter.fingerprints.iter().all(|&fp| fp == 0));
    }

    #[test]
    fn test_duplicate_keys() {
        let mut keys = [303u64, 1, 77, 31, 241, 303];
        let filter = BinaryFuse8::try_from_keys(&mut keys).unwrap();
        for key in [303u64, 1, 77, 31, 241] {
            assert!(filter.contains(&key));
        }
    }

    #[test]
    fn test_replicated_keys() {
        let mut rng = rand::thread_rng();
        let distinct: Vec<u64> = (0..1_000).map(|_| rng.gen()).collect();
        let mut replicated: Vec<u64> = distinct
            .iter()
            .flat_map(|&key| [key, key, key])
            .collect();

        let filter = BinaryFuse8::try_from_keys(&mut replicated).unwrap();
        for key in distinct {
            assert!(filter.contains(&key));
        }
    }

    #[test]
    fn test_deterministic_construction() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| i.wrapping_mul(0x2545f4914f6cdd1d)).collect();

        let a = BinaryFuse8::try_from(&keys).unwrap();
        let b = BinaryFuse8::try_from(&keys).unwrap();

        assert_eq!(a.descriptor, b.descriptor);
        assert_eq!(a.fingerprints, b.fingerprints);
    }

    #[test]
    fn test_builder_reuse() {
        let mut rng = rand::thread_rng();
        let mut builder = BinaryFuseBuilder::new();

        let mut filters = Vec::new();
        let mut key_sets = Vec::new();
        for n in [10_000usize, 100, 25_000, 0, 317] {
            let keys: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
            let mut scratch = keys.clone();
            filters.push(BinaryFuse8::build_with(&mut builder, &mut scratch).unwrap());
            key_sets.push(keys);
        }
        drop(builder);

        // Filters own their fingerprints and outlive the builder.
        for (filter, keys) in filters.iter().zip(key_sets.iter()) {
            for key in keys {
                assert!(filter.contains(key));
            }
        }
    }

    #[test]
    fn test_builder_matches_fresh_build() {
        let keys: Vec<u64> = (0..5_000u64).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect();
        let mut builder = BinaryFuseBuilder::new();

        // Dirty the scratch with an unrelated build first.
        let mut other: Vec<u64> = (0..12_345u64).map(|i| i ^ 0xabcdef).collect();
        BinaryFuse8::build_with(&mut builder, &mut other).unwrap();

        let reused = BinaryFuse8::build_with(&mut builder, &mut keys.clone()).unwrap();
        let fresh = BinaryFuse8::try_from(&keys).unwrap();
        assert_eq!(reused.descriptor, fresh.descriptor);
        assert_eq!(reused.fingerprints, fresh.fingerprints);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..10_000).map(|_| rng.gen()).collect();

        let filter = BinaryFuse8::try_from(&keys).unwrap();
        let bytes = filter.to_bytes();
        let reloaded = BinaryFuse8::from_bytes(&bytes).unwrap();

        assert_eq!(filter.descriptor, reloaded.descriptor);
        assert_eq!(filter.fingerprints, reloaded.fingerprints);
        for key in keys {
            assert!(reloaded.contains(&key));
        }
    }

    #[test]
    fn test_from_bytes_truncated() {
        let keys: Vec<u64> = (0..100u64).collect();
        let bytes = BinaryFuse8::try_from(&keys).unwrap().to_bytes();

        for cut in 0..bytes.len() {
            assert_eq!(
                BinaryFuse8::from_bytes(&bytes[..cut]).unwrap_err(),
                Error::Truncated,
                "prefix of {} bytes should not deserialize",
                cut
            );
        }
    }

    #[test]
    fn test_dma_roundtrip() {
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..10_000).map(|_| rng.gen()).collect();
        let filter = BinaryFuse8::try_from(&keys).unwrap();

        let mut descriptor = [0; BinaryFuse8::DESCRIPTOR_LEN];
        filter.dma_copy_descriptor_to(&mut descriptor);

        let filter_ref = BinaryFuse8Ref::from_dma(&descriptor, filter.dma_fingerprints());
        assert_eq!(filter_ref.descriptor, filter.descriptor);
        for key in &keys {
            assert!(filter_ref.contains(key));
        }
    }

    #[test]
    fn test_structured_keys() {
        // Hash digests of small integer pairs cluster much more than
        // uniform keys; construction must still converge every time.
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let mut keys: Vec<u64> = (0..40_000)
                .map(|_| {
                    let a: i32 = rng.gen_range(0..10);
                    let b: i32 = rng.gen_range(0..100_000);
                    let mut pair = [0u8; 8];
                    pair[..4].copy_from_slice(&a.to_le_bytes());
                    pair[4..].copy_from_slice(&b.to_le_bytes());
                    twox_hash::XxHash64::oneshot(0, &pair)
                })
                .collect();
            let queries = keys.clone();

            let filter = BinaryFuse8::try_from_keys(&mut keys).unwrap();
            for key in queries {
                assert!(filter.contains(&key));
            }
        }
    }
}
