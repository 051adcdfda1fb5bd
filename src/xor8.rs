//! Implements Xor8 filters as described in [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters].
//!
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters]: https://arxiv.org/abs/1912.08258

use crate::{xor_contains_impl, xor_from_impl, Error, Filter};
use alloc::{boxed::Box, vec::Vec};

#[cfg(feature = "bincode")]
use bincode::{Decode, Encode};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Xor filter using 8-bit fingerprints.
///
/// An `Xor8` filter uses <10 bits per entry of the set it is constructed
/// from, and has a false positive rate of ≈0.39%. As with other
/// probabilistic filters, a higher number of entries decreases the bits per
/// entry but increases the false positive rate.
///
/// An `Xor8` is constructed from a set of 64-bit unsigned integers and is
/// immutable. Duplicate keys are tolerated (and represented once), but
/// construction is faster without them. Unlike the Binary Fuse family,
/// construction from an empty set is an error.
///
/// ```
/// # extern crate alloc;
/// use xorfuse::{Filter, Xor8};
/// # use alloc::vec::Vec;
/// # use rand::Rng;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 1_000_000;
/// let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// let filter = Xor8::try_from(&keys).unwrap();
///
/// // no false negatives
/// for key in keys {
///     assert!(filter.contains(&key));
/// }
///
/// // bits per entry
/// let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);
/// assert!(bpe < 10., "Bits per entry is {}", bpe);
/// ```
///
/// Serializing and deserializing `Xor8` filters can be enabled with the
/// [`serde`] feature (or `bincode` for bincode).
///
/// [`serde`]: http://serde.rs
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone)]
pub struct Xor8 {
    /// The seed for the filter
    pub seed: u64,
    /// The number of slots in each of the filter's three blocks
    pub block_length: usize,
    /// The fingerprints for the filter
    pub fingerprints: Box<[u8]>,
}

impl Filter<u64> for Xor8 {
    /// Returns `true` if the filter contains the specified key. Has a false positive rate of <0.4%.
    fn contains(&self, key: &u64) -> bool {
        xor_contains_impl!(*key, self, fingerprint u8)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl Xor8 {
    /// Tries to construct the filter from a slice of keys.
    ///
    /// If duplicate keys keep construction from succeeding, the slice is
    /// sorted and deduplicated in place; with distinct keys it is left
    /// untouched. An empty slice is [`Error::EmptySet`].
    pub fn try_from_keys(keys: &mut [u64]) -> Result<Self, Error> {
        xor_from_impl!(keys fingerprint u8)
    }
}

impl TryFrom<&[u64]> for Xor8 {
    type Error = Error;

    /// Copies the keys once so duplicates can be pruned in place; use
    /// [`Xor8::try_from_keys`] to avoid the copy.
    fn try_from(keys: &[u64]) -> Result<Self, Self::Error> {
        let mut keys = keys.to_vec();
        Self::try_from_keys(&mut keys)
    }
}

impl TryFrom<&Vec<u64>> for Xor8 {
    type Error = Error;

    fn try_from(v: &Vec<u64>) -> Result<Self, Self::Error> {
        Self::try_from(v.as_slice())
    }
}

impl TryFrom<Vec<u64>> for Xor8 {
    type Error = Error;

    fn try_from(mut v: Vec<u64>) -> Result<Self, Self::Error> {
        Self::try_from_keys(&mut v)
    }
}
