//! Reusable construction scratch for Binary Fuse filters.

use alloc::vec::Vec;

/// Scratch memory for Binary Fuse construction, reusable across builds.
///
/// Construction touches several large temporary arrays (roughly nine bytes
/// per table slot plus nine bytes per key). A builder keeps them alive
/// between builds so repeated construction does not reallocate:
///
/// ```
/// # extern crate alloc;
/// use xorfuse::{BinaryFuse8, BinaryFuseBuilder, Filter};
/// # use alloc::vec::Vec;
///
/// let mut builder = BinaryFuseBuilder::new();
/// for n in [1_000u64, 10, 5_000] {
///     let mut keys: Vec<u64> = (0..n).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect();
///     let filter = BinaryFuse8::build_with(&mut builder, &mut keys).unwrap();
///     assert!(filter.contains(&keys[0]));
/// }
/// ```
///
/// Buffers only ever grow; a build that fits in the existing capacity zeroes
/// the prefix it needs and allocates nothing. A builder is exclusively
/// borrowed for the duration of one build, so two concurrent builds need two
/// builders. The fingerprint array of a finished filter is always freshly
/// allocated: filters never alias builder memory and stay valid after the
/// builder is dropped.
#[derive(Default)]
pub struct BinaryFuseBuilder {
    /// Work queue of slot indices currently of degree 1.
    pub alone: Vec<u32>,
    /// Per-slot packed peeling state: degree in the high 6 bits, the XOR of
    /// incident position labels in the low 2.
    pub t2count: Vec<u8>,
    /// Per-slot XOR of all incident key hashes.
    pub t2hash: Vec<u64>,
    /// Bucket-sorted hash stream, later reused as the peel stack. One
    /// element longer than the key count to hold the probe sentinel.
    pub reverse_order: Vec<u64>,
    /// Position label (0, 1, or 2) of each peeled hash.
    pub reverse_h: Vec<u8>,
    /// Bucket-sort cursors.
    pub start_pos: Vec<usize>,
}

impl BinaryFuseBuilder {
    /// Creates a builder with no scratch allocated; buffers are sized on
    /// first use.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns a zeroed slice of `len` elements backed by `buf`, growing `buf`
/// by at least 25% when it is too small so that repeated growth amortizes.
#[doc(hidden)]
pub fn reuse_buffer<T: Copy + Default>(buf: &mut Vec<T>, len: usize) -> &mut [T] {
    if buf.len() >= len {
        buf[..len].fill(T::default());
    } else {
        let grown = len.max(buf.len() + buf.len() / 4);
        buf.clear();
        buf.resize(grown, T::default());
    }
    &mut buf[..len]
}

#[cfg(test)]
mod test {
    use super::reuse_buffer;
    use alloc::vec::Vec;

    #[test]
    fn test_reuse_zeroes_prefix() {
        let mut buf: Vec<u64> = Vec::new();
        {
            let slice = reuse_buffer(&mut buf, 8);
            slice.fill(7);
        }
        let slice = reuse_buffer(&mut buf, 4);
        assert_eq!(slice.len(), 4);
        assert!(slice.iter().all(|&v| v == 0));
        // The tail past the requested length is untouched scratch.
        assert_eq!(buf[4], 7);
    }

    #[test]
    fn test_growth_is_geometric() {
        let mut buf: Vec<u8> = Vec::new();
        reuse_buffer(&mut buf, 100);
        let first = buf.len();
        reuse_buffer(&mut buf, 101);
        assert!(buf.len() >= first + first / 4);
    }
}
