//! Construction and lookup implementation for the Binary Fuse filter family.
//!
//! Binary Fuse filters place a key's three slots in three *consecutive*
//! segments of the table rather than three disjoint blocks, which tightens
//! the space overhead to ≈13% over the information-theoretic minimum and
//! makes construction cache-friendly: keys are bucket-partitioned by the
//! high bits of their hash, so the counting and peeling passes touch the
//! table almost sequentially.

use crate::Error;
use libm::{floor, fmax, log};

#[cfg(feature = "bincode")]
use bincode::{Decode, Encode};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The geometry and seed of a built Binary Fuse filter; everything a lookup
/// needs besides the fingerprint array.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// The seed of the successful construction attempt.
    pub seed: u64,
    /// Length of one segment; a power of two in `[4, 262144]`.
    pub segment_length: u32,
    /// `segment_length - 1`.
    pub segment_length_mask: u32,
    /// Number of logical segments. The table holds `segment_count + 2`
    /// physical segments so a key's three consecutive segments always fit.
    pub segment_count: u32,
    /// `segment_count * segment_length`; the range of a key's first slot.
    pub segment_count_length: u32,
}

impl Descriptor {
    /// Packed byte width of a serialized descriptor.
    pub const BYTE_LEN: usize = 24;

    /// Maps a key hash to its three table slots, one in each of three
    /// consecutive segments.
    #[inline]
    pub const fn positions(&self, hash: u64) -> (u32, u32, u32) {
        let hi = ((hash as u128 * self.segment_count_length as u128) >> 64) as u64;
        let h0 = hi as u32;
        let mut h1 = h0 + self.segment_length;
        let mut h2 = h1 + self.segment_length;
        h1 ^= ((hash >> 18) as u32) & self.segment_length_mask;
        h2 ^= (hash as u32) & self.segment_length_mask;
        (h0, h1, h2)
    }

    /// Writes the descriptor into `out` in little-endian byte order.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Descriptor::BYTE_LEN`].
    pub fn write_le(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.seed.to_le_bytes());
        out[8..12].copy_from_slice(&self.segment_length.to_le_bytes());
        out[12..16].copy_from_slice(&self.segment_length_mask.to_le_bytes());
        out[16..20].copy_from_slice(&self.segment_count.to_le_bytes());
        out[20..24].copy_from_slice(&self.segment_count_length.to_le_bytes());
    }

    /// Reads a little-endian descriptor from the front of `bytes`.
    pub fn read_le(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::BYTE_LEN {
            return Err(Error::Truncated);
        }
        Ok(Self {
            seed: read_u64(bytes, 0, u64::from_le_bytes),
            segment_length: read_u32(bytes, 8, u32::from_le_bytes),
            segment_length_mask: read_u32(bytes, 12, u32::from_le_bytes),
            segment_count: read_u32(bytes, 16, u32::from_le_bytes),
            segment_count_length: read_u32(bytes, 20, u32::from_le_bytes),
        })
    }

    /// Writes the descriptor into `out` in host byte order, for the
    /// zero-copy serialization path.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Descriptor::BYTE_LEN`].
    pub fn write_ne(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.seed.to_ne_bytes());
        out[8..12].copy_from_slice(&self.segment_length.to_ne_bytes());
        out[12..16].copy_from_slice(&self.segment_length_mask.to_ne_bytes());
        out[16..20].copy_from_slice(&self.segment_count.to_ne_bytes());
        out[20..24].copy_from_slice(&self.segment_count_length.to_ne_bytes());
    }

    /// Reads a host-byte-order descriptor, the counterpart of
    /// [`Descriptor::write_ne`].
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`Descriptor::BYTE_LEN`].
    pub fn read_ne(bytes: &[u8]) -> Self {
        assert!(
            bytes.len() >= Self::BYTE_LEN,
            "Invalid descriptor buffer provided - must be at least {} bytes",
            Self::BYTE_LEN
        );
        Self {
            seed: read_u64(bytes, 0, u64::from_ne_bytes),
            segment_length: read_u32(bytes, 8, u32::from_ne_bytes),
            segment_length_mask: read_u32(bytes, 12, u32::from_ne_bytes),
            segment_count: read_u32(bytes, 16, u32::from_ne_bytes),
            segment_count_length: read_u32(bytes, 20, u32::from_ne_bytes),
        }
    }
}

#[inline]
fn read_u64(bytes: &[u8], at: usize, decode: fn([u8; 8]) -> u64) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    decode(buf)
}

#[inline]
fn read_u32(bytes: &[u8], at: usize, decode: fn([u8; 4]) -> u32) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    decode(buf)
}

/// Empirically tuned segment length for a table of `size` keys. The `floor`
/// matters: rounding instead can substantially slow construction.
#[inline]
pub fn segment_length(arity: u32, size: u32) -> u32 {
    if size == 0 {
        return 4;
    }

    match arity {
        3 => 1 << (floor(log(size as f64) / log(3.33_f64) + 2.25) as u32),
        4 => 1 << (floor(log(size as f64) / log(2.91_f64) - 0.5) as u32),
        _ => 65536,
    }
}

/// Empirically tuned capacity-to-size ratio; larger for small tables where
/// peeling needs more slack.
#[inline]
pub fn size_factor(arity: u32, size: u32) -> f64 {
    match arity {
        3 => fmax(
            1.125_f64,
            0.875 + 0.25 * log(1000000_f64) / log(size as f64),
        ),
        4 => fmax(1.075_f64, 0.77 + 0.305 * log(600000_f64) / log(size as f64)),
        _ => 2.0,
    }
}

/// Reduces a position label in `0..=4` back into `{0, 1, 2}`.
#[inline]
pub const fn mod3(x: u8) -> u8 {
    if x > 2 {
        x - 3
    } else {
        x
    }
}

/// Creates a fallible constructor body for a Binary Fuse filter of
/// fingerprint type `$fpty`, using `$builder`'s scratch buffers.
///
/// `$keys` is a mutable slice; it is reordered in place if duplicates force
/// a pruning pass. An empty slice builds an empty filter.
#[doc(hidden)]
#[macro_export]
macro_rules! bfuse_build_impl(
    ($builder:ident, $keys:ident, fingerprint $fpty:ty) => {{
        use alloc::boxed::Box;
        use $crate::{
            fingerprint, make_fp_block,
            builder::{reuse_buffer, BinaryFuseBuilder},
            hash::{mixsplit, splitmix64},
            prelude::{
                bfuse::{mod3, segment_length, size_factor, Descriptor},
                prune_duplicates,
            },
            Error, MAX_ITERATIONS,
        };

        let keys: &mut [u64] = $keys;
        let size = keys.len();
        // Number of keys not yet pruned away as duplicates. The scratch
        // arrays and loop bounds stay sized to the original input.
        let mut live = size;

        const ARITY: u32 = 3;
        let base_segment_length = segment_length(ARITY, size as u32).min(262144);
        let size_factor = size_factor(ARITY, size as u32);
        let capacity: u32 = if size > 1 {
            libm::round(size as f64 * size_factor) as u32
        } else {
            0
        };
        let (array_length, base_segment_count) = {
            let proposed = (capacity + base_segment_length - 1) / base_segment_length;
            let segment_count = if proposed < ARITY {
                1
            } else {
                proposed - (ARITY - 1)
            };
            // A key's first slot lands in any of `segment_count` segments
            // and spans two more, so the table is two segments longer.
            let array_length = (segment_count + ARITY - 1) * base_segment_length;
            (array_length as usize, segment_count)
        };

        let mut fingerprints: Box<[$fpty]> = make_fp_block!(array_length);
        let capacity = array_length;

        let BinaryFuseBuilder {
            alone,
            t2count,
            t2hash,
            reverse_order,
            reverse_h,
            start_pos,
        } = $builder;
        let alone = reuse_buffer(alone, capacity);
        let t2count = reuse_buffer(t2count, capacity);
        let t2hash = reuse_buffer(t2hash, capacity);
        let reverse_h = reuse_buffer(reverse_h, size);
        let reverse_order = reuse_buffer(reverse_order, size + 1);
        // Non-zero guard one past the last valid index; terminates the
        // bucket probe below without a bounds branch.
        reverse_order[size] = 1;

        let mut rng = 1u64;
        let mut descriptor = Descriptor {
            seed: 0,
            segment_length: 0,
            segment_length_mask: 0,
            segment_count: 0,
            segment_count_length: 0,
        };
        // The slots of a hash, listed twice so `found + 1` and `found + 2`
        // wrap cyclically without a modulo.
        let mut h012 = [0u32; 6];
        let mut stack_size = 0usize;
        let mut done = false;
        for iteration in 1..=MAX_ITERATIONS {
            descriptor.seed = splitmix64(&mut rng);

            // Mid-range sizes occasionally sit in a pathological region of
            // the segment-length formula; every fourth attempt runs with
            // half-length segments instead. The fingerprint array length is
            // unchanged: (2c + 2 + 2) * (l / 2) == (c + 2) * l.
            let shrink = iteration % 4 == 0
                && size > 4
                && size < 1_000_000
                && base_segment_length >= 8;
            if shrink {
                descriptor.segment_length = base_segment_length / 2;
                descriptor.segment_count = base_segment_count * 2 + 2;
            } else {
                descriptor.segment_length = base_segment_length;
                descriptor.segment_count = base_segment_count;
            }
            descriptor.segment_length_mask = descriptor.segment_length - 1;
            descriptor.segment_count_length =
                descriptor.segment_count * descriptor.segment_length;

            // Partition hashes into 2^block_bits buckets by their top bits.
            // The result approximates a sort, which keeps the counting pass
            // below cache-resident.
            let block_bits = {
                let mut block_bits = 1usize;
                while (1u32 << block_bits) < descriptor.segment_count {
                    block_bits += 1;
                }
                block_bits
            };
            let bucket_count = 1usize << block_bits;
            let start_pos = reuse_buffer(start_pos, bucket_count);
            for (i, pos) in start_pos.iter_mut().enumerate() {
                *pos = ((i as u64 * size as u64) >> block_bits) as usize;
            }
            for &key in keys[..live].iter() {
                let hash = mixsplit(key, descriptor.seed);
                let mut bucket = (hash >> (64 - block_bits)) as usize;
                while reverse_order[start_pos[bucket]] != 0 {
                    bucket += 1;
                    bucket &= bucket_count - 1;
                }
                reverse_order[start_pos[bucket]] = hash;
                start_pos[bucket] += 1;
            }

            // Count incidences per slot: degree in the upper six bits of
            // t2count, the XOR of position labels in the lower two, and the
            // XOR of incident hashes in t2hash.
            let mut error = false;
            let mut duplicates = 0usize;
            for i in 0..size {
                let hash = reverse_order[i];
                let (index1, index2, index3) = descriptor.positions(hash);
                let (index1, index2, index3) =
                    (index1 as usize, index2 as usize, index3 as usize);
                t2count[index1] += 4;
                // label 0 is a no-op on the low bits
                t2hash[index1] ^= hash;
                t2count[index2] += 4;
                t2count[index2] ^= 1;
                t2hash[index2] ^= hash;
                t2count[index3] += 4;
                t2count[index3] ^= 2;
                t2hash[index3] ^= hash;

                // Two copies of one hash cancel in t2hash and register as
                // degree 2, i.e. a slot with hash 0 and count 8. The
                // bitwise AND cheaply rules out the common case before the
                // exact test.
                if t2hash[index1] & t2hash[index2] & t2hash[index3] == 0 {
                    if (t2hash[index1] == 0 && t2count[index1] == 8)
                        || (t2hash[index2] == 0 && t2count[index2] == 8)
                        || (t2hash[index3] == 0 && t2count[index3] == 8)
                    {
                        duplicates += 1;
                        t2count[index1] -= 4;
                        t2hash[index1] ^= hash;
                        t2count[index2] -= 4;
                        t2count[index2] ^= 1;
                        t2hash[index2] ^= hash;
                        t2count[index3] -= 4;
                        t2count[index3] ^= 2;
                        t2hash[index3] ^= hash;
                    }
                }
                if t2count[index1] < 4 || t2count[index2] < 4 || t2count[index3] < 4 {
                    error = true;
                }
            }
            if error {
                reverse_order[..size].fill(0);
                t2count.fill(0);
                t2hash.fill(0);
                continue;
            }

            // Seed the queue with every slot of degree 1.
            let mut qsize = 0usize;
            for (i, &count) in t2count.iter().enumerate() {
                alone[qsize] = i as u32;
                if (count >> 2) == 1 {
                    qsize += 1;
                }
            }

            // Peel: pop a degree-1 slot, record its hash and which of the
            // three positions it held, and detach the hash from the other
            // two slots.
            stack_size = 0;
            while qsize > 0 {
                qsize -= 1;
                let index = alone[qsize] as usize;
                if (t2count[index] >> 2) == 1 {
                    let hash = t2hash[index];
                    let found = t2count[index] & 3;
                    reverse_h[stack_size] = found;
                    reverse_order[stack_size] = hash;
                    stack_size += 1;

                    let (index1, index2, index3) = descriptor.positions(hash);
                    h012[1] = index2;
                    h012[2] = index3;
                    h012[3] = index1;
                    h012[4] = h012[1];

                    let other_index1 = h012[(found + 1) as usize] as usize;
                    alone[qsize] = other_index1 as u32;
                    if (t2count[other_index1] >> 2) == 2 {
                        qsize += 1;
                    }
                    t2count[other_index1] -= 4;
                    t2count[other_index1] ^= mod3(found + 1);
                    t2hash[other_index1] ^= hash;

                    let other_index2 = h012[(found + 2) as usize] as usize;
                    alone[qsize] = other_index2 as u32;
                    if (t2count[other_index2] >> 2) == 2 {
                        qsize += 1;
                    }
                    t2count[other_index2] -= 4;
                    t2count[other_index2] ^= mod3(found + 2);
                    t2hash[other_index2] ^= hash;
                }
            }

            if stack_size + duplicates == size {
                done = true;
                break;
            }
            if duplicates > 0 {
                // Detection could not account for every duplicate under
                // this seed; sort them out for real before retrying.
                live = prune_duplicates(&mut keys[..live]);
            }
            reverse_order[..size].fill(0);
            t2count.fill(0);
            t2hash.fill(0);
        }
        if !done {
            return Err(Error::TooManyIterations);
        }

        // Replay the peel stack backwards: each entry's two peer slots are
        // already final, so its own slot is forced.
        for i in (0..stack_size).rev() {
            let hash = reverse_order[i];
            let fp = fingerprint!(hash) as $fpty;
            let (index1, index2, index3) = descriptor.positions(hash);
            let found = reverse_h[i] as usize;
            h012[0] = index1;
            h012[1] = index2;
            h012[2] = index3;
            h012[3] = h012[0];
            h012[4] = h012[1];
            fingerprints[h012[found] as usize] = fp
                ^ fingerprints[h012[found + 1] as usize]
                ^ fingerprints[h012[found + 2] as usize];
        }

        Ok(Self {
            descriptor,
            fingerprints,
        })
    }};
);

/// Creates a `contains` implementation for a Binary Fuse filter of
/// fingerprint type `$fpty`.
#[doc(hidden)]
#[macro_export]
macro_rules! bfuse_contains_impl(
    ($key:expr, $self:expr, fingerprint $fpty:ty) => {{
        let hash = $crate::hash::mixsplit($key, $self.descriptor.seed);
        let mut f = $crate::fingerprint!(hash) as $fpty;
        let (h0, h1, h2) = $self.descriptor.positions(hash);
        f ^= $self.fingerprints[h0 as usize]
            ^ $self.fingerprints[h1 as usize]
            ^ $self.fingerprints[h2 as usize];
        f == 0
    }};
);

/// Creates a `to_bytes` body serializing a Binary Fuse filter into the
/// packed little-endian layout: descriptor, fingerprint count, fingerprint
/// cells.
#[doc(hidden)]
#[macro_export]
macro_rules! bfuse_to_bytes_impl(
    ($self:expr, fingerprint $fpty:ty) => {{
        use $crate::prelude::bfuse::Descriptor;

        const FP_WIDTH: usize = core::mem::size_of::<$fpty>();
        let header = Descriptor::BYTE_LEN + 4;
        let mut bytes = alloc::vec![0u8; header + $self.fingerprints.len() * FP_WIDTH];
        $self.descriptor.write_le(&mut bytes[..Descriptor::BYTE_LEN]);
        bytes[Descriptor::BYTE_LEN..header]
            .copy_from_slice(&($self.fingerprints.len() as u32).to_le_bytes());
        for (cell, fp) in bytes[header..]
            .chunks_exact_mut(FP_WIDTH)
            .zip($self.fingerprints.iter())
        {
            cell.copy_from_slice(&fp.to_le_bytes());
        }
        bytes
    }};
);

/// Creates a `from_bytes` body deserializing the layout written by
/// [`bfuse_to_bytes_impl!`]. Trailing bytes past the fingerprint block are
/// ignored.
#[doc(hidden)]
#[macro_export]
macro_rules! bfuse_from_bytes_impl(
    ($bytes:ident, fingerprint $fpty:ty) => {{
        use alloc::{boxed::Box, vec::Vec};
        use $crate::{prelude::bfuse::Descriptor, Error};

        const FP_WIDTH: usize = core::mem::size_of::<$fpty>();
        let descriptor = Descriptor::read_le($bytes)?;
        let header = Descriptor::BYTE_LEN + 4;
        if $bytes.len() < header {
            return Err(Error::Truncated);
        }
        let count = {
            let mut le = [0u8; 4];
            le.copy_from_slice(&$bytes[Descriptor::BYTE_LEN..header]);
            u32::from_le_bytes(le) as usize
        };
        let body = &$bytes[header..];
        if body.len() < count * FP_WIDTH {
            return Err(Error::Truncated);
        }
        let fingerprints: Box<[$fpty]> = body[..count * FP_WIDTH]
            .chunks_exact(FP_WIDTH)
            .map(|cell| {
                let mut le = [0u8; FP_WIDTH];
                le.copy_from_slice(cell);
                <$fpty>::from_le_bytes(le)
            })
            .collect::<Vec<$fpty>>()
            .into_boxed_slice();

        Ok(Self {
            descriptor,
            fingerprints,
        })
    }};
);
