//! Hash primitives shared by every filter family.
//!
//! All filters key off the same pipeline: a per-build seed drawn from a
//! [`splitmix64`] stream, mixed into each key with [`mixsplit`], and reduced
//! to a fingerprint and three slot indices from the resulting 64-bit hash.

/// Advances `state` and returns the next value of Sebastiano Vigna's
/// [SplitMix64] generator.
///
/// The construction retry loop seeds this with a counter reset to 1 at the
/// start of every build, so the seed tried at attempt `k` is the same in
/// every process and on every platform.
///
/// [SplitMix64]: https://prng.di.unimi.it/splitmix64.c
pub fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// The 64-bit finalization mix of [MurmurHash3], avalanching every input bit
/// across the output.
///
/// [MurmurHash3]: https://github.com/aappleby/smhasher/blob/master/src/MurmurHash3.cpp
pub const fn murmur64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Hashes a key under a build seed.
///
/// Applied to the full 64-bit key on every insertion and every lookup; a
/// high-quality mix here is what keeps the false-positive ratio at its
/// theoretical bound (see Section 4 of the xor filter paper).
#[inline]
pub const fn mixsplit(key: u64, seed: u64) -> u64 {
    murmur64(key.wrapping_add(seed))
}

#[cfg(test)]
mod test {
    use super::{mixsplit, splitmix64};

    #[test]
    fn test_splitmix64_stream_is_deterministic() {
        let mut a = 1u64;
        let mut b = 1u64;
        for _ in 0..100 {
            assert_eq!(splitmix64(&mut a), splitmix64(&mut b));
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_mixsplit_spreads_adjacent_keys() {
        let seed = splitmix64(&mut 1u64);
        let a = mixsplit(1, seed);
        let b = mixsplit(2, seed);
        assert_ne!(a, b);
        assert_ne!(a >> 32, b >> 32);
    }
}
