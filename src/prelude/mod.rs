//! Construction scaffolding shared by the filter families.

#[cfg(feature = "binary-fuse")]
pub mod bfuse;
pub mod xor;

/// The hash of a key and the table slot it was peeled from.
#[derive(Default, Copy, Clone)]
pub struct KeyIndex {
    pub hash: u64,
    pub index: usize,
}

/// One slot of the xor construction table. Incident keys are folded into the
/// mask; when `count` reaches 1 the mask is exactly the remaining hash.
#[derive(Default, Clone)]
pub struct HSet {
    pub count: u32,
    pub mask: u64,
}

/// Sorts `keys` ascending and compacts adjacent equal values, returning the
/// length of the deduplicated prefix. The slice is reordered in place; the
/// tail past the returned length holds leftover values.
pub fn prune_duplicates(keys: &mut [u64]) -> usize {
    if keys.is_empty() {
        return 0;
    }
    keys.sort_unstable();
    let mut pos = 0;
    for i in 1..keys.len() {
        if keys[i] != keys[pos] {
            pos += 1;
            keys[pos] = keys[i];
        }
    }
    pos + 1
}

/// Computes a fingerprint from a key hash. The result is truncated to the
/// filter's fingerprint width by the caller; zero fingerprints are valid and
/// not reserved.
#[doc(hidden)]
#[macro_export]
macro_rules! fingerprint(
    ($hash:expr) => {
        $hash ^ ($hash >> 32)
    };
);

/// Rotate left.
#[doc(hidden)]
#[macro_export]
macro_rules! rotl64(
    ($n:expr, by $c:expr) => {
        ($n << ($c & 63)) | ($n >> ((-$c) & 63))
    };
);

/// [A fast alternative to the modulo reduction](http://lemire.me/blog/2016/06/27/a-fast-alternative-to-the-modulo-reduction/)
#[doc(hidden)]
#[macro_export]
macro_rules! reduce(
    ($hash:expr, on interval $n:expr) => {
        ((($hash) as u64 * $n as u64) >> 32) as usize
    };
);

/// Creates a zeroed block of construction state.
#[doc(hidden)]
#[macro_export]
macro_rules! make_block(
    (with $size:ident sets) => {{
        let sets_block = alloc::vec![Default::default(); $size];
        sets_block.into_boxed_slice()
    }};
);

/// Creates the output fingerprint block.
///
/// Slots the peeling order never assigns keep their initial value. If they
/// are all zero, keys whose fingerprint happens to be zero see an elevated
/// false-positive rate; the `uniform-random` feature instead fills the block
/// with random values at the cost of deterministic output.
#[doc(hidden)]
#[macro_export]
macro_rules! make_fp_block(
    ($size:ident) => {{
        #[cfg(feature = "uniform-random")]
        {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            let mut block = alloc::vec::Vec::with_capacity($size);
            for _ in 0..$size {
                block.push(rng.gen());
            }
            block.into_boxed_slice()
        }

        #[cfg(not(feature = "uniform-random"))]
        {
            $crate::make_block!(with $size sets)
        }
    }};
);

/// Enqueues a slot if it holds exactly one key. With a single key incident,
/// the slot's mask is that key's hash.
#[doc(hidden)]
#[macro_export]
macro_rules! try_enqueue(
    (block $H_block:expr, set $idx:ident; queue block $Q_block:expr, with size $qblock_size:expr) => {
        if $H_block[$idx].count == 1 {
            $Q_block[$qblock_size].index = $idx;
            $Q_block[$qblock_size].hash = $H_block[$idx].mask;
            $qblock_size += 1;
        }
    };
);
