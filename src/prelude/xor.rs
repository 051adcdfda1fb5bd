//! Construction and lookup implementation for the xor filter family.
//!
//! An xor filter's table is three equal blocks; a key's hash selects one
//! slot per block, and the key's fingerprint must equal the XOR of the three
//! slots. Construction peels a 3-uniform hypergraph: slots holding a single
//! key are removed one at a time onto a stack, and replaying the stack in
//! reverse assigns each slot with its two peers already frozen.

/// Computes a hash indexing the i'th filter block.
#[doc(hidden)]
#[macro_export]
macro_rules! xor_h(
    (index block $i:expr, of length $block_length:expr, using $hash:expr) => {{
        // Rotate the hash so each block reads an independent 32-bit window.
        let rot = $crate::rotl64!($hash, by (($i as isize) * 21)) as u32;
        $crate::reduce!(rot, on interval $block_length)
    }};
);

/// Creates a `contains` implementation for an xor filter of fingerprint type
/// `$fpty`.
#[doc(hidden)]
#[macro_export]
macro_rules! xor_contains_impl(
    ($key:expr, $self:expr, fingerprint $fpty:ty) => {{
        let hash = $crate::hash::mixsplit($key, $self.seed);
        let fp = $crate::fingerprint!(hash) as $fpty;
        let block_length = $self.block_length;

        fp == $self.fingerprints[$crate::xor_h!(index block 0, of length block_length, using hash)]
            ^ $self.fingerprints[$crate::xor_h!(index block 1, of length block_length, using hash) + block_length]
            ^ $self.fingerprints[$crate::xor_h!(index block 2, of length block_length, using hash) + 2 * block_length]
    }};
);

/// Creates a fallible constructor body for an xor filter of fingerprint type
/// `$fpty`. `$keys` is a mutable slice; it is reordered in place if
/// duplicates force a pruning pass.
#[doc(hidden)]
#[macro_export]
macro_rules! xor_from_impl(
    ($keys:ident fingerprint $fpty:ty) => {{
        use alloc::boxed::Box;
        use $crate::{
            fingerprint, make_block, try_enqueue, xor_h,
            hash::splitmix64,
            prelude::{prune_duplicates, HSet, KeyIndex},
            Error, MAX_ITERATIONS,
        };

        let keys: &mut [u64] = $keys;
        if keys.is_empty() {
            return Err(Error::EmptySet);
        }
        let mut size = keys.len();

        // See Algorithm 3 in the paper.
        let capacity = {
            let capacity = 32 + libm::ceil(1.23 * size as f64) as usize;
            capacity / 3 * 3 // round down to a multiple of 3
        };
        let block_length = capacity / 3;

        #[allow(non_snake_case)]
        let mut H: [Box<[HSet]>; 3] = [
            make_block!(with block_length sets),
            make_block!(with block_length sets),
            make_block!(with block_length sets),
        ];
        #[allow(non_snake_case)]
        let mut Q: [Box<[KeyIndex]>; 3] = [
            make_block!(with block_length sets),
            make_block!(with block_length sets),
            make_block!(with block_length sets),
        ];
        let mut stack: Box<[KeyIndex]> = make_block!(with size sets);

        let mut rng = 1u64;
        let mut seed = splitmix64(&mut rng);
        let mut stack_size = 0;
        let mut done = false;
        for iteration in 1..=MAX_ITERATIONS {
            // Fold every key into its slot in each of the three blocks.
            for &key in keys[..size].iter() {
                let hash = $crate::hash::mixsplit(key, seed);
                for b in 0..3 {
                    let idx = xor_h!(index block b, of length block_length, using hash);
                    H[b][idx].mask ^= hash;
                    H[b][idx].count += 1;
                }
            }

            // Scan for slots holding a single key; those seed the queues.
            let mut q_sizes: [usize; 3] = [0, 0, 0];
            for b in 0..3 {
                for idx in 0..block_length {
                    try_enqueue!(block H[b], set idx;
                                 queue block Q[b], with size q_sizes[b]);
                }
            }

            stack_size = 0;
            while q_sizes.iter().sum::<usize>() > 0 {
                while q_sizes[0] > 0 {
                    q_sizes[0] -= 1;
                    let ki = Q[0][q_sizes[0]];
                    if H[0][ki.index].count == 0 {
                        continue;
                    }
                    stack[stack_size] = ki;
                    stack_size += 1;

                    // Remove the key from the other two blocks, enqueueing
                    // any slot left with a single key.
                    for &other in [1usize, 2].iter() {
                        let idx = xor_h!(index block other, of length block_length, using ki.hash);
                        H[other][idx].mask ^= ki.hash;
                        H[other][idx].count -= 1;
                        try_enqueue!(block H[other], set idx;
                                     queue block Q[other], with size q_sizes[other]);
                    }
                }

                while q_sizes[1] > 0 {
                    q_sizes[1] -= 1;
                    let mut ki = Q[1][q_sizes[1]];
                    if H[1][ki.index].count == 0 {
                        continue;
                    }
                    ki.index += block_length;
                    stack[stack_size] = ki;
                    stack_size += 1;

                    for &other in [0usize, 2].iter() {
                        let idx = xor_h!(index block other, of length block_length, using ki.hash);
                        H[other][idx].mask ^= ki.hash;
                        H[other][idx].count -= 1;
                        try_enqueue!(block H[other], set idx;
                                     queue block Q[other], with size q_sizes[other]);
                    }
                }

                while q_sizes[2] > 0 {
                    q_sizes[2] -= 1;
                    let mut ki = Q[2][q_sizes[2]];
                    if H[2][ki.index].count == 0 {
                        continue;
                    }
                    ki.index += 2 * block_length;
                    stack[stack_size] = ki;
                    stack_size += 1;

                    for &other in [0usize, 1].iter() {
                        let idx = xor_h!(index block other, of length block_length, using ki.hash);
                        H[other][idx].mask ^= ki.hash;
                        H[other][idx].count -= 1;
                        try_enqueue!(block H[other], set idx;
                                     queue block Q[other], with size q_sizes[other]);
                    }
                }
            }

            if stack_size == size {
                done = true;
                break;
            }

            // Peeling stalls permanently on duplicate keys; sort them out
            // once the failure persists past a handful of reseeds.
            if iteration == 10 {
                size = prune_duplicates(&mut keys[..size]);
            }

            for block in H.iter_mut() {
                for set in block.iter_mut() {
                    *set = HSet::default();
                }
            }
            seed = splitmix64(&mut rng);
        }
        if !done {
            return Err(Error::TooManyIterations);
        }

        // Construct all fingerprints (see Algorithm 4 in the paper). Walking
        // the stack backwards guarantees the two peer slots of each entry
        // are already final; the entry's own slot still holds zero, so it
        // can be folded into the XOR unconditionally.
        #[allow(non_snake_case)]
        let mut B: Box<[$fpty]> = make_block!(with capacity sets);
        for ki in stack[..stack_size].iter().rev() {
            B[ki.index] = fingerprint!(ki.hash) as $fpty
                ^ B[xor_h!(index block 0, of length block_length, using ki.hash)]
                ^ B[xor_h!(index block 1, of length block_length, using ki.hash) + block_length]
                ^ B[xor_h!(index block 2, of length block_length, using ki.hash) + 2 * block_length];
        }

        Ok(Self {
            seed,
            block_length,
            fingerprints: B,
        })
    }};
);
