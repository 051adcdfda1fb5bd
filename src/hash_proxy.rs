//! Implements a hashing proxy for filters over arbitrary key types.

use crate::{Error, Filter};
use alloc::vec::Vec;
use core::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Arbitrary key type proxy for filters keyed on `u64`.
///
/// A `HashProxy` exposes a [`Filter`] trait for arbitrary key types, using a
/// `Filter<u64>` as an underlying keystore. The performance and collision
/// rate of the `HashProxy` filter depends on the choice of [`Hasher`] and
/// underlying [`Filter`]. A `HashProxy` is immutable once constructed.
///
/// ```
/// # extern crate alloc;
/// # extern crate std;
/// use std::collections::hash_map::DefaultHasher;
/// use xorfuse::{Filter, HashProxy, Xor8};
/// # use alloc::vec::Vec;
/// # use rand::distributions::Alphanumeric;
/// # use rand::Rng;
///
/// const SAMPLE_SIZE: usize = 100_000;
/// let passwords: Vec<String> = (0..SAMPLE_SIZE)
///     .map(|_| rand::thread_rng().sample_iter(&Alphanumeric).take(30).map(char::from).collect())
///     .collect();
///
/// let pw_filter: HashProxy<String, DefaultHasher, Xor8> = HashProxy::try_from(&passwords).unwrap();
///
/// for password in passwords {
///     assert!(pw_filter.contains(&password));
/// }
/// ```
///
/// While a `HashProxy` persists type information about the keys it is
/// constructed with, in most cases the key type parameter can be elided; the
/// `pw_filter` above can also be written
///
/// ```
/// # extern crate alloc;
/// # extern crate std;
/// # use std::collections::hash_map::DefaultHasher;
/// # use xorfuse::{Filter, HashProxy, Xor8};
/// # use alloc::vec::Vec;
/// #
/// # let passwords: Vec<String> = alloc::vec!["correct".into(), "horse".into()];
/// let pw_filter: HashProxy<_, DefaultHasher, Xor8> = HashProxy::try_from(&passwords).unwrap();
/// ```
///
/// Because of `HashProxy`s' key type parameter, the existence of a key can
/// only be checked using types a `HashProxy` is constructed with.
///
/// ```compile_fail
/// # extern crate alloc;
/// # extern crate std;
/// use std::collections::hash_map::DefaultHasher;
/// use std::hash::{Hash, Hasher};
/// use xorfuse::{Filter, HashProxy, Xor8};
/// # use alloc::vec::Vec;
///
/// let fruits = vec!["apple", "banana", "tangerine", "watermelon"];
/// let fruits: HashProxy<_, DefaultHasher, Xor8> = HashProxy::try_from(&fruits).unwrap();
///
/// let mut hasher = DefaultHasher::default();
/// "tangerine".hash(&mut hasher);
/// let tangerine_hash = hasher.finish();
///
/// assert!(fruits.contains(&tangerine_hash)); // doesn't work!
/// ```
///
/// Serializing and deserializing `HashProxy`s can be enabled with the
/// [`serde`] feature.
///
/// [`Filter`]: crate::Filter
/// [`Hasher`]: core::hash::Hasher
/// [`serde`]: http://serde.rs
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    filter: F,
    _hasher: core::marker::PhantomData<H>,
    _type: core::marker::PhantomData<T>,
}

#[inline]
fn hash<T: Hash, H: Hasher + Default>(key: &T) -> u64 {
    let mut hasher = H::default();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<T, H, F> Filter<T> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    /// Returns `true` if the underlying filter contains the specified key.
    fn contains(&self, key: &T) -> bool {
        self.filter.contains(&hash::<T, H>(key))
    }

    fn len(&self) -> usize {
        self.filter.len()
    }
}

impl<T, H, F> TryFrom<&[T]> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64> + TryFrom<Vec<u64>, Error = Error>,
{
    type Error = Error;

    fn try_from(keys: &[T]) -> Result<Self, Self::Error> {
        let keys: Vec<u64> = keys.iter().map(hash::<T, H>).collect();
        Ok(Self {
            filter: F::try_from(keys)?,
            _hasher: core::marker::PhantomData,
            _type: core::marker::PhantomData,
        })
    }
}

impl<T, H, F> TryFrom<&Vec<T>> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64> + TryFrom<Vec<u64>, Error = Error>,
{
    type Error = Error;

    fn try_from(v: &Vec<T>) -> Result<Self, Self::Error> {
        Self::try_from(v.as_slice())
    }
}

#[cfg(test)]
mod test {
    use crate::{Filter, HashProxy, Xor16, Xor32, Xor8};

    use alloc::vec::Vec;
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    extern crate std;
    use std::collections::hash_map::DefaultHasher;
    use std::string::String;

    #[test]
    fn test_initialization() {
        const SAMPLE_SIZE: usize = 100_000;
        // Key generation is expensive. Do it once and make copies during tests.
        let keys: Vec<String> = (0..SAMPLE_SIZE)
            .map(|_| {
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(15)
                    .map(char::from)
                    .collect()
            })
            .collect();

        macro_rules! drive_test {
            ($filter:ident) => {{
                let keys = keys.clone();
                let filter: HashProxy<_, DefaultHasher, $filter> =
                    HashProxy::try_from(&keys).unwrap();
                for key in keys {
                    assert!(filter.contains(&key));
                }
            }};
        }

        drive_test!(Xor8);
        drive_test!(Xor16);
        drive_test!(Xor32);
    }

    #[cfg(feature = "binary-fuse")]
    #[test]
    fn test_binary_fuse_backend() {
        use crate::BinaryFuse8;

        let keys: Vec<&str> = alloc::vec!["apple", "banana", "tangerine", "watermelon"];
        let filter: HashProxy<_, DefaultHasher, BinaryFuse8> =
            HashProxy::try_from(&keys).unwrap();
        for key in keys {
            assert!(filter.contains(&key));
        }
    }
}
