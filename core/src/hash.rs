//! Mapping from keys to partition indices.

use hashpart_common::PartitionConfig;

/// Partition index of `key` for `2^hash_bits` partitions: the low
/// `hash_bits` bits of the key.
///
/// `hash_bits` must be in `1..=MAX_HASH_BITS`; this is checked once by
/// [`PartitionConfig::validate`], not here.
#[inline]
pub fn partition_of(key: u64, hash_bits: u32) -> usize {
    (key & ((1u64 << hash_bits) - 1)) as usize
}

/// Number of partitions produced by `hash_bits`.
#[inline]
pub fn num_partitions(hash_bits: u32) -> usize {
    1usize << hash_bits
}

/// A `key mod 2^h` hasher with the mask precomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadixHasher {
    hash_bits: u32,
    mask: u64,
}

impl RadixHasher {
    pub fn new(hash_bits: u32) -> Self {
        debug_assert!(hash_bits > 0 && hash_bits < u64::BITS);
        Self {
            hash_bits,
            mask: (1u64 << hash_bits) - 1,
        }
    }

    pub fn from_config(config: &PartitionConfig) -> Self {
        Self::new(config.hash_bits)
    }

    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    pub fn num_partitions(&self) -> usize {
        num_partitions(self.hash_bits)
    }

    #[inline]
    pub fn partition_of(&self, key: u64) -> usize {
        (key & self.mask) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_bits() {
        assert_eq!(partition_of(0, 2), 0);
        assert_eq!(partition_of(5, 2), 1);
        assert_eq!(partition_of(15, 2), 3);
        assert_eq!(partition_of(0b1011_0110, 4), 0b0110);
        assert_eq!(partition_of(u64::MAX, 62), (1usize << 62) - 1);
    }

    #[test]
    fn test_matches_modulo() {
        for bits in [1, 3, 10, 18] {
            let hasher = RadixHasher::new(bits);
            let n = hasher.num_partitions() as u64;
            for key in [0u64, 1, 2, 1023, 1 << 20, 0xdead_beef, u64::MAX - 3] {
                assert_eq!(hasher.partition_of(key), (key % n) as usize);
                assert_eq!(hasher.partition_of(key), partition_of(key, bits));
            }
        }
    }

    #[test]
    fn test_num_partitions() {
        assert_eq!(num_partitions(1), 2);
        assert_eq!(num_partitions(10), 1024);
        assert_eq!(RadixHasher::new(18).num_partitions(), 1 << 18);
    }
}
