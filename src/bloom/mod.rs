pub mod sizing;

use xxhash_rust::xxh3::{xxh3_128, xxh3_64_with_seed};

use crate::types::Fingerprint;

/// Number of technical bins that share one 64-bit word, and therefore one
/// stripe lock during concurrent builds.
pub const BINS_PER_STRIPE: usize = 64;

/// Seed of the hash that spreads a split user bin over its technical bins.
/// Must never change: the query side recomputes the same partition.
pub const SPLIT_SEED: u64 = 0x5EED_5B17;

/// An Interleaved Bloom Filter: `bin_count` Bloom filters of `bin_size` bits
/// each, sharing the same hash functions.
///
/// Storage is interleaved per stripe of 64 bins. Bit `b % 64` of word
/// `(b / 64) * bin_size + p` is position `p` of bin `b`:
///
/// ```text
///            stripe 0 (bins 0..64)     stripe 1 (bins 64..128)
/// pos 0      [ word 0 ]                [ word bin_size + 0 ]
/// pos 1      [ word 1 ]                [ word bin_size + 1 ]
/// ...
/// pos m-1    [ word m-1 ]              [ word 2*bin_size - 1 ]
/// ```
///
/// A single hash position therefore answers for 64 bins at once, and each
/// stripe is a contiguous slice that can be handed to one writer.
///
/// Hashing follows the double hashing trick: one 128-bit xxh3 hash split
/// into (h1, h2), position_i = (h1 + i * h2) mod bin_size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleavedBloomFilter {
    bin_count: usize,
    bin_size: usize,
    hash_count: usize,
    data: Vec<u64>,
}

impl InterleavedBloomFilter {
    /// Allocate an empty filter.
    ///
    /// # Panics
    /// Panics if any argument is 0.
    pub fn new(bin_count: usize, bin_size: usize, hash_count: usize) -> Self {
        assert!(bin_count > 0, "bin_count must be > 0");
        assert!(bin_size > 0, "bin_size must be > 0");
        assert!(hash_count > 0, "hash_count must be > 0");

        let stripes = bin_count.div_ceil(BINS_PER_STRIPE);
        InterleavedBloomFilter {
            bin_count,
            bin_size,
            hash_count,
            data: vec![0u64; stripes * bin_size],
        }
    }

    /// Rebuild a filter from its raw words (deserialization).
    pub(crate) fn from_parts(
        bin_count: usize,
        bin_size: usize,
        hash_count: usize,
        data: Vec<u64>,
    ) -> Option<Self> {
        let expected = bin_count.div_ceil(BINS_PER_STRIPE).checked_mul(bin_size)?;
        if bin_count == 0 || bin_size == 0 || hash_count == 0 || data.len() != expected {
            return None;
        }
        Some(InterleavedBloomFilter {
            bin_count,
            bin_size,
            hash_count,
            data,
        })
    }

    /// Number of technical bins.
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Bits per technical bin.
    pub fn bin_size(&self) -> usize {
        self.bin_size
    }

    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.data
    }

    /// Insert a fingerprint into one bin.
    pub fn emplace(&mut self, value: Fingerprint, bin: usize) {
        assert!(bin < self.bin_count, "bin {bin} out of range ({})", self.bin_count);

        let base = (bin / BINS_PER_STRIPE) * self.bin_size;
        let mask = 1u64 << (bin % BINS_PER_STRIPE);
        for pos in positions(value, self.hash_count, self.bin_size) {
            self.data[base + pos] |= mask;
        }
    }

    /// Check whether a fingerprint MIGHT be in one bin.
    pub fn contains(&self, value: Fingerprint, bin: usize) -> bool {
        assert!(bin < self.bin_count, "bin {bin} out of range ({})", self.bin_count);

        let base = (bin / BINS_PER_STRIPE) * self.bin_size;
        let mask = 1u64 << (bin % BINS_PER_STRIPE);
        positions(value, self.hash_count, self.bin_size).all(|pos| self.data[base + pos] & mask != 0)
    }

    /// Membership of a fingerprint in every bin at once.
    pub fn bulk_contains(&self, value: Fingerprint) -> Vec<bool> {
        let stripes = self.bin_count.div_ceil(BINS_PER_STRIPE);
        let mut hits = vec![u64::MAX; stripes];
        for pos in positions(value, self.hash_count, self.bin_size) {
            for (stripe, word) in hits.iter_mut().enumerate() {
                *word &= self.data[stripe * self.bin_size + pos];
            }
        }

        (0..self.bin_count)
            .map(|bin| hits[bin / BINS_PER_STRIPE] >> (bin % BINS_PER_STRIPE) & 1 == 1)
            .collect()
    }

    /// Number of set bits in one bin.
    pub fn bin_occupancy(&self, bin: usize) -> usize {
        assert!(bin < self.bin_count, "bin {bin} out of range ({})", self.bin_count);

        let base = (bin / BINS_PER_STRIPE) * self.bin_size;
        let mask = 1u64 << (bin % BINS_PER_STRIPE);
        self.data[base..base + self.bin_size]
            .iter()
            .filter(|word| *word & mask != 0)
            .count()
    }

    /// Split the filter into independent writers, one per stripe of 64 bins.
    pub fn stripes_mut(&mut self) -> Vec<BinStripe<'_>> {
        let (bin_size, hash_count) = (self.bin_size, self.hash_count);
        self.data
            .chunks_mut(bin_size)
            .enumerate()
            .map(|(stripe, words)| BinStripe {
                first_bin: stripe * BINS_PER_STRIPE,
                bin_size,
                hash_count,
                words,
            })
            .collect()
    }
}

/// Exclusive write access to the 64 bins of one stripe.
pub struct BinStripe<'a> {
    first_bin: usize,
    bin_size: usize,
    hash_count: usize,
    words: &'a mut [u64],
}

impl BinStripe<'_> {
    /// Insert a fingerprint into `bin`, a global bin index inside this stripe.
    pub fn emplace(&mut self, value: Fingerprint, bin: usize) {
        assert!(
            bin >= self.first_bin && bin < self.first_bin + BINS_PER_STRIPE,
            "bin {bin} is not in stripe starting at {}",
            self.first_bin
        );

        let mask = 1u64 << (bin - self.first_bin);
        for pos in positions(value, self.hash_count, self.bin_size) {
            self.words[pos] |= mask;
        }
    }
}

/// Offset, within `[0, bin_count)`, of the technical bin that holds
/// `value` when one user bin is split across `bin_count` contiguous bins.
pub fn split_bin_offset(value: Fingerprint, bin_count: usize) -> usize {
    debug_assert!(bin_count > 0);
    (xxh3_64_with_seed(&value.to_le_bytes(), SPLIT_SEED) % bin_count as u64) as usize
}

/// Bit positions of `value` inside a bin of `bin_size` bits.
fn positions(value: Fingerprint, hash_count: usize, bin_size: usize) -> impl Iterator<Item = usize> {
    let hash128 = xxh3_128(&value.to_le_bytes());
    let h1 = hash128 as u64;
    let h2 = (hash128 >> 64) as u64;
    let bin_size = bin_size as u64;

    (0..hash_count as u64).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % bin_size) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basics() {
        let mut ibf = InterleavedBloomFilter::new(3, 1024, 2);
        ibf.emplace(42, 1);
        assert!(ibf.contains(42, 1));
        assert!(!ibf.contains(42, 0));
        assert!(!ibf.contains(42, 2));
    }

    #[test]
    fn stripe_writes_land_in_filter() {
        let mut ibf = InterleavedBloomFilter::new(130, 256, 3);
        {
            let mut stripes = ibf.stripes_mut();
            assert_eq!(stripes.len(), 3);
            stripes[0].emplace(7, 63);
            stripes[1].emplace(8, 64);
            stripes[2].emplace(9, 129);
        }
        assert!(ibf.contains(7, 63));
        assert!(ibf.contains(8, 64));
        assert!(ibf.contains(9, 129));
        assert!(!ibf.contains(7, 64));
    }

    #[test]
    #[should_panic]
    fn stripe_rejects_foreign_bin() {
        let mut ibf = InterleavedBloomFilter::new(128, 64, 1);
        let mut stripes = ibf.stripes_mut();
        stripes[0].emplace(1, 64);
    }

    #[test]
    fn split_offset_in_range() {
        for value in 0..1000u64 {
            assert!(split_bin_offset(value, 5) < 5);
            assert_eq!(split_bin_offset(value, 1), 0);
        }
    }
}
