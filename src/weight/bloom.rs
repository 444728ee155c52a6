//! Fixed-rate Bloom filter.
//!
//! Sized from a target false-positive rate and an expected cardinality using
//! the standard optimum `m = -n ln p / (ln 2)^2`, `k = (m / n) ln 2`. Probe
//! positions come from double hashing (`h1 + i * h2`) over two seeded SipHash
//! passes, so membership is stable across runs of the same binary.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::marker::PhantomData;

/// Approximate set: no false negatives, bounded false positives.
#[derive(Debug, Clone)]
pub struct BloomFilter<T: ?Sized> {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    len: usize,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Hash + ?Sized> BloomFilter<T> {
    /// Create a filter for `expected` items at false-positive rate `fp_rate`.
    ///
    /// `expected` is clamped to at least 1 and `fp_rate` into `(0, 1)`;
    /// callers that need validation do it before construction.
    pub fn with_rate(fp_rate: f64, expected: usize) -> Self {
        let n = expected.max(1) as f64;
        let p = fp_rate.clamp(f64::MIN_POSITIVE, 0.999_999);
        let ln2 = std::f64::consts::LN_2;
        let num_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().max(1.0) as u32;
        let words = num_bits.div_ceil(64) as usize;
        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Insert an item. Returns `true` if at least one bit changed, i.e. the
    /// item was definitely not present before.
    pub fn insert(&mut self, item: &T) -> bool {
        let (h1, h2) = self.hashes(item);
        let mut changed = false;
        for i in 0..self.num_hashes {
            let (word, mask) = self.locate(h1, h2, i);
            if self.bits[word] & mask == 0 {
                self.bits[word] |= mask;
                changed = true;
            }
        }
        if changed {
            self.len += 1;
        }
        changed
    }

    /// Whether the item may have been inserted.
    pub fn contains(&self, item: &T) -> bool {
        let (h1, h2) = self.hashes(item);
        (0..self.num_hashes).all(|i| {
            let (word, mask) = self.locate(h1, h2, i);
            self.bits[word] & mask != 0
        })
    }

    /// Number of insertions that changed the filter.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Forget every insertion.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
        self.len = 0;
    }

    fn hashes(&self, item: &T) -> (u64, u64) {
        let mut a = DefaultHasher::new();
        0x51_7c_c1_b7_27_22_0a_95u64.hash(&mut a);
        item.hash(&mut a);
        let mut b = DefaultHasher::new();
        0x9e_37_79_b9_7f_4a_7c_15u64.hash(&mut b);
        item.hash(&mut b);
        // Odd step so all positions are reachable.
        (a.finish(), b.finish() | 1)
    }

    fn locate(&self, h1: u64, h2: u64, i: u32) -> (usize, u64) {
        let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits;
        ((bit / 64) as usize, 1u64 << (bit % 64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let mut bloom: BloomFilter<str> = BloomFilter::with_rate(0.01, 100);
        let items: Vec<String> = (0..100).map(|i| format!("feature_{i}")).collect();
        for item in &items {
            bloom.insert(item.as_str());
        }
        assert!(items.iter().all(|i| bloom.contains(i.as_str())));
    }

    #[test]
    fn second_insert_changes_nothing() {
        let mut bloom: BloomFilter<str> = BloomFilter::with_rate(0.01, 100);
        assert!(bloom.insert("a"));
        assert!(!bloom.insert("a"));
        assert_eq!(bloom.len(), 1);
    }

    #[test]
    fn sizing_follows_rate_and_capacity() {
        let bloom: BloomFilter<u64> = BloomFilter::with_rate(0.01, 100);
        // 100 items at 1% needs ~959 bits and 7 hashes.
        assert!((950..=970).contains(&bloom.num_bits()));
        assert_eq!(bloom.num_hashes(), 7);
    }

    #[test]
    fn false_positive_rate_is_near_target() {
        let mut bloom: BloomFilter<u64> = BloomFilter::with_rate(0.01, 1000);
        for i in 0..1000u64 {
            bloom.insert(&i);
        }
        let probes = 20_000u64;
        let hits = (1_000_000..1_000_000 + probes)
            .filter(|i| bloom.contains(i))
            .count();
        let rate = hits as f64 / probes as f64;
        assert!(rate < 0.03, "false-positive rate {rate} far above 1%");
    }

    #[test]
    fn clear_empties_the_filter() {
        let mut bloom: BloomFilter<str> = BloomFilter::with_rate(0.01, 10);
        bloom.insert("x");
        bloom.clear();
        assert!(bloom.is_empty());
        assert!(!bloom.contains("x"));
    }
}
