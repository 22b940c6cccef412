//! Fixed-size bloom filter used to tolerate safe over-fetch from the
//! paragraph pending set: the consumer may pull an id it already
//! forwarded (e.g. after a crash-restart replays part of a Redis batch),
//! and this filter lets it drop the duplicate without a round-trip to
//! Postgres.

use std::sync::atomic::{AtomicU64, Ordering};

const HASHES: usize = 4;

/// A blake3-keyed counting-free bloom filter over a fixed bit array.
/// False positives are acceptable (a rare paragraph gets skipped rather
/// than double-served); false negatives are not (every real duplicate
/// must be caught), which a bloom filter guarantees by construction.
pub struct RecentlyConsumed {
    bits: Vec<AtomicU64>,
    len_bits: u64,
}

impl RecentlyConsumed {
    pub fn with_capacity_bits(len_bits: usize) -> Self {
        let words = len_bits.div_ceil(64).max(1);
        Self {
            bits: (0..words).map(|_| AtomicU64::new(0)).collect(),
            len_bits: (words * 64) as u64,
        }
    }

    /// Marks `id` as consumed. Returns `true` if it was already present
    /// (a likely duplicate).
    pub fn check_and_insert(&self, id: i64) -> bool {
        let hashes = self.indices(id);
        let mut all_set = true;
        for index in hashes {
            let word = index / 64;
            let bit = index % 64;
            let mask = 1u64 << bit;
            let prev = self.bits[word as usize].fetch_or(mask, Ordering::Relaxed);
            if prev & mask == 0 {
                all_set = false;
            }
        }
        all_set
    }

    fn indices(&self, id: i64) -> [u64; HASHES] {
        let digest = blake3::hash(&id.to_le_bytes());
        let bytes = digest.as_bytes();
        let mut out = [0u64; HASHES];
        for (i, slot) in out.iter_mut().enumerate() {
            let chunk: [u8; 8] = bytes[i * 8..i * 8 + 8].try_into().unwrap();
            *slot = u64::from_le_bytes(chunk) % self.len_bits;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_reports_not_present() {
        let filter = RecentlyConsumed::with_capacity_bits(1 << 16);
        assert!(!filter.check_and_insert(42));
    }

    #[test]
    fn second_insert_of_same_id_reports_present() {
        let filter = RecentlyConsumed::with_capacity_bits(1 << 16);
        filter.check_and_insert(42);
        assert!(filter.check_and_insert(42));
    }

    #[test]
    fn distinct_ids_rarely_collide_in_a_large_filter() {
        let filter = RecentlyConsumed::with_capacity_bits(1 << 20);
        let mut false_positives = 0;
        for id in 0..1000 {
            if filter.check_and_insert(id) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 10);
    }
}
