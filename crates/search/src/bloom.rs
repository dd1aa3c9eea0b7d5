//! Block-addressed bloom filter used to skip query terms absent from a
//! segment without fetching postings.
//!
//! Parameters (`bit_size`, `hash_count`, `block_bits`) are computed once at
//! build time from the expected item count and a target false-positive
//! rate, then stored as segment metadata; the reader MUST use the same
//! parameters the writer used (spec invariant 7) — they travel with the
//! segment rather than being recomputed at query time.

use std::collections::HashMap;

use bitvec::prelude::{BitVec, Lsb0};
use sha2::{Digest, Sha256};

/// Bit-array sizing and hashing parameters for one segment's bloom filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomParams {
    pub bit_size: u64,
    pub hash_count: u32,
    pub block_bits: u64,
}

impl BloomParams {
    /// Computes `bit_size = ceil(-n * ln(p) / ln(2)^2)` and
    /// `hash_count = round(bit_size / n * ln(2))`, clamped to at least 1.
    pub fn for_expected_items(expected_items: u64, false_positive_rate: f64, block_bits: u64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-6, 0.5);
        let raw_bit_size = (-n * p.ln() / std::f64::consts::LN_2.powi(2)).ceil() as u64;
        // Round up to a whole number of blocks so every bit has a home.
        let block_bits = block_bits.max(8);
        let blocks = raw_bit_size.div_ceil(block_bits).max(1);
        let bit_size = blocks * block_bits;
        let hash_count = ((bit_size as f64 / n) * std::f64::consts::LN_2).round().max(1.0) as u32;
        BloomParams { bit_size, hash_count, block_bits }
    }

    pub fn block_count(&self) -> u64 {
        self.bit_size.div_ceil(self.block_bits)
    }
}

/// Returns the `hash_count` bit positions a term maps to, in `[0,
/// bit_size)`, via Kirsch-Mitzenmacher double hashing over two independent
/// SHA-256-derived hashes.
pub fn bit_positions(term: &str, params: BloomParams) -> Vec<u64> {
    let (h1, h2) = double_hash(term);
    (0..params.hash_count as u64)
        .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % params.bit_size)
        .collect()
}

fn double_hash(term: &str) -> (u64, u64) {
    let mut hasher = Sha256::new();
    hasher.update(term.as_bytes());
    let digest_a = hasher.finalize();

    let mut hasher = Sha256::new();
    hasher.update(term.as_bytes());
    hasher.update(b":bloom-secondary");
    let digest_b = hasher.finalize();

    (u64_from_bytes(&digest_a), u64_from_bytes(&digest_b))
}

fn u64_from_bytes(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes[..8].try_into().expect("sha256 digest is 32 bytes"))
}

/// Accumulates bits for every term seen during indexing, then splits the
/// global bit array into fixed-size blocks for storage.
pub struct BloomBuilder {
    params: BloomParams,
    bits: BitVec<u8, Lsb0>,
}

impl BloomBuilder {
    pub fn new(params: BloomParams) -> Self {
        BloomBuilder {
            params,
            bits: BitVec::repeat(false, params.bit_size as usize),
        }
    }

    pub fn insert(&mut self, term: &str) {
        for position in bit_positions(term, self.params) {
            self.bits.set(position as usize, true);
        }
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    /// Splits the bit array into `(block_index, bytes)` pairs, one per
    /// block, ready for storage in the `bloom_blocks` table.
    pub fn into_blocks(self) -> Vec<(u64, Vec<u8>)> {
        let block_bits = self.params.block_bits as usize;
        let mut blocks = Vec::new();
        for (index, chunk) in self.bits.chunks(block_bits).enumerate() {
            blocks.push((index as u64, chunk.to_bitvec().into_vec()));
        }
        blocks
    }
}

/// Read-side probe: given the subset of blocks the caller has already
/// loaded, reports whether all of a term's probed bits are set. Never
/// false-negative; may be false-positive.
pub fn probe(term: &str, params: BloomParams, loaded_blocks: &HashMap<u64, Vec<u8>>) -> bool {
    for position in bit_positions(term, params) {
        let block_index = position / params.block_bits;
        let bit_offset = (position % params.block_bits) as usize;
        let Some(bytes) = loaded_blocks.get(&block_index) else {
            // A required block wasn't loaded (e.g. never populated): treat
            // as not-present rather than panicking on an empty slab.
            return false;
        };
        let byte = bit_offset / 8;
        let bit = bit_offset % 8;
        let Some(&b) = bytes.get(byte) else {
            return false;
        };
        if b & (1 << bit) == 0 {
            return false;
        }
    }
    true
}

/// Which blocks a caller must load to probe a set of terms, given as
/// `(block_index, per-term bit positions)`.
pub fn required_blocks(terms: &[String], params: BloomParams) -> Vec<u64> {
    let mut blocks: Vec<u64> = terms
        .iter()
        .flat_map(|t| bit_positions(t, params))
        .map(|pos| pos / params.block_bits)
        .collect();
    blocks.sort_unstable();
    blocks.dedup();
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let params = BloomParams::for_expected_items(100, 0.01, 4096);
        let mut builder = BloomBuilder::new(params);
        let items = ["apple", "banana", "cherry", "date", "eggplant"];
        for item in items {
            builder.insert(item);
        }
        let blocks: HashMap<u64, Vec<u8>> = builder.into_blocks().into_iter().collect();
        for item in items {
            assert!(probe(item, params, &blocks), "false negative for {item}");
        }
    }

    #[test]
    fn params_scale_with_false_positive_rate() {
        let loose = BloomParams::for_expected_items(1000, 0.1, 4096);
        let tight = BloomParams::for_expected_items(1000, 0.001, 4096);
        assert!(tight.bit_size > loose.bit_size);
    }

    #[test]
    fn bit_size_is_multiple_of_block_bits() {
        let params = BloomParams::for_expected_items(1000, 0.01, 4096);
        assert_eq!(params.bit_size % params.block_bits, 0);
    }

    #[test]
    fn probe_is_deterministic() {
        let params = BloomParams::for_expected_items(50, 0.01, 2048);
        let mut builder = BloomBuilder::new(params);
        builder.insert("xyzzy");
        let blocks: HashMap<u64, Vec<u8>> = builder.into_blocks().into_iter().collect();
        assert!(probe("xyzzy", params, &blocks));
        assert!(probe("xyzzy", params, &blocks));
    }
}
