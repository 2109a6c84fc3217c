//! Deterministic degree and block index regeneration.
//!
//! Packets do not carry their block index sets; both sides derive them from
//! `(transfer id, sequence number)` alone. The first `k` sequence numbers
//! are systematic (degree 1, index = seq) so a clean capture of one full
//! cycle decodes with zero overhead and progress is visible immediately.
//! Later sequence numbers draw from a soliton-style degree distribution:
//! the ideal soliton body `1/(d(d-1))` with the degree-1 mass boosted to
//! `(isqrt(k)+1)/k`, expressed entirely in fixed-point integer weights.
//!
//! The draws come from a ChaCha20 keystream seeded with a domain-separated
//! hash of the transfer id and sequence number, consumed with rejection
//! sampling. Integer weights plus a fixed keystream keep regeneration
//! bit-identical across platforms and library versions; the distribution is
//! part of the wire format and versioned with it.

// Allow truncation casts - degrees and indices are bounded by MAX_BLOCKS
#![allow(clippy::cast_possible_truncation)]

use std::collections::BTreeSet;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::packet::TransferId;

/// Domain separator for sampler seeds, versioned with the wire format.
const SAMPLER_DOMAIN: &[u8; 15] = b"SLQR-SAMPLER-V1";

/// Fixed-point scale for distribution weights.
const WEIGHT_SCALE: u64 = 1 << 32;

/// Regenerates `(degree, index set)` for any sequence number of a transfer
/// split into `k` source blocks.
#[derive(Debug, Clone)]
pub struct IndexSampler {
    k: u32,
    /// Cumulative fixed-point weights for degrees `1..=k`.
    cumulative: Vec<u64>,
}

impl IndexSampler {
    /// Build the degree table for a transfer of `k` source blocks.
    /// `k` must be at least 1.
    #[must_use]
    pub fn new(k: u32) -> Self {
        debug_assert!(k >= 1, "a transfer has at least one source block");
        let k = k.max(1);

        let mut cumulative = Vec::with_capacity(k as usize);
        let boost = u64::from(isqrt(k) + 1);
        let mut total = WEIGHT_SCALE * boost / u64::from(k);
        cumulative.push(total);
        for d in 2..=k {
            total += WEIGHT_SCALE / (u64::from(d) * u64::from(d - 1));
            cumulative.push(total);
        }

        Self { k, cumulative }
    }

    /// Number of source blocks this sampler was built for.
    #[must_use]
    pub const fn k(&self) -> u32 {
        self.k
    }

    /// Derive the degree and sorted block index set for one packet.
    #[must_use]
    pub fn degree_and_indices(&self, transfer_id: TransferId, seq: u32) -> (u16, Vec<u32>) {
        if seq < self.k {
            return (1, vec![seq]);
        }

        let mut rng = ChaCha20Rng::from_seed(seed_for(transfer_id, seq));
        let total = self.cumulative.last().copied().unwrap_or(WEIGHT_SCALE);
        let draw = uniform(&mut rng, total);
        // Bucket d covers [cumulative[d-2], cumulative[d-1]); empty buckets
        // from zero-weight degrees are skipped by the partition point.
        let degree = (self.cumulative.partition_point(|&c| c <= draw) as u32 + 1).min(self.k);

        let mut indices = BTreeSet::new();
        while (indices.len() as u32) < degree {
            indices.insert(uniform(&mut rng, u64::from(self.k)) as u32);
        }
        (degree as u16, indices.into_iter().collect())
    }
}

fn seed_for(transfer_id: TransferId, seq: u32) -> [u8; 32] {
    let mut seed = [0_u8; 32];
    seed[..15].copy_from_slice(SAMPLER_DOMAIN);
    seed[15..23].copy_from_slice(&transfer_id.as_raw().to_le_bytes());
    seed[23..27].copy_from_slice(&seq.to_le_bytes());
    seed
}

/// Unbiased draw in `[0, bound)` by rejection on the raw keystream.
fn uniform(rng: &mut ChaCha20Rng, bound: u64) -> u64 {
    debug_assert!(bound > 0);
    let zone = u64::MAX - u64::MAX % bound;
    loop {
        let value = rng.next_u64();
        if value < zone {
            return value % bound;
        }
    }
}

/// Integer square root, Newton's method.
const fn isqrt(n: u32) -> u32 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> TransferId {
        TransferId::from_raw(0x5343_4f55_544c_494e)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Systematic pass
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn systematic_below_k() {
        let sampler = IndexSampler::new(8);
        for seq in 0..8 {
            let (degree, indices) = sampler.degree_and_indices(test_id(), seq);
            assert_eq!(degree, 1);
            assert_eq!(indices, vec![seq]);
        }
    }

    #[test]
    fn single_block_transfers_always_repeat_block_zero() {
        let sampler = IndexSampler::new(1);
        for seq in [0, 1, 5, 1000] {
            let (degree, indices) = sampler.degree_and_indices(test_id(), seq);
            assert_eq!(degree, 1);
            assert_eq!(indices, vec![0]);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Coded packets
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn regeneration_is_deterministic() {
        let sampler_a = IndexSampler::new(40);
        let sampler_b = IndexSampler::new(40);
        for seq in 40..140 {
            assert_eq!(
                sampler_a.degree_and_indices(test_id(), seq),
                sampler_b.degree_and_indices(test_id(), seq),
                "seq {seq}"
            );
        }
    }

    #[test]
    fn indices_are_distinct_in_range_and_match_degree() {
        let sampler = IndexSampler::new(64);
        for seq in 64..500 {
            let (degree, indices) = sampler.degree_and_indices(test_id(), seq);
            assert!(degree >= 1);
            assert!(u32::from(degree) <= 64, "seq {seq}: degree {degree}");
            assert_eq!(indices.len(), usize::from(degree), "seq {seq}");
            assert!(indices.iter().all(|&i| i < 64), "seq {seq}");
            let mut sorted = indices.clone();
            sorted.dedup();
            assert_eq!(sorted.len(), indices.len(), "seq {seq}: indices repeat");
        }
    }

    #[test]
    fn transfer_id_changes_the_pattern() {
        let sampler = IndexSampler::new(32);
        let other = TransferId::from_raw(test_id().as_raw() ^ 1);
        let differs = (32..132).any(|seq| {
            sampler.degree_and_indices(test_id(), seq) != sampler.degree_and_indices(other, seq)
        });
        assert!(differs, "two transfers produced identical coded streams");
    }

    #[test]
    fn distribution_skews_low_but_keeps_degree_one_alive() {
        let sampler = IndexSampler::new(100);
        let mut degree_one = 0_u32;
        let mut total_degree = 0_u64;
        let samples = 1000;
        for seq in 100..100 + samples {
            let (degree, _) = sampler.degree_and_indices(test_id(), seq);
            if degree == 1 {
                degree_one += 1;
            }
            total_degree += u64::from(degree);
        }

        // Soliton body with boosted degree-1: roughly 10% singletons and a
        // low mean. Loose bounds; the stream is deterministic.
        assert!(degree_one >= 20, "degree-1 packets too rare: {degree_one}/{samples}");
        assert!(degree_one <= 400, "degree-1 packets dominate: {degree_one}/{samples}");
        let mean = total_degree as f64 / f64::from(samples);
        assert!(mean > 1.2, "mean degree {mean} implausibly low");
        assert!(mean < 15.0, "mean degree {mean} implausibly high");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn isqrt_matches_perfect_squares_and_neighbors() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(3), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(99), 9);
        assert_eq!(isqrt(100), 10);
        assert_eq!(isqrt(65535), 255);
        assert_eq!(isqrt(u32::MAX), 65535);
    }

    #[test]
    fn uniform_draws_stay_in_bounds() {
        let mut rng = ChaCha20Rng::from_seed(seed_for(test_id(), 7));
        for bound in [1, 2, 3, 10, 65535, u64::from(u32::MAX)] {
            for _ in 0..50 {
                assert!(uniform(&mut rng, bound) < bound);
            }
        }
    }
}
