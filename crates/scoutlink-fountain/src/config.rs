//! Fountain codec configuration.

// Allow truncation casts - block and packet counts are bounded by the wire format
#![allow(clippy::cast_possible_truncation)]

use serde::{Deserialize, Serialize};

/// Floor on the number of coded packets appended after the systematic pass,
/// so tiny payloads still get loss headroom.
pub const MIN_EXTRA_PACKETS: u32 = 4;

/// Fountain codec configuration.
///
/// Controls block size, payload size limits, and how much coded overhead a
/// finite packet batch carries. The degree distribution itself is fixed by
/// the wire version and deliberately not configurable: both devices must
/// regenerate identical packet index sets from the same sequence numbers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FountainConfig {
    /// Source block size in bytes. Every packet carries exactly one
    /// block-sized body, so this bounds the QR frame size.
    ///
    /// Default: 256
    pub block_size: u16,

    /// Maximum payload size that can be encoded.
    ///
    /// Default: 1MB
    pub max_payload_len: u32,

    /// Coded overhead in basis points for finite packet batches.
    ///
    /// 5000 = 50% = K × 1.5 packets per batch.
    ///
    /// Default: 5000
    pub coded_overhead_bps: u16,
}

impl Default for FountainConfig {
    fn default() -> Self {
        Self {
            block_size: 256,
            max_payload_len: 1024 * 1024, // 1MB
            coded_overhead_bps: 5000,
        }
    }
}

impl FountainConfig {
    /// Calculate K (source blocks) needed for a payload.
    #[must_use]
    pub fn source_blocks(&self, payload_len: usize) -> u32 {
        payload_len.div_ceil(usize::from(self.block_size.max(1))) as u32
    }

    /// Calculate the number of extra coded packets from basis points.
    ///
    /// `coded_overhead_bps = 5000` means 50% overhead, floored at
    /// [`MIN_EXTRA_PACKETS`] so a one-block payload is not sent bare.
    #[must_use]
    pub fn extra_packets(&self, source_blocks: u32) -> u32 {
        let from_ratio =
            (u64::from(source_blocks) * u64::from(self.coded_overhead_bps) / 10000) as u32;
        from_ratio.max(MIN_EXTRA_PACKETS)
    }

    /// Total packets (systematic + coded) in one finite batch for a payload.
    ///
    /// A cycling display keeps emitting past this count; the batch size is
    /// what one-shot emitters such as the CLI default to.
    #[must_use]
    pub fn batch_packets(&self, payload_len: usize) -> u32 {
        let k = self.source_blocks(payload_len);
        k + self.extra_packets(k)
    }
}
