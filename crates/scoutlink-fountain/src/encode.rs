//! Fountain encoder.
//!
//! Splits a payload into fixed-size source blocks and turns it into an
//! unbounded stream of self-describing packets. Packet generation is pure:
//! `packet_at(seq)` always produces the same frame for the same encoder, so
//! a cycling display can loop forever without storing what it already sent.

// Allow truncation casts - payload length is validated against u32 limits
#![allow(clippy::cast_possible_truncation)]

use tracing::debug;

use crate::config::FountainConfig;
use crate::error::EncodeError;
use crate::packet::{Packet, TransferId, MAX_BLOCKS};
use crate::sampler::IndexSampler;

/// Stateless packet generator for one payload.
#[derive(Debug, Clone)]
pub struct FountainEncoder {
    transfer_id: TransferId,
    total_len: u32,
    digest: [u8; 32],
    block_size: u16,
    blocks: Vec<Vec<u8>>,
    sampler: IndexSampler,
}

impl FountainEncoder {
    /// Build an encoder with a fresh random transfer id.
    ///
    /// # Errors
    /// [`EncodeError::EmptyPayload`] for an empty payload,
    /// [`EncodeError::ZeroBlockSize`] for a zero block size,
    /// [`EncodeError::PayloadTooLarge`] or [`EncodeError::TooManyBlocks`]
    /// when the payload exceeds the configured or wire-format limits.
    pub fn new(payload: &[u8], config: &FountainConfig) -> Result<Self, EncodeError> {
        Self::with_transfer_id(payload, config, TransferId::random())
    }

    /// Build an encoder with an explicit transfer id. Fixing the id makes
    /// the whole packet stream reproducible.
    ///
    /// # Errors
    /// As [`FountainEncoder::new`].
    pub fn with_transfer_id(
        payload: &[u8],
        config: &FountainConfig,
        transfer_id: TransferId,
    ) -> Result<Self, EncodeError> {
        if payload.is_empty() {
            return Err(EncodeError::EmptyPayload);
        }
        if config.block_size == 0 {
            return Err(EncodeError::ZeroBlockSize);
        }
        if payload.len() > config.max_payload_len as usize {
            return Err(EncodeError::PayloadTooLarge {
                size: payload.len(),
                max: config.max_payload_len as usize,
            });
        }
        let k = config.source_blocks(payload.len());
        if k > MAX_BLOCKS {
            return Err(EncodeError::TooManyBlocks {
                blocks: u64::from(k),
                max: MAX_BLOCKS,
            });
        }

        let block_size = usize::from(config.block_size);
        let blocks: Vec<Vec<u8>> = payload
            .chunks(block_size)
            .map(|chunk| {
                // The tail block is zero-padded; total_len records where
                // the payload really ends.
                let mut block = vec![0_u8; block_size];
                block[..chunk.len()].copy_from_slice(chunk);
                block
            })
            .collect();
        let digest = *blake3::hash(payload).as_bytes();

        debug!(
            %transfer_id,
            payload_len = payload.len(),
            blocks = k,
            block_size = config.block_size,
            "fountain encoder ready"
        );

        Ok(Self {
            transfer_id,
            total_len: payload.len() as u32,
            digest,
            block_size: config.block_size,
            blocks,
            sampler: IndexSampler::new(k),
        })
    }

    /// Transfer id stamped on every packet.
    #[must_use]
    pub const fn transfer_id(&self) -> TransferId {
        self.transfer_id
    }

    /// Number of source blocks (K).
    #[must_use]
    pub fn source_blocks(&self) -> u32 {
        self.blocks.len() as u32
    }

    /// Block size every packet body carries.
    #[must_use]
    pub const fn block_size(&self) -> u16 {
        self.block_size
    }

    /// Wire length of one encoded frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        crate::packet::HEADER_LEN + usize::from(self.block_size)
    }

    /// Generate the packet for one sequence number.
    ///
    /// Sequence numbers below K are systematic copies of single source
    /// blocks; the rest are XOR combinations selected by the sampler.
    #[must_use]
    pub fn packet_at(&self, seq: u32) -> Packet {
        let (degree, indices) = self.sampler.degree_and_indices(self.transfer_id, seq);
        let mut body = vec![0_u8; usize::from(self.block_size)];
        for index in &indices {
            xor_into(&mut body, &self.blocks[*index as usize]);
        }
        Packet {
            transfer_id: self.transfer_id,
            total_len: self.total_len,
            digest: self.digest,
            block_size: self.block_size,
            seq,
            degree,
            body,
        }
    }

    /// Endless packet stream starting at sequence 0.
    pub fn packets(&self) -> impl Iterator<Item = Packet> + '_ {
        (0_u32..).map(|seq| self.packet_at(seq))
    }
}

/// XOR `block` into `acc` in place. Lengths must match.
pub(crate) fn xor_into(acc: &mut [u8], block: &[u8]) {
    debug_assert_eq!(acc.len(), block.len());
    for (a, b) in acc.iter_mut().zip(block) {
        *a ^= *b;
    }
}
