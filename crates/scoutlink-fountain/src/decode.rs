//! Fountain decoder.
//!
//! Rebuilds a payload from packets arriving in any order, with any mix of
//! gaps and duplicates. Single-block packets pin their source block
//! directly; multi-block packets are reduced against everything already
//! resolved and then either pin the one block they still cover or wait in a
//! pending set. Every pinned block re-runs the reduction (peeling), so one
//! resolution can cascade through the whole pending set.
//!
//! The decoder tracks one transfer at a time. A packet carrying a new
//! transfer id abandons the reconstruction in progress and starts over,
//! which is what a scanner pointed at a fresh display session wants.

// Allow truncation casts - lengths are validated against wire-format limits
#![allow(clippy::cast_possible_truncation)]

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::encode::xor_into;
use crate::error::DecodeError;
use crate::packet::{Packet, TransferId};
use crate::sampler::IndexSampler;

/// What ingesting one packet did to the reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// The packet contributed new information.
    Applied,
    /// This sequence number was ingested before.
    Duplicate,
    /// Consistent, but everything it covers was already known.
    Redundant,
    /// The transfer was already fully decoded.
    AlreadyComplete,
    /// This packet finished the transfer.
    Completed,
}

/// Per-packet progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    /// Transfer the packet belonged to.
    pub transfer_id: TransferId,
    /// What the packet did.
    pub outcome: PacketOutcome,
    /// Source blocks resolved so far.
    pub resolved_blocks: u32,
    /// Source blocks the transfer needs.
    pub total_blocks: u32,
}

impl DecodeProgress {
    /// True once the payload is fully reconstructed and verified.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(
            self.outcome,
            PacketOutcome::Completed | PacketOutcome::AlreadyComplete
        )
    }
}

/// Decoder lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// No packet seen yet.
    AwaitingFirstPacket,
    /// Mid-reconstruction.
    Accumulating,
    /// Payload reconstructed and digest-verified.
    Complete,
}

struct ReconstructionState {
    transfer_id: TransferId,
    total_len: u32,
    digest: [u8; 32],
    block_size: u16,
    k: u32,
    sampler: IndexSampler,
    /// Resolved source blocks, indexed by block number.
    blocks: Vec<Option<Vec<u8>>>,
    resolved: u32,
    /// Multi-block equations waiting for more resolutions, keyed by their
    /// sorted unresolved index sets.
    pending: HashMap<Vec<u32>, Vec<u8>>,
    /// Sequence numbers already ingested.
    seen: HashSet<u32>,
    payload: Option<Vec<u8>>,
    complete: bool,
}

impl ReconstructionState {
    fn start(packet: &Packet) -> Self {
        let k = packet.source_blocks();
        info!(
            transfer = %packet.transfer_id,
            blocks = k,
            total_len = packet.total_len,
            block_size = packet.block_size,
            "reconstruction started"
        );
        Self {
            transfer_id: packet.transfer_id,
            total_len: packet.total_len,
            digest: packet.digest,
            block_size: packet.block_size,
            k,
            sampler: IndexSampler::new(k),
            blocks: vec![None; k as usize],
            resolved: 0,
            pending: HashMap::new(),
            seen: HashSet::new(),
            payload: None,
            complete: false,
        }
    }

    fn ingest_packet(&mut self, packet: &Packet) -> Result<PacketOutcome, DecodeError> {
        self.check_consistent(packet)?;
        if self.complete {
            return Ok(PacketOutcome::AlreadyComplete);
        }
        if self.seen.contains(&packet.seq) {
            return Ok(PacketOutcome::Duplicate);
        }

        let (degree, indices) = self.sampler.degree_and_indices(self.transfer_id, packet.seq);
        if degree != packet.degree {
            return Err(DecodeError::DegreeMismatch {
                seq: packet.seq,
                declared: packet.degree,
                derived: degree,
            });
        }
        self.seen.insert(packet.seq);

        // Reduce against everything already resolved.
        let mut body = packet.body.clone();
        let mut remaining = Vec::with_capacity(indices.len());
        for index in indices {
            match &self.blocks[index as usize] {
                Some(block) => xor_into(&mut body, block),
                None => remaining.push(index),
            }
        }

        let outcome = self.absorb(remaining, body);
        if self.resolved == self.k {
            return self.finish().map(|()| PacketOutcome::Completed);
        }
        Ok(outcome)
    }

    fn check_consistent(&self, packet: &Packet) -> Result<(), DecodeError> {
        if packet.total_len != self.total_len {
            return Err(DecodeError::Inconsistent {
                field: "total_len",
                expected: self.total_len.to_string(),
                got: packet.total_len.to_string(),
            });
        }
        if packet.block_size != self.block_size {
            return Err(DecodeError::Inconsistent {
                field: "block_size",
                expected: self.block_size.to_string(),
                got: packet.block_size.to_string(),
            });
        }
        if packet.digest != self.digest {
            return Err(DecodeError::Inconsistent {
                field: "digest",
                expected: hex::encode(self.digest),
                got: hex::encode(packet.digest),
            });
        }
        Ok(())
    }

    fn absorb(&mut self, remaining: Vec<u32>, body: Vec<u8>) -> PacketOutcome {
        match remaining.as_slice() {
            [] => {
                if body.iter().any(|&b| b != 0) {
                    warn!(
                        transfer = %self.transfer_id,
                        "redundant packet disagrees with resolved blocks"
                    );
                }
                PacketOutcome::Redundant
            }
            [index] => {
                self.pin_and_peel(*index, body);
                PacketOutcome::Applied
            }
            _ => {
                if self.pending.contains_key(&remaining) {
                    return PacketOutcome::Redundant;
                }
                self.pending.insert(remaining, body);
                PacketOutcome::Applied
            }
        }
    }

    /// Pin one block, then peel: every pending equation covering a pinned
    /// block is reduced, and equations that drop to one unresolved index
    /// pin that block too.
    fn pin_and_peel(&mut self, index: u32, block: Vec<u8>) {
        self.blocks[index as usize] = Some(block);
        self.resolved += 1;

        let mut worklist = vec![index];
        while let Some(pinned) = worklist.pop() {
            let affected: Vec<Vec<u32>> = self
                .pending
                .keys()
                .filter(|key| key.binary_search(&pinned).is_ok())
                .cloned()
                .collect();

            for old_key in affected {
                let Some(mut body) = self.pending.remove(&old_key) else {
                    continue;
                };
                if let Some(block) = &self.blocks[pinned as usize] {
                    xor_into(&mut body, block);
                }
                let mut key = old_key;
                key.retain(|&i| i != pinned);

                match key.as_slice() {
                    [] => {}
                    [next] => {
                        let next = *next;
                        if self.blocks[next as usize].is_none() {
                            self.blocks[next as usize] = Some(body);
                            self.resolved += 1;
                            worklist.push(next);
                        }
                    }
                    _ => {
                        self.pending.entry(key).or_insert(body);
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        let mut payload =
            Vec::with_capacity(self.blocks.len() * usize::from(self.block_size));
        for block in self.blocks.iter().flatten() {
            payload.extend_from_slice(block);
        }
        payload.truncate(self.total_len as usize);

        let got = blake3::hash(&payload);
        if got.as_bytes() != &self.digest {
            return Err(DecodeError::Integrity {
                expected: hex::encode(self.digest),
                got: hex::encode(got.as_bytes()),
            });
        }

        info!(
            transfer = %self.transfer_id,
            payload_len = payload.len(),
            "transfer decoded and verified"
        );
        self.payload = Some(payload);
        self.complete = true;
        Ok(())
    }
}

/// Incremental payload reconstruction from any packet subset.
#[derive(Default)]
pub struct FountainDecoder {
    state: Option<ReconstructionState>,
}

impl FountainDecoder {
    /// Fresh decoder with no transfer in progress.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Ingest one packet.
    ///
    /// The first packet of a transfer initializes the reconstruction from
    /// its header; a packet with a different transfer id replaces the
    /// reconstruction in progress.
    ///
    /// # Errors
    /// [`DecodeError::Inconsistent`] and [`DecodeError::DegreeMismatch`]
    /// reject the packet and leave the reconstruction untouched.
    /// [`DecodeError::Integrity`] discards the whole reconstruction; the
    /// transfer must be captured again from scratch.
    pub fn ingest(&mut self, packet: &Packet) -> Result<DecodeProgress, DecodeError> {
        let mut state = match self.state.take() {
            Some(state) if state.transfer_id == packet.transfer_id => state,
            Some(old) => {
                info!(
                    superseded = %old.transfer_id,
                    incoming = %packet.transfer_id,
                    "abandoning reconstruction for a newer transfer"
                );
                ReconstructionState::start(packet)
            }
            None => ReconstructionState::start(packet),
        };

        match state.ingest_packet(packet) {
            Ok(outcome) => {
                let progress = DecodeProgress {
                    transfer_id: state.transfer_id,
                    outcome,
                    resolved_blocks: state.resolved,
                    total_blocks: state.k,
                };
                self.state = Some(state);
                Ok(progress)
            }
            Err(err) => {
                // Integrity failure poisons the whole reconstruction; the
                // other errors only reject the offending packet.
                if !matches!(err, DecodeError::Integrity { .. }) {
                    self.state = Some(state);
                }
                Err(err)
            }
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn status(&self) -> DecodeStatus {
        match &self.state {
            None => DecodeStatus::AwaitingFirstPacket,
            Some(state) if state.complete => DecodeStatus::Complete,
            Some(_) => DecodeStatus::Accumulating,
        }
    }

    /// Transfer currently being reconstructed, if any.
    #[must_use]
    pub fn transfer_id(&self) -> Option<TransferId> {
        self.state.as_ref().map(|state| state.transfer_id)
    }

    /// Source blocks resolved so far.
    #[must_use]
    pub fn resolved_blocks(&self) -> u32 {
        self.state.as_ref().map_or(0, |state| state.resolved)
    }

    /// Source blocks the current transfer needs.
    #[must_use]
    pub fn total_blocks(&self) -> Option<u32> {
        self.state.as_ref().map(|state| state.k)
    }

    /// Verified payload, if reconstruction finished.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.state.as_ref().and_then(|state| state.payload.as_deref())
    }

    /// Take the verified payload out of the decoder. The transfer stays
    /// marked complete, so stray packets from the same session report
    /// [`PacketOutcome::AlreadyComplete`] instead of restarting it.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        self.state.as_mut().and_then(|state| state.payload.take())
    }

    /// Drop any reconstruction in progress.
    pub fn reset(&mut self) {
        self.state = None;
    }
}
