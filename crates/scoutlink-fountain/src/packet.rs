//! Packet wire format.
//!
//! One packet per QR frame. The layout is fixed and versioned:
//!
//! ```text
//! SCOUTLINK PACKET FORMAT (58-byte header + one block)
//!
//!   Bytes 0-3:   Magic (0x53 0x4C 0x51 0x52 = "SLQR")
//!   Bytes 4-5:   Version (u16 LE, currently 1)
//!   Bytes 6-13:  Transfer ID (u64 LE, random per transfer)
//!   Bytes 14-17: Total payload length (u32 LE, before padding)
//!   Bytes 18-49: Payload digest (32 bytes, BLAKE3-256)
//!   Bytes 50-51: Block size (u16 LE, > 0)
//!   Bytes 52-55: Sequence number (u32 LE, index-derivation seed)
//!   Bytes 56-57: Degree (u16 LE, cross-checked against regeneration)
//!   Bytes 58+:   XOR-combined block data (exactly block_size bytes)
//! ```
//!
//! Every packet repeats the transfer geometry (length, digest, block size)
//! so any single frame is enough to start a reconstruction, in any order.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::PacketError;

/// Magic bytes identifying a scoutlink packet.
pub const PACKET_MAGIC: [u8; 4] = *b"SLQR";

/// Wire version this build speaks.
pub const WIRE_VERSION: u16 = 1;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 58;

/// Most source blocks a transfer may have. The degree field must be able
/// to count up to the block total, so the limit is what a u16 can hold.
pub const MAX_BLOCKS: u32 = u16::MAX as u32;

/// Random identifier binding all packets of one encode session.
///
/// A decoder tracks exactly one transfer at a time; a packet with a
/// different id supersedes the reconstruction in progress.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(u64);

impl TransferId {
    /// Fresh random id for a new encode session.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransferId").field(&self.to_string()).finish()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One self-describing coded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Transfer this packet belongs to.
    pub transfer_id: TransferId,
    /// Payload length in bytes, before block padding.
    pub total_len: u32,
    /// BLAKE3 digest of the whole payload.
    pub digest: [u8; 32],
    /// Source block size this transfer was split with.
    pub block_size: u16,
    /// Sequence number; doubles as the seed for index regeneration.
    pub seq: u32,
    /// Number of blocks XORed into the body. Redundant with `seq` by
    /// construction and used to detect sampler desync.
    pub degree: u16,
    /// XOR combination of the selected blocks, `block_size` bytes.
    pub body: Vec<u8>,
}

impl Packet {
    /// Serialize to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.extend_from_slice(&PACKET_MAGIC);
        out.extend_from_slice(&WIRE_VERSION.to_le_bytes());
        out.extend_from_slice(&self.transfer_id.as_raw().to_le_bytes());
        out.extend_from_slice(&self.total_len.to_le_bytes());
        out.extend_from_slice(&self.digest);
        out.extend_from_slice(&self.block_size.to_le_bytes());
        out.extend_from_slice(&self.seq.to_le_bytes());
        out.extend_from_slice(&self.degree.to_le_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse wire bytes.
    ///
    /// # Errors
    /// Any [`PacketError`] variant; a frame that fails here has touched no
    /// decoder state and can simply be re-scanned.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN {
            return Err(PacketError::TooShort {
                len: bytes.len(),
                min: HEADER_LEN,
            });
        }

        let mut magic = [0_u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != PACKET_MAGIC {
            return Err(PacketError::BadMagic { got: magic });
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != WIRE_VERSION {
            return Err(PacketError::UnsupportedVersion {
                version,
                supported: WIRE_VERSION,
            });
        }

        let mut id = [0_u8; 8];
        id.copy_from_slice(&bytes[6..14]);
        let transfer_id = TransferId::from_raw(u64::from_le_bytes(id));

        let total_len = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);
        if total_len == 0 {
            return Err(PacketError::ZeroPayloadLength);
        }

        let mut digest = [0_u8; 32];
        digest.copy_from_slice(&bytes[18..50]);

        let block_size = u16::from_le_bytes([bytes[50], bytes[51]]);
        if block_size == 0 {
            return Err(PacketError::ZeroBlockSize);
        }

        let blocks = u64::from(total_len).div_ceil(u64::from(block_size));
        if blocks > u64::from(MAX_BLOCKS) {
            return Err(PacketError::TooManyBlocks {
                blocks,
                max: MAX_BLOCKS,
            });
        }

        let seq = u32::from_le_bytes([bytes[52], bytes[53], bytes[54], bytes[55]]);
        let degree = u16::from_le_bytes([bytes[56], bytes[57]]);

        let body = &bytes[HEADER_LEN..];
        if body.len() != usize::from(block_size) {
            return Err(PacketError::BodyLengthMismatch {
                expected: usize::from(block_size),
                got: body.len(),
            });
        }

        Ok(Self {
            transfer_id,
            total_len,
            digest,
            block_size,
            seq,
            degree,
            body: body.to_vec(),
        })
    }

    /// Number of source blocks implied by this packet's geometry.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // decode() caps blocks at MAX_BLOCKS
    pub fn source_blocks(&self) -> u32 {
        u64::from(self.total_len).div_ceil(u64::from(self.block_size.max(1))) as u32
    }

    /// Serialize to a single-line base64 frame, the form the QR layer
    /// renders and scans.
    #[must_use]
    pub fn to_armored(&self) -> String {
        BASE64.encode(self.encode())
    }

    /// Parse a base64 frame. Surrounding whitespace is tolerated so frames
    /// can travel through line-oriented plumbing.
    ///
    /// # Errors
    /// [`PacketError::Armor`] for bad base64, otherwise as [`Packet::decode`].
    pub fn from_armored(line: &str) -> Result<Self, PacketError> {
        let bytes = BASE64.decode(line.trim())?;
        Self::decode(&bytes)
    }
}
