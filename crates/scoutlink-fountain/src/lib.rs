//! Rateless packet transport for QR-relayed scouting data.
//!
//! The sending device splits a payload into fixed-size source blocks and
//! emits an endless stream of self-describing packets; the scanning device
//! reconstructs the payload from whichever subset it happens to capture.
//!
//! # Why a fountain code
//!
//! A camera pointed at a cycling QR display misses frames constantly and in
//! no particular pattern, and the two devices share no back channel. The
//! transport is built for exactly that:
//! - Any packet can be the first one seen; each repeats the full transfer
//!   geometry in its header
//! - Packets decode in any order, duplicates are free
//! - Roughly K distinct packets reconstruct K source blocks; which K
//!   barely matters
//! - The sender never needs to know what was received - it just keeps
//!   cycling
//!
//! The first K sequence numbers are plain copies of the source blocks, so a
//! clean capture costs no overhead. Later packets XOR several blocks
//! together; both sides regenerate the block selection deterministically
//! from the sequence number, so the selection never rides in the packet.
//! A BLAKE3 digest over the whole payload gates completion.

#![forbid(unsafe_code)]

mod config;
mod decode;
mod encode;
mod error;
mod golden;
mod packet;
mod sampler;

pub use config::{FountainConfig, MIN_EXTRA_PACKETS};
pub use decode::{DecodeProgress, DecodeStatus, FountainDecoder, PacketOutcome};
pub use encode::FountainEncoder;
pub use error::{DecodeError, EncodeError, PacketError};
pub use packet::{Packet, TransferId, HEADER_LEN, MAX_BLOCKS, PACKET_MAGIC, WIRE_VERSION};
pub use sampler::IndexSampler;
