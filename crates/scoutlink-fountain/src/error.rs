//! Fountain codec error types.

use thiserror::Error;

/// Packet wire-format errors. Every variant means the frame is rejected
/// before it can touch decoder state; a malformed frame is never misread as
/// a different packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Frame shorter than the fixed header.
    #[error("packet too short: {len} bytes, header needs {min}")]
    TooShort {
        /// Received frame length.
        len: usize,
        /// Minimum length (the fixed header).
        min: usize,
    },

    /// Magic bytes did not match.
    #[error("bad magic: expected SLQR, got {got:02x?}")]
    BadMagic {
        /// The four bytes found where the magic belongs.
        got: [u8; 4],
    },

    /// Wire version newer or older than this build understands.
    #[error("unsupported wire version {version}, this build speaks {supported}")]
    UnsupportedVersion {
        /// Version declared by the frame.
        version: u16,
        /// Version this build implements.
        supported: u16,
    },

    /// Declared block size of zero.
    #[error("block size of zero is not valid")]
    ZeroBlockSize,

    /// Declared payload length of zero.
    #[error("payload length of zero is not valid")]
    ZeroPayloadLength,

    /// Frame body length disagrees with the declared block size.
    #[error("body length mismatch: declared block size {expected}, body carries {got} bytes")]
    BodyLengthMismatch {
        /// Declared block size.
        expected: usize,
        /// Bytes actually present after the header.
        got: usize,
    },

    /// Declared geometry implies more source blocks than the wire format
    /// allows, so the header cannot be honest.
    #[error("implausible geometry: {blocks} source blocks, limit is {max}")]
    TooManyBlocks {
        /// Block count implied by payload length and block size.
        blocks: u64,
        /// Most blocks a transfer may have.
        max: u32,
    },

    /// Armored frame was not valid base64.
    #[error("invalid frame armor: {0}")]
    Armor(#[from] base64::DecodeError),
}

/// Encoder construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Empty payload cannot be encoded.
    #[error("cannot encode empty payload")]
    EmptyPayload,

    /// Payload exceeds the configured maximum.
    #[error("payload too large: {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Configured block size of zero.
    #[error("configured block size must be at least 1 byte")]
    ZeroBlockSize,

    /// Payload would split into more source blocks than a degree header
    /// can count. Raise the block size or shrink the payload.
    #[error("payload splits into {blocks} blocks at this block size, limit is {max}")]
    TooManyBlocks {
        /// Block count the payload would need.
        blocks: u64,
        /// Most blocks a transfer may have.
        max: u32,
    },
}

/// Decoder errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A packet carried the active transfer id but disagreed with its
    /// geometry. The packet is discarded; decoder state is untouched.
    #[error("inconsistent transfer: {field} changed from {expected} to {got}")]
    Inconsistent {
        /// Which header field disagreed.
        field: &'static str,
        /// Value the reconstruction started with.
        expected: String,
        /// Value the offending packet declared.
        got: String,
    },

    /// A packet's declared degree disagreed with the one regenerated from
    /// its sequence number. Either side runs a different sampler, so the
    /// packet cannot be trusted.
    #[error("degree mismatch at seq {seq}: packet declares {declared}, regeneration gives {derived}")]
    DegreeMismatch {
        /// Sequence number of the offending packet.
        seq: u32,
        /// Degree declared in the packet header.
        declared: u16,
        /// Degree derived from the sequence number.
        derived: u16,
    },

    /// Reassembled payload failed digest verification. The reconstruction
    /// is discarded; the transfer must be restarted from scratch.
    #[error("payload integrity check failed: expected digest {expected}, got {got}")]
    Integrity {
        /// Digest declared by the packets, hex encoded.
        expected: String,
        /// Digest of the reassembled payload, hex encoded.
        got: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_error_display() {
        let err = PacketError::TooShort { len: 10, min: 58 };
        assert_eq!(err.to_string(), "packet too short: 10 bytes, header needs 58");

        let err = PacketError::BadMagic { got: *b"HTTP" };
        assert!(err.to_string().contains("expected SLQR"));

        let err = PacketError::UnsupportedVersion {
            version: 9,
            supported: 1,
        };
        assert!(err.to_string().contains("version 9"));

        let err = PacketError::BodyLengthMismatch {
            expected: 256,
            got: 200,
        };
        assert!(err.to_string().contains("256"));
        assert!(err.to_string().contains("200"));

        let err = PacketError::TooManyBlocks {
            blocks: 70_000,
            max: 65_535,
        };
        assert!(err.to_string().contains("70000"));
        assert!(err.to_string().contains("65535"));
    }

    #[test]
    fn encode_error_display() {
        assert_eq!(
            EncodeError::EmptyPayload.to_string(),
            "cannot encode empty payload"
        );

        let err = EncodeError::PayloadTooLarge {
            size: 2_000_000,
            max: 1_048_576,
        };
        assert!(err.to_string().contains("2000000"));
        assert!(err.to_string().contains("1048576"));
    }

    #[test]
    fn decode_error_display() {
        let err = DecodeError::Inconsistent {
            field: "block_size",
            expected: "256".into(),
            got: "128".into(),
        };
        assert_eq!(
            err.to_string(),
            "inconsistent transfer: block_size changed from 256 to 128"
        );

        let err = DecodeError::DegreeMismatch {
            seq: 17,
            declared: 3,
            derived: 2,
        };
        assert!(err.to_string().contains("seq 17"));

        let err = DecodeError::Integrity {
            expected: "aa".repeat(32),
            got: "bb".repeat(32),
        };
        assert!(err.to_string().contains("integrity"));
    }

    #[test]
    fn errors_are_clone_and_eq() {
        let err1 = EncodeError::EmptyPayload;
        let err2 = err1.clone();
        assert_eq!(err1, err2);

        let err1 = PacketError::ZeroBlockSize;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
