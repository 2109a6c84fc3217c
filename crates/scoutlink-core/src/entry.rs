//! Scouting records and content-derived entry identity.
//!
//! Identity is the anchor of the whole merge pipeline: two devices that have
//! never communicated must assign the same id to the same observation. Ids
//! are therefore derived from record content alone, never from insertion
//! order, clocks, or per-device counters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_128;

/// Number of leading fields that form a match record's natural key:
/// scouter initials, match number, team number, in schema order.
pub const NATURAL_KEY_WIDTH: usize = 3;

/// Domain separator for match-entry identity hashes.
const ENTRY_DOMAIN: &[u8] = b"SCOUTLINK-ENTRY-V1";

/// Domain separator for pit-entry identity hashes.
const PIT_DOMAIN: &[u8] = b"SCOUTLINK-PIT-V1";

const TAG_ABSENT: u8 = 0x00;
const TAG_TEXT: u8 = 0x01;
const TAG_NUMBER: u8 = 0x02;
const TAG_FLAG: u8 = 0x03;

/// All NaN payloads collapse to this bit pattern before hashing.
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

/// One scalar cell of a record's fixed form schema.
///
/// Serialized untagged so JSON scalars round-trip as themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Append the canonical encoding: a type tag, a u64 LE byte length, and
    /// the payload bytes. Numbers canonicalize `-0.0` to `0.0` and every NaN
    /// to a single bit pattern so equal values hash equally.
    fn canonical_write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Flag(flag) => {
                out.push(TAG_FLAG);
                out.extend_from_slice(&1_u64.to_le_bytes());
                out.push(u8::from(*flag));
            }
            Self::Number(number) => {
                out.push(TAG_NUMBER);
                out.extend_from_slice(&8_u64.to_le_bytes());
                out.extend_from_slice(&canonical_f64_bits(*number).to_le_bytes());
            }
            Self::Text(text) => {
                out.push(TAG_TEXT);
                out.extend_from_slice(&(text.len() as u64).to_le_bytes());
                out.extend_from_slice(text.as_bytes());
            }
        }
    }
}

fn canonical_f64_bits(number: f64) -> u64 {
    if number.is_nan() {
        CANONICAL_NAN
    } else if number == 0.0 {
        0
    } else {
        number.to_bits()
    }
}

/// Content-derived identifier for one scouting entry.
///
/// 128 bits of XXH3 over the canonical encoding of the record's natural-key
/// fields. Displayed and serialized as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId([u8; 16]);

impl EntryId {
    /// Construct an `EntryId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Derive the `n`-th alternate id for this identity.
    ///
    /// Used by the keep-both merge policy to give a colliding
    /// distinct-content entry its own stable slot.
    #[must_use]
    pub fn disambiguate(&self, n: u32) -> Self {
        let mut buf = [0_u8; 20];
        buf[..16].copy_from_slice(&self.0);
        buf[16..].copy_from_slice(&n.to_le_bytes());
        Self(xxh3_128(&buf).to_be_bytes())
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryId").field(&self.to_string()).finish()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for EntryId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Error parsing an [`EntryId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entry id must be 32 hex characters")]
pub struct ParseEntryIdError;

impl FromStr for EntryId {
    type Err = ParseEntryIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s).map_err(|_| ParseEntryIdError)?;
        let bytes: [u8; 16] = decoded.try_into().map_err(|_| ParseEntryIdError)?;
        Ok(Self(bytes))
    }
}

impl Serialize for EntryId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// One match-scouting observation: an optional pre-assigned id, an optional
/// capture timestamp (epoch milliseconds), and the ordered field values of
/// the fixed form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<u64>,
    pub data: Vec<FieldValue>,
}

impl MatchRecord {
    /// A record with field content only; its id is derived on demand.
    #[must_use]
    pub const fn new(data: Vec<FieldValue>) -> Self {
        Self {
            id: None,
            recorded_at: None,
            data,
        }
    }

    /// The record's identity: the pre-assigned id when present, otherwise
    /// derived from content. Pre-assigned ids are never recomputed, so an id
    /// survives edits to non-key fields made after assignment.
    #[must_use]
    pub fn identity(&self) -> EntryId {
        self.id.unwrap_or_else(|| identify(self))
    }
}

/// Derive the content-addressed identity of a match record.
///
/// Hashes the canonical encoding of the natural-key fields (the first
/// [`NATURAL_KEY_WIDTH`] entries of `data`). Records shorter than the key
/// width contribute an absent marker per missing position, so identity is
/// total: malformed records still get stable, mergeable ids.
#[must_use]
pub fn identify(record: &MatchRecord) -> EntryId {
    hash_key_fields(ENTRY_DOMAIN, &record.data, NATURAL_KEY_WIDTH)
}

/// Derive the identity of a pit-scouting entry from its natural key
/// (scouter initials + team number). Pit entries use their own hash domain
/// so they can never collide with match entries.
#[must_use]
pub fn identify_pit(scouter_initials: &str, team_number: f64) -> EntryId {
    let key = [
        FieldValue::Text(scouter_initials.to_owned()),
        FieldValue::Number(team_number),
    ];
    hash_key_fields(PIT_DOMAIN, &key, key.len())
}

fn hash_key_fields(domain: &[u8], fields: &[FieldValue], width: usize) -> EntryId {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(domain);
    for position in 0..width {
        match fields.get(position) {
            Some(field) => field.canonical_write(&mut buf),
            None => buf.push(TAG_ABSENT),
        }
    }
    EntryId(xxh3_128(&buf).to_be_bytes())
}

/// Assign derived ids to every record that lacks one, in place.
///
/// Returns how many ids were assigned. Records that already carry an id are
/// left untouched.
pub fn assign_ids(records: &mut [MatchRecord]) -> usize {
    let mut assigned = 0;
    for record in records.iter_mut() {
        if record.id.is_none() {
            record.id = Some(identify(record));
            assigned += 1;
        }
    }
    assigned
}
