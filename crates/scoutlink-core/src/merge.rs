//! Policy-driven merging of record sets.
//!
//! The merge is a fold: existing entries are indexed by identity, then each
//! incoming entry lands as net-new, duplicate, or conflict. Ordering is
//! stable (existing entries first, in their original order, then net-new
//! incoming entries in theirs) so repeated merges produce identical output.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{identify_pit, EntryId, MatchRecord};

/// Conflict policy applied when existing and incoming entries share an
/// identity but differ in content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// The entry with the strictly newer capture timestamp wins. Missing or
    /// equal timestamps fall back to keeping the existing entry.
    #[default]
    Smart,
    /// The existing entry always wins.
    KeepExisting,
    /// The incoming entry always wins.
    KeepIncoming,
    /// Both entries survive; the incoming one gets a disambiguated id.
    KeepBoth,
}

impl MergePolicy {
    /// All policies, in presentation order.
    pub const ALL: [Self; 4] = [
        Self::Smart,
        Self::KeepExisting,
        Self::KeepIncoming,
        Self::KeepBoth,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::KeepExisting => "keep-existing",
            Self::KeepIncoming => "keep-incoming",
            Self::KeepBoth => "keep-both",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`MergePolicy`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown merge policy {input:?}, expected one of: smart, keep-existing, keep-incoming, keep-both")]
pub struct ParsePolicyError {
    input: String,
}

impl FromStr for MergePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(Self::Smart),
            "keep-existing" => Ok(Self::KeepExisting),
            "keep-incoming" => Ok(Self::KeepIncoming),
            "keep-both" => Ok(Self::KeepBoth),
            other => Err(ParsePolicyError {
                input: other.to_owned(),
            }),
        }
    }
}

/// Exact accounting of one merge application.
///
/// `kept + added` always equals the result length; `duplicates` counts
/// identical-content pairs collapsed into a single entry; `conflicts` counts
/// identity collisions with differing content regardless of which side won.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Result entries that originate from the existing set.
    pub kept: u64,
    /// Result entries that originate from the incoming set.
    pub added: u64,
    /// Identical-content pairs collapsed into one entry.
    pub duplicates: u64,
    /// Identity collisions with differing content.
    pub conflicts: u64,
}

/// Outcome of a merge: the combined record list plus its statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub records: Vec<MatchRecord>,
    pub stats: MergeStats,
}

/// Which input set a result slot currently originates from. A conflict
/// replacement flips the slot to incoming without moving it.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Existing,
    Incoming,
}

/// Merge `incoming` match records into `existing` under `policy`.
///
/// Every result record carries a materialized id (pre-assigned ids are
/// honored, everything else is derived from content). Incoming entries are
/// folded one at a time, so duplicates inside the incoming set itself
/// collapse exactly like duplicates across the two sets. The operation is
/// idempotent: feeding its own output back in yields the same records and
/// zero additions.
#[must_use]
pub fn merge(existing: &[MatchRecord], incoming: &[MatchRecord], policy: MergePolicy) -> MergeResult {
    let mut records: Vec<MatchRecord> = Vec::with_capacity(existing.len() + incoming.len());
    let mut origins: Vec<Origin> = Vec::with_capacity(records.capacity());
    let mut index: HashMap<EntryId, usize> = HashMap::with_capacity(records.capacity());
    let mut stats = MergeStats::default();

    for record in existing {
        let id = record.identity();
        let mut record = record.clone();
        record.id = Some(id);
        match index.get(&id) {
            // A store should never hold two entries with one id; if it does,
            // collapse exact copies and leave the rest untouched.
            Some(&slot) if records[slot].data == record.data => stats.duplicates += 1,
            Some(_) => {
                records.push(record);
                origins.push(Origin::Existing);
            }
            None => {
                index.insert(id, records.len());
                records.push(record);
                origins.push(Origin::Existing);
            }
        }
    }

    for record in incoming {
        let id = record.identity();
        let mut record = record.clone();
        record.id = Some(id);
        let Some(&slot) = index.get(&id) else {
            index.insert(id, records.len());
            records.push(record);
            origins.push(Origin::Incoming);
            continue;
        };

        if records[slot].data == record.data {
            stats.duplicates += 1;
            continue;
        }

        stats.conflicts += 1;
        debug!(id = %id, policy = %policy, "conflicting content for entry");
        match policy {
            MergePolicy::KeepExisting => {}
            MergePolicy::KeepIncoming => {
                records[slot] = record;
                origins[slot] = Origin::Incoming;
            }
            MergePolicy::Smart => {
                let incoming_wins = match (records[slot].recorded_at, record.recorded_at) {
                    (Some(held), Some(offered)) => offered > held,
                    _ => false,
                };
                if incoming_wins {
                    records[slot] = record;
                    origins[slot] = Origin::Incoming;
                }
            }
            MergePolicy::KeepBoth => {
                insert_disambiguated(&mut records, &mut origins, &mut index, &mut stats, id, record);
            }
        }
    }

    stats.kept = origins.iter().filter(|o| **o == Origin::Existing).count() as u64;
    stats.added = origins.iter().filter(|o| **o == Origin::Incoming).count() as u64;
    MergeResult { records, stats }
}

/// Find a free disambiguated id for a keep-both insertion.
///
/// Probes `disambiguate(1)`, `disambiguate(2)`, ... until a slot is free. A
/// probe that lands on a content-identical occupant means this entry was
/// already kept by an earlier merge, so it counts as a duplicate instead of
/// being inserted again.
fn insert_disambiguated(
    records: &mut Vec<MatchRecord>,
    origins: &mut Vec<Origin>,
    index: &mut HashMap<EntryId, usize>,
    stats: &mut MergeStats,
    base: EntryId,
    mut record: MatchRecord,
) {
    for n in 1.. {
        let candidate = base.disambiguate(n);
        match index.get(&candidate) {
            Some(&slot) if records[slot].data == record.data => {
                stats.duplicates += 1;
                return;
            }
            Some(_) => {}
            None => {
                record.id = Some(candidate);
                index.insert(candidate, records.len());
                records.push(record);
                origins.push(Origin::Incoming);
                return;
            }
        }
    }
}

/// Union of two keyed JSON row lists with keep-existing semantics.
///
/// Used for dataset categories whose rows carry their own unique key and
/// need deduplication but no conflict policy: scouter profiles keyed by
/// name, pit entries keyed by their natural key. Rows the key extractor
/// cannot key are passed through unkeyed (existing ones kept, incoming ones
/// appended).
pub fn union_keyed<K, F>(existing: &[Value], incoming: &[Value], key_of: F) -> (Vec<Value>, MergeStats)
where
    K: Eq + std::hash::Hash,
    F: Fn(&Value) -> Option<K>,
{
    let mut rows: Vec<Value> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut stats = MergeStats::default();

    for row in existing {
        if let Some(key) = key_of(row) {
            index.entry(key).or_insert(rows.len());
        }
        stats.kept += 1;
        rows.push(row.clone());
    }

    for row in incoming {
        let Some(key) = key_of(row) else {
            stats.added += 1;
            rows.push(row.clone());
            continue;
        };
        match index.get(&key) {
            Some(&slot) if &rows[slot] == row => stats.duplicates += 1,
            Some(_) => stats.conflicts += 1,
            None => {
                index.insert(key, rows.len());
                stats.added += 1;
                rows.push(row.clone());
            }
        }
    }

    (rows, stats)
}

/// Identity of a raw pit row: its `id` field when parseable, otherwise the
/// pit natural key derived from `scouterInitials` + `teamNumber`.
#[must_use]
pub fn pit_row_identity(row: &Value) -> Option<EntryId> {
    if let Some(id) = row
        .get("id")
        .and_then(Value::as_str)
        .and_then(|text| text.parse().ok())
    {
        return Some(id);
    }
    let initials = row.get("scouterInitials").and_then(Value::as_str)?;
    let team = row.get("teamNumber").and_then(Value::as_f64)?;
    Some(identify_pit(initials, team))
}

/// Fold an images-only update into stored pit rows.
///
/// Each update is matched to a row by [`pit_row_identity`] and only its
/// `images` field is copied over. Updates that match no stored row are
/// dropped with a warning: an images-only transfer cannot invent entries.
/// In the returned stats, `added` counts rows whose images changed,
/// `duplicates` counts no-op updates, and `kept` counts untouched rows.
#[must_use]
pub fn apply_pit_images(pit_rows: &[Value], updates: &[Value]) -> (Vec<Value>, MergeStats) {
    let mut rows = pit_rows.to_vec();
    let mut index: HashMap<EntryId, usize> = HashMap::with_capacity(rows.len());
    for (slot, row) in rows.iter().enumerate() {
        if let Some(id) = pit_row_identity(row) {
            index.entry(id).or_insert(slot);
        }
    }

    let mut stats = MergeStats::default();
    let mut touched: HashSet<usize> = HashSet::new();
    for update in updates {
        let slot = pit_row_identity(update).and_then(|id| index.get(&id).copied());
        let Some(slot) = slot else {
            warn!("pit image update matches no stored pit entry, dropping it");
            continue;
        };
        let images = update.get("images").cloned().unwrap_or(Value::Array(Vec::new()));
        if rows[slot].get("images") == Some(&images) {
            stats.duplicates += 1;
            continue;
        }
        if let Value::Object(row) = &mut rows[slot] {
            row.insert("images".to_owned(), images);
            touched.insert(slot);
        }
    }

    stats.added = touched.len() as u64;
    stats.kept = (rows.len() - touched.len()) as u64;
    (rows, stats)
}
