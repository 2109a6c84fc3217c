//! Dataset payload shapes and the transfer-type detector.
//!
//! A transfer carries one JSON document and no out-of-band type tag, so the
//! receiving side classifies the document by ordered structural checks.
//! Anything that matches none of the known shapes is rejected as
//! unrecognized, never guessed at: merging records into the wrong category
//! would corrupt the store silently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{identify_pit, EntryId, FieldValue, MatchRecord, PayloadError};

/// Marker field that tags an images-only pit update.
pub const PIT_IMAGES_MARKER: &str = "pitImagesOnly";

/// Scouter profile set: per-scouter performance stats plus prediction
/// history. Internals belong to the profile subsystem; the transfer layer
/// moves them as opaque rows keyed by scouter name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScouterProfileSet {
    pub scouters: Vec<Value>,
    pub predictions: Value,
}

/// Images-only update for pit entries already on the receiving device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitImageUpdate {
    pub pit_images_only: bool,
    pub entries: Vec<Value>,
}

/// One pit-scouting entry. Only the fields the transfer layer needs are
/// typed; everything else rides along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    pub team_number: f64,
    pub scouter_initials: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PitRecord {
    /// The entry's identity: the pre-assigned id when present, otherwise
    /// derived from the pit natural key (scouter initials + team number).
    #[must_use]
    pub fn identity(&self) -> EntryId {
        self.id
            .unwrap_or_else(|| identify_pit(&self.scouter_initials, self.team_number))
    }
}

/// Full pit-scouting dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitScoutingSet {
    pub entries: Vec<PitRecord>,
}

/// Match-scouting dataset in the current identified format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutingSet {
    pub entries: Vec<MatchRecord>,
}

/// A decoded transfer payload, classified by dataset kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferPayload {
    ScouterProfiles(ScouterProfileSet),
    PitImages(PitImageUpdate),
    PitScouting(PitScoutingSet),
    Scouting(ScoutingSet),
    /// Pre-identity exports: rows of bare scalar arrays, no ids.
    LegacyScouting(Vec<MatchRecord>),
}

impl TransferPayload {
    /// Dataset kind for logs and reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ScouterProfiles(_) => "scouter_profiles",
            Self::PitImages(_) => "pit_images",
            Self::PitScouting(_) => "pit_scouting",
            Self::Scouting(_) => "scouting",
            Self::LegacyScouting(_) => "legacy_scouting",
        }
    }
}

/// Classify and parse a payload from raw bytes.
///
/// # Errors
/// [`PayloadError::Json`] when the bytes are not JSON or an item fails its
/// schema; [`PayloadError::Unrecognized`] when the document matches no known
/// dataset shape.
pub fn detect(bytes: &[u8]) -> Result<TransferPayload, PayloadError> {
    detect_value(serde_json::from_slice(bytes)?)
}

/// Classify and parse an already-parsed payload document.
///
/// Checks run in fixed order and the first match wins:
/// 1. `scouters` + `predictions` keys: scouter profiles.
/// 2. truthy [`PIT_IMAGES_MARKER`] + `entries` array: pit image update.
/// 3. `entries` whose first item looks like a pit entry: pit scouting.
/// 4. `entries` whose first item carries `id` + `data` (or is empty):
///    identified match scouting.
/// 5. a bare array, or a `data` array inside an object: legacy scouting.
///
/// # Errors
/// Same contract as [`detect`].
pub fn detect_value(value: Value) -> Result<TransferPayload, PayloadError> {
    let map = match value {
        Value::Array(rows) => return parse_legacy_rows(rows).map(TransferPayload::LegacyScouting),
        Value::Object(map) => map,
        other => {
            return Err(PayloadError::unrecognized(format!(
                "top level is {}, expected an object or an array",
                json_kind(&other)
            )))
        }
    };

    if map.contains_key("scouters") && map.contains_key("predictions") {
        let set = serde_json::from_value(Value::Object(map))?;
        return Ok(TransferPayload::ScouterProfiles(set));
    }

    if map.get(PIT_IMAGES_MARKER).and_then(Value::as_bool) == Some(true)
        && map.get("entries").is_some_and(Value::is_array)
    {
        let update = serde_json::from_value(Value::Object(map))?;
        return Ok(TransferPayload::PitImages(update));
    }

    if let Some(entries) = map.get("entries").and_then(Value::as_array) {
        if entries.first().is_some_and(looks_like_pit_entry) {
            let set = serde_json::from_value(Value::Object(map))?;
            return Ok(TransferPayload::PitScouting(set));
        }
        if entries.first().map_or(true, looks_like_identified_entry) {
            let set = serde_json::from_value(Value::Object(map))?;
            return Ok(TransferPayload::Scouting(set));
        }
        return Err(PayloadError::unrecognized(
            "entries items match no known record shape",
        ));
    }

    let mut map = map;
    if let Some(Value::Array(rows)) = map.remove("data") {
        return parse_legacy_rows(rows).map(TransferPayload::LegacyScouting);
    }

    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
    Err(PayloadError::unrecognized(format!(
        "object with keys [{}] matches no known dataset",
        keys.join(", ")
    )))
}

fn looks_like_pit_entry(item: &Value) -> bool {
    let Value::Object(map) = item else {
        return false;
    };
    map.contains_key("teamNumber")
        && map.contains_key("scouterInitials")
        && ["drivetrain", "weight", "scoring"]
            .iter()
            .any(|key| map.contains_key(*key))
}

fn looks_like_identified_entry(item: &Value) -> bool {
    let Value::Object(map) = item else {
        return false;
    };
    map.contains_key("id") && map.contains_key("data")
}

fn parse_legacy_rows(rows: Vec<Value>) -> Result<Vec<MatchRecord>, PayloadError> {
    rows.into_iter()
        .map(|row| {
            let data: Vec<FieldValue> = serde_json::from_value(row)?;
            Ok(MatchRecord::new(data))
        })
        .collect()
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
