//! `scoutlink scan` command implementation.
//!
//! Consumes armored frames from stdin or a file, feeds them to the fountain
//! decoder until a payload verifies, classifies the payload, merges it into
//! the store, and prints a JSON report on stdout. Unreadable or inconsistent
//! frames are logged and skipped, the way a camera feed demands; a failed
//! integrity check or an unrecognizable payload aborts with nothing merged.
//!
//! # Usage
//!
//! ```text
//! # Pipe from the displaying device (or any frame capture)
//! scoutlink generate --store ./a --category scouting | scoutlink scan --store ./b
//!
//! # Keep both sides of id collisions instead of smart resolution
//! scoutlink scan --store ./b --policy keep-both --input frames.txt
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use scoutlink_core::{
    apply_pit_images, detect, merge, pit_row_identity, union_keyed, MatchRecord, MergePolicy,
    MergeStats, PitRecord, ScouterProfileSet, TransferPayload,
};
use scoutlink_fountain::{DecodeError, FountainDecoder, Packet};
use scoutlink_store::{DataCategory, DatasetStore, JsonFileStore};

/// Arguments for the `scoutlink scan` command.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Store directory with the category files.
    #[arg(long, value_name = "DIR")]
    pub store: PathBuf,

    /// Merge policy for scouting records.
    #[arg(long, default_value_t = MergePolicy::Smart)]
    pub policy: MergePolicy,

    /// Read armored frames from a file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

/// Scan session summary printed as JSON on stdout.
#[derive(Debug, Serialize)]
struct ScanReport {
    /// Store category the merge wrote.
    category: DataCategory,
    /// Policy the session ran with.
    policy: MergePolicy,
    /// Merge accounting.
    stats: MergeStats,
    /// Rows in the category after the write.
    total: usize,
}

/// Run the scan command.
///
/// # Errors
///
/// Store access failure, input that ends before a transfer completes, a
/// failed integrity check, or a payload no detector rule recognizes.
pub fn run(args: &ScanArgs) -> Result<()> {
    let store = JsonFileStore::open(&args.store)
        .with_context(|| format!("cannot open store at {}", args.store.display()))?;

    let payload = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open frame capture {}", path.display()))?;
            collect_payload(BufReader::new(file))?
        }
        None => collect_payload(io::stdin().lock())?,
    };

    let detected = detect(&payload)
        .context("transfer decoded but its payload is unusable; nothing was merged")?;
    info!(kind = detected.kind(), payload_len = payload.len(), "payload classified");

    let report = match detected {
        TransferPayload::Scouting(set) => merge_scouting(&store, &set.entries, args.policy)?,
        TransferPayload::LegacyScouting(records) => {
            merge_scouting(&store, &records, args.policy)?
        }
        TransferPayload::PitScouting(set) => merge_pit(&store, &set.entries, args.policy)?,
        TransferPayload::PitImages(update) => {
            merge_pit_images_into(&store, &update.entries, args.policy)?
        }
        TransferPayload::ScouterProfiles(set) => merge_profiles(&store, &set, args.policy)?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
    Ok(())
}

/// Feed frames to a decoder until one transfer completes.
fn collect_payload(reader: impl BufRead) -> Result<Vec<u8>> {
    let mut decoder = FountainDecoder::new();
    for line in reader.lines() {
        let line = line.context("reading frames")?;
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }

        let packet = match Packet::from_armored(frame) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, "skipping unreadable frame");
                continue;
            }
        };

        match decoder.ingest(&packet) {
            Ok(progress) => {
                debug!(
                    transfer = %progress.transfer_id,
                    resolved = progress.resolved_blocks,
                    total = progress.total_blocks,
                    "frame ingested"
                );
                if progress.is_complete() {
                    return decoder
                        .take_payload()
                        .context("decoder completed without a payload");
                }
            }
            Err(err @ DecodeError::Integrity { .. }) => {
                return Err(err).context(
                    "transfer failed integrity verification; restart it and scan again (nothing was merged)",
                );
            }
            Err(err) => {
                warn!(%err, "skipping frame that disagrees with the transfer");
            }
        }
    }
    bail!("frame input ended before the transfer completed");
}

fn merge_scouting(
    store: &JsonFileStore,
    incoming: &[MatchRecord],
    policy: MergePolicy,
) -> Result<ScanReport> {
    let existing: Vec<MatchRecord> = read_typed(store, DataCategory::Scouting)?;
    let outcome = merge(&existing, incoming, policy);
    let total = write_typed(store, DataCategory::Scouting, &outcome.records)?;
    info!(
        category = %DataCategory::Scouting,
        added = outcome.stats.added,
        duplicates = outcome.stats.duplicates,
        conflicts = outcome.stats.conflicts,
        total,
        "merge complete"
    );
    Ok(ScanReport {
        category: DataCategory::Scouting,
        policy,
        stats: outcome.stats,
        total,
    })
}

fn merge_pit(
    store: &JsonFileStore,
    incoming: &[PitRecord],
    policy: MergePolicy,
) -> Result<ScanReport> {
    let existing = store.read_all(DataCategory::PitScouting)?;
    let incoming_rows: Vec<Value> = incoming
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    let (rows, stats) = union_keyed(&existing, &incoming_rows, pit_row_identity);
    store.write_all(DataCategory::PitScouting, &rows)?;
    info!(
        category = %DataCategory::PitScouting,
        added = stats.added,
        duplicates = stats.duplicates,
        total = rows.len(),
        "merge complete"
    );
    Ok(ScanReport {
        category: DataCategory::PitScouting,
        policy,
        stats,
        total: rows.len(),
    })
}

fn merge_pit_images_into(
    store: &JsonFileStore,
    updates: &[Value],
    policy: MergePolicy,
) -> Result<ScanReport> {
    let existing = store.read_all(DataCategory::PitScouting)?;
    let (rows, stats) = apply_pit_images(&existing, updates);
    store.write_all(DataCategory::PitScouting, &rows)?;
    info!(
        category = %DataCategory::PitScouting,
        updated = stats.added,
        unchanged = stats.duplicates,
        "pit images applied"
    );
    Ok(ScanReport {
        category: DataCategory::PitScouting,
        policy,
        stats,
        total: rows.len(),
    })
}

fn merge_profiles(
    store: &JsonFileStore,
    set: &ScouterProfileSet,
    policy: MergePolicy,
) -> Result<ScanReport> {
    let existing = store.read_all(DataCategory::ScouterProfiles)?;
    let (rows, stats) = union_keyed(&existing, &set.scouters, |row| {
        row.get("name").and_then(Value::as_str).map(str::to_owned)
    });
    if set.predictions.as_object().is_some_and(|map| !map.is_empty()) {
        // Predictions stay device-local; only the scouter list syncs.
        debug!("ignoring incoming predictions blob");
    }
    store.write_all(DataCategory::ScouterProfiles, &rows)?;
    info!(
        category = %DataCategory::ScouterProfiles,
        added = stats.added,
        duplicates = stats.duplicates,
        total = rows.len(),
        "merge complete"
    );
    Ok(ScanReport {
        category: DataCategory::ScouterProfiles,
        policy,
        stats,
        total: rows.len(),
    })
}

fn read_typed<T: serde::de::DeserializeOwned>(
    store: &JsonFileStore,
    category: DataCategory,
) -> Result<Vec<T>> {
    store
        .read_all(category)?
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
        .with_context(|| format!("store rows in {category} do not match their schema"))
}

fn write_typed<T: Serialize>(
    store: &JsonFileStore,
    category: DataCategory,
    rows: &[T],
) -> Result<usize> {
    let values: Vec<Value> = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    store.write_all(category, &values)?;
    Ok(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutlink_fountain::{FountainConfig, FountainEncoder, TransferId};
    use std::io::Cursor;

    fn frames_for(payload: &[u8]) -> Vec<String> {
        let config = FountainConfig {
            block_size: 32,
            ..FountainConfig::default()
        };
        let encoder = FountainEncoder::with_transfer_id(
            payload,
            &config,
            TransferId::from_raw(0x5ca0_71a5_5ca0_71a5),
        )
        .unwrap();
        let batch = config.batch_packets(payload.len()) as usize;
        encoder.packets().take(batch).map(|p| p.to_armored()).collect()
    }

    #[test]
    fn collect_payload_reads_a_clean_stream() {
        let payload = br#"{"entries":[]}"#.to_vec();
        let text = frames_for(&payload).join("\n");
        let recovered = collect_payload(Cursor::new(text)).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn collect_payload_skips_noise_lines() {
        let payload = br#"{"entries":[{"id":"x","data":[1.0]}]}"#.to_vec();
        let mut lines = frames_for(&payload);
        lines.insert(0, "not a frame at all".to_owned());
        lines.insert(2, String::new());
        lines.insert(3, "AAAA".to_owned());
        let recovered = collect_payload(Cursor::new(lines.join("\n"))).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn collect_payload_tolerates_duplicated_and_reversed_frames() {
        let payload = vec![7_u8; 300];
        let mut lines = frames_for(&payload);
        let doubled: Vec<String> = lines.iter().chain(lines.iter()).cloned().collect();
        lines = doubled.into_iter().rev().collect();
        let recovered = collect_payload(Cursor::new(lines.join("\n"))).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn collect_payload_fails_on_truncated_input() {
        let payload = vec![9_u8; 300];
        let lines = frames_for(&payload);
        // Keep too few frames to ever finish.
        let text = lines[..2].join("\n");
        let err = collect_payload(Cursor::new(text)).unwrap_err();
        assert!(err.to_string().contains("ended before"));
    }

    #[test]
    fn report_serializes_with_snake_case_category_and_kebab_policy() {
        let report = ScanReport {
            category: DataCategory::Scouting,
            policy: MergePolicy::KeepBoth,
            stats: MergeStats::default(),
            total: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["category"], "scouting");
        assert_eq!(json["policy"], "keep-both");
        assert_eq!(json["total"], 3);
        assert_eq!(json["stats"]["added"], 0);
    }
}
