//! `scoutlink generate` command implementation.
//!
//! Reads one store category, wraps it in its transfer container, fountain
//! encodes it, and prints armored frames to stdout, one per line. The QR
//! layer turns each line into one displayed code.
//!
//! # Usage
//!
//! ```text
//! # One finite batch (systematic pass + coded overhead)
//! scoutlink generate --store ./event --category scouting
//!
//! # Stream forever like a cycling display
//! scoutlink generate --store ./event --category pit_scouting --loop
//! ```

use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::{json, Value};
use tracing::{debug, info};

use scoutlink_core::{assign_ids, MatchRecord, ScoutingSet};
use scoutlink_fountain::{FountainConfig, FountainEncoder, Packet};
use scoutlink_store::{DataCategory, DatasetStore, JsonFileStore};

/// Arguments for the `scoutlink generate` command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Store directory with the category files.
    #[arg(long, value_name = "DIR")]
    pub store: PathBuf,

    /// Category to send: scouting, scouter_profiles or pit_scouting.
    #[arg(long)]
    pub category: DataCategory,

    /// Source block size in bytes (bounds the QR frame size).
    #[arg(long, default_value_t = 256)]
    pub block_size: u16,

    /// Exact number of frames to emit instead of the automatic batch.
    #[arg(long)]
    pub packets: Option<u32>,

    /// Cycle frames forever, the way a QR display loop does.
    #[arg(long = "loop", conflicts_with = "packets")]
    pub cycle: bool,
}

/// Run the generate command.
///
/// # Errors
///
/// Store access failure, an empty category, or a payload past the encoder
/// limits.
pub fn run(args: &GenerateArgs) -> Result<()> {
    let store = JsonFileStore::open(&args.store)
        .with_context(|| format!("cannot open store at {}", args.store.display()))?;
    let rows = store.read_all(args.category)?;
    if rows.is_empty() {
        bail!("category {} is empty, nothing to send", args.category);
    }

    let payload = build_payload(args.category, rows)?;

    let config = FountainConfig {
        block_size: args.block_size,
        ..FountainConfig::default()
    };
    let encoder =
        FountainEncoder::new(&payload, &config).context("cannot encode this payload")?;
    let batch = args
        .packets
        .unwrap_or_else(|| config.batch_packets(payload.len()));

    info!(
        transfer = %encoder.transfer_id(),
        category = %args.category,
        payload_len = payload.len(),
        blocks = encoder.source_blocks(),
        frame_len = encoder.frame_len(),
        "transfer ready"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.cycle {
        emit(&mut out, encoder.packets())
    } else {
        emit(&mut out, encoder.packets().take(batch as usize))
    }
}

/// Wrap category rows in the container shape the receiving side recognizes.
///
/// Scouting rows are parsed into typed records and get content-derived ids
/// materialized before export, so the payload is always in the identified
/// format no matter how the store rows were produced.
fn build_payload(category: DataCategory, rows: Vec<Value>) -> Result<Vec<u8>> {
    let document = match category {
        DataCategory::Scouting => {
            let mut entries: Vec<MatchRecord> = rows
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()
                .context("scouting rows do not match their schema")?;
            let assigned = assign_ids(&mut entries);
            if assigned > 0 {
                debug!(assigned, "derived ids for unidentified records");
            }
            serde_json::to_value(ScoutingSet { entries })?
        }
        DataCategory::PitScouting => json!({ "entries": rows }),
        // Predictions are device-local; peers only sync the scouter list.
        DataCategory::ScouterProfiles => json!({ "scouters": rows, "predictions": {} }),
    };
    Ok(serde_json::to_vec(&document)?)
}

/// Write frames until the iterator ends or the reader hangs up.
fn emit(out: &mut impl Write, packets: impl Iterator<Item = Packet>) -> Result<()> {
    for packet in packets {
        if let Err(err) = writeln!(out, "{}", packet.to_armored()) {
            // A scanner that completes mid-cycle closes the pipe; that is a
            // finished transfer, not a failure.
            if err.kind() == ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(err).context("writing frames to stdout");
        }
    }
    Ok(())
}
