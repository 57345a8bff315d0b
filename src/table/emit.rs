use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::Writer;
use tracing::debug;

use crate::reconcile::interval::LifeInterval;
use crate::reconcile::lifetime::UnitLifetime;

/// Output column order, fixed across runs.
const INTERVAL_HEADER: &[&str] = &[
    "unit_id",
    "slot_id",
    "insert",
    "remove",
    "duration_secs",
    "terminal_event",
    "censored",
];

const LIFETIME_HEADER: &[&str] = &[
    "unit_id",
    "total_duration_secs",
    "interval_count",
    "distinct_slot_count",
    "dominant_slot",
    "dominant_slot_fraction",
    "last_seen",
    "failure_count",
    "removed_count",
    "dominant_failure_count",
    "dominant_removed_count",
    "still_in_service",
    "censored",
    "install_batch",
];

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn fmt_time(at: NaiveDateTime) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Write the per-interval table. Missing values are written as the
/// configured null marker, never as empty cells.
pub fn write_intervals(path: &Path, intervals: &[LifeInterval], null_marker: &str) -> Result<()> {
    let mut writer = Writer::from_path(path)
        .with_context(|| format!("creating interval table {}", path.display()))?;
    writer.write_record(INTERVAL_HEADER)?;
    for interval in intervals {
        writer.write_record([
            interval.unit_id.clone(),
            interval.slot_id.clone(),
            fmt_time(interval.start),
            fmt_time(interval.end),
            interval.duration().num_seconds().to_string(),
            interval
                .terminal_event
                .map(|event| event.as_str().to_string())
                .unwrap_or_else(|| null_marker.to_string()),
            interval.censored.to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing interval table {}", path.display()))?;
    debug!(rows = intervals.len(), path = %path.display(), "wrote interval table");
    Ok(())
}

/// Write the per-unit lifetime table.
pub fn write_lifetimes(path: &Path, lifetimes: &[UnitLifetime], null_marker: &str) -> Result<()> {
    let mut writer = Writer::from_path(path)
        .with_context(|| format!("creating lifetime table {}", path.display()))?;
    writer.write_record(LIFETIME_HEADER)?;
    for row in lifetimes {
        writer.write_record([
            row.unit_id.clone(),
            row.total_duration.num_seconds().to_string(),
            row.interval_count.to_string(),
            row.distinct_slot_count.to_string(),
            row.dominant_slot.clone(),
            row.dominant_slot_fraction
                .map(|fraction| format!("{fraction:.6}"))
                .unwrap_or_else(|| null_marker.to_string()),
            fmt_time(row.last_seen),
            row.failure_count.to_string(),
            row.removed_count.to_string(),
            row.dominant_failure_count.to_string(),
            row.dominant_removed_count.to_string(),
            row.still_in_service.to_string(),
            row.censored.to_string(),
            row.install_batch.as_str().to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing lifetime table {}", path.display()))?;
    debug!(rows = lifetimes.len(), path = %path.display(), "wrote lifetime table");
    Ok(())
}
