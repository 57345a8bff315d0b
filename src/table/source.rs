use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::scan::normalize::RawRecord;

/// Accepted history header spellings, matched case-insensitively.
const UNIT_HEADERS: &[&str] = &["sn", "serial", "serial_number", "unit_id"];
const SLOT_HEADERS: &[&str] = &["location", "slot", "slot_id"];
const INSERT_HEADERS: &[&str] = &["insert", "insert_time", "inserted"];
const REMOVE_HEADERS: &[&str] = &["remove", "remove_time", "removed"];

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim().to_ascii_lowercase();
        names.contains(&header.as_str())
    })
}

fn cell(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Read the inventory history table. Empty cells become None; raw line
/// numbers are preserved for reject diagnostics. An empty table aborts
/// the run, there is nothing to reconcile.
pub fn read_history(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening history file {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("reading history header from {}", path.display()))?
        .clone();
    let unit_col = match find_column(&headers, UNIT_HEADERS) {
        Some(idx) => idx,
        None => bail!(
            "history file {} has no serial-number column (expected one of {:?})",
            path.display(),
            UNIT_HEADERS
        ),
    };
    let slot_col = match find_column(&headers, SLOT_HEADERS) {
        Some(idx) => idx,
        None => bail!(
            "history file {} has no location column (expected one of {:?})",
            path.display(),
            SLOT_HEADERS
        ),
    };
    let insert_col = match find_column(&headers, INSERT_HEADERS) {
        Some(idx) => idx,
        None => bail!(
            "history file {} has no insert column (expected one of {:?})",
            path.display(),
            INSERT_HEADERS
        ),
    };
    let remove_col = match find_column(&headers, REMOVE_HEADERS) {
        Some(idx) => idx,
        None => bail!(
            "history file {} has no remove column (expected one of {:?})",
            path.display(),
            REMOVE_HEADERS
        ),
    };

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("reading {} row {}", path.display(), idx + 2))?;
        records.push(RawRecord {
            unit_id: cell(&row, unit_col),
            slot_id: cell(&row, slot_col),
            insert: cell(&row, insert_col),
            remove: cell(&row, remove_col),
            // Header occupies line 1.
            line: idx + 2,
        });
    }
    if records.is_empty() {
        bail!("history file {} contains no records", path.display());
    }
    debug!(records = records.len(), path = %path.display(), "read history table");
    Ok(records)
}

/// Read the service-slot reference table. Uses the location column when
/// one is named, the first column otherwise. An empty set is allowed.
pub fn read_service_slots(path: &Path) -> Result<BTreeSet<String>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening service-slot file {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("reading service-slot header from {}", path.display()))?
        .clone();
    let slot_col = find_column(&headers, SLOT_HEADERS).unwrap_or(0);

    let mut slots = BTreeSet::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("reading {} row {}", path.display(), idx + 2))?;
        if let Some(slot) = cell(&row, slot_col) {
            slots.insert(slot);
        }
    }
    debug!(slots = slots.len(), path = %path.display(), "read service-slot table");
    Ok(slots)
}
