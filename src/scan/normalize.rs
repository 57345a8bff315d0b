//! Record normalization: raw scan rows in, typed observations out.
//!
//! Identifier fill is an explicit fold over the records in log order. The
//! carried state holds the most recent format-valid unit serial and slot
//! address; a record missing an identifier takes the carried value, and a
//! record arriving before any valid value is rejected. Malformed
//! identifiers reject their record and never enter the carry state, so a
//! bad scan line cannot poison the records after it.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

use crate::scan::event::EventKind;
use crate::scan::parse::{self, ParseError};
use crate::scan::slot::{self, SlotAddress};

/// One raw history row as read from the source table. Empty cells arrive
/// as None; `line` is the 1-based source line kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub unit_id: Option<String>,
    pub slot_id: Option<String>,
    pub insert: Option<String>,
    pub remove: Option<String>,
    pub line: usize,
}

/// A normalized observation. Identifiers are present, format-valid and in
/// canonical form; at least one timestamp is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub unit_id: String,
    pub slot_id: String,
    pub insert: Option<NaiveDateTime>,
    pub remove: Option<NaiveDateTime>,
    pub kind: EventKind,
    pub line: usize,
}

/// Why a raw record was rejected. Rejects are collected and counted,
/// never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("unit id {value:?} is not a 13-digit serial")]
    MalformedUnitId { value: String },
    #[error("slot id {value:?} does not match the slot grammar")]
    MalformedSlotId { value: String },
    #[error("missing {field} with no prior record to fill from")]
    UnresolvedIdentifier { field: &'static str },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RejectReason {
    /// Canonical label used in logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedUnitId { .. } => "malformed_unit_id",
            Self::MalformedSlotId { .. } => "malformed_slot_id",
            Self::UnresolvedIdentifier { .. } => "unresolved_identifier",
            Self::Parse(ParseError::UnknownTag { .. }) => "unknown_tag",
            Self::Parse(ParseError::NoTimestamp) => "no_timestamp",
            Self::Parse(ParseError::ReversedTimestamps { .. }) => "reversed_timestamps",
        }
    }
}

/// A rejected record: source line plus typed reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub line: usize,
    pub reason: RejectReason,
}

/// Reject tallies by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectCounts {
    pub malformed_unit_id: usize,
    pub malformed_slot_id: usize,
    pub unresolved_identifier: usize,
    pub unknown_tag: usize,
    pub no_timestamp: usize,
    pub reversed_timestamps: usize,
}

impl RejectCounts {
    fn record(&mut self, reason: &RejectReason) {
        match reason {
            RejectReason::MalformedUnitId { .. } => self.malformed_unit_id += 1,
            RejectReason::MalformedSlotId { .. } => self.malformed_slot_id += 1,
            RejectReason::UnresolvedIdentifier { .. } => self.unresolved_identifier += 1,
            RejectReason::Parse(ParseError::UnknownTag { .. }) => self.unknown_tag += 1,
            RejectReason::Parse(ParseError::NoTimestamp) => self.no_timestamp += 1,
            RejectReason::Parse(ParseError::ReversedTimestamps { .. }) => {
                self.reversed_timestamps += 1
            }
        }
    }

    pub fn total(&self) -> usize {
        self.malformed_unit_id
            + self.malformed_slot_id
            + self.unresolved_identifier
            + self.unknown_tag
            + self.no_timestamp
            + self.reversed_timestamps
    }
}

/// Normalizer output: surviving observations plus full reject accounting.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub observations: Vec<Observation>,
    pub rejects: Vec<RejectedRecord>,
    pub counts: RejectCounts,
}

/// Identifier carry-forward state.
#[derive(Debug, Clone, Default)]
struct CarriedIds {
    unit: Option<String>,
    slot: Option<String>,
}

/// Normalize raw records in log order.
pub fn normalize(records: &[RawRecord]) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut carried = CarriedIds::default();
    for record in records {
        match normalize_one(record, &mut carried) {
            Ok(obs) => outcome.observations.push(obs),
            Err(reason) => {
                debug!(
                    line = record.line,
                    reason = reason.label(),
                    detail = %reason,
                    "record rejected"
                );
                outcome.counts.record(&reason);
                outcome.rejects.push(RejectedRecord {
                    line: record.line,
                    reason,
                });
            }
        }
    }
    outcome
}

fn normalize_one(record: &RawRecord, carried: &mut CarriedIds) -> Result<Observation, RejectReason> {
    // Both identifier columns are resolved before the first error
    // propagates, so a reject in one column cannot suppress a valid
    // carry update in the other.
    let unit = resolve_unit(record.unit_id.as_deref(), &mut carried.unit);
    let slot = resolve_slot(record.slot_id.as_deref(), &mut carried.slot);
    let unit_id = unit?;
    let slot_id = slot?;

    let insert = parse::parse_field(record.insert.as_deref())?;
    let remove = parse::parse_field(record.remove.as_deref())?;
    let classified = parse::classify(insert, remove)?;

    Ok(Observation {
        unit_id,
        slot_id,
        insert: classified.insert,
        remove: classified.remove,
        kind: classified.kind,
        line: record.line,
    })
}

fn resolve_unit(raw: Option<&str>, carried: &mut Option<String>) -> Result<String, RejectReason> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => {
            if !slot::is_valid_unit_id(value) {
                return Err(RejectReason::MalformedUnitId {
                    value: value.to_string(),
                });
            }
            *carried = Some(value.to_string());
            Ok(value.to_string())
        }
        None => carried.clone().ok_or(RejectReason::UnresolvedIdentifier {
            field: "unit_id",
        }),
    }
}

fn resolve_slot(raw: Option<&str>, carried: &mut Option<String>) -> Result<String, RejectReason> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => match SlotAddress::parse(value) {
            // Stored in canonical form so zero-padded spellings of one
            // physical slot group together.
            Some(addr) => {
                let canonical = addr.to_string();
                *carried = Some(canonical.clone());
                Ok(canonical)
            }
            None => Err(RejectReason::MalformedSlotId {
                value: value.to_string(),
            }),
        },
        None => carried.clone().ok_or(RejectReason::UnresolvedIdentifier {
            field: "slot_id",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(
        line: usize,
        unit: Option<&str>,
        slot: Option<&str>,
        insert: Option<&str>,
        remove: Option<&str>,
    ) -> RawRecord {
        RawRecord {
            unit_id: unit.map(String::from),
            slot_id: slot.map(String::from),
            insert: insert.map(String::from),
            remove: remove.map(String::from),
            line,
        }
    }

    const U1: &str = "0320813034669";
    const U2: &str = "0320813034670";
    const S1: &str = "c0-0c0s0n0";
    const S2: &str = "c1-0c1s2n3";

    #[test]
    fn test_forward_fill_takes_most_recent_valid() {
        let records = vec![
            raw(1, Some(U1), Some(S1), Some("2015-01-01T00:00:00"), Some("2015-02-01T00:00:00")),
            raw(2, None, None, Some("2015-03-01T00:00:00"), Some("2015-04-01T00:00:00")),
            raw(3, Some(U2), Some(S2), Some("2015-05-01T00:00:00"), Some("2015-06-01T00:00:00")),
            raw(4, None, None, Some("2015-07-01T00:00:00"), Some("2015-08-01T00:00:00")),
        ];
        let outcome = normalize(&records);
        assert_eq!(outcome.rejects.len(), 0);
        assert_eq!(outcome.observations.len(), 4);
        assert_eq!(outcome.observations[1].unit_id, U1);
        assert_eq!(outcome.observations[1].slot_id, S1);
        assert_eq!(outcome.observations[3].unit_id, U2);
        assert_eq!(outcome.observations[3].slot_id, S2);
    }

    #[test]
    fn test_missing_identifier_before_any_valid_rejects() {
        let records = vec![raw(
            1,
            None,
            Some(S1),
            Some("2015-01-01T00:00:00"),
            Some("2015-02-01T00:00:00"),
        )];
        let outcome = normalize(&records);
        assert!(outcome.observations.is_empty());
        assert_eq!(outcome.counts.unresolved_identifier, 1);
        assert!(matches!(
            outcome.rejects[0].reason,
            RejectReason::UnresolvedIdentifier { field: "unit_id" }
        ));
    }

    #[test]
    fn test_malformed_identifier_never_enters_carry_state() {
        let records = vec![
            raw(1, Some(U1), Some(S1), Some("2015-01-01T00:00:00"), Some("2015-02-01T00:00:00")),
            raw(2, Some("badserial"), Some(S2), Some("2015-03-01T00:00:00"), Some("2015-04-01T00:00:00")),
            raw(3, None, None, Some("2015-05-01T00:00:00"), Some("2015-06-01T00:00:00")),
        ];
        let outcome = normalize(&records);
        assert_eq!(outcome.counts.malformed_unit_id, 1);
        assert_eq!(outcome.observations.len(), 2);
        // Line 3 fills from line 1's unit, not line 2's rejected value.
        // The slot column of line 2 was valid, so it does carry.
        assert_eq!(outcome.observations[1].unit_id, U1);
        assert_eq!(outcome.observations[1].slot_id, S2);
    }

    #[test]
    fn test_slot_ids_are_canonicalized() {
        let records = vec![raw(
            1,
            Some(U1),
            Some("c01-03c0s0n0"),
            Some("2015-01-01T00:00:00"),
            Some("2015-02-01T00:00:00"),
        )];
        let outcome = normalize(&records);
        assert_eq!(outcome.observations[0].slot_id, "c1-3c0s0n0");
    }

    #[test]
    fn test_parse_rejects_are_counted_by_reason() {
        let records = vec![
            raw(1, Some(U1), Some(S1), Some("2015-06-01T00:00:00"), Some("2015-01-01T00:00:00")),
            raw(2, Some(U1), Some(S1), Some("garbage"), Some("2015-01-01T00:00:00")),
            raw(3, Some(U1), Some(S1), Some("dbe"), None),
            raw(4, Some(U1), Some(S1), None, None),
        ];
        let outcome = normalize(&records);
        assert!(outcome.observations.is_empty());
        assert_eq!(outcome.counts.reversed_timestamps, 1);
        assert_eq!(outcome.counts.unknown_tag, 1);
        assert_eq!(outcome.counts.no_timestamp, 2);
        assert_eq!(outcome.counts.total(), outcome.rejects.len());
    }

    #[test]
    fn test_kinds_assigned() {
        let records = vec![
            raw(1, Some(U1), Some(S1), Some("2015-01-01T00:00:00"), Some("2015-02-01T00:00:00")),
            raw(2, Some(U1), Some(S1), Some("2015-03-01T00:00:00"), Some("2015-03-01T00:00:00")),
            raw(3, Some(U1), Some(S1), Some("2015-04-01T00:00:00"), Some("DBE")),
            raw(4, Some(U1), Some(S1), Some("otb"), Some("2015-05-01T00:00:00")),
            raw(5, Some(U1), Some(S1), Some("2015-06-01T00:00:00"), None),
            raw(6, Some(U1), Some(S1), None, Some("2015-07-01T00:00:00")),
        ];
        let outcome = normalize(&records);
        let kinds: Vec<EventKind> = outcome.observations.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Life,
                EventKind::ZeroLife,
                EventKind::Failure,
                EventKind::Removed,
                EventKind::OpenEnd,
                EventKind::OpenStart,
            ]
        );
    }

    #[test]
    fn test_empty_strings_are_missing() {
        let records = vec![
            raw(1, Some(U1), Some(S1), Some("2015-01-01T00:00:00"), Some("2015-02-01T00:00:00")),
            raw(2, Some(""), Some("  "), Some("2015-03-01T00:00:00"), Some("2015-04-01T00:00:00")),
        ];
        let outcome = normalize(&records);
        assert_eq!(outcome.observations.len(), 2);
        assert_eq!(outcome.observations[1].unit_id, U1);
        assert_eq!(outcome.observations[1].slot_id, S1);
    }
}
