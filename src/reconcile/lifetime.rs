use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::reconcile::interval::{EventMarker, LifeInterval, TerminalEvent};
use crate::scan::event::EventKind;

/// Install cohort relative to the configured cutoff instant. Units whose
/// earliest surviving interval starts strictly before the cutoff are
/// Early; everything else is Late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallBatch {
    Early,
    Late,
}

impl InstallBatch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Late => "late",
        }
    }
}

impl fmt::Display for InstallBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit's merged lifetime across all of its surviving intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitLifetime {
    pub unit_id: String,
    /// Sum of surviving interval durations, not wall-clock span.
    pub total_duration: Duration,
    pub interval_count: usize,
    pub distinct_slot_count: usize,
    /// Slot holding the largest share of the unit's service time. Ties go
    /// to the slot occupied first.
    pub dominant_slot: String,
    /// Dominant share of total service time. None when the total is zero;
    /// never NaN.
    pub dominant_slot_fraction: Option<f64>,
    /// Latest instant the unit was seen: interval ends and marker
    /// timestamps both count.
    pub last_seen: NaiveDateTime,
    pub failure_count: usize,
    pub removed_count: usize,
    pub dominant_failure_count: usize,
    pub dominant_removed_count: usize,
    /// True when no interval ended in failure or removal. Relocation does
    /// not end service.
    pub still_in_service: bool,
    /// The chronologically last interval's censoring flag.
    pub censored: bool,
    pub install_batch: InstallBatch,
}

/// Merge classified intervals into one lifetime row per unit. Units with
/// markers but no surviving intervals produce no row; the pipeline counts
/// them separately. Rows come back ordered by unit id.
pub fn aggregate(
    intervals: &[LifeInterval],
    markers: &[EventMarker],
    batch_cutoff: NaiveDateTime,
) -> Vec<UnitLifetime> {
    let mut by_unit: BTreeMap<&str, Vec<&LifeInterval>> = BTreeMap::new();
    for interval in intervals {
        by_unit.entry(&interval.unit_id).or_default().push(interval);
    }
    let mut marks_by_unit: BTreeMap<&str, Vec<&EventMarker>> = BTreeMap::new();
    for marker in markers {
        marks_by_unit.entry(&marker.unit_id).or_default().push(marker);
    }

    let mut lifetimes = Vec::with_capacity(by_unit.len());
    for (unit_id, mut group) in by_unit {
        group.sort_by_key(|iv| (iv.start, iv.end));
        let unit_marks = marks_by_unit.get(unit_id).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(row) = aggregate_unit(unit_id, &group, unit_marks, batch_cutoff) {
            lifetimes.push(row);
        }
    }
    lifetimes
}

fn aggregate_unit(
    unit_id: &str,
    group: &[&LifeInterval],
    marks: &[&EventMarker],
    batch_cutoff: NaiveDateTime,
) -> Option<UnitLifetime> {
    let total: Duration = group
        .iter()
        .fold(Duration::zero(), |acc, iv| acc + iv.duration());

    // Cumulative service time per slot, in first-occupancy order so that
    // ties resolve to the slot occupied first.
    let mut slot_order: Vec<&str> = Vec::new();
    let mut slot_time: BTreeMap<&str, Duration> = BTreeMap::new();
    for iv in group {
        let entry = slot_time.entry(&iv.slot_id).or_insert_with(|| {
            slot_order.push(&iv.slot_id);
            Duration::zero()
        });
        *entry = *entry + iv.duration();
    }
    let mut dominant_slot = *slot_order.first()?;
    for &slot in slot_order.iter().skip(1) {
        if slot_time[slot] > slot_time[dominant_slot] {
            dominant_slot = slot;
        }
    }
    let dominant_time = slot_time[dominant_slot];
    let dominant_slot_fraction = if total > Duration::zero() {
        Some(dominant_time.num_seconds() as f64 / total.num_seconds() as f64)
    } else {
        None
    };

    let mut failure_count = 0;
    let mut removed_count = 0;
    let mut dominant_failure_count = 0;
    let mut dominant_removed_count = 0;
    for mark in marks {
        match mark.kind {
            EventKind::Failure => {
                failure_count += 1;
                if mark.slot_id == dominant_slot {
                    dominant_failure_count += 1;
                }
            }
            EventKind::Removed => {
                removed_count += 1;
                if mark.slot_id == dominant_slot {
                    dominant_removed_count += 1;
                }
            }
            _ => {}
        }
    }

    let last_end = group.iter().map(|iv| iv.end).max()?;
    let last_seen = marks
        .iter()
        .map(|m| m.timestamp)
        .max()
        .map_or(last_end, |m| last_end.max(m));

    let still_in_service = !group.iter().any(|iv| {
        matches!(
            iv.terminal_event,
            Some(TerminalEvent::Failure) | Some(TerminalEvent::Removed)
        )
    });
    let censored = group.last()?.censored;
    let earliest_start = group.iter().map(|iv| iv.start).min()?;
    let install_batch = if earliest_start < batch_cutoff {
        InstallBatch::Early
    } else {
        InstallBatch::Late
    };

    Some(UnitLifetime {
        unit_id: unit_id.to_string(),
        total_duration: total,
        interval_count: group.len(),
        distinct_slot_count: slot_time.len(),
        dominant_slot: dominant_slot.to_string(),
        dominant_slot_fraction,
        last_seen,
        failure_count,
        removed_count,
        dominant_failure_count,
        dominant_removed_count,
        still_in_service,
        censored,
        install_batch,
    })
}
