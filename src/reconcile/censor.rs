//! Terminal-event classification and right-censoring.
//!
//! Runs on the survivors of both resolver passes. An interval ends in a
//! recorded event when a failure or removal marker lands exactly on its
//! (unit, slot, end) coordinate; it ends in relocation when the same unit
//! is observed again later; otherwise it is right-censored, whether the
//! window closed on it or the unit simply vanished from the scans.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::reconcile::interval::{EventMarker, LifeInterval, TerminalEvent};
use crate::scan::event::EventKind;

/// Classification tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CensorStats {
    pub failure_terminated: usize,
    pub removed_terminated: usize,
    pub relocated: usize,
    /// Last interval ending at the latest surviving end overall.
    pub censored_at_close: usize,
    /// Last interval ending before the latest surviving end; the unit
    /// disappeared from later scans without a recorded event.
    pub censored_vanished: usize,
    /// Terminal marker on a non-final interval. The record is kept as-is;
    /// the count surfaces the inconsistency.
    pub terminal_then_reappeared: usize,
}

/// Classifier output.
#[derive(Debug, Clone, Default)]
pub struct CensorOutput {
    pub intervals: Vec<LifeInterval>,
    pub stats: CensorStats,
    /// Latest end across all surviving intervals; the close of the
    /// observation window.
    pub last_inventory: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default)]
struct MarkerMatch {
    failure: bool,
    removed: bool,
}

/// Classify every surviving interval. Intervals come back ordered by
/// (unit, start).
pub fn classify(mut intervals: Vec<LifeInterval>, markers: &[EventMarker]) -> CensorOutput {
    let last_inventory = intervals.iter().map(|iv| iv.end).max();

    let mut terminal_marks: HashMap<(&str, &str, NaiveDateTime), MarkerMatch> = HashMap::new();
    for marker in markers {
        let entry = terminal_marks
            .entry((
                marker.unit_id.as_str(),
                marker.slot_id.as_str(),
                marker.timestamp,
            ))
            .or_default();
        match marker.kind {
            EventKind::Failure => entry.failure = true,
            EventKind::Removed => entry.removed = true,
            _ => {}
        }
    }

    intervals.sort_by(|a, b| {
        (a.unit_id.as_str(), a.start, a.end, a.slot_id.as_str()).cmp(&(
            b.unit_id.as_str(),
            b.start,
            b.end,
            b.slot_id.as_str(),
        ))
    });

    let mut stats = CensorStats::default();
    let mut i = 0;
    while i < intervals.len() {
        let mut j = i + 1;
        while j < intervals.len() && intervals[j].unit_id == intervals[i].unit_id {
            j += 1;
        }
        for idx in i..j {
            let is_last = idx == j - 1;
            let mark = terminal_marks
                .get(&(
                    intervals[idx].unit_id.as_str(),
                    intervals[idx].slot_id.as_str(),
                    intervals[idx].end,
                ))
                .copied()
                .unwrap_or_default();

            let interval = &mut intervals[idx];
            if mark.failure || mark.removed {
                // Failure wins when one endpoint carries both kinds.
                if mark.failure {
                    interval.terminal_event = Some(TerminalEvent::Failure);
                    stats.failure_terminated += 1;
                } else {
                    interval.terminal_event = Some(TerminalEvent::Removed);
                    stats.removed_terminated += 1;
                }
                interval.censored = false;
                if !is_last {
                    stats.terminal_then_reappeared += 1;
                    warn!(
                        unit = %interval.unit_id,
                        slot = %interval.slot_id,
                        end = %interval.end,
                        "terminal event recorded but unit observed again later"
                    );
                }
            } else if !is_last {
                interval.terminal_event = Some(TerminalEvent::Relocation);
                interval.censored = false;
                stats.relocated += 1;
            } else {
                interval.terminal_event = None;
                interval.censored = true;
                if Some(interval.end) == last_inventory {
                    stats.censored_at_close += 1;
                } else {
                    stats.censored_vanished += 1;
                }
            }
        }
        i = j;
    }

    CensorOutput {
        intervals,
        stats,
        last_inventory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::parse::parse_timestamp;

    const U1: &str = "0320813034669";
    const U2: &str = "0320813034670";
    const S1: &str = "c0-0c0s0n0";
    const S2: &str = "c1-0c0s0n0";

    fn day(d: u32) -> NaiveDateTime {
        parse_timestamp(&format!("2015-01-{d:02}T00:00:00")).expect("test timestamp parses")
    }

    fn iv(unit: &str, slot: &str, start: u32, end: u32) -> LifeInterval {
        LifeInterval::new(unit, slot, day(start), day(end))
    }

    fn mark(unit: &str, slot: &str, at: u32, kind: EventKind) -> EventMarker {
        EventMarker {
            unit_id: unit.to_string(),
            slot_id: slot.to_string(),
            timestamp: day(at),
            kind,
        }
    }

    #[test]
    fn test_failure_marker_terminates_interval() {
        let out = classify(
            vec![iv(U1, S1, 1, 10)],
            &[mark(U1, S1, 10, EventKind::Failure)],
        );
        let interval = &out.intervals[0];
        assert_eq!(interval.terminal_event, Some(TerminalEvent::Failure));
        assert!(!interval.censored);
        assert_eq!(out.stats.failure_terminated, 1);
    }

    #[test]
    fn test_removed_marker_terminates_interval() {
        let out = classify(
            vec![iv(U1, S1, 1, 10)],
            &[mark(U1, S1, 10, EventKind::Removed)],
        );
        assert_eq!(out.intervals[0].terminal_event, Some(TerminalEvent::Removed));
        assert_eq!(out.stats.removed_terminated, 1);
    }

    #[test]
    fn test_failure_wins_double_match() {
        let out = classify(
            vec![iv(U1, S1, 1, 10)],
            &[
                mark(U1, S1, 10, EventKind::Removed),
                mark(U1, S1, 10, EventKind::Failure),
            ],
        );
        assert_eq!(out.intervals[0].terminal_event, Some(TerminalEvent::Failure));
    }

    #[test]
    fn test_marker_must_match_slot_and_end() {
        let out = classify(
            vec![iv(U1, S1, 1, 10)],
            &[
                mark(U1, S2, 10, EventKind::Failure),
                mark(U1, S1, 9, EventKind::Failure),
            ],
        );
        assert_eq!(out.intervals[0].terminal_event, None);
        assert!(out.intervals[0].censored);
    }

    #[test]
    fn test_non_last_interval_relocates() {
        let out = classify(vec![iv(U1, S1, 1, 10), iv(U1, S2, 12, 20)], &[]);
        assert_eq!(
            out.intervals[0].terminal_event,
            Some(TerminalEvent::Relocation)
        );
        assert!(!out.intervals[0].censored);
        assert_eq!(out.intervals[1].terminal_event, None);
        assert!(out.intervals[1].censored);
        assert_eq!(out.stats.relocated, 1);
        assert_eq!(out.stats.censored_at_close, 1);
    }

    #[test]
    fn test_vanished_unit_is_censored_before_close() {
        let out = classify(vec![iv(U1, S1, 1, 10), iv(U2, S2, 1, 20)], &[]);
        assert_eq!(out.last_inventory, Some(day(20)));
        let u1 = out
            .intervals
            .iter()
            .find(|iv| iv.unit_id == U1)
            .expect("u1 present");
        assert!(u1.censored);
        assert_eq!(u1.terminal_event, None);
        assert_eq!(out.stats.censored_vanished, 1);
        assert_eq!(out.stats.censored_at_close, 1);
    }

    #[test]
    fn test_terminal_then_reappeared_is_kept_and_counted() {
        let out = classify(
            vec![iv(U1, S1, 1, 10), iv(U1, S2, 12, 20)],
            &[mark(U1, S1, 10, EventKind::Failure)],
        );
        assert_eq!(
            out.intervals[0].terminal_event,
            Some(TerminalEvent::Failure)
        );
        assert_eq!(out.stats.terminal_then_reappeared, 1);
        assert!(out.intervals[1].censored);
    }

    #[test]
    fn test_empty_input() {
        let out = classify(vec![], &[]);
        assert!(out.intervals.is_empty());
        assert_eq!(out.last_inventory, None);
        assert_eq!(out.stats, CensorStats::default());
    }
}
