use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::scan::event::EventKind;
use crate::scan::normalize::Observation;

/// Why a retained life interval ended. Set by the censoring classifier;
/// right-censored intervals carry None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalEvent {
    /// Hardware fault recorded at the interval's end.
    Failure,
    /// Deliberate removal recorded at the interval's end.
    Removed,
    /// No recorded event, but the unit was observed again later.
    Relocation,
}

impl TerminalEvent {
    /// Canonical label used in logs and output tables.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Removed => "removed",
            Self::Relocation => "relocation",
        }
    }
}

impl fmt::Display for TerminalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous occupancy of a slot by a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifeInterval {
    pub unit_id: String,
    pub slot_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Set by the overlap resolver when this interval is part of an
    /// overlapping run within a grouping key.
    pub overlap_flag: bool,
    pub terminal_event: Option<TerminalEvent>,
    pub censored: bool,
}

impl LifeInterval {
    pub fn new(unit_id: &str, slot_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            slot_id: slot_id.to_string(),
            start,
            end,
            overlap_flag: false,
            terminal_event: None,
            censored: false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Strict temporal overlap. Touching endpoints (one interval starting
    /// exactly when another ends) do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A non-Life observation kept for terminal-event association and
/// last-seen tracking. `kind` is never [`EventKind::Life`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMarker {
    pub unit_id: String,
    pub slot_id: String,
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
}

/// Per-kind build tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildCounts {
    pub intervals: usize,
    pub zero_life: usize,
    pub failure: usize,
    pub removed: usize,
    pub open_start: usize,
    pub open_end: usize,
}

impl BuildCounts {
    fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::Life => self.intervals += 1,
            EventKind::ZeroLife => self.zero_life += 1,
            EventKind::Failure => self.failure += 1,
            EventKind::Removed => self.removed += 1,
            EventKind::OpenStart => self.open_start += 1,
            EventKind::OpenEnd => self.open_end += 1,
        }
    }

    pub fn markers(&self) -> usize {
        self.zero_life + self.failure + self.removed + self.open_start + self.open_end
    }
}

/// Interval builder output.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub intervals: Vec<LifeInterval>,
    pub markers: Vec<EventMarker>,
    pub counts: BuildCounts,
}

/// Turn normalized observations into candidate life intervals and event
/// markers. Life observations become intervals; every other kind becomes
/// a marker anchored at the record's single reference instant.
pub fn build(observations: &[Observation]) -> BuildOutput {
    let mut out = BuildOutput::default();
    for obs in observations {
        match obs.kind {
            EventKind::Life => {
                if let (Some(start), Some(end)) = (obs.insert, obs.remove) {
                    out.counts.record(EventKind::Life);
                    out.intervals
                        .push(LifeInterval::new(&obs.unit_id, &obs.slot_id, start, end));
                }
            }
            kind => {
                if let Some(at) = obs.insert.or(obs.remove) {
                    out.counts.record(kind);
                    out.markers.push(EventMarker {
                        unit_id: obs.unit_id.clone(),
                        slot_id: obs.slot_id.clone(),
                        timestamp: at,
                        kind,
                    });
                }
            }
        }
    }
    out
}
