//! The reconciliation engine: stage wiring and run diagnostics.
//!
//! Stages run in a fixed order on in-memory data: normalize, service
//! filter, interval build, unit-keyed overlap pass, slot-keyed overlap
//! pass, censoring, lifetime aggregation. Nothing here touches files;
//! the table adapters feed and drain the pipeline.

pub mod censor;
pub mod interval;
pub mod lifetime;
pub mod overlap;
pub mod service;

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use tracing::info;

use crate::scan::normalize::{self, RawRecord, RejectCounts};

use self::censor::CensorStats;
use self::interval::{BuildCounts, LifeInterval};
use self::lifetime::UnitLifetime;
use self::overlap::{GroupKey, RemovalPolicy, ResolveStats};
use self::service::ServiceSlots;

/// Counts from every stage of one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub records_in: usize,
    pub observations: usize,
    pub rejects: RejectCounts,
    pub service_filtered: usize,
    pub service_unobserved: Vec<String>,
    pub build: BuildCounts,
    pub unit_pass: ResolveStats,
    pub slot_pass: ResolveStats,
    pub censor: CensorStats,
    pub last_inventory: Option<NaiveDateTime>,
    /// Units with at least one surviving interval; the lifetime row count.
    pub units: usize,
    /// Units that only ever appear as markers, or whose intervals were
    /// all dropped while markers remain.
    pub marker_only_units: usize,
}

impl PipelineReport {
    pub fn log_summary(&self) {
        info!(
            records = self.records_in,
            observations = self.observations,
            rejected = self.rejects.total(),
            "normalized scan records"
        );
        info!(
            filtered = self.service_filtered,
            unobserved_reference = self.service_unobserved.len(),
            "applied service-slot filter"
        );
        info!(
            intervals = self.build.intervals,
            markers = self.build.markers(),
            zero_life = self.build.zero_life,
            open_start = self.build.open_start,
            open_end = self.build.open_end,
            "built candidate intervals"
        );
        info!(
            before = self.unit_pass.before,
            flagged = self.unit_pass.flagged,
            dropped = self.unit_pass.dropped,
            after = self.unit_pass.after,
            "resolved unit-keyed overlaps"
        );
        info!(
            before = self.slot_pass.before,
            flagged = self.slot_pass.flagged,
            dropped = self.slot_pass.dropped,
            after = self.slot_pass.after,
            "resolved slot-keyed overlaps"
        );
        info!(
            failures = self.censor.failure_terminated,
            removals = self.censor.removed_terminated,
            relocations = self.censor.relocated,
            censored_at_close = self.censor.censored_at_close,
            vanished = self.censor.censored_vanished,
            anomalies = self.censor.terminal_then_reappeared,
            "classified interval terminals"
        );
        info!(
            units = self.units,
            marker_only = self.marker_only_units,
            "aggregated unit lifetimes"
        );
    }
}

/// Engine output: the interval table, the lifetime table and the run
/// report.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub intervals: Vec<LifeInterval>,
    pub lifetimes: Vec<UnitLifetime>,
    pub report: PipelineReport,
}

/// The reconciliation pipeline, configured once per run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    service: ServiceSlots,
    batch_cutoff: NaiveDateTime,
}

impl Pipeline {
    pub fn new(service: ServiceSlots, batch_cutoff: NaiveDateTime) -> Self {
        Self {
            service,
            batch_cutoff,
        }
    }

    /// Run every stage on the given records, in log order.
    pub fn run(&self, records: &[RawRecord]) -> PipelineOutput {
        let mut report = PipelineReport {
            records_in: records.len(),
            ..PipelineReport::default()
        };

        let normalized = normalize::normalize(records);
        report.observations = normalized.observations.len();
        report.rejects = normalized.counts;

        let filtered = service::filter(normalized.observations, &self.service);
        report.service_filtered = filtered.filtered;
        report.service_unobserved = filtered.unobserved;

        let built = interval::build(&filtered.observations);
        report.build = built.counts;

        let unit_pass = overlap::resolve(
            built.intervals,
            GroupKey::Unit,
            RemovalPolicy::DropWholeGroup,
        );
        report.unit_pass = unit_pass.stats;

        let slot_pass = overlap::resolve(
            unit_pass.survivors,
            GroupKey::Slot,
            RemovalPolicy::DropFlaggedOnly,
        );
        report.slot_pass = slot_pass.stats;

        let classified = censor::classify(slot_pass.survivors, &built.markers);
        report.censor = classified.stats;
        report.last_inventory = classified.last_inventory;

        let lifetimes =
            lifetime::aggregate(&classified.intervals, &built.markers, self.batch_cutoff);
        report.units = lifetimes.len();

        let interval_units: BTreeSet<&str> = classified
            .intervals
            .iter()
            .map(|iv| iv.unit_id.as_str())
            .collect();
        report.marker_only_units = built
            .markers
            .iter()
            .map(|m| m.unit_id.as_str())
            .collect::<BTreeSet<&str>>()
            .difference(&interval_units)
            .count();

        report.log_summary();

        PipelineOutput {
            intervals: classified.intervals,
            lifetimes,
            report,
        }
    }
}
