//! Overlap detection and resolution within a grouping key.
//!
//! A periodic physical inventory cannot observe a unit in two places at
//! once, and a slot cannot hold two units at once. Candidate intervals
//! that overlap within a grouping key are therefore inventory artifacts.
//! Detection is a single sorted scan per group that tracks the running
//! maximum end, so flagging covers whole connected runs: if A overlaps B
//! and B overlaps C, all three are flagged even when A and C are disjoint.
//! The same scan runs twice with different keys and removal policies.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::reconcile::interval::LifeInterval;

/// Which identifier the resolver groups intervals by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Unit,
    Slot,
}

impl GroupKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Slot => "slot",
        }
    }

    fn of<'a>(self, interval: &'a LifeInterval) -> &'a str {
        match self {
            Self::Unit => &interval.unit_id,
            Self::Slot => &interval.slot_id,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How flagged intervals are removed from a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// One flagged interval discredits the whole group: every interval in
    /// a group containing a flag is dropped. Used for the unit pass,
    /// where a serial seen in two places at once discredits that unit's
    /// entire location history.
    DropWholeGroup,
    /// Only the flagged intervals are dropped; unflagged group-mates
    /// survive. Used for the slot pass, where a conflict is local and
    /// the owning units' other intervals remain trustworthy.
    DropFlaggedOnly,
}

impl RemovalPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropWholeGroup => "drop_whole_group",
            Self::DropFlaggedOnly => "drop_flagged_only",
        }
    }
}

/// Per-pass accounting, surfaced in the pipeline report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub before: usize,
    pub flagged: usize,
    pub dropped: usize,
    pub after: usize,
    pub groups: usize,
    pub affected_groups: usize,
}

/// Resolver output. Survivors are ordered by group key, then start.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub survivors: Vec<LifeInterval>,
    pub dropped: Vec<LifeInterval>,
    pub stats: ResolveStats,
}

/// Detect overlapping runs within each key group and remove conflicts
/// according to the policy.
pub fn resolve(intervals: Vec<LifeInterval>, key: GroupKey, policy: RemovalPolicy) -> Resolution {
    let mut resolution = Resolution {
        stats: ResolveStats {
            before: intervals.len(),
            ..ResolveStats::default()
        },
        ..Resolution::default()
    };

    let mut groups: BTreeMap<String, Vec<LifeInterval>> = BTreeMap::new();
    for interval in intervals {
        groups
            .entry(key.of(&interval).to_string())
            .or_default()
            .push(interval);
    }
    resolution.stats.groups = groups.len();

    for (group_key, mut group) in groups {
        let flagged = flag_runs(&mut group);
        resolution.stats.flagged += flagged;
        if flagged > 0 {
            resolution.stats.affected_groups += 1;
            debug!(
                key = %key,
                group = %group_key,
                intervals = group.len(),
                flagged,
                policy = policy.as_str(),
                "overlap run flagged"
            );
        }
        match policy {
            RemovalPolicy::DropWholeGroup if flagged > 0 => {
                resolution.dropped.extend(group);
            }
            _ => {
                for interval in group {
                    if interval.overlap_flag {
                        resolution.dropped.push(interval);
                    } else {
                        resolution.survivors.push(interval);
                    }
                }
            }
        }
    }

    resolution.stats.dropped = resolution.dropped.len();
    resolution.stats.after = resolution.survivors.len();
    resolution
}

/// Sort a group by (start, end) and flag every member of each maximal
/// run of transitively overlapping intervals. Touching endpoints do not
/// overlap. Returns the number of intervals flagged.
fn flag_runs(group: &mut [LifeInterval]) -> usize {
    group.sort_by_key(|iv| (iv.start, iv.end));
    let mut flagged = 0;
    let mut run_start = 0;
    let mut run_max_end = match group.first() {
        Some(first) => first.end,
        None => return 0,
    };

    for i in 1..=group.len() {
        let extends_run = group
            .get(i)
            .map(|iv| iv.start < run_max_end)
            .unwrap_or(false);
        if extends_run {
            // `end` is not monotone in start order; a long early interval
            // can swallow several short later ones.
            if group[i].end > run_max_end {
                run_max_end = group[i].end;
            }
            continue;
        }
        if i - run_start >= 2 {
            for member in &mut group[run_start..i] {
                member.overlap_flag = true;
            }
            flagged += i - run_start;
        }
        if let Some(next) = group.get(i) {
            run_start = i;
            run_max_end = next.end;
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::parse::parse_timestamp;
    use chrono::NaiveDateTime;

    const U1: &str = "0320813034669";
    const U2: &str = "0320813034670";
    const S1: &str = "c0-0c0s0n0";
    const S2: &str = "c1-0c0s0n0";
    const S3: &str = "c2-0c0s0n0";

    fn day(d: u32) -> NaiveDateTime {
        parse_timestamp(&format!("2015-01-{d:02}T00:00:00")).expect("test timestamp parses")
    }

    fn iv(unit: &str, slot: &str, start: u32, end: u32) -> LifeInterval {
        LifeInterval::new(unit, slot, day(start), day(end))
    }

    fn assert_no_overlap_within(key: GroupKey, intervals: &[LifeInterval]) {
        for a in intervals {
            for b in intervals {
                if std::ptr::eq(a, b) {
                    continue;
                }
                let same_group = match key {
                    GroupKey::Unit => a.unit_id == b.unit_id,
                    GroupKey::Slot => a.slot_id == b.slot_id,
                };
                if same_group {
                    assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_disjoint_intervals_survive_unflagged() {
        let res = resolve(
            vec![iv(U1, S1, 1, 5), iv(U1, S2, 6, 10), iv(U2, S1, 2, 8)],
            GroupKey::Unit,
            RemovalPolicy::DropWholeGroup,
        );
        assert_eq!(res.stats.flagged, 0);
        assert_eq!(res.stats.dropped, 0);
        assert_eq!(res.survivors.len(), 3);
        assert_eq!(res.stats.groups, 2);
        assert_eq!(res.stats.affected_groups, 0);
    }

    #[test]
    fn test_touching_endpoints_do_not_overlap() {
        let res = resolve(
            vec![iv(U1, S1, 1, 5), iv(U1, S2, 5, 9)],
            GroupKey::Unit,
            RemovalPolicy::DropWholeGroup,
        );
        assert_eq!(res.stats.flagged, 0);
        assert_eq!(res.survivors.len(), 2);
    }

    #[test]
    fn test_whole_group_drop_takes_clean_group_mates() {
        // Two conflicting sightings plus one clean later interval; the
        // unit's whole history goes.
        let res = resolve(
            vec![iv(U1, S1, 1, 10), iv(U1, S2, 5, 12), iv(U1, S3, 20, 25)],
            GroupKey::Unit,
            RemovalPolicy::DropWholeGroup,
        );
        assert_eq!(res.stats.flagged, 2);
        assert_eq!(res.stats.dropped, 3);
        assert!(res.survivors.is_empty());
        assert_eq!(res.stats.affected_groups, 1);
    }

    #[test]
    fn test_flagged_only_drop_keeps_group_mates() {
        let res = resolve(
            vec![iv(U1, S1, 1, 10), iv(U2, S1, 5, 12), iv(U1, S1, 20, 25)],
            GroupKey::Slot,
            RemovalPolicy::DropFlaggedOnly,
        );
        assert_eq!(res.stats.flagged, 2);
        assert_eq!(res.stats.dropped, 2);
        assert_eq!(res.survivors.len(), 1);
        assert_eq!(res.survivors[0].start, day(20));
        assert!(res.dropped.iter().all(|iv| iv.overlap_flag));
    }

    #[test]
    fn test_transitive_run_flags_non_adjacent_members() {
        // The third interval overlaps the first but not the second; an
        // adjacent-pair scan would miss it.
        let res = resolve(
            vec![iv(U1, S1, 1, 10), iv(U1, S2, 2, 3), iv(U1, S3, 4, 5)],
            GroupKey::Unit,
            RemovalPolicy::DropFlaggedOnly,
        );
        assert_eq!(res.stats.flagged, 3);
        assert!(res.survivors.is_empty());
    }

    #[test]
    fn test_chained_run_flags_all_members() {
        // A-B overlap and B-C overlap; A and C are disjoint but belong to
        // the same connected run.
        let res = resolve(
            vec![iv(U1, S1, 1, 5), iv(U1, S2, 4, 8), iv(U1, S3, 7, 11)],
            GroupKey::Unit,
            RemovalPolicy::DropFlaggedOnly,
        );
        assert_eq!(res.stats.flagged, 3);
    }

    #[test]
    fn test_runs_reset_between_gaps() {
        let res = resolve(
            vec![
                iv(U1, S1, 1, 5),
                iv(U1, S2, 3, 6),
                iv(U1, S1, 10, 15),
                iv(U1, S2, 20, 25),
            ],
            GroupKey::Unit,
            RemovalPolicy::DropFlaggedOnly,
        );
        assert_eq!(res.stats.flagged, 2);
        assert_eq!(res.survivors.len(), 2);
        assert_no_overlap_within(GroupKey::Unit, &res.survivors);
    }

    #[test]
    fn test_groups_are_isolated() {
        // U1's conflict must not touch U2's clean history.
        let res = resolve(
            vec![iv(U1, S1, 1, 10), iv(U1, S2, 5, 12), iv(U2, S3, 2, 8)],
            GroupKey::Unit,
            RemovalPolicy::DropWholeGroup,
        );
        assert_eq!(res.survivors.len(), 1);
        assert_eq!(res.survivors[0].unit_id, U2);
    }

    #[test]
    fn test_counts_reconcile() {
        let res = resolve(
            vec![
                iv(U1, S1, 1, 10),
                iv(U1, S2, 5, 12),
                iv(U2, S1, 1, 4),
                iv(U2, S2, 6, 9),
            ],
            GroupKey::Unit,
            RemovalPolicy::DropWholeGroup,
        );
        assert_eq!(res.stats.before, 4);
        assert_eq!(res.stats.after + res.stats.dropped, res.stats.before);
        assert_eq!(res.survivors.len(), res.stats.after);
        assert_eq!(res.dropped.len(), res.stats.dropped);
    }

    #[test]
    fn test_survivors_sorted_by_key_then_start() {
        let res = resolve(
            vec![iv(U2, S1, 6, 9), iv(U1, S1, 3, 4), iv(U1, S2, 1, 2)],
            GroupKey::Unit,
            RemovalPolicy::DropFlaggedOnly,
        );
        let order: Vec<(&str, NaiveDateTime)> = res
            .survivors
            .iter()
            .map(|iv| (iv.unit_id.as_str(), iv.start))
            .collect();
        assert_eq!(order, vec![(U1, day(1)), (U1, day(3)), (U2, day(6))]);
    }
}
