use std::collections::BTreeSet;

use tracing::warn;

use crate::scan::normalize::Observation;
use crate::scan::slot::SlotAddress;

/// The reference set of non-GPU service slots. Slot ids are held in
/// canonical form so they match normalized observations.
#[derive(Debug, Clone, Default)]
pub struct ServiceSlots {
    slots: BTreeSet<String>,
}

impl ServiceSlots {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let slots = raw
            .into_iter()
            .map(|s| match SlotAddress::parse(s.as_ref()) {
                Some(addr) => addr.to_string(),
                // Kept verbatim; it can never match a validated
                // observation and will surface as drift.
                None => s.as_ref().trim().to_string(),
            })
            .collect();
        Self { slots }
    }

    pub fn contains(&self, slot_id: &str) -> bool {
        self.slots.contains(slot_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Filter output.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub observations: Vec<Observation>,
    pub filtered: usize,
    /// Reference service slots never observed in the data. A non-empty
    /// list means the reference file and the scans disagree about the
    /// machine's layout.
    pub unobserved: Vec<String>,
}

/// Drop observations located at service slots. Must run after identifier
/// normalization: service records still carry identifiers forward for the
/// records after them.
pub fn filter(observations: Vec<Observation>, service: &ServiceSlots) -> FilterOutcome {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut kept = Vec::with_capacity(observations.len());
    let mut filtered = 0;
    for obs in &observations {
        seen.insert(obs.slot_id.as_str());
    }
    let unobserved: Vec<String> = service
        .slots
        .iter()
        .filter(|slot| !seen.contains(slot.as_str()))
        .cloned()
        .collect();
    if !unobserved.is_empty() {
        warn!(
            count = unobserved.len(),
            "reference service slots never observed in the scan data"
        );
    }

    for obs in observations {
        if service.contains(&obs.slot_id) {
            filtered += 1;
        } else {
            kept.push(obs);
        }
    }

    FilterOutcome {
        observations: kept,
        filtered,
        unobserved,
    }
}
