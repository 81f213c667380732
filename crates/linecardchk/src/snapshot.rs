//! Counter snapshot model
//!
//! A [`Snapshot`] is one observation of the tracked error counter across every
//! monitored module: `module_id -> group_id -> count`. Modules whose query
//! failed, or whose output held no parseable counter, carry the explicit
//! no-data marker ([`ModuleCounters::no_data`]) so that absence is never read
//! as zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Raw counter reading for one asic group, as reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterObservation {
    /// Asic or port-group identifier within the module
    pub group: String,
    /// Counter value exactly as the device printed it
    pub raw_count: String,
}

impl CounterObservation {
    /// Create a new observation
    pub fn new(group: impl Into<String>, raw_count: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            raw_count: raw_count.into(),
        }
    }
}

/// Counters of a single module.
///
/// Either a non-empty map of per-group counts or the no-data marker. An empty
/// map is never stored; it is folded into the marker on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "Option<BTreeMap<String, u64>>",
    into = "Option<BTreeMap<String, u64>>"
)]
pub struct ModuleCounters(Option<BTreeMap<String, u64>>);

impl ModuleCounters {
    /// Per-group counts; an empty map becomes the no-data marker
    pub fn from_counts(groups: BTreeMap<String, u64>) -> Self {
        if groups.is_empty() {
            Self::no_data()
        } else {
            Self(Some(groups))
        }
    }

    /// The no-data marker (query failed or returned nothing parseable)
    pub fn no_data() -> Self {
        Self(None)
    }

    /// Per-group counts, or `None` for the no-data marker
    pub fn counters(&self) -> Option<&BTreeMap<String, u64>> {
        self.0.as_ref()
    }

    /// Check if this module carries the no-data marker
    pub fn is_no_data(&self) -> bool {
        self.0.is_none()
    }

    /// Sum of all group counts (saturating)
    pub fn total(&self) -> Option<u64> {
        self.counters()
            .map(|groups| groups.values().fold(0u64, |acc, v| acc.saturating_add(*v)))
    }
}

impl From<Option<BTreeMap<String, u64>>> for ModuleCounters {
    fn from(value: Option<BTreeMap<String, u64>>) -> Self {
        value.map_or_else(Self::no_data, Self::from_counts)
    }
}

impl From<ModuleCounters> for Option<BTreeMap<String, u64>> {
    fn from(value: ModuleCounters) -> Self {
        value.0
    }
}

/// One observation of every monitored module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    modules: BTreeMap<String, ModuleCounters>,
}

impl Snapshot {
    /// Snapshot with no modules (device has none of the monitored type)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a snapshot
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Counters of one module
    pub fn module(&self, module: &str) -> Option<&ModuleCounters> {
        self.modules.get(module)
    }

    /// Count for a `(module, group)` pair, `None` if absent or no data
    pub fn count(&self, module: &str, group: &str) -> Option<u64> {
        self.modules
            .get(module)
            .and_then(ModuleCounters::counters)
            .and_then(|groups| groups.get(group).copied())
    }

    /// Iterate modules in module id order
    pub fn modules(&self) -> impl Iterator<Item = (&str, &ModuleCounters)> {
        self.modules.iter().map(|(id, counters)| (id.as_str(), counters))
    }

    /// Iterate every `(module, group, count)` with data, sorted
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.modules.iter().flat_map(|(module, counters)| {
            counters
                .counters()
                .into_iter()
                .flat_map(move |groups| {
                    groups
                        .iter()
                        .map(move |(group, count)| (module.as_str(), group.as_str(), *count))
                })
        })
    }

    /// Module ids carrying the no-data marker
    pub fn no_data_modules(&self) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|(_, counters)| counters.is_no_data())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Number of modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Copy of this snapshot for persisting.
    ///
    /// A module with no data now keeps its counts from `previous`, so a failed
    /// query does not erase the baseline the next run compares against.
    pub fn carry_forward(&self, previous: Option<&Snapshot>) -> Snapshot {
        let mut modules = self.modules.clone();

        if let Some(previous) = previous {
            for (module, counters) in modules.iter_mut() {
                if !counters.is_no_data() {
                    continue;
                }
                if let Some(kept) = previous.modules.get(module).filter(|c| !c.is_no_data()) {
                    *counters = kept.clone();
                }
            }
        }

        Snapshot { modules }
    }
}

/// Builds a [`Snapshot`] from device observations
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    modules: BTreeMap<String, ModuleCounters>,
}

impl SnapshotBuilder {
    /// Record the observations of one module.
    ///
    /// Observations with an unparseable count are dropped. Repeated groups are
    /// summed. A module left with no valid observation gets the no-data marker.
    pub fn module<'a>(
        mut self,
        module: &str,
        observations: impl IntoIterator<Item = &'a CounterObservation>,
    ) -> Self {
        let mut groups: BTreeMap<String, u64> = BTreeMap::new();

        for obs in observations {
            match parse_count(&obs.raw_count) {
                Some(count) => {
                    let slot = groups.entry(obs.group.clone()).or_insert(0);
                    *slot = slot.saturating_add(count);
                }
                None => {
                    warn!(
                        module = %module,
                        group = %obs.group,
                        raw = %obs.raw_count,
                        "Discarding counter with unparseable value"
                    );
                }
            }
        }

        self.modules
            .insert(module.to_string(), ModuleCounters::from_counts(groups));
        self
    }

    /// Record a module whose query failed
    pub fn no_data(mut self, module: &str) -> Self {
        self.modules
            .insert(module.to_string(), ModuleCounters::no_data());
        self
    }

    /// Finish the snapshot
    pub fn build(self) -> Snapshot {
        Snapshot {
            modules: self.modules,
        }
    }
}

/// Parse a device counter value as a non-negative decimal integer
pub fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<u64>().ok()
}
