//! History log entries
//!
//! One [`HistoryEntry`] is appended per run. It lists every module that
//! returned data with its serial, total error count and per-group counts.
//! Modules with no data are left out.

use crate::detector::Detection;
use crate::device::DeviceQuery;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Separator line opening each history block
pub const ENTRY_SEPARATOR: &str = "---";

/// Serial shown when the lookup failed
pub const UNKNOWN_SERIAL: &str = "unknown";

/// One asic group line of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group: String,
    pub description: String,
    pub count: u64,
    /// Previous count when the group regressed
    pub previous: Option<u64>,
}

/// One module of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    pub module: String,
    pub serial: String,
    pub total: u64,
    pub groups: Vec<GroupReport>,
}

/// Formatted record of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub modules: Vec<ModuleReport>,
    /// `(module, group)` pairs flagged this run
    pub flagged: Vec<(String, String)>,
}

impl HistoryEntry {
    /// Assemble the entry for a run.
    ///
    /// `serials` maps module ids to resolved serial numbers; modules missing
    /// from it are shown with [`UNKNOWN_SERIAL`].
    pub fn build(
        snapshot: &Snapshot,
        detection: &Detection,
        serials: &BTreeMap<String, String>,
        device: &dyn DeviceQuery,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut modules = Vec::new();

        for (module, counters) in snapshot.modules() {
            let Some(groups) = counters.counters() else {
                continue;
            };

            let groups: Vec<GroupReport> = groups
                .iter()
                .map(|(group, count)| GroupReport {
                    group: group.clone(),
                    description: device.resolve_port_description(module, group),
                    count: *count,
                    previous: detection.previous_count(module, group),
                })
                .collect();

            modules.push(ModuleReport {
                module: module.to_string(),
                serial: serials
                    .get(module)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_SERIAL.to_string()),
                total: counters.total().unwrap_or(0),
                groups,
            });
        }

        let flagged = detection
            .regressions()
            .iter()
            .map(|r| (r.module.clone(), r.group.clone()))
            .collect();

        Self {
            timestamp,
            modules,
            flagged,
        }
    }

    /// Render as a text block for the history log
    pub fn render(&self) -> String {
        let mut out = String::new();

        // Writing to a String cannot fail
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", ENTRY_SEPARATOR);
        let _ = writeln!(out, "{}", self.timestamp.format("%a %b %e %H:%M:%S %Y UTC"));

        for module in &self.modules {
            let _ = writeln!(
                out,
                "Module {} - {} - errors:  {}",
                module.module, module.serial, module.total
            );
            for group in &module.groups {
                let _ = write!(out, "    {}", group.group);
                if group.description != group.group {
                    let _ = write!(out, " [{}]", group.description);
                }
                let _ = write!(out, " - errors: {}", group.count);
                if let Some(previous) = group.previous {
                    let _ = write!(out, " (was {}) INCREMENTED", previous);
                }
                let _ = writeln!(out);
            }
        }

        if self.flagged.is_empty() {
            let _ = writeln!(out, "Flagged: none");
        } else {
            let flagged: Vec<String> = self
                .flagged
                .iter()
                .map(|(module, group)| format!("{}/{}", module, group))
                .collect();
            let _ = writeln!(out, "Flagged: {}", flagged.join(", "));
        }

        out
    }
}
