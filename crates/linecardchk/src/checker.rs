//! One check run
//!
//! [`ErrorChecker::run`] walks a fixed sequence: enumerate modules, query
//! each module's counters, build the [`Snapshot`], take the state lock, load
//! the previous snapshot, detect regressions, alert, save, and append to the
//! history log. Modules with no data this run keep their saved counts. Per-module query failures, alert delivery failures and
//! history log failures are logged and recorded in the [`RunSummary`];
//! everything else ends the run with an error.

use crate::alert::{AlertRecord, AlertSink};
use crate::clock::Clock;
use crate::config::PathsConfig;
use crate::detector::{self, Detection, Regression};
use crate::device::DeviceQuery;
use crate::error::Result;
use crate::report::{HistoryEntry, UNKNOWN_SERIAL};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Modules enumerated on the device
    pub modules: usize,
    /// Modules that returned no usable counters
    pub no_data_modules: Vec<String>,
    /// Groups whose counters increased
    pub regressions: Vec<Regression>,
    /// No previous state existed
    pub cold_start: bool,
    /// Alerts that could not be delivered
    pub alert_failures: usize,
    /// The history entry could not be appended
    pub history_append_failed: bool,
}

impl RunSummary {
    /// Check if any group was flagged
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Line card error counter checker
pub struct ErrorChecker {
    store: SnapshotStore,
    clock: Box<dyn Clock>,
}

impl ErrorChecker {
    /// Create a checker over the configured state and log paths
    pub fn new(paths: &PathsConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            store: SnapshotStore::new(&paths.state_file, &paths.history_log),
            clock,
        }
    }

    /// Underlying snapshot store
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Execute one check run
    pub fn run(&self, device: &dyn DeviceQuery, alerts: &dyn AlertSink) -> Result<RunSummary> {
        let modules = enumerate(device)?;
        info!(count = modules.len(), "Checking modules");

        let current = collect(device, &modules);

        let _lock = self.store.lock()?;
        let previous = self.store.load()?;

        let detection = detector::detect(&current, previous.as_ref());
        log_detection(&detection);

        let serials = resolve_serials(device, &current);

        let now = self.clock.now();
        let mut alert_failures = 0;
        for regression in detection.regressions() {
            let serial = serials
                .get(&regression.module)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_SERIAL);
            let description =
                device.resolve_port_description(&regression.module, &regression.group);
            let alert = AlertRecord::from_regression(regression, serial, &description, now);

            warn!(
                module = %regression.module,
                group = %regression.group,
                old_count = regression.old_count,
                new_count = regression.new_count,
                delta = regression.delta(),
                "Error counters incremented"
            );
            if let Err(e) = alerts.emit_alert(&alert) {
                error!(module = %alert.module, error = %e, "Failed to deliver alert");
                alert_failures += 1;
            }
        }

        self.store
            .save(&current.carry_forward(previous.as_ref()), now)?;

        let entry = HistoryEntry::build(&current, &detection, &serials, device, now);
        let history_append_failed = match self.store.append_log(&entry) {
            Ok(()) => false,
            Err(e) => {
                error!(error = %e, "Failed to append history entry");
                true
            }
        };

        let summary = RunSummary {
            modules: modules.len(),
            no_data_modules: current
                .no_data_modules()
                .into_iter()
                .map(str::to_string)
                .collect(),
            regressions: detection.regressions().to_vec(),
            cold_start: detection.is_cold_start(),
            alert_failures,
            history_append_failed,
        };

        info!(
            modules = summary.modules,
            no_data = summary.no_data_modules.len(),
            regressions = summary.regressions.len(),
            cold_start = summary.cold_start,
            "Check complete"
        );
        Ok(summary)
    }
}

/// Enumerate modules, dropping repeated ids
fn enumerate(device: &dyn DeviceQuery) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    Ok(device
        .enumerate_modules()?
        .into_iter()
        .filter(|m| seen.insert(m.clone()))
        .collect())
}

fn collect(device: &dyn DeviceQuery, modules: &[String]) -> Snapshot {
    let mut builder = Snapshot::builder();

    for module in modules {
        builder = match device.query_error_counters(module) {
            Ok(observations) => builder.module(module, &observations),
            Err(e) => {
                warn!(module = %module, error = %e, "Counter query failed, module has no data");
                builder.no_data(module)
            }
        };
    }

    builder.build()
}

fn log_detection(detection: &Detection) {
    if detection.is_cold_start() {
        info!("No previous stats, seeding state");
        return;
    }

    for (module, group) in detection.unbaselined() {
        info!(module = %module, group = %group, "No previous stats for group");
    }
}

/// Serial numbers of modules with data; failed lookups are left out
fn resolve_serials(device: &dyn DeviceQuery, snapshot: &Snapshot) -> BTreeMap<String, String> {
    let mut serials = BTreeMap::new();

    for (module, counters) in snapshot.modules() {
        if counters.is_no_data() {
            continue;
        }
        match device.resolve_serial(module) {
            Ok(serial) => {
                serials.insert(module.to_string(), serial);
            }
            Err(e) => warn!(module = %module, error = %e, "Serial lookup failed"),
        }
    }

    serials
}
