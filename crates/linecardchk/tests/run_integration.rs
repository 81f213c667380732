//! Integration tests for complete check runs
//!
//! Tests whole runs against a fixture device:
//! - Cold start seeding and regression detection on the next run
//! - Corrupt state handling (nothing written)
//! - Per-module query failures
//! - Alert and history log failures that must not abort the run
//! - Concurrent run exclusion

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use sonic_linecardchk::{
    AlertRecord, AlertSink, CounterObservation, ErrorChecker, FixedClock, FixtureDevice,
    LinecardError, PathsConfig, Regression, Result, Snapshot, SnapshotStore,
};
use std::cell::RefCell;
use std::fs;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSink {
    alerts: RefCell<Vec<AlertRecord>>,
}

impl AlertSink for RecordingSink {
    fn emit_alert(&self, alert: &AlertRecord) -> Result<()> {
        self.alerts.borrow_mut().push(alert.clone());
        Ok(())
    }
}

struct FailingSink;

impl AlertSink for FailingSink {
    fn emit_alert(&self, _alert: &AlertRecord) -> Result<()> {
        Err(LinecardError::AlertDelivery("logger unavailable".to_string()))
    }
}

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 5, 0).unwrap()
}

fn paths(dir: &TempDir) -> PathsConfig {
    PathsConfig {
        state_file: dir.path().join("error_stats.json"),
        history_log: dir.path().join("error_stats.log"),
    }
}

fn checker(paths: &PathsConfig) -> ErrorChecker {
    ErrorChecker::new(paths, Box::new(FixedClock(at())))
}

fn seed(paths: &PathsConfig, snapshot: &Snapshot) {
    SnapshotStore::new(&paths.state_file, &paths.history_log)
        .save(snapshot, at())
        .unwrap();
}

#[test]
fn test_increase_raises_single_alert() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    seed(
        &paths,
        &Snapshot::builder()
            .module("3", &[CounterObservation::new("A", "100")])
            .build(),
    );

    let device = FixtureDevice::new()
        .with_module("3", "JAF1234", &[("A", "150"), ("B", "5")])
        .with_ports("3", "A", "Eth3/1-8");
    let sink = RecordingSink::default();

    let checker = checker(&paths);
    let summary = checker.run(&device, &sink).unwrap();

    assert_eq!(
        summary.regressions,
        vec![Regression {
            module: "3".to_string(),
            group: "A".to_string(),
            old_count: 100,
            new_count: 150,
        }]
    );
    assert!(!summary.cold_start);

    let alerts = sink.alerts.borrow();
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts[0].message,
        "Module 3 -- SN:JAF1234 is failing: error counters incremented on Eth3/1-8 (100 -> 150)"
    );

    let expected = Snapshot::builder()
        .module(
            "3",
            &[
                CounterObservation::new("A", "150"),
                CounterObservation::new("B", "5"),
            ],
        )
        .build();
    assert_eq!(checker.store().load().unwrap(), Some(expected));

    let log = fs::read_to_string(&paths.history_log).unwrap();
    assert!(log.contains("A [Eth3/1-8] - errors: 150 (was 100) INCREMENTED"));
    assert!(log.ends_with("Flagged: 3/A\n"));
}

#[test]
fn test_cold_start_seeds_state() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    let device = FixtureDevice::new().with_module("7", "JAF7", &[("X", "10")]);
    let sink = RecordingSink::default();

    let summary = checker(&paths).run(&device, &sink).unwrap();

    assert!(summary.cold_start);
    assert!(summary.regressions.is_empty());
    assert!(sink.alerts.borrow().is_empty());
    assert!(paths.state_file.exists());

    let log = fs::read_to_string(&paths.history_log).unwrap();
    assert_eq!(log.matches("\n---\n").count(), 1);
    assert!(log.contains("Module 7 - JAF7 - errors:  10"));
}

#[test]
fn test_corrupt_state_aborts_without_writing() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    let garbage = b"{\"version\": 1, \"modules\": {\"3\": [";
    fs::write(&paths.state_file, garbage).unwrap();

    let device = FixtureDevice::new().with_module("3", "JAF3", &[("A", "150")]);
    let sink = RecordingSink::default();

    match checker(&paths).run(&device, &sink) {
        Err(e @ LinecardError::CorruptState { .. }) => {
            assert!(e.to_string().contains("error_stats.json"));
        }
        other => panic!("Expected CorruptState, got {:?}", other),
    }

    assert_eq!(fs::read(&paths.state_file).unwrap(), garbage.to_vec());
    assert!(!paths.history_log.exists());
    assert!(sink.alerts.borrow().is_empty());
}

#[test]
fn test_failing_module_is_no_data() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    seed(
        &paths,
        &Snapshot::builder()
            .module("3", &[CounterObservation::new("A", "100")])
            .module("5", &[CounterObservation::new("Y", "1")])
            .build(),
    );

    let device = FixtureDevice::new()
        .with_module("3", "JAF3", &[("A", "120")])
        .with_failing_module("5");
    let sink = RecordingSink::default();

    let checker = checker(&paths);
    let summary = checker.run(&device, &sink).unwrap();

    assert_eq!(summary.modules, 2);
    assert_eq!(summary.no_data_modules, vec!["5".to_string()]);
    assert_eq!(summary.regressions.len(), 1);
    assert_eq!(sink.alerts.borrow()[0].module, "3");

    // Module 5 keeps its last good counts as the baseline
    let state = fs::read_to_string(&paths.state_file).unwrap();
    let json: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(json["modules"]["5"]["Y"], 1);

    let log = fs::read_to_string(&paths.history_log).unwrap();
    assert!(!log.contains("Module 5"));
}

#[test]
fn test_increase_across_failed_query_is_flagged() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    let checker = checker(&paths);
    let sink = RecordingSink::default();

    let healthy = FixtureDevice::new().with_module("3", "JAF3", &[("A", "100")]);
    checker.run(&healthy, &sink).unwrap();

    let failing = FixtureDevice::new().with_failing_module("3");
    let summary = checker.run(&failing, &sink).unwrap();
    assert_eq!(summary.no_data_modules, vec!["3".to_string()]);
    assert_eq!(checker.store().load().unwrap().unwrap().count("3", "A"), Some(100));

    let worse = FixtureDevice::new().with_module("3", "JAF3", &[("A", "150")]);
    let summary = checker.run(&worse, &sink).unwrap();

    assert_eq!(
        summary.regressions,
        vec![Regression {
            module: "3".to_string(),
            group: "A".to_string(),
            old_count: 100,
            new_count: 150,
        }]
    );
    assert_eq!(sink.alerts.borrow().len(), 1);
}

#[test]
fn test_module_back_from_no_data_has_no_baseline() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    seed(&paths, &Snapshot::builder().no_data("5").build());

    let device = FixtureDevice::new().with_module("5", "JAF5", &[("Y", "40")]);
    let sink = RecordingSink::default();

    let summary = checker(&paths).run(&device, &sink).unwrap();

    assert!(!summary.cold_start);
    assert!(summary.regressions.is_empty());
    assert!(sink.alerts.borrow().is_empty());
}

#[test]
fn test_zero_modules_still_saved_and_logged() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);

    let checker = checker(&paths);
    let summary = checker.run(&FixtureDevice::new(), &RecordingSink::default()).unwrap();

    assert_eq!(summary.modules, 0);
    assert_eq!(checker.store().load().unwrap(), Some(Snapshot::empty()));
    assert_eq!(
        fs::read_to_string(&paths.history_log).unwrap(),
        "\n---\nFri Oct 16 09:05:00 2026 UTC\nFlagged: none\n"
    );
}

#[test]
fn test_alert_failure_does_not_abort() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    seed(
        &paths,
        &Snapshot::builder()
            .module(
                "3",
                &[
                    CounterObservation::new("A", "1"),
                    CounterObservation::new("B", "1"),
                ],
            )
            .build(),
    );

    let device = FixtureDevice::new().with_module("3", "JAF3", &[("A", "2"), ("B", "3")]);

    let checker = checker(&paths);
    let summary = checker.run(&device, &FailingSink).unwrap();

    assert_eq!(summary.alert_failures, 2);
    assert_eq!(checker.store().load().unwrap().unwrap().count("3", "B"), Some(3));
    assert!(paths.history_log.exists());
}

#[test]
fn test_history_failure_does_not_block_save() {
    let temp_dir = TempDir::new().unwrap();
    let paths = PathsConfig {
        state_file: temp_dir.path().join("error_stats.json"),
        // A directory cannot be appended to
        history_log: temp_dir.path().to_path_buf(),
    };
    let device = FixtureDevice::new().with_module("3", "JAF3", &[("A", "7")]);

    let checker = checker(&paths);
    let summary = checker.run(&device, &RecordingSink::default()).unwrap();

    assert!(summary.history_append_failed);
    assert_eq!(checker.store().load().unwrap().unwrap().count("3", "A"), Some(7));
}

#[cfg(unix)]
#[test]
fn test_concurrent_run_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    let _held = SnapshotStore::new(&paths.state_file, &paths.history_log)
        .lock()
        .unwrap();

    let device = FixtureDevice::new().with_module("3", "JAF3", &[("A", "7")]);
    let result = checker(&paths).run(&device, &RecordingSink::default());

    assert!(matches!(result, Err(LinecardError::StateLocked { .. })));
    assert!(!paths.state_file.exists());
    assert!(!paths.history_log.exists());
}

#[test]
fn test_fixture_file_run() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths(&temp_dir);
    let fixture = temp_dir.path().join("fixture.json");
    fs::write(
        &fixture,
        r#"{
            "modules": {
                "3": { "serial": "JAF3", "counters": { "Eureka:0": 12, "Eureka:1": "garbage" } },
                "4": { "serial": "JAF4" }
            }
        }"#,
    )
    .unwrap();

    let device = FixtureDevice::from_file(&fixture).unwrap();
    let checker = checker(&paths);
    let summary = checker.run(&device, &RecordingSink::default()).unwrap();

    assert_eq!(summary.no_data_modules, vec!["4".to_string()]);
    let saved = checker.store().load().unwrap().unwrap();
    assert_eq!(saved.count("3", "Eureka:0"), Some(12));
    assert_eq!(saved.count("3", "Eureka:1"), None);
}
