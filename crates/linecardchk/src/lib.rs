//! Line Card Error Counter Check
//!
//! Periodic health check for modular switch line cards. Each run reads the
//! per-asic hardware error counters of every monitored module, compares them
//! with the counters saved by the previous run, raises an alert for every
//! asic group whose counter went up, then saves the new counters and appends
//! a report to a history log.

pub mod alert;
pub mod checker;
pub mod clock;
pub mod config;
pub mod detector;
pub mod device;
pub mod error;
pub mod lock;
pub mod parser;
pub mod report;
pub mod shell;
pub mod snapshot;
pub mod store;

pub use alert::{AlertRecord, AlertSeverity, AlertSink, SyslogSink, TracingSink};
pub use checker::{ErrorChecker, RunSummary};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AlertConfig, AlertSinkKind, CheckerConfig, DeviceConfig, PathsConfig, DEFAULT_CONFIG_PATH,
};
pub use detector::{detect, Detection, Regression};
pub use device::{DeviceQuery, FixtureDevice, NxosDevice};
pub use error::*;
pub use report::HistoryEntry;
pub use snapshot::{CounterObservation, ModuleCounters, Snapshot};
pub use store::{SnapshotStore, STATE_VERSION};
