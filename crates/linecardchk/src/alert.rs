//! Alert delivery for failing line cards
//!
//! Each detected [`Regression`] becomes one [`AlertRecord`] handed to an
//! [`AlertSink`]. Delivery is best-effort: the checker logs a failed delivery
//! and carries on with the run.

use crate::detector::Regression;
use crate::error::{LinecardError, Result};
use crate::shell::{self, shellquote, LOGGER_CMD};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::error;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlertSeverity {
    /// Immediate intervention required
    Critical,
}

impl AlertSeverity {
    /// Syslog level name used with `logger -p <facility>.<level>`
    pub fn syslog_level(&self) -> &'static str {
        match self {
            AlertSeverity::Critical => "alert",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// Structured alert for one regressed asic group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRecord {
    pub module: String,
    pub serial: String,
    pub group: String,
    pub severity: AlertSeverity,
    pub old_count: u64,
    pub new_count: u64,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Build the alert for a regression
    pub fn from_regression(
        regression: &Regression,
        serial: &str,
        port_description: &str,
        raised_at: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "Module {} -- SN:{} is failing: error counters incremented on {} ({} -> {})",
            regression.module,
            serial,
            port_description,
            regression.old_count,
            regression.new_count
        );

        Self {
            module: regression.module.clone(),
            serial: serial.to_string(),
            group: regression.group.clone(),
            severity: AlertSeverity::Critical,
            old_count: regression.old_count,
            new_count: regression.new_count,
            message,
            raised_at,
        }
    }
}

/// Operational alert channel
pub trait AlertSink {
    fn emit_alert(&self, alert: &AlertRecord) -> Result<()>;
}

/// Delivers alerts to the system log through `logger`
#[derive(Debug, Clone)]
pub struct SyslogSink {
    logger_cmd: String,
    facility: String,
    tag: String,
}

impl SyslogSink {
    /// Create a sink logging to `facility` under `tag`
    pub fn new(facility: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            logger_cmd: LOGGER_CMD.to_string(),
            facility: facility.into(),
            tag: tag.into(),
        }
    }

    /// Use a different `logger` binary
    pub fn with_logger_cmd(mut self, logger_cmd: impl Into<String>) -> Self {
        self.logger_cmd = logger_cmd.into();
        self
    }

    /// Command line that delivers `alert`
    pub fn command_for(&self, alert: &AlertRecord) -> String {
        let priority = format!("{}.{}", self.facility, alert.severity.syslog_level());
        format!(
            "{} -p {} -t {} -- {}",
            self.logger_cmd,
            shellquote(&priority),
            shellquote(&self.tag),
            shellquote(&alert.message)
        )
    }
}

impl AlertSink for SyslogSink {
    fn emit_alert(&self, alert: &AlertRecord) -> Result<()> {
        shell::exec_or_throw(&self.command_for(alert))
            .map(|_| ())
            .map_err(|e| LinecardError::AlertDelivery(e.to_string()))
    }
}

/// Delivers alerts as `tracing` error events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn emit_alert(&self, alert: &AlertRecord) -> Result<()> {
        error!(
            target: "linecardchk::alert",
            module = %alert.module,
            serial = %alert.serial,
            group = %alert.group,
            severity = %alert.severity,
            old_count = alert.old_count,
            new_count = alert.new_count,
            "{}",
            alert.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn regression() -> Regression {
        Regression {
            module: "3".to_string(),
            group: "Eureka:0".to_string(),
            old_count: 100,
            new_count: 150,
        }
    }

    fn alert() -> AlertRecord {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        AlertRecord::from_regression(&regression(), "JAF1234", "Eureka instance 0", at)
    }

    #[test]
    fn test_alert_from_regression() {
        let alert = alert();

        assert_eq!(alert.module, "3");
        assert_eq!(alert.serial, "JAF1234");
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(
            alert.message,
            "Module 3 -- SN:JAF1234 is failing: error counters incremented on Eureka instance 0 (100 -> 150)"
        );
    }

    #[test]
    fn test_syslog_command() {
        let sink = SyslogSink::new("local0", "linecardchk");
        let cmd = sink.command_for(&alert());

        assert!(cmd.starts_with(
            "/usr/bin/logger -p \"local0.alert\" -t \"linecardchk\" -- \"Module 3"
        ));
    }

    #[test]
    fn test_syslog_command_quotes_facility() {
        let sink = SyslogSink::new("local0$(reboot)", "linecardchk");
        let cmd = sink.command_for(&alert());

        assert!(cmd.contains("-p \"local0\\$(reboot).alert\" -t"));
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(AlertSeverity::Critical.syslog_level(), "alert");
        assert_eq!(AlertSeverity::Critical.to_string(), "Critical");
    }

    #[cfg(unix)]
    #[test]
    fn test_syslog_delivery_failure() {
        let sink = SyslogSink::new("local0", "linecardchk").with_logger_cmd("/bin/false");
        assert!(matches!(
            sink.emit_alert(&alert()),
            Err(LinecardError::AlertDelivery(_))
        ));
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        assert!(TracingSink.emit_alert(&alert()).is_ok());
    }
}
