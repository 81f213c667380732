//! Parsers for NX-OS diagnostic command output
//!
//! Keeps all knowledge of the device's text layout in one place so the rest of
//! the crate only sees [`CounterObservation`]s.
//!
//! # `show module`
//!
//! Rows whose first token is a slot number and which contain a token starting
//! with the monitored model prefix name a module:
//!
//! ```text
//! Mod  Ports  Module-Type                         Model              Status
//! ---  -----  ----------------------------------- ------------------ ----------
//! 3    32     10 Gbps Ethernet Module             N7K-M132XP-12      ok
//! ```
//!
//! # `show hardware internal error module <m>`
//!
//! ```text
//! | Device:Eureka                   Role:MAC                 Mod: 3        |
//! Instance:0
//! Cntr  Name                                          Value             Ports
//! ----- -----                                         -----             -----
//!    19 mstat_rx_pkts_bad_crc                         0000000000000012  1,3,5,7 -
//! ```
//!
//! `Device:` sets the asic name, `Instance:` opens an asic block, and counter
//! rows are `<idx> <name> <value> [<ports>] [-]`. Every asic block becomes one
//! group `<device>:<instance>` whose count is the sum of the tracked counter's
//! rows, or `0` when the counter is absent from the block (the device only
//! prints non-zero counters).

use crate::error::{LinecardError, Result};
use crate::snapshot::{parse_count, CounterObservation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DEVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Device:\s*(\S+)").expect("Invalid regex pattern"));

static INSTANCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*Instance:\s*(\d+)").expect("Invalid regex pattern"));

static COUNTER_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(\S+)\s+(\S+)(?:\s+(\S+))?").expect("Invalid regex pattern")
});

/// Module slots in `show module` output whose model starts with `model_prefix`
pub fn parse_module_list(output: &str, model_prefix: &str) -> Vec<String> {
    let mut modules: Vec<String> = Vec::new();

    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        let Some(slot) = tokens.next() else {
            continue;
        };
        if !slot.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if tokens.any(|t| t.starts_with(model_prefix)) && !modules.iter().any(|m| m == slot) {
            modules.push(slot.to_string());
        }
    }

    modules
}

/// One asic instance block of the hardware error table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsicBlock {
    /// Asic name from the preceding `Device:` header, if any
    pub device: Option<String>,
    /// Asic instance number
    pub instance: String,
    /// Raw values of the tracked counter rows
    pub values: Vec<String>,
    /// Ports listed on the tracked counter rows
    pub ports: Vec<String>,
}

impl AsicBlock {
    fn new(device: Option<String>, instance: String) -> Self {
        Self {
            device,
            instance,
            values: Vec::new(),
            ports: Vec::new(),
        }
    }

    /// Group identifier: `<device>:<instance>`, or the bare instance
    pub fn group_id(&self) -> String {
        match &self.device {
            Some(device) => format!("{}:{}", device, self.instance),
            None => self.instance.clone(),
        }
    }

    /// Count to report for this block.
    ///
    /// Sum of all rows, `0` with no rows. An unparseable row value is passed
    /// through unchanged so the snapshot model can reject it.
    pub fn raw_count(&self) -> String {
        let mut total: u64 = 0;
        for value in &self.values {
            match parse_count(value) {
                Some(v) => total = total.saturating_add(v),
                None => return value.clone(),
            }
        }
        total.to_string()
    }

    /// Convert to a snapshot observation
    pub fn observation(&self) -> CounterObservation {
        CounterObservation::new(self.group_id(), self.raw_count())
    }
}

/// Parse `show hardware internal error module <m>` for `counter_name`
pub fn parse_error_counters(output: &str, counter_name: &str) -> Vec<AsicBlock> {
    let mut blocks: Vec<AsicBlock> = Vec::new();
    let mut device: Option<String> = None;

    for line in output.lines() {
        if let Some(caps) = DEVICE_RE.captures(line) {
            device = Some(caps[1].to_string());
            continue;
        }

        if let Some(caps) = INSTANCE_RE.captures(line) {
            blocks.push(AsicBlock::new(device.clone(), caps[1].to_string()));
            continue;
        }

        let Some(caps) = COUNTER_ROW_RE.captures(line) else {
            continue;
        };
        if &caps[2] != counter_name {
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };

        block.values.push(caps[3].to_string());
        if let Some(ports) = caps.get(4) {
            let ports = ports.as_str();
            if ports != "-" && !block.ports.iter().any(|p| p == ports) {
                block.ports.push(ports.to_string());
            }
        }
    }

    blocks
}

/// Serial number from `show module <m> | json` output
pub fn parse_serial(json: &str) -> Result<String> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| LinecardError::Parse(format!("Invalid module JSON: {}", e)))?;

    let row = &value["TABLE_modmacinfo"]["ROW_modmacinfo"];
    let row = match row {
        Value::Array(rows) => rows.first().unwrap_or(&Value::Null),
        other => other,
    };

    row["serialnum"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LinecardError::Parse("serialnum missing from module JSON".to_string()))
}
