//! Device interrogation
//!
//! [`DeviceQuery`] is everything the checker needs from the switch: which
//! modules are installed, their raw error counters, serial numbers, and a
//! readable description of each asic group. [`NxosDevice`] talks to the real
//! CLI; [`FixtureDevice`] serves canned data for tests and dry runs.

use crate::config::DeviceConfig;
use crate::error::{LinecardError, Result};
use crate::parser::{self, AsicBlock};
use crate::shell::{self, shellquote};
use crate::snapshot::CounterObservation;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Source of module inventory and error counters
pub trait DeviceQuery {
    /// List modules of the monitored type present on the device
    fn enumerate_modules(&self) -> Result<Vec<String>>;

    /// Raw counter observations for one module
    fn query_error_counters(&self, module: &str) -> Result<Vec<CounterObservation>>;

    /// Hardware serial number of a module
    fn resolve_serial(&self, module: &str) -> Result<String>;

    /// Human-readable asic/port description of a group
    fn resolve_port_description(&self, module: &str, group: &str) -> String;
}

/// Device backed by the NX-OS command line
pub struct NxosDevice {
    cli_prefix: String,
    module_model: String,
    counter_name: String,
    /// Asic blocks seen by the last counter query, for port descriptions
    blocks: RefCell<BTreeMap<(String, String), AsicBlock>>,
}

impl NxosDevice {
    /// Create a CLI-backed device from configuration
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            cli_prefix: config.cli_prefix.clone(),
            module_model: config.module_model.clone(),
            counter_name: config.counter_name.clone(),
            blocks: RefCell::new(BTreeMap::new()),
        }
    }

    fn run_cli(&self, command: &str) -> Result<String> {
        let cmd = format!("{} {}", self.cli_prefix, shellquote(command));
        shell::exec_or_throw(&cmd)
    }
}

impl DeviceQuery for NxosDevice {
    fn enumerate_modules(&self) -> Result<Vec<String>> {
        let output = self
            .run_cli("show module")
            .map_err(|e| LinecardError::Enumeration(e.to_string()))?;
        let modules = parser::parse_module_list(&output, &self.module_model);
        debug!(model = %self.module_model, count = modules.len(), "Enumerated modules");
        Ok(modules)
    }

    fn query_error_counters(&self, module: &str) -> Result<Vec<CounterObservation>> {
        let output = self
            .run_cli(&format!("show hardware internal error module {}", module))
            .map_err(|e| LinecardError::query_failure(module, e.to_string()))?;

        let blocks = parser::parse_error_counters(&output, &self.counter_name);
        let observations = blocks.iter().map(AsicBlock::observation).collect();

        let mut cache = self.blocks.borrow_mut();
        cache.retain(|(m, _), _| m != module);
        for block in blocks {
            cache.insert((module.to_string(), block.group_id()), block);
        }

        Ok(observations)
    }

    fn resolve_serial(&self, module: &str) -> Result<String> {
        let output = self.run_cli(&format!("show module {} | json", module))?;
        parser::parse_serial(&output)
    }

    fn resolve_port_description(&self, module: &str, group: &str) -> String {
        let cache = self.blocks.borrow();
        let Some(block) = cache.get(&(module.to_string(), group.to_string())) else {
            return group.to_string();
        };

        let asic = match &block.device {
            Some(device) => format!("{} instance {}", device, block.instance),
            None => format!("instance {}", block.instance),
        };
        if block.ports.is_empty() {
            return asic;
        }

        let ports: Vec<String> = block
            .ports
            .iter()
            .flat_map(|list| list.split(','))
            .filter(|p| !p.is_empty())
            .map(|p| format!("Eth{}/{}", module, p))
            .collect();
        format!("{} ports {}", asic, ports.join(","))
    }
}

/// Canned module data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureModule {
    /// Serial number; lookup fails when absent
    #[serde(default)]
    pub serial: Option<String>,
    /// Raw counts per group; the query fails when absent
    #[serde(default)]
    pub counters: Option<BTreeMap<String, FixtureCount>>,
    /// Port descriptions per group
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
}

/// Counter value in a fixture file, either a number or raw device text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FixtureCount {
    Number(u64),
    Text(String),
}

impl FixtureCount {
    fn raw(&self) -> String {
        match self {
            FixtureCount::Number(n) => n.to_string(),
            FixtureCount::Text(s) => s.clone(),
        }
    }
}

/// In-memory device for tests and dry runs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureDevice {
    #[serde(default)]
    modules: BTreeMap<String, FixtureModule>,
    #[serde(default)]
    enumeration_fails: bool,
}

impl FixtureDevice {
    /// Device with no modules
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            LinecardError::Configuration(format!(
                "Failed to read fixture {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            LinecardError::Configuration(format!(
                "Failed to parse fixture {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Add a module reporting the given raw counts
    pub fn with_module(mut self, module: &str, serial: &str, counters: &[(&str, &str)]) -> Self {
        let counters = counters
            .iter()
            .map(|(group, raw)| (group.to_string(), FixtureCount::Text(raw.to_string())))
            .collect();
        self.modules.insert(
            module.to_string(),
            FixtureModule {
                serial: Some(serial.to_string()),
                counters: Some(counters),
                ports: BTreeMap::new(),
            },
        );
        self
    }

    /// Add a module whose counter query fails
    pub fn with_failing_module(mut self, module: &str) -> Self {
        self.modules.insert(module.to_string(), FixtureModule::default());
        self
    }

    /// Attach a port description to a group
    pub fn with_ports(mut self, module: &str, group: &str, ports: &str) -> Self {
        self.modules
            .entry(module.to_string())
            .or_default()
            .ports
            .insert(group.to_string(), ports.to_string());
        self
    }

    /// Make module enumeration fail
    pub fn with_enumeration_failure(mut self) -> Self {
        self.enumeration_fails = true;
        self
    }
}

impl DeviceQuery for FixtureDevice {
    fn enumerate_modules(&self) -> Result<Vec<String>> {
        if self.enumeration_fails {
            return Err(LinecardError::Enumeration(
                "fixture enumeration failure".to_string(),
            ));
        }
        Ok(self.modules.keys().cloned().collect())
    }

    fn query_error_counters(&self, module: &str) -> Result<Vec<CounterObservation>> {
        let counters = self
            .modules
            .get(module)
            .and_then(|m| m.counters.as_ref())
            .ok_or_else(|| LinecardError::query_failure(module, "no fixture data"))?;

        Ok(counters
            .iter()
            .map(|(group, count)| CounterObservation::new(group.clone(), count.raw()))
            .collect())
    }

    fn resolve_serial(&self, module: &str) -> Result<String> {
        self.modules
            .get(module)
            .and_then(|m| m.serial.clone())
            .ok_or_else(|| LinecardError::Parse(format!("no serial for module {}", module)))
    }

    fn resolve_port_description(&self, module: &str, group: &str) -> String {
        self.modules
            .get(module)
            .and_then(|m| m.ports.get(group).cloned())
            .unwrap_or_else(|| group.to_string())
    }
}
