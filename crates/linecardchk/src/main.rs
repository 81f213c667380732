//! linecardchk entry point
//!
//! Runs one check over the monitored line cards and exits. Intended to be
//! scheduled periodically.

use anyhow::{Context, Result};
use clap::Parser;
use sonic_linecardchk::{
    AlertSink, AlertSinkKind, CheckerConfig, DeviceQuery, ErrorChecker, FixtureDevice,
    NxosDevice, SyslogSink, SystemClock, TracingSink, DEFAULT_CONFIG_PATH,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Line card hardware error counter check
#[derive(Parser, Debug)]
#[command(name = "linecardchk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// State file (overrides the configuration file)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// History log (overrides the configuration file)
    #[arg(long)]
    history_log: Option<PathBuf>,

    /// Read modules and counters from a JSON fixture instead of the device
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("linecardchk: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "linecardchk: Check failed");
            eprintln!("linecardchk: {}", message);
            ExitCode::FAILURE
        }
    }
}

/// Initialize structured logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level {}", level))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set logger")?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = CheckerConfig::load_or_default(&args.config)?;
    if let Some(state_file) = args.state_file {
        config.paths.state_file = state_file;
    }
    if let Some(history_log) = args.history_log {
        config.paths.history_log = history_log;
    }
    config.validate()?;

    info!(
        state_file = %config.paths.state_file.display(),
        history_log = %config.paths.history_log.display(),
        "linecardchk: Starting check"
    );

    let device: Box<dyn DeviceQuery> = match &args.fixture {
        Some(path) => {
            info!(fixture = %path.display(), "Using fixture device");
            Box::new(FixtureDevice::from_file(path)?)
        }
        None => Box::new(NxosDevice::new(&config.device)),
    };

    let alerts: Box<dyn AlertSink> = match config.alert.sink {
        AlertSinkKind::Syslog => Box::new(SyslogSink::new(
            config.alert.facility.clone(),
            config.alert.tag.clone(),
        )),
        AlertSinkKind::Log => Box::new(TracingSink),
    };

    let checker = ErrorChecker::new(&config.paths, Box::new(SystemClock));
    let summary = checker.run(device.as_ref(), alerts.as_ref())?;

    if summary.has_regressions() {
        info!(
            flagged = summary.regressions.len(),
            "linecardchk: Failing modules reported"
        );
    }
    Ok(())
}
