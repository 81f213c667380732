//! Shell command execution for device CLI access.
//!
//! Device diagnostics are read by running NX-OS CLI commands through the
//! platform shell (`vsh -c "<command>"`). Arguments are quoted with
//! [`shellquote`] before being placed on a command line.
//!
//! # Example
//!
//! ```ignore
//! use sonic_linecardchk::shell::{self, shellquote};
//!
//! let cmd = format!("{} {}", VSH_CMD, shellquote("show module"));
//! let output = shell::exec_or_throw(&cmd)?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::{Command, Stdio};

use crate::error::{LinecardError, Result};

/// NX-OS virtual shell invocation used to run CLI commands.
pub const VSH_CMD: &str = "/isan/bin/vsh -c";

/// Path to the `logger` command for syslog delivery.
pub const LOGGER_CMD: &str = "/usr/bin/logger";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\` and
/// newline.
///
/// ```
/// use sonic_linecardchk::shell::shellquote;
///
/// assert_eq!(shellquote("show module"), "\"show module\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The stdout output.
    pub stdout: String,
    /// The stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command through `/bin/sh -c`, blocking until it exits.
pub fn exec(cmd: &str) -> Result<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| LinecardError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %cmd, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Executes a shell command and returns stdout, failing on non-zero exit.
pub fn exec_or_throw(cmd: &str) -> Result<String> {
    let result = exec(cmd)?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(LinecardError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
