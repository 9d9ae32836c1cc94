//! Shell command execution for the routing-daemon pusher.
//!
//! Commands run through `/bin/sh -c`; every argument that comes from
//! configuration must go through [`shellquote`] first.

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{CfgMgrError, CfgMgrResult};

/// Default path to the FRR `vtysh` shell.
pub const VTYSH_CMD: &str = "/usr/bin/vtysh";

/// Characters that keep a special meaning inside shell double quotes.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// ```
/// use sonic_bgpcfg_common::shell::shellquote;
///
/// assert_eq!(shellquote("segment-routing"), "\"segment-routing\"");
/// assert_eq!(shellquote("permit _$1_"), "\"permit _\\$1_\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Outcome of one shell command.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,
    /// Trimmed stdout.
    pub stdout: String,
    /// Trimmed stderr.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout and stderr joined, for error messages.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs a shell command and collects its output.
///
/// Returns `Err` only if the command could not be spawned; a non-zero exit
/// is reported through [`ExecResult::exit_code`].
pub async fn exec(cmd: &str) -> CfgMgrResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CfgMgrError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let result = ExecResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if !result.success() {
        tracing::warn!(
            command = %cmd,
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Runs a shell command, turning a non-zero exit into an error.
pub async fn exec_or_throw(cmd: &str) -> CfgMgrResult<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(CfgMgrError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
