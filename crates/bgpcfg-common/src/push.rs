//! Routing-daemon command pushers.
//!
//! A push is one transaction from the routing daemon's point of view:
//! enter config mode, apply the lines in order, leave. Pushers report
//! success as a plain `bool`; retrying is the caller's business.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::shell::{self, shellquote, VTYSH_CMD};

/// Sink for ordered routing-daemon configuration lines.
#[async_trait]
pub trait ConfigPusher: Send + Sync {
    /// Applies `commands` as a single configuration transaction.
    async fn push_list(&self, commands: &[String]) -> bool;
}

/// Builds the `vtysh` invocation applying `commands` in one session.
pub fn build_vtysh_cmd(vtysh: &str, commands: &[String]) -> String {
    let mut cmd = format!("{} -c {}", vtysh, shellquote("configure terminal"));
    for line in commands {
        cmd.push_str(" -c ");
        cmd.push_str(&shellquote(line));
    }
    cmd
}

/// Pushes commands to FRR through `vtysh`.
#[derive(Debug, Clone)]
pub struct VtyshPusher {
    vtysh: String,
}

impl VtyshPusher {
    /// Creates a pusher using the given `vtysh` binary.
    pub fn new(vtysh: impl Into<String>) -> Self {
        Self {
            vtysh: vtysh.into(),
        }
    }

    /// Returns the `vtysh` binary path.
    pub fn vtysh(&self) -> &str {
        &self.vtysh
    }
}

impl Default for VtyshPusher {
    fn default() -> Self {
        Self::new(VTYSH_CMD)
    }
}

#[async_trait]
impl ConfigPusher for VtyshPusher {
    async fn push_list(&self, commands: &[String]) -> bool {
        if commands.is_empty() {
            return true;
        }

        let cmd = build_vtysh_cmd(&self.vtysh, commands);
        match shell::exec_or_throw(&cmd).await {
            Ok(_) => {
                debug!(lines = commands.len(), "Pushed configuration to vtysh");
                true
            }
            Err(e) => {
                error!(error = %e, ?commands, "Failed to push configuration");
                false
            }
        }
    }
}

/// Logs commands instead of applying them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPusher;

#[async_trait]
impl ConfigPusher for DryRunPusher {
    async fn push_list(&self, commands: &[String]) -> bool {
        for line in commands {
            info!(line = %line, "dry-run");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_vtysh_cmd() {
        let cmd = build_vtysh_cmd(
            "/usr/bin/vtysh",
            &lines(&["segment-routing", "srv6", "encapsulation", "source-address fc00::1"]),
        );
        assert_eq!(
            cmd,
            "/usr/bin/vtysh -c \"configure terminal\" -c \"segment-routing\" -c \"srv6\" \
             -c \"encapsulation\" -c \"source-address fc00::1\""
        );
    }

    #[test]
    fn test_build_vtysh_cmd_quotes_lines() {
        let cmd = build_vtysh_cmd("vtysh", &lines(&["description `reboot`"]));
        assert!(cmd.ends_with("-c \"description \\`reboot\\`\""));
    }

    #[tokio::test]
    async fn test_empty_push_is_noop() {
        let pusher = VtyshPusher::new("/nonexistent/vtysh");
        assert!(pusher.push_list(&[]).await);
    }

    #[tokio::test]
    async fn test_failed_push_returns_false() {
        let pusher = VtyshPusher::new("/nonexistent/vtysh");
        assert!(!pusher.push_list(&lines(&["segment-routing"])).await);
    }

    #[tokio::test]
    async fn test_vtysh_substitute_binary() {
        // `true` accepts any arguments and exits 0
        let pusher = VtyshPusher::new("true");
        assert!(pusher.push_list(&lines(&["segment-routing"])).await);
    }

    #[tokio::test]
    async fn test_dry_run() {
        assert!(DryRunPusher.push_list(&lines(&["srv6"])).await);
    }
}
