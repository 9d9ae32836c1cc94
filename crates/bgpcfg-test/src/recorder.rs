//! Command pusher that records instead of executing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sonic_bgpcfg_common::ConfigPusher;

/// Records every command list pushed to it
///
/// Each call is recorded even when the pusher is set to fail, so tests can
/// check what a manager attempted.
#[derive(Debug, Default)]
pub struct RecordingPusher {
    pushes: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl RecordingPusher {
    /// Pusher accepting every command list
    pub fn new() -> Self {
        Self::default()
    }

    /// Pusher rejecting every command list
    pub fn failing() -> Self {
        let pusher = Self::default();
        pusher.set_failing(true);
        pusher
    }

    /// Make subsequent pushes fail or succeed
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All command lists pushed so far, oldest first
    pub fn pushes(&self) -> Vec<Vec<String>> {
        self.lock().clone()
    }

    /// Number of push calls so far
    pub fn push_count(&self) -> usize {
        self.lock().len()
    }

    /// Most recent command list
    pub fn last_push(&self) -> Option<Vec<String>> {
        self.lock().last().cloned()
    }

    /// Every pushed command, flattened in push order
    pub fn commands(&self) -> Vec<String> {
        self.lock().iter().flatten().cloned().collect()
    }

    /// Forget recorded pushes
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<String>>> {
        // a panicking test thread must not hide the record from the others
        self.pushes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ConfigPusher for RecordingPusher {
    async fn push_list(&self, commands: &[String]) -> bool {
        self.lock().push(commands.to_vec());
        !self.failing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmds(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[tokio::test]
    async fn test_records_pushes() {
        let pusher = RecordingPusher::new();
        assert!(pusher.push_list(&cmds(&["a", "b"])).await);
        assert!(pusher.push_list(&cmds(&["c"])).await);

        assert_eq!(pusher.push_count(), 2);
        assert_eq!(pusher.last_push(), Some(cmds(&["c"])));
        assert_eq!(pusher.commands(), cmds(&["a", "b", "c"]));

        pusher.clear();
        assert_eq!(pusher.push_count(), 0);
        assert_eq!(pusher.last_push(), None);
    }

    #[tokio::test]
    async fn test_failing_still_records() {
        let pusher = RecordingPusher::failing();
        assert!(!pusher.push_list(&cmds(&["a"])).await);
        assert_eq!(pusher.push_count(), 1);

        pusher.set_failing(false);
        assert!(pusher.push_list(&cmds(&["b"])).await);
    }
}
