//! Error types for bgpcfgd operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. Manager
//! handlers never let these escape: they are logged at the handler
//! boundary and turned into a `false` return.

use std::io;
use thiserror::Error;

/// Result type alias for bgpcfgd operations.
pub type CfgMgrResult<T> = Result<T, CfgMgrError>;

/// Errors that can occur while synchronizing configuration.
#[derive(Debug, Error)]
pub enum CfgMgrError {
    /// Failed to spawn a shell command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Config store operation failed.
    #[error("Database operation failed: {operation}: {message}")]
    Database {
        /// The operation that failed (e.g., "hgetall", "psubscribe").
        operation: String,
        /// Error message.
        message: String,
    },

    /// A configuration row or value failed validation.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// The daemon configuration file could not be read or parsed.
    #[error("Config file '{path}': {message}")]
    ConfigFile {
        /// Path of the offending file.
        path: String,
        /// Error message.
        message: String,
    },

    /// Table entry not found.
    #[error("Table entry not found: {table}:{key}")]
    EntryNotFound {
        /// The table name.
        table: String,
        /// The key.
        key: String,
    },

    /// Manager table dependencies form a cycle.
    #[error("Manager dependency cycle between tables: {}", tables.join(", "))]
    DependencyCycle {
        /// Tables taking part in the cycle.
        tables: Vec<String>,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl CfgMgrError {
    /// Creates a database error.
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a config file error.
    pub fn config_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an entry not found error.
    pub fn entry_not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::EntryNotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CfgMgrError::Database { .. } | CfgMgrError::ShellCommandFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error() {
        let err = CfgMgrError::database("hgetall", "Connection refused");
        assert_eq!(
            err.to_string(),
            "Database operation failed: hgetall: Connection refused"
        );
    }

    #[test]
    fn test_shell_command_failed() {
        let err = CfgMgrError::ShellCommandFailed {
            command: "vtysh -c 'configure terminal'".to_string(),
            exit_code: 2,
            output: "% Unknown command".to_string(),
        };
        assert!(err.to_string().contains("vtysh"));
        assert!(err.to_string().contains("exit code 2"));
    }

    #[test]
    fn test_dependency_cycle_display() {
        let err = CfgMgrError::DependencyCycle {
            tables: vec!["CONFIG_DB|A".to_string(), "CONFIG_DB|B".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Manager dependency cycle between tables: CONFIG_DB|A, CONFIG_DB|B"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(CfgMgrError::database("get", "timeout").is_retryable());
        assert!(!CfgMgrError::invalid_config("encap_src_addr", "bad").is_retryable());
        assert!(!CfgMgrError::internal("bug").is_retryable());
    }
}
