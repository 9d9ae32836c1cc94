//! Common infrastructure for the SONiC BGP configuration daemon.
//!
//! bgpcfgd keeps the routing daemon (FRR) in sync with CONFIG_DB. This crate
//! holds the pieces that are independent of any particular table:
//!
//! - [`directory`]: cross-manager cache of accepted configuration rows
//! - [`manager`]: the [`Manager`] trait every table handler implements
//! - [`event`]: change events and the [`EventSource`] abstraction
//! - [`push`]: routing-daemon command pushers (`vtysh`, dry-run)
//! - [`shell`]: shell execution with proper quoting
//! - [`error`]: error types
//!
//! # Architecture
//!
//! 1. An event source delivers `(db, table, op, key, data)` notifications
//! 2. The dispatcher routes each one to the manager owning `(db, table)`
//! 3. The manager validates the row, updates the [`Directory`] and its own
//!    derived state, and pushes an ordered command list to the routing daemon

pub mod directory;
pub mod error;
pub mod event;
pub mod manager;
pub mod push;
pub mod shell;

// Re-export commonly used items at crate root
pub use directory::{DepPath, DirValue, Directory, TableRef};
pub use error::{CfgMgrError, CfgMgrResult};
pub use event::{ChannelSource, ConfigEvent, EventSource, Operation};
pub use manager::{DbId, FieldValue, FieldValues, FieldValuesExt, Manager, MgrContext};
pub use push::{ConfigPusher, DryRunPusher, VtyshPusher};
