//! Test infrastructure for the SONiC BGP configuration daemon
//!
//! Provides:
//! - CONFIG_DB change fixtures for every managed table
//! - Multi-step scenarios with their expected routing-daemon commands
//! - A recording command pusher standing in for vtysh

pub mod fixtures;
mod recorder;

pub use fixtures::*;
pub use recorder::RecordingPusher;
