//! Table managers.
//!
//! One manager per CONFIG_DB table. Each is constructed with the
//! `(db, table)` pair it owns and gets everything else through
//! [`sonic_bgpcfg_common::MgrContext`] at handling time.

mod as_path;
mod srv6;
mod srv6_global;
mod vrf;

pub use as_path::{AsPathKey, AsPathMgr, T2_GROUP_ASNS_ACL};
pub use srv6::Srv6Mgr;
pub use srv6_global::{Srv6GlobalCfgMgr, DEFAULT_ENCAP_SRC_ADDR};
pub use vrf::VrfMgr;
