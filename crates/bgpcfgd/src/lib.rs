//! BGP configuration daemon for SONiC
//!
//! Keeps FRR in sync with CONFIG_DB. Each managed table has a manager that
//! validates rows, records accepted state in the shared Directory and pushes
//! the resulting vtysh commands. The [`Dispatcher`] routes change events to
//! managers one at a time.

pub mod config;
mod dispatcher;
pub mod managers;
pub mod redis_source;
pub mod sid;
pub mod tables;

pub use config::{DaemonConfig, DEFAULT_CONFIG_PATH};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use managers::*;
pub use redis_source::RedisSource;
pub use sid::{Sid, SidError, SidFormat};
pub use tables::*;

use std::sync::Arc;

use sonic_bgpcfg_common::{CfgMgrResult, ConfigPusher, DbId};

/// Dispatcher with every bgpcfgd manager registered on its CONFIG_DB table
pub fn default_dispatcher(cfg_mgr: Arc<dyn ConfigPusher>) -> CfgMgrResult<Dispatcher> {
    let db = DbId::ConfigDb.name();
    let mut dispatcher = Dispatcher::new(cfg_mgr);
    dispatcher.register(VrfMgr::new(db, CFG_VRF_TABLE_NAME))?;
    dispatcher.register(Srv6Mgr::new(db, CFG_SRV6_MY_SIDS_TABLE_NAME))?;
    dispatcher.register(Srv6GlobalCfgMgr::new(db, CFG_SRV6_GLOBAL_TABLE_NAME))?;
    dispatcher.register(AsPathMgr::new(db, CFG_BGP_DEVICE_GLOBAL_TABLE_NAME))?;
    Ok(dispatcher)
}
