//! AS-path access-list manager

use std::str::FromStr;

use async_trait::async_trait;
use sonic_bgpcfg_common::{
    CfgMgrError, CfgMgrResult, Directory, FieldValues, FieldValuesExt, Manager, MgrContext,
};
use tracing::{debug, error, info, instrument};

use crate::tables::fields;

/// Access-list holding the ASNs of the T2 group
pub const T2_GROUP_ASNS_ACL: &str = "T2_GROUP_ASNS";

const LOCALHOST: &str = "localhost";

/// Recognized keys of the BGP device-global table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsPathKey {
    /// `localhost|t2_group_asns`
    T2GroupAsns,
}

impl AsPathKey {
    /// FRR access-list the key maps to
    pub fn acl_name(&self) -> &'static str {
        match self {
            AsPathKey::T2GroupAsns => T2_GROUP_ASNS_ACL,
        }
    }
}

impl FromStr for AsPathKey {
    type Err = CfgMgrError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (namespace, item) = key
            .split_once('|')
            .ok_or_else(|| CfgMgrError::invalid_config("key", format!("'{}' has no '|'", key)))?;

        if namespace != LOCALHOST {
            return Err(CfgMgrError::invalid_config(
                "key",
                format!("unexpected namespace '{}'", namespace),
            ));
        }

        match item {
            "t2_group_asns" => Ok(AsPathKey::T2GroupAsns),
            other => Err(CfgMgrError::invalid_config(
                "key",
                format!("unknown item '{}'", other),
            )),
        }
    }
}

/// Parse a comma or whitespace separated AS number list, dropping duplicates
pub fn parse_asns(raw: &str) -> CfgMgrResult<Vec<u32>> {
    let mut asns = Vec::new();
    for token in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let asn: u32 = token.parse().map_err(|_| {
            CfgMgrError::invalid_config(fields::ASNS, format!("'{}' is not an AS number", token))
        })?;
        if !asns.contains(&asn) {
            asns.push(asn);
        }
    }
    Ok(asns)
}

/// Build the command permitting paths through `asn`
pub fn build_permit_cmd(acl: &str, asn: u32) -> String {
    format!("bgp as-path access-list {} permit _{}_", acl, asn)
}

/// Build the command withdrawing the permit entry for `asn`
pub fn build_no_permit_cmd(acl: &str, asn: u32) -> String {
    format!("no {}", build_permit_cmd(acl, asn))
}

/// AS-path Manager
///
/// Keeps FRR AS-path access-lists in line with AS lists in CONFIG_DB. The
/// list last applied is cached in the Directory so updates and deletions
/// only touch the entries that changed.
pub struct AsPathMgr {
    db: String,
    table: String,
}

impl AsPathMgr {
    /// Create a new AsPathMgr bound to `(db, table)`
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }

    /// ASNs currently applied for `key`
    pub fn applied_asns(&self, directory: &Directory, key: &str) -> Vec<u32> {
        directory
            .get_row(&self.db, &self.table, key)
            .and_then(|row| row.get_field(fields::ASNS))
            .and_then(|raw| parse_asns(raw).ok())
            .unwrap_or_default()
    }

    fn parse_key(&self, key: &str) -> Option<AsPathKey> {
        match key.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Ignoring {} entry {}: {}", self.table, key, e);
                None
            }
        }
    }
}

#[async_trait]
impl Manager for AsPathMgr {
    fn name(&self) -> &str {
        "aspathmgr"
    }

    fn db(&self) -> &str {
        &self.db
    }

    fn table(&self) -> &str {
        &self.table
    }

    #[instrument(skip(self, ctx, data))]
    async fn set_handler(&mut self, ctx: &mut MgrContext<'_>, key: &str, data: &FieldValues) -> bool {
        let Some(as_path_key) = self.parse_key(key) else {
            return false;
        };
        let acl = as_path_key.acl_name();

        let Some(raw) = data.get_field(fields::ASNS) else {
            error!("{} has no '{}' field", key, fields::ASNS);
            return false;
        };
        let asns = match parse_asns(raw) {
            Ok(asns) => asns,
            Err(e) => {
                error!("Rejecting {}: {}", key, e);
                return false;
            }
        };

        let applied = self.applied_asns(ctx.directory, key);
        let cmds: Vec<String> = applied
            .iter()
            .filter(|asn| !asns.contains(asn))
            .map(|&asn| build_no_permit_cmd(acl, asn))
            .chain(
                asns.iter()
                    .filter(|asn| !applied.contains(asn))
                    .map(|&asn| build_permit_cmd(acl, asn)),
            )
            .collect();

        if cmds.is_empty() {
            debug!("{} already up to date", acl);
        } else if !ctx.cfg_mgr.push_list(&cmds).await {
            error!("Failed to update as-path access-list {}", acl);
            return false;
        } else {
            info!(asns = ?asns, "Updated as-path access-list {}", acl);
        }

        ctx.directory.put(&self.db, &self.table, key, data.clone());
        true
    }

    #[instrument(skip(self, ctx, _data))]
    async fn del_handler(
        &mut self,
        ctx: &mut MgrContext<'_>,
        key: &str,
        _data: Option<&FieldValues>,
    ) -> bool {
        let Some(as_path_key) = self.parse_key(key) else {
            return false;
        };
        let acl = as_path_key.acl_name();

        let applied = self.applied_asns(ctx.directory, key);
        if !applied.is_empty() {
            let cmds: Vec<String> = applied
                .iter()
                .map(|&asn| build_no_permit_cmd(acl, asn))
                .collect();
            if !ctx.cfg_mgr.push_list(&cmds).await {
                error!("Failed to withdraw as-path access-list {}", acl);
                return false;
            }
            info!("Withdrew as-path access-list {}", acl);
        }

        ctx.directory.remove(&self.db, &self.table, key);
        true
    }
}
