//! SRv6 Manager - groups configured SIDs by locator

use std::collections::BTreeMap;

use async_trait::async_trait;
use sonic_bgpcfg_common::{
    DbId, DepPath, FieldValues, FieldValuesExt, Manager, MgrContext, TableRef,
};
use tracing::{debug, error, info, instrument, warn};

use crate::sid::{Sid, DEFAULT_VRF};
use crate::tables::{fields, CFG_VRF_TABLE_NAME};

/// Locator bits -> opcode bits -> SID
pub type LocatorGroups = BTreeMap<u128, BTreeMap<u128, Sid>>;

/// SRv6 Manager
///
/// Keeps every accepted SID grouped under its locator. Rows bound to a
/// non-default VRF wait until that VRF is present in the Directory.
/// Routing-daemon commands for SIDs are not generated yet: the manager
/// only maintains the locator groups.
pub struct Srv6Mgr {
    db: String,
    table: String,
    vrf_table: TableRef,
    sids: LocatorGroups,
}

impl Srv6Mgr {
    /// Create a new Srv6Mgr bound to `(db, table)`
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
            vrf_table: TableRef::new(DbId::ConfigDb.name(), CFG_VRF_TABLE_NAME),
            sids: LocatorGroups::new(),
        }
    }

    /// Current locator groups
    pub fn sids(&self) -> &LocatorGroups {
        &self.sids
    }

    /// Look up one SID by its locator and opcode
    pub fn get_sid(&self, locator: u128, opcode: u128) -> Option<&Sid> {
        self.sids.get(&locator)?.get(&opcode)
    }

    fn insert(&mut self, sid: Sid) {
        self.sids
            .entry(sid.locator())
            .or_default()
            .insert(sid.opcode(), sid);
    }

    /// Removes the SID at its locator/opcode, pruning empty groups
    fn remove(&mut self, sid: &Sid) {
        let locator = sid.locator();
        let Some(group) = self.sids.get_mut(&locator) else {
            warn!(
                locator = %sid.locator_prefix(),
                "Encountered a config deletion with an unexpected locator"
            );
            return;
        };

        if group.remove(&sid.opcode()).is_none() {
            debug!("SID {} was not configured under its locator", sid.addr());
        }
        if group.is_empty() {
            self.sids.remove(&locator);
        }
    }

    /// Builds the SID to delete from the DEL row, falling back to the
    /// row accepted earlier for the same key
    fn sid_for_delete(
        &self,
        ctx: &MgrContext<'_>,
        key: &str,
        data: Option<&FieldValues>,
    ) -> Option<Sid> {
        if let Some(data) = data.filter(|d| d.has_field(fields::ACTION)) {
            match Sid::new(key, data) {
                Ok(sid) => return Some(sid),
                Err(e) => debug!("DEL row for {} unusable ({}), trying cached row", key, e),
            }
        }

        let cached = ctx.directory.get_row(&self.db, &self.table, key)?;
        match Sid::new(key, cached) {
            Ok(sid) => Some(sid),
            Err(e) => {
                error!("Cached SRv6 row for {} is invalid: {}", key, e);
                None
            }
        }
    }
}

#[async_trait]
impl Manager for Srv6Mgr {
    fn name(&self) -> &str {
        "srv6mgr"
    }

    fn db(&self) -> &str {
        &self.db
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn deps(&self) -> Vec<TableRef> {
        vec![self.vrf_table.clone()]
    }

    fn row_deps(&self, _key: &str, data: &FieldValues) -> Vec<DepPath> {
        match data.get_field(fields::VRF) {
            Some(vrf) if vrf != DEFAULT_VRF => vec![DepPath::new(
                self.vrf_table.db.clone(),
                self.vrf_table.table.clone(),
                vrf,
            )],
            _ => Vec::new(),
        }
    }

    #[instrument(skip(self, ctx, data))]
    async fn set_handler(&mut self, ctx: &mut MgrContext<'_>, key: &str, data: &FieldValues) -> bool {
        let sid = match Sid::new(key, data) {
            Ok(sid) => sid,
            Err(e) => {
                error!("Rejecting SRv6 SID {}: {}", key, e);
                return false;
            }
        };

        // A changed row replaces whatever the key described before
        if let Some(previous) = ctx
            .directory
            .get_row(&self.db, &self.table, key)
            .and_then(|row| Sid::new(key, row).ok())
        {
            if (previous.locator(), previous.opcode()) != (sid.locator(), sid.opcode()) {
                self.remove(&previous);
            }
        }

        info!(
            locator = %sid.locator_prefix(),
            action = sid.action(),
            vrf = sid.vrf(),
            "SRv6 SID {} configured",
            key
        );
        self.insert(sid);
        ctx.directory.put(&self.db, &self.table, key, data.clone());
        true
    }

    #[instrument(skip(self, ctx, data))]
    async fn del_handler(
        &mut self,
        ctx: &mut MgrContext<'_>,
        key: &str,
        data: Option<&FieldValues>,
    ) -> bool {
        match self.sid_for_delete(ctx, key, data) {
            Some(sid) => {
                self.remove(&sid);
                info!("SRv6 SID {} removed", key);
            }
            None => warn!("Deleting unknown SRv6 SID {}", key),
        }
        ctx.directory.remove(&self.db, &self.table, key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_bgpcfg_common::{field_values, Directory};
    use sonic_bgpcfg_test::RecordingPusher;
    use std::net::Ipv6Addr;

    fn bits(s: &str) -> u128 {
        u128::from(s.parse::<Ipv6Addr>().unwrap())
    }

    fn mgr() -> Srv6Mgr {
        Srv6Mgr::new("CONFIG_DB", "SRV6_MY_SIDS")
    }

    #[tokio::test]
    async fn test_set_groups_by_locator() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"action" => "uN"};
        assert!(mgr.set_handler(&mut ctx, "fcbb:bbbb:1::", &data).await);
        let data = field_values! {"action" => "uDT46", "vrf" => "default"};
        assert!(mgr.set_handler(&mut ctx, "fcbb:bbbb:1:fe00::", &data).await);
        let data = field_values! {"action" => "uN"};
        assert!(mgr.set_handler(&mut ctx, "fcbb:bbbb:2::", &data).await);

        assert_eq!(mgr.sids().len(), 2);
        let group = &mgr.sids()[&bits("fcbb:bbbb:1::")];
        assert_eq!(group.len(), 2);
        assert!(group.contains_key(&0));
        assert_eq!(group[&bits("0:0:0:fe00::")].action(), "uDT46");

        assert!(mgr.get_sid(bits("fcbb:bbbb:2::"), 0).is_some());
        assert_eq!(pusher.push_count(), 0);
    }

    #[tokio::test]
    async fn test_set_then_del_restores_state() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let keep = field_values! {"action" => "uN"};
        assert!(mgr.set_handler(&mut ctx, "fcbb:bbbb:1::", &keep).await);
        let before = mgr.sids().clone();

        let rows = [
            ("fcbb:bbbb:1:fe00::", field_values! {"action" => "uDT46"}),
            ("fcbb:bbbb:7:fe00::", field_values! {"action" => "uDT4", "func_len" => 8}),
            (
                "fcbb:bbbb:1:e000::",
                field_values! {"action" => "uA", "adj" => "fe80::1"},
            ),
        ];
        for (addr, data) in &rows {
            assert!(mgr.set_handler(&mut ctx, addr, data).await);
            assert!(mgr.del_handler(&mut ctx, addr, Some(data)).await);
            assert_eq!(mgr.sids(), &before);
        }
    }

    #[tokio::test]
    async fn test_set_then_del_on_configured_key_drops_both_sids() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let key = "fcbb:bbbb:1:fe00::";
        assert!(mgr.set_handler(&mut ctx, key, &field_values! {"action" => "uDT46"}).await);
        assert_eq!(mgr.sids().len(), 1);

        // round trip only restores keys that were not configured before
        let wide = field_values! {"action" => "uDT46", "node_len" => 32};
        assert!(mgr.set_handler(&mut ctx, key, &wide).await);
        assert!(mgr.del_handler(&mut ctx, key, Some(&wide)).await);
        assert!(mgr.sids().is_empty());
        assert!(!ctx.directory.path_exist("CONFIG_DB", "SRV6_MY_SIDS", key));
    }

    #[tokio::test]
    async fn test_del_without_data_uses_cached_row() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"action" => "uN", "block_len" => 40, "node_len" => 24};
        assert!(mgr.set_handler(&mut ctx, "fcbb:bbbb:1122:3344::", &data).await);
        assert_eq!(mgr.sids().len(), 1);

        assert!(mgr.del_handler(&mut ctx, "fcbb:bbbb:1122:3344::", None).await);
        assert!(mgr.sids().is_empty());
        assert!(!ctx
            .directory
            .path_exist("CONFIG_DB", "SRV6_MY_SIDS", "fcbb:bbbb:1122:3344::"));
    }

    #[tokio::test]
    async fn test_del_unknown_locator_is_noop() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"action" => "uN"};
        assert!(mgr.del_handler(&mut ctx, "fcbb:bbbb:9::", Some(&data)).await);
        assert!(mgr.del_handler(&mut ctx, "fcbb:bbbb:9::", None).await);
        assert!(mgr.sids().is_empty());
    }

    #[tokio::test]
    async fn test_missing_action_rejected_without_mutation() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"vrf" => "default"};
        assert!(!mgr.set_handler(&mut ctx, "fcbb:bbbb:1::", &data).await);
        assert!(mgr.sids().is_empty());
        assert!(ctx.directory.get_table("CONFIG_DB", "SRV6_MY_SIDS").is_none());
        assert_eq!(pusher.push_count(), 0);
    }

    #[tokio::test]
    async fn test_changed_row_moves_sid() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let key = "fcbb:bbbb:1:fe00::";
        assert!(mgr.set_handler(&mut ctx, key, &field_values! {"action" => "uDT46"}).await);
        // a 64-bit locator now covers the former function bits
        let wide = field_values! {"action" => "uDT46", "node_len" => 32};
        assert!(mgr.set_handler(&mut ctx, key, &wide).await);

        assert_eq!(mgr.sids().len(), 1);
        assert!(mgr.get_sid(bits("fcbb:bbbb:1:fe00::"), 0).is_some());
    }

    #[test]
    fn test_row_deps() {
        let mgr = mgr();
        assert!(mgr.row_deps("fcbb::", &field_values! {"action" => "uN"}).is_empty());
        assert!(mgr
            .row_deps("fcbb::", &field_values! {"action" => "uDT4", "vrf" => "default"})
            .is_empty());
        assert_eq!(
            mgr.row_deps("fcbb::", &field_values! {"action" => "uDT4", "vrf" => "Vrf1"}),
            vec![DepPath::new("CONFIG_DB", "VRF", "Vrf1")]
        );
        assert_eq!(mgr.deps(), vec![TableRef::new("CONFIG_DB", "VRF")]);
    }
}
