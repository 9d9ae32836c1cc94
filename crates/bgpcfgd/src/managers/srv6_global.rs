//! SRv6 global configuration manager (encapsulation source address)

use std::net::Ipv6Addr;

use async_trait::async_trait;
use sonic_bgpcfg_common::{Directory, FieldValues, FieldValuesExt, Manager, MgrContext};
use tracing::{debug, error, info, instrument};

use crate::tables::fields;

/// Encapsulation source address FRR uses when none is configured
pub const DEFAULT_ENCAP_SRC_ADDR: &str = "::";

/// Build the FRR command sequence setting the encapsulation source address
pub fn build_encap_src_addr_cmds(addr: &str) -> Vec<String> {
    vec![
        "segment-routing".to_string(),
        "srv6".to_string(),
        "encapsulation".to_string(),
        format!("source-address {}", addr),
    ]
}

/// Canonical text form of an address, or the trimmed input if it does not parse
fn normalize(addr: &str) -> String {
    let addr = addr.trim();
    addr.parse::<Ipv6Addr>()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| addr.to_string())
}

/// SRv6 global configuration manager
///
/// Owns a single scalar, the SRv6 encapsulation source address. The value
/// last pushed to the routing daemon is cached in the Directory; repeating
/// it is a no-op.
pub struct Srv6GlobalCfgMgr {
    db: String,
    table: String,
}

impl Srv6GlobalCfgMgr {
    /// Create a new Srv6GlobalCfgMgr bound to `(db, table)`
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }

    /// Address currently applied, `::` until something else was pushed
    pub fn current_encap_src_addr<'a>(&self, directory: &'a Directory) -> &'a str {
        directory
            .get_scalar(&self.db, &self.table, fields::ENCAP_SRC_ADDR)
            .unwrap_or(DEFAULT_ENCAP_SRC_ADDR)
    }

    fn is_update_required(&self, directory: &Directory, addr: &str) -> bool {
        self.current_encap_src_addr(directory) != addr
    }

    /// Converge the encapsulation source address to `data`
    ///
    /// `None` restores the default address.
    pub async fn configure_srv6_encap_src_addr(
        &self,
        ctx: &mut MgrContext<'_>,
        data: Option<&FieldValues>,
    ) -> bool {
        let addr = normalize(
            data.and_then(|d| d.get_field(fields::ENCAP_SRC_ADDR))
                .unwrap_or(DEFAULT_ENCAP_SRC_ADDR),
        );

        if !self.is_update_required(ctx.directory, &addr) {
            debug!("SRv6 encapsulation source address is already {}", addr);
            return true;
        }

        if addr.parse::<Ipv6Addr>().is_err() {
            error!("Invalid SRv6 encapsulation source address '{}'", addr);
            return false;
        }

        if !ctx.cfg_mgr.push_list(&build_encap_src_addr_cmds(&addr)).await {
            error!("Failed to apply SRv6 encapsulation source address {}", addr);
            return false;
        }

        ctx.directory
            .put(&self.db, &self.table, fields::ENCAP_SRC_ADDR, addr.as_str());
        info!("SRv6 encapsulation source address set to {}", addr);
        true
    }
}

#[async_trait]
impl Manager for Srv6GlobalCfgMgr {
    fn name(&self) -> &str {
        "srv6globalcfgmgr"
    }

    fn db(&self) -> &str {
        &self.db
    }

    fn table(&self) -> &str {
        &self.table
    }

    #[instrument(skip(self, ctx, data))]
    async fn set_handler(&mut self, ctx: &mut MgrContext<'_>, key: &str, data: &FieldValues) -> bool {
        self.configure_srv6_encap_src_addr(ctx, Some(data)).await
    }

    #[instrument(skip(self, ctx, _data))]
    async fn del_handler(
        &mut self,
        ctx: &mut MgrContext<'_>,
        key: &str,
        _data: Option<&FieldValues>,
    ) -> bool {
        self.configure_srv6_encap_src_addr(ctx, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_bgpcfg_common::field_values;
    use sonic_bgpcfg_test::RecordingPusher;

    fn mgr() -> Srv6GlobalCfgMgr {
        Srv6GlobalCfgMgr::new("CONFIG_DB", "SRV6_GLOBAL")
    }

    #[tokio::test]
    async fn test_set_pushes_and_caches() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"encap_src_addr" => "fcbb:bbbb:1::1"};
        assert!(mgr.set_handler(&mut ctx, "Values", &data).await);

        assert_eq!(
            pusher.pushes(),
            vec![vec![
                "segment-routing".to_string(),
                "srv6".to_string(),
                "encapsulation".to_string(),
                "source-address fcbb:bbbb:1::1".to_string(),
            ]]
        );
        assert_eq!(
            ctx.directory
                .get_scalar("CONFIG_DB", "SRV6_GLOBAL", "encap_src_addr"),
            Some("fcbb:bbbb:1::1")
        );
    }

    #[tokio::test]
    async fn test_repeated_set_pushes_once() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"encap_src_addr" => "fc00::1"};
        assert!(mgr.set_handler(&mut ctx, "Values", &data).await);
        assert!(mgr.set_handler(&mut ctx, "Values", &data).await);
        // same address, different spelling
        let upper = field_values! {"encap_src_addr" => "FC00:0::1"};
        assert!(mgr.set_handler(&mut ctx, "Values", &upper).await);

        assert_eq!(pusher.push_count(), 1);
    }

    #[tokio::test]
    async fn test_del_without_set_is_noop() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        assert!(mgr.del_handler(&mut ctx, "Values", None).await);
        assert_eq!(pusher.push_count(), 0);
        assert_eq!(mgr.current_encap_src_addr(ctx.directory), "::");
    }

    #[tokio::test]
    async fn test_del_restores_default() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"encap_src_addr" => "fc00::1"};
        assert!(mgr.set_handler(&mut ctx, "Values", &data).await);
        assert!(mgr.del_handler(&mut ctx, "Values", None).await);

        assert_eq!(pusher.push_count(), 2);
        assert_eq!(
            pusher.last_push(),
            Some(build_encap_src_addr_cmds("::"))
        );
        assert_eq!(mgr.current_encap_src_addr(ctx.directory), "::");
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let good = field_values! {"encap_src_addr" => "fc00::1"};
        assert!(mgr.set_handler(&mut ctx, "Values", &good).await);

        let bad = field_values! {"encap_src_addr" => "not-an-ip"};
        assert!(!mgr.set_handler(&mut ctx, "Values", &bad).await);
        let v4 = field_values! {"encap_src_addr" => "10.0.0.1"};
        assert!(!mgr.set_handler(&mut ctx, "Values", &v4).await);

        assert_eq!(pusher.push_count(), 1);
        assert_eq!(mgr.current_encap_src_addr(ctx.directory), "fc00::1");
    }

    #[tokio::test]
    async fn test_push_failure_leaves_cache() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::failing();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"encap_src_addr" => "fc00::1"};
        assert!(!mgr.set_handler(&mut ctx, "Values", &data).await);
        assert_eq!(mgr.current_encap_src_addr(ctx.directory), "::");
        // the failed attempt was still offered to the routing daemon
        assert_eq!(pusher.push_count(), 1);
    }

    #[tokio::test]
    async fn test_row_without_address_means_default() {
        let mut mgr = mgr();
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        assert!(mgr.set_handler(&mut ctx, "Values", &FieldValues::new()).await);
        assert_eq!(pusher.push_count(), 0);
    }
}
