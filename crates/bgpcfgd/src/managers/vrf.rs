//! VRF Manager - mirrors the VRF table into the Directory

use async_trait::async_trait;
use sonic_bgpcfg_common::{FieldValues, Manager, MgrContext};
use tracing::{debug, info, instrument, warn};

/// VRF Manager
///
/// Never talks to the routing daemon. It only makes VRF existence
/// queryable by other managers through the Directory.
pub struct VrfMgr {
    db: String,
    table: String,
}

impl VrfMgr {
    /// Create a new VrfMgr bound to `(db, table)`
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }
}

#[async_trait]
impl Manager for VrfMgr {
    fn name(&self) -> &str {
        "vrfmgr"
    }

    fn db(&self) -> &str {
        &self.db
    }

    fn table(&self) -> &str {
        &self.table
    }

    #[instrument(skip(self, ctx, data))]
    async fn set_handler(&mut self, ctx: &mut MgrContext<'_>, key: &str, data: &FieldValues) -> bool {
        if key.is_empty() {
            warn!("Ignoring VRF entry with an empty name");
            return false;
        }

        ctx.directory.put(&self.db, &self.table, key, data.clone());
        info!("VRF {} registered", key);
        true
    }

    #[instrument(skip(self, ctx, _data))]
    async fn del_handler(
        &mut self,
        ctx: &mut MgrContext<'_>,
        key: &str,
        _data: Option<&FieldValues>,
    ) -> bool {
        match ctx.directory.remove(&self.db, &self.table, key) {
            Some(_) => info!("VRF {} unregistered", key),
            None => debug!("VRF {} was not registered", key),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_bgpcfg_common::{field_values, Directory};
    use sonic_bgpcfg_test::RecordingPusher;

    #[tokio::test]
    async fn test_set_and_del() {
        let mut mgr = VrfMgr::new("CONFIG_DB", "VRF");
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        let data = field_values! {"vni" => "1000"};
        assert!(mgr.set_handler(&mut ctx, "Vrf1", &data).await);
        assert_eq!(ctx.directory.get_row("CONFIG_DB", "VRF", "Vrf1"), Some(&data));

        assert!(mgr.del_handler(&mut ctx, "Vrf1", None).await);
        assert!(!ctx.directory.path_exist("CONFIG_DB", "VRF", "Vrf1"));
        assert_eq!(pusher.push_count(), 0);
    }

    #[tokio::test]
    async fn test_del_unknown_vrf_is_noop() {
        let mut mgr = VrfMgr::new("CONFIG_DB", "VRF");
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        assert!(mgr.del_handler(&mut ctx, "Vrf9", None).await);
        assert_eq!(pusher.push_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_key_ignored() {
        let mut mgr = VrfMgr::new("CONFIG_DB", "VRF");
        let mut dir = Directory::new();
        let pusher = RecordingPusher::new();
        let mut ctx = MgrContext::new(&mut dir, &pusher);

        assert!(!mgr.set_handler(&mut ctx, "", &FieldValues::new()).await);
        assert!(ctx.directory.get_table("CONFIG_DB", "VRF").is_none());
    }
}
