//! Test fixtures for the tables bgpcfgd manages
//!
//! Provides reusable change events and multi-step scenarios

use sonic_bgpcfg_common::{ConfigEvent, FieldValues, Operation, TableRef};

/// Database every fixture targets unless told otherwise
pub const FIXTURE_DB: &str = "CONFIG_DB";

/// Represents a CONFIG_DB change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// Database name (e.g., "CONFIG_DB")
    pub db: String,
    /// Table name (e.g., "VRF", "SRV6_MY_SIDS")
    pub table: String,
    /// Key within the table
    pub key: String,
    /// Operation type
    pub op: Operation,
    /// Field-value pairs, in insertion order
    pub fields: FieldValues,
}

impl ConfigChange {
    /// Create a SET operation
    pub fn set(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            db: FIXTURE_DB.to_string(),
            table: table.into(),
            key: key.into(),
            op: Operation::Set,
            fields: FieldValues::new(),
        }
    }

    /// Create a DEL operation
    pub fn del(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            op: Operation::Del,
            ..Self::set(table, key)
        }
    }

    /// Target another database
    pub fn in_db(mut self, db: impl Into<String>) -> Self {
        self.db = db.into();
        self
    }

    /// Add a field, replacing an earlier value for the same field
    pub fn with_field(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        let field = field.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field, value)),
        }
        self
    }

    /// Add multiple fields
    pub fn with_fields<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        fields
            .into_iter()
            .fold(self, |change, (k, v)| change.with_field(k, v))
    }

    /// Table this change targets
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.db.clone(), self.table.clone())
    }

    /// Convert into the event a source would deliver
    ///
    /// DEL changes carry their fields only if some were added.
    pub fn to_event(&self) -> ConfigEvent {
        match self.op {
            Operation::Set => ConfigEvent::set(
                self.db.clone(),
                self.table.clone(),
                self.key.clone(),
                self.fields.clone(),
            ),
            Operation::Del => {
                let event = ConfigEvent::del(self.db.clone(), self.table.clone(), self.key.clone());
                if self.fields.is_empty() {
                    event
                } else {
                    event.with_data(self.fields.clone())
                }
            }
        }
    }
}

impl From<ConfigChange> for ConfigEvent {
    fn from(change: ConfigChange) -> Self {
        change.to_event()
    }
}

/// VRF table fixtures
pub mod vrf_fixtures {
    use super::*;

    /// VRF with no attributes
    pub fn vrf(name: &str) -> ConfigChange {
        ConfigChange::set("VRF", name)
    }

    /// VRF bound to an EVPN VNI
    pub fn vrf_with_vni(name: &str, vni: u32) -> ConfigChange {
        ConfigChange::set("VRF", name).with_field("vni", vni)
    }

    /// Delete VRF
    pub fn delete_vrf(name: &str) -> ConfigChange {
        ConfigChange::del("VRF", name)
    }
}

/// SRV6_MY_SIDS table fixtures
pub mod srv6_fixtures {
    use super::*;

    /// End SID with the default 32/16/16/0 format
    pub fn un_sid(addr: &str) -> ConfigChange {
        ConfigChange::set("SRV6_MY_SIDS", addr).with_field("action", "uN")
    }

    /// Decapsulation SID into `vrf`
    pub fn udt46_sid(addr: &str, vrf: &str) -> ConfigChange {
        ConfigChange::set("SRV6_MY_SIDS", addr)
            .with_field("action", "uDT46")
            .with_field("vrf", vrf)
    }

    /// Adjacency SID over the given next hops
    pub fn ua_sid(addr: &str, adj: &[&str]) -> ConfigChange {
        ConfigChange::set("SRV6_MY_SIDS", addr)
            .with_field("action", "uA")
            .with_field("adj", adj.join(","))
    }

    /// SID with an explicit format
    pub fn sid_with_format(
        addr: &str,
        action: &str,
        block_len: u8,
        node_len: u8,
        func_len: u8,
    ) -> ConfigChange {
        ConfigChange::set("SRV6_MY_SIDS", addr)
            .with_field("action", action)
            .with_field("block_len", block_len)
            .with_field("node_len", node_len)
            .with_field("func_len", func_len)
    }

    /// Delete SID
    pub fn delete_sid(addr: &str) -> ConfigChange {
        ConfigChange::del("SRV6_MY_SIDS", addr)
    }
}

/// SRV6_GLOBAL table fixtures
pub mod srv6_global_fixtures {
    use super::*;

    /// Key of the single SRV6_GLOBAL row
    pub const SRV6_GLOBAL_KEY: &str = "Values";

    /// Set the encapsulation source address
    pub fn encap_src_addr(addr: &str) -> ConfigChange {
        ConfigChange::set("SRV6_GLOBAL", SRV6_GLOBAL_KEY).with_field("encap_src_addr", addr)
    }

    /// Delete the global row
    pub fn delete_srv6_global() -> ConfigChange {
        ConfigChange::del("SRV6_GLOBAL", SRV6_GLOBAL_KEY)
    }
}

/// BGP_DEVICE_GLOBAL table fixtures
pub mod as_path_fixtures {
    use super::*;

    /// Key of the T2 group ASN row
    pub const T2_GROUP_ASNS_KEY: &str = "localhost|t2_group_asns";

    /// T2 group ASN list
    pub fn t2_group_asns(asns: &[u32]) -> ConfigChange {
        let list: Vec<String> = asns.iter().map(|a| a.to_string()).collect();
        ConfigChange::set("BGP_DEVICE_GLOBAL", T2_GROUP_ASNS_KEY).with_field("asns", list.join(","))
    }

    /// Delete the T2 group ASN list
    pub fn delete_t2_group_asns() -> ConfigChange {
        ConfigChange::del("BGP_DEVICE_GLOBAL", T2_GROUP_ASNS_KEY)
    }
}

/// Test scenario builder for complex multi-step tests
#[derive(Debug)]
pub struct TestScenario {
    /// Scenario name
    pub name: String,
    /// Sequence of configuration changes
    pub changes: Vec<ConfigChange>,
    /// Command lists expected at the routing daemon, in order
    pub expected_pushes: Vec<Vec<String>>,
}

impl TestScenario {
    /// Create a new test scenario
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
            expected_pushes: Vec::new(),
        }
    }

    /// Add a configuration change to the scenario
    pub fn add_change(mut self, change: ConfigChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Expect one more command list at the routing daemon
    pub fn expect_push<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_pushes
            .push(commands.into_iter().map(Into::into).collect());
        self
    }

    /// Events the scenario feeds to the dispatcher
    pub fn events(&self) -> Vec<ConfigEvent> {
        self.changes.iter().map(ConfigChange::to_event).collect()
    }
}
