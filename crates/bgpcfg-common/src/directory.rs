//! Cross-manager configuration cache.
//!
//! The [`Directory`] mirrors every row a manager has validated and accepted,
//! indexed as `db -> table -> key -> value`. Managers consult it for
//! dependency checks against other tables; they only ever write under their
//! own `(db, table)`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::trace;

use crate::manager::FieldValues;

/// A `(db, table)` pair identifying one table of one database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef {
    /// Database name (e.g., "CONFIG_DB").
    pub db: String,
    /// Table name (e.g., "VRF").
    pub table: String,
}

impl TableRef {
    /// Creates a new table reference.
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.db, self.table)
    }
}

/// A fully qualified Directory path: `(db, table, key)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepPath {
    /// The table holding the entry.
    pub table: TableRef,
    /// Row key within the table.
    pub key: String,
}

impl DepPath {
    /// Creates a new dependency path.
    pub fn new(db: impl Into<String>, table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: TableRef::new(db, table),
            key: key.into(),
        }
    }
}

impl fmt::Display for DepPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.table, self.key)
    }
}

/// A value stored in the Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirValue {
    /// A single scalar setting.
    Scalar(String),
    /// A whole configuration row.
    Row(FieldValues),
}

impl DirValue {
    /// Returns the scalar value, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            DirValue::Scalar(s) => Some(s),
            DirValue::Row(_) => None,
        }
    }

    /// Returns the row, if this is a row.
    pub fn as_row(&self) -> Option<&FieldValues> {
        match self {
            DirValue::Row(fvs) => Some(fvs),
            DirValue::Scalar(_) => None,
        }
    }
}

impl From<String> for DirValue {
    fn from(s: String) -> Self {
        DirValue::Scalar(s)
    }
}

impl From<&str> for DirValue {
    fn from(s: &str) -> Self {
        DirValue::Scalar(s.to_string())
    }
}

impl From<FieldValues> for DirValue {
    fn from(fvs: FieldValues) -> Self {
        DirValue::Row(fvs)
    }
}

/// Namespaced key-value cache shared by all managers.
///
/// Every `put`/`remove` records the touched table so the dispatcher can
/// retry deferred rows that depend on it.
#[derive(Debug, Default)]
pub struct Directory {
    data: BTreeMap<String, BTreeMap<String, BTreeMap<String, DirValue>>>,
    changed: BTreeSet<TableRef>,
}

impl Directory {
    /// Creates an empty Directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `(db, table, key)` holds a value.
    pub fn path_exist(&self, db: &str, table: &str, key: &str) -> bool {
        self.get(db, table, key).is_some()
    }

    /// Returns the value stored at `(db, table, key)`.
    pub fn get(&self, db: &str, table: &str, key: &str) -> Option<&DirValue> {
        self.data.get(db)?.get(table)?.get(key)
    }

    /// Returns the scalar stored at `(db, table, key)`.
    pub fn get_scalar(&self, db: &str, table: &str, key: &str) -> Option<&str> {
        self.get(db, table, key).and_then(DirValue::as_scalar)
    }

    /// Returns the row stored at `(db, table, key)`.
    pub fn get_row(&self, db: &str, table: &str, key: &str) -> Option<&FieldValues> {
        self.get(db, table, key).and_then(DirValue::as_row)
    }

    /// Returns every entry of a table.
    pub fn get_table(&self, db: &str, table: &str) -> Option<&BTreeMap<String, DirValue>> {
        self.data.get(db)?.get(table)
    }

    /// Stores a value, replacing any previous one.
    pub fn put(&mut self, db: &str, table: &str, key: &str, value: impl Into<DirValue>) {
        let value = value.into();
        trace!(db, table, key, ?value, "directory put");
        self.data
            .entry(db.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.changed.insert(TableRef::new(db, table));
    }

    /// Removes a value. Removing an absent path is a no-op.
    pub fn remove(&mut self, db: &str, table: &str, key: &str) -> Option<DirValue> {
        let tables = self.data.get_mut(db)?;
        let entries = tables.get_mut(table)?;
        let removed = entries.remove(key)?;
        if entries.is_empty() {
            tables.remove(table);
        }
        trace!(db, table, key, "directory remove");
        self.changed.insert(TableRef::new(db, table));
        Some(removed)
    }

    /// Returns true if every path exists.
    pub fn available(&self, paths: &[DepPath]) -> bool {
        paths
            .iter()
            .all(|p| self.path_exist(&p.table.db, &p.table.table, &p.key))
    }

    /// Drains the set of tables touched since the last call.
    pub fn take_changes(&mut self) -> BTreeSet<TableRef> {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_put_get_remove() {
        let mut dir = Directory::new();
        assert!(!dir.path_exist("CONFIG_DB", "VRF", "Vrf1"));

        dir.put("CONFIG_DB", "VRF", "Vrf1", vec![("vni".to_string(), "100".to_string())]);
        assert!(dir.path_exist("CONFIG_DB", "VRF", "Vrf1"));
        assert_eq!(
            dir.get_row("CONFIG_DB", "VRF", "Vrf1"),
            Some(&vec![("vni".to_string(), "100".to_string())])
        );
        assert_eq!(dir.get_scalar("CONFIG_DB", "VRF", "Vrf1"), None);

        assert!(dir.remove("CONFIG_DB", "VRF", "Vrf1").is_some());
        assert!(!dir.path_exist("CONFIG_DB", "VRF", "Vrf1"));
        assert!(dir.get_table("CONFIG_DB", "VRF").is_none());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut dir = Directory::new();
        assert!(dir.remove("CONFIG_DB", "VRF", "Vrf1").is_none());
        assert!(dir.take_changes().is_empty());
    }

    #[test]
    fn test_scalar_overwrite() {
        let mut dir = Directory::new();
        dir.put("CONFIG_DB", "SRV6_GLOBAL", "encap_src_addr", "::");
        dir.put("CONFIG_DB", "SRV6_GLOBAL", "encap_src_addr", "fc00::1");
        assert_eq!(
            dir.get_scalar("CONFIG_DB", "SRV6_GLOBAL", "encap_src_addr"),
            Some("fc00::1")
        );
    }

    #[test]
    fn test_available() {
        let mut dir = Directory::new();
        let deps = vec![
            DepPath::new("CONFIG_DB", "VRF", "Vrf1"),
            DepPath::new("CONFIG_DB", "VRF", "Vrf2"),
        ];
        assert!(dir.available(&[]));
        assert!(!dir.available(&deps));

        dir.put("CONFIG_DB", "VRF", "Vrf1", FieldValues::new());
        assert!(!dir.available(&deps));
        dir.put("CONFIG_DB", "VRF", "Vrf2", FieldValues::new());
        assert!(dir.available(&deps));
    }

    #[test]
    fn test_change_tracking() {
        let mut dir = Directory::new();
        dir.put("CONFIG_DB", "VRF", "Vrf1", FieldValues::new());
        dir.put("CONFIG_DB", "VRF", "Vrf2", FieldValues::new());
        dir.put("CONFIG_DB", "SRV6_GLOBAL", "encap_src_addr", "::");

        let changes = dir.take_changes();
        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&TableRef::new("CONFIG_DB", "VRF")));
        assert!(dir.take_changes().is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(TableRef::new("CONFIG_DB", "VRF").to_string(), "CONFIG_DB|VRF");
        assert_eq!(
            DepPath::new("CONFIG_DB", "VRF", "Vrf1").to_string(),
            "CONFIG_DB|VRF|Vrf1"
        );
    }
}
