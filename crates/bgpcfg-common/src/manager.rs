//! Manager trait and common abstractions.
//!
//! A manager is bound to one `(db, table)` pair. The dispatcher hands it
//! every SET/DEL notification for that table, one at a time, together with
//! a [`MgrContext`] giving access to the shared [`Directory`] and to the
//! routing-daemon command pusher.

use async_trait::async_trait;

use crate::directory::{DepPath, Directory, TableRef};
use crate::push::ConfigPusher;

/// Database identifiers used by bgpcfgd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbId {
    /// Configuration database (CONFIG_DB) - source of configuration.
    ConfigDb,
    /// Application database (APPL_DB).
    ApplDb,
    /// State database (STATE_DB) - operational state tracking.
    StateDb,
}

impl DbId {
    /// Returns the database name as used in Redis/SONiC.
    pub fn name(&self) -> &'static str {
        match self {
            DbId::ConfigDb => "CONFIG_DB",
            DbId::ApplDb => "APPL_DB",
            DbId::StateDb => "STATE_DB",
        }
    }

    /// Returns the database ID number.
    pub fn id(&self) -> u32 {
        match self {
            DbId::ConfigDb => 4,
            DbId::ApplDb => 0,
            DbId::StateDb => 6,
        }
    }

    /// Returns the separator between table name and key in this database.
    pub fn separator(&self) -> char {
        match self {
            DbId::ApplDb => ':',
            DbId::ConfigDb | DbId::StateDb => '|',
        }
    }
}

/// Key-value tuple representing a field and its value.
pub type FieldValue = (String, String);

/// Collection of field-value pairs for a table entry.
pub type FieldValues = Vec<FieldValue>;

/// Helper trait for working with field-value collections.
pub trait FieldValuesExt {
    /// Gets the value for a field, if present.
    fn get_field(&self, field: &str) -> Option<&str>;

    /// Gets the value for a field, returning the default if not present.
    fn get_field_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str;

    /// Checks if a field exists.
    fn has_field(&self, field: &str) -> bool;
}

impl FieldValuesExt for FieldValues {
    fn get_field(&self, field: &str) -> Option<&str> {
        self.iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    fn get_field_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get_field(field).unwrap_or(default)
    }

    fn has_field(&self, field: &str) -> bool {
        self.iter().any(|(f, _)| f == field)
    }
}

/// Builds a FieldValues collection from key-value pairs.
#[macro_export]
macro_rules! field_values {
    ($($field:expr => $value:expr),* $(,)?) => {
        vec![
            $(($field.to_string(), $value.to_string()),)*
        ]
    };
}

/// Collaborators a handler may use while processing one event.
///
/// The dispatcher owns both; a handler borrows them only for the duration
/// of a single call, which keeps Directory access exclusive.
pub struct MgrContext<'a> {
    /// Shared configuration cache.
    pub directory: &'a mut Directory,
    /// Routing-daemon command pusher.
    pub cfg_mgr: &'a dyn ConfigPusher,
}

impl<'a> MgrContext<'a> {
    /// Creates a new handler context.
    pub fn new(directory: &'a mut Directory, cfg_mgr: &'a dyn ConfigPusher) -> Self {
        Self { directory, cfg_mgr }
    }
}

/// A reactive unit translating one table's changes into routing-daemon state.
///
/// Handlers return `true` when the event was applied and `false` when it was
/// rejected or intentionally ignored. They must never panic on bad input and
/// must push nothing when they return `false` for an ignored row.
#[async_trait]
pub trait Manager: Send {
    /// Returns the manager name (for logging).
    fn name(&self) -> &str;

    /// Returns the database this manager subscribes to.
    fn db(&self) -> &str;

    /// Returns the table this manager subscribes to.
    fn table(&self) -> &str;

    /// Returns the `(db, table)` pair this manager owns.
    fn table_ref(&self) -> TableRef {
        TableRef::new(self.db(), self.table())
    }

    /// Tables whose state this manager reads through the Directory.
    ///
    /// Managers owning those tables are started (replayed) first.
    fn deps(&self) -> Vec<TableRef> {
        Vec::new()
    }

    /// Directory paths that must exist before this row can be applied.
    ///
    /// A SET whose row dependencies are missing is deferred by the
    /// dispatcher and retried once one of the referenced tables changes.
    fn row_deps(&self, _key: &str, _data: &FieldValues) -> Vec<DepPath> {
        Vec::new()
    }

    /// Handles a SET notification.
    async fn set_handler(&mut self, ctx: &mut MgrContext<'_>, key: &str, data: &FieldValues)
        -> bool;

    /// Handles a DEL notification.
    ///
    /// `data` carries the deleted row when the store provides it. Deleting a
    /// key that was never set is a no-op, not an error.
    async fn del_handler(
        &mut self,
        ctx: &mut MgrContext<'_>,
        key: &str,
        data: Option<&FieldValues>,
    ) -> bool;
}
