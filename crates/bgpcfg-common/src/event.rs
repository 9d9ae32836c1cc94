//! Row-level change events and the sources that deliver them.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::directory::TableRef;
use crate::error::CfgMgrResult;
use crate::manager::FieldValues;

/// Operation type of a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set operation (add or update)
    Set,
    /// Delete operation
    Del,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Set => "SET",
            Operation::Del => "DEL",
        })
    }
}

/// One row-level change: `(db, table, op, key, data)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEvent {
    /// Table the row belongs to.
    pub table: TableRef,
    /// SET or DEL.
    pub op: Operation,
    /// Row key (may be compound, e.g. "localhost|t2_group_asns").
    pub key: String,
    /// Row contents. Always present for SET; optional for DEL.
    pub data: Option<FieldValues>,
}

impl ConfigEvent {
    /// Creates a SET event.
    pub fn set(
        db: impl Into<String>,
        table: impl Into<String>,
        key: impl Into<String>,
        data: FieldValues,
    ) -> Self {
        Self {
            table: TableRef::new(db, table),
            op: Operation::Set,
            key: key.into(),
            data: Some(data),
        }
    }

    /// Creates a DEL event without row contents.
    pub fn del(db: impl Into<String>, table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: TableRef::new(db, table),
            op: Operation::Del,
            key: key.into(),
            data: None,
        }
    }

    /// Attaches the deleted row to a DEL event.
    pub fn with_data(mut self, data: FieldValues) -> Self {
        self.data = Some(data);
        self
    }
}

/// Source of configuration change notifications.
#[async_trait]
pub trait EventSource: Send {
    /// Returns the current rows of a table as SET events.
    async fn snapshot(&mut self, table: &TableRef) -> CfgMgrResult<Vec<ConfigEvent>>;

    /// Waits for the next change. `None` means the source is exhausted.
    async fn next_event(&mut self) -> CfgMgrResult<Option<ConfigEvent>>;
}

/// In-process event source fed through a tokio channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<ConfigEvent>,
    snapshots: BTreeMap<TableRef, Vec<ConfigEvent>>,
}

impl ChannelSource {
    /// Creates a source and the sender feeding it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ConfigEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let source = Self {
            rx,
            snapshots: BTreeMap::new(),
        };
        (tx, source)
    }

    /// Seeds the initial content returned by [`EventSource::snapshot`].
    pub fn with_snapshot(mut self, events: impl IntoIterator<Item = ConfigEvent>) -> Self {
        for event in events {
            self.snapshots
                .entry(event.table.clone())
                .or_default()
                .push(event);
        }
        self
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn snapshot(&mut self, table: &TableRef) -> CfgMgrResult<Vec<ConfigEvent>> {
        Ok(self.snapshots.remove(table).unwrap_or_default())
    }

    async fn next_event(&mut self) -> CfgMgrResult<Option<ConfigEvent>> {
        Ok(self.rx.recv().await)
    }
}
