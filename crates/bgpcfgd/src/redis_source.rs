//! Redis event source.
//!
//! Initial table content is read with KEYS + HGETALL. Changes arrive as
//! keyspace notifications (`__keyspace@<db>__:<table><sep><key>`); the
//! current row is re-read on every hash write so managers always receive
//! the full field set.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::pin::Pin;

use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Msg};
use sonic_bgpcfg_common::{
    CfgMgrError, CfgMgrResult, ConfigEvent, EventSource, FieldValues, TableRef,
};
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;

const KEYSPACE_PREFIX: &str = "__keyspace@";

/// What a keyspace notification means for the row it names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceAction {
    /// The hash changed; its current content must be re-read
    Refresh,
    /// The key is gone
    Remove,
}

/// Map a keyspace event name to the action it requires
pub fn classify_keyspace_event(event: &str) -> Option<KeyspaceAction> {
    match event {
        "hset" | "hmset" | "hsetnx" | "hdel" | "hincrby" => Some(KeyspaceAction::Refresh),
        "del" | "expired" | "evicted" => Some(KeyspaceAction::Remove),
        _ => None,
    }
}

/// Split `__keyspace@4__:VRF|Vrf1` into the database number and Redis key
pub fn parse_keyspace_channel(channel: &str) -> Option<(u32, &str)> {
    let rest = channel.strip_prefix(KEYSPACE_PREFIX)?;
    let (id, key) = rest.split_once("__:")?;
    Some((id.parse().ok()?, key))
}

/// Split a Redis key into table name and row key at the first separator
pub fn split_table_key(redis_key: &str, separator: char) -> Option<(&str, &str)> {
    let (table, key) = redis_key.split_once(separator)?;
    if table.is_empty() || key.is_empty() {
        return None;
    }
    Some((table, key))
}

/// Table/key layout of one connected database
#[derive(Debug, Clone)]
struct DbLayout {
    name: String,
    id: u32,
    separator: char,
}

/// A keyspace notification for a managed row, not yet resolved to an event
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingChange {
    db: usize,
    redis_key: String,
    table: TableRef,
    key: String,
    action: KeyspaceAction,
}

/// Raw `(channel, payload)` pairs from the notification subscription
type NoticeStream = Pin<Box<dyn Stream<Item = (String, String)> + Send>>;

/// Row reads against the databases a source is connected to
#[async_trait]
trait RowStore: Send {
    async fn keys(&mut self, db: usize, pattern: &str) -> CfgMgrResult<Vec<String>>;

    async fn hgetall(&mut self, db: usize, redis_key: &str) -> CfgMgrResult<FieldValues>;
}

/// One connection per database, indexed like the source's layouts
struct RedisRows {
    conns: Vec<ConnectionManager>,
}

fn redis_err(operation: &str, e: redis::RedisError) -> CfgMgrError {
    CfgMgrError::database(operation, e.to_string())
}

#[async_trait]
impl RowStore for RedisRows {
    async fn keys(&mut self, db: usize, pattern: &str) -> CfgMgrResult<Vec<String>> {
        self.conns[db]
            .keys(pattern)
            .await
            .map_err(|e| redis_err("KEYS", e))
    }

    async fn hgetall(&mut self, db: usize, redis_key: &str) -> CfgMgrResult<FieldValues> {
        let fvs: BTreeMap<String, String> = self.conns[db]
            .hgetall(redis_key)
            .await
            .map_err(|e| redis_err("HGETALL", e))?;
        Ok(fvs.into_iter().collect())
    }
}

/// Turns keyspace notifications into change events
///
/// A notification whose row read fails stays pending and is resolved again
/// on the next call, so a transient store error never loses a change.
struct KeyspaceReader<S> {
    dbs: Vec<DbLayout>,
    tables: HashSet<TableRef>,
    notices: NoticeStream,
    pending: Option<PendingChange>,
    store: S,
}

impl<S: RowStore> KeyspaceReader<S> {
    fn db_index(&self, name: &str) -> CfgMgrResult<usize> {
        self.dbs
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| CfgMgrError::entry_not_found("databases", name))
    }

    /// Match one notification against the managed tables
    fn classify(&self, channel: &str, payload: &str) -> Option<PendingChange> {
        let (id, redis_key) = parse_keyspace_channel(channel)?;
        let action = classify_keyspace_event(payload)?;
        let db = self.dbs.iter().position(|d| d.id == id)?;
        let (table, key) = split_table_key(redis_key, self.dbs[db].separator)?;

        let table = TableRef::new(self.dbs[db].name.clone(), table);
        if !self.tables.contains(&table) {
            return None;
        }
        Some(PendingChange {
            db,
            redis_key: redis_key.to_string(),
            table,
            key: key.to_string(),
            action,
        })
    }

    async fn resolve(&mut self, change: &PendingChange) -> CfgMgrResult<ConfigEvent> {
        let PendingChange { table, key, .. } = change;
        match change.action {
            KeyspaceAction::Refresh => {
                let fvs = self.store.hgetall(change.db, &change.redis_key).await?;
                if fvs.is_empty() {
                    Ok(ConfigEvent::del(table.db.clone(), table.table.clone(), key.clone()))
                } else {
                    Ok(ConfigEvent::set(table.db.clone(), table.table.clone(), key.clone(), fvs))
                }
            }
            KeyspaceAction::Remove => Ok(ConfigEvent::del(
                table.db.clone(),
                table.table.clone(),
                key.clone(),
            )),
        }
    }

    async fn snapshot(&mut self, table: &TableRef) -> CfgMgrResult<Vec<ConfigEvent>> {
        let idx = self.db_index(&table.db)?;
        let separator = self.dbs[idx].separator;
        let pattern = format!("{}{}*", table.table, separator);

        let mut keys = self.store.keys(idx, &pattern).await?;
        keys.sort();

        let mut events = Vec::with_capacity(keys.len());
        for redis_key in keys {
            let Some((_, key)) = split_table_key(&redis_key, separator) else {
                continue;
            };
            let key = key.to_string();
            let fvs = self.store.hgetall(idx, &redis_key).await?;
            // removed between KEYS and HGETALL
            if fvs.is_empty() {
                continue;
            }
            events.push(ConfigEvent::set(
                table.db.clone(),
                table.table.clone(),
                key,
                fvs,
            ));
        }

        debug!("Read {} entries from {}", events.len(), table);
        Ok(events)
    }

    async fn next_event(&mut self) -> CfgMgrResult<Option<ConfigEvent>> {
        loop {
            let change = match self.pending.take() {
                Some(change) => {
                    debug!("Retrying pending change {}", change.redis_key);
                    change
                }
                None => {
                    let Some((channel, payload)) = self.notices.next().await else {
                        warn!("Redis notification stream ended");
                        return Ok(None);
                    };
                    match self.classify(&channel, &payload) {
                        Some(change) => change,
                        None => continue,
                    }
                }
            };

            match self.resolve(&change).await {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.pending = Some(change);
                    return Err(e);
                }
            }
        }
    }
}

/// Event source backed by a live Redis server
pub struct RedisSource {
    reader: KeyspaceReader<RedisRows>,
}

impl RedisSource {
    /// Connect to every configured database holding one of `tables`
    pub async fn connect(config: &DaemonConfig, tables: &[TableRef]) -> CfgMgrResult<Self> {
        let tables: HashSet<TableRef> = tables.iter().cloned().collect();
        let names: BTreeSet<&str> = tables.iter().map(|t| t.db.as_str()).collect();

        let mut dbs = Vec::new();
        let mut conns = Vec::new();
        for name in names {
            let db = config.database(name).ok_or_else(|| {
                CfgMgrError::invalid_config(
                    "databases",
                    format!("{} is not a configured database", name),
                )
            })?;

            let url = config.redis_url(db.id);
            let client = redis::Client::open(url.as_str()).map_err(|e| redis_err("open", e))?;
            let mut conn = client
                .get_connection_manager()
                .await
                .map_err(|e| redis_err("connect", e))?;

            let notify: redis::RedisResult<()> = redis::cmd("CONFIG")
                .arg("SET")
                .arg("notify-keyspace-events")
                .arg("KEA")
                .query_async(&mut conn)
                .await;
            if let Err(e) = notify {
                warn!("Could not enable keyspace notifications on {}: {}", db.name, e);
            }

            info!("Connected to Redis: {} (db={})", db.name, db.id);
            dbs.push(DbLayout {
                name: db.name.clone(),
                id: db.id,
                separator: db.separator_char(),
            });
            conns.push(conn);
        }

        let client = redis::Client::open(config.redis_url(0).as_str())
            .map_err(|e| redis_err("open", e))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| redis_err("pubsub", e))?;
        for db in &dbs {
            let pattern = format!("{}{}__:*", KEYSPACE_PREFIX, db.id);
            pubsub
                .psubscribe(&pattern)
                .await
                .map_err(|e| redis_err("psubscribe", e))?;
            debug!("Subscribed to {}", pattern);
        }

        let notices = pubsub.into_on_message().filter_map(|msg: Msg| {
            let notice = match msg.get_payload::<String>() {
                Ok(payload) => Some((msg.get_channel_name().to_string(), payload)),
                Err(e) => {
                    warn!("Unreadable keyspace notification on {}: {}", msg.get_channel_name(), e);
                    None
                }
            };
            future::ready(notice)
        });

        Ok(Self {
            reader: KeyspaceReader {
                dbs,
                tables,
                notices: Box::pin(notices),
                pending: None,
                store: RedisRows { conns },
            },
        })
    }
}

#[async_trait]
impl EventSource for RedisSource {
    async fn snapshot(&mut self, table: &TableRef) -> CfgMgrResult<Vec<ConfigEvent>> {
        self.reader.snapshot(table).await
    }

    async fn next_event(&mut self) -> CfgMgrResult<Option<ConfigEvent>> {
        self.reader.next_event().await
    }
}
