//! Config dispatcher - routes change events to the owning manager
//!
//! The dispatcher owns the [`Directory`] and the routing-daemon pusher and
//! lends both to exactly one handler at a time. Events are processed
//! strictly in arrival order; a handler runs to completion before the next
//! event is read, so managers always see a consistent Directory.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use sonic_bgpcfg_common::{
    CfgMgrError, CfgMgrResult, ConfigEvent, ConfigPusher, DepPath, Directory, EventSource,
    FieldValues, Manager, MgrContext, Operation, TableRef,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Delay before reading again after a transient event source error
const SOURCE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Event counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Events a handler accepted
    pub handled: u64,
    /// Events a handler rejected or ignored
    pub failed: u64,
    /// SETs parked until their row dependencies appear
    pub deferred: u64,
    /// Events for tables no manager owns
    pub unrouted: u64,
}

/// A SET waiting for its row dependencies
#[derive(Debug)]
struct Deferred {
    key: String,
    data: FieldValues,
    deps: Vec<DepPath>,
}

struct ManagerSlot {
    mgr: Box<dyn Manager>,
    deferred: Vec<Deferred>,
}

impl ManagerSlot {
    fn take_deferred(&mut self, key: &str) -> Option<Deferred> {
        let pos = self.deferred.iter().position(|d| d.key == key)?;
        Some(self.deferred.remove(pos))
    }
}

/// Config Dispatcher
pub struct Dispatcher {
    directory: Directory,
    cfg_mgr: Arc<dyn ConfigPusher>,
    slots: Vec<ManagerSlot>,
    routes: HashMap<TableRef, usize>,
    stats: DispatcherStats,
}

impl Dispatcher {
    /// Create a dispatcher pushing commands through `cfg_mgr`
    pub fn new(cfg_mgr: Arc<dyn ConfigPusher>) -> Self {
        Self {
            directory: Directory::new(),
            cfg_mgr,
            slots: Vec::new(),
            routes: HashMap::new(),
            stats: DispatcherStats::default(),
        }
    }

    /// Register a manager for the `(db, table)` it declares
    pub fn register(&mut self, mgr: impl Manager + 'static) -> CfgMgrResult<()> {
        let table = mgr.table_ref();
        if self.routes.contains_key(&table) {
            return Err(CfgMgrError::internal(format!(
                "{} is already owned by another manager",
                table
            )));
        }

        info!("Registered {} for {}", mgr.name(), table);
        self.routes.insert(table, self.slots.len());
        self.slots.push(ManagerSlot {
            mgr: Box::new(mgr),
            deferred: Vec::new(),
        });
        Ok(())
    }

    /// Shared configuration cache
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Event counters so far
    pub fn stats(&self) -> DispatcherStats {
        self.stats
    }

    /// Number of SETs currently waiting for dependencies
    pub fn deferred_count(&self) -> usize {
        self.slots.iter().map(|s| s.deferred.len()).sum()
    }

    /// Tables in the order their managers must be started
    ///
    /// A manager comes after every registered manager owning a table it
    /// depends on; otherwise registration order is kept.
    pub fn startup_order(&self) -> CfgMgrResult<Vec<TableRef>> {
        let n = self.slots.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (idx, slot) in self.slots.iter().enumerate() {
            let owned: BTreeSet<usize> = slot
                .mgr
                .deps()
                .iter()
                .filter_map(|t| self.routes.get(t).copied())
                .filter(|&dep| dep != idx)
                .collect();
            indegree[idx] = owned.len();
            for dep in owned {
                dependents[dep].push(idx);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &next in &dependents[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < n {
            let tables = (0..n)
                .filter(|i| indegree[*i] > 0)
                .map(|i| self.slots[i].mgr.table_ref().to_string())
                .collect();
            return Err(CfgMgrError::DependencyCycle { tables });
        }

        Ok(order
            .into_iter()
            .map(|i| self.slots[i].mgr.table_ref())
            .collect())
    }

    /// Replay the current content of every managed table, dependencies first
    pub async fn start(&mut self, source: &mut dyn EventSource) -> CfgMgrResult<()> {
        for table in self.startup_order()? {
            let events = source.snapshot(&table).await?;
            info!("Replaying {} entries of {}", events.len(), table);
            for event in events {
                self.handle_event(event).await;
            }
        }
        Ok(())
    }

    /// Start, then process events until the source closes or `shutdown` fires
    pub async fn run(
        &mut self,
        source: &mut dyn EventSource,
        shutdown: CancellationToken,
    ) -> CfgMgrResult<()> {
        self.start(source).await?;
        info!("Initial replay done, waiting for changes");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                next = source.next_event() => next,
            };

            match next {
                Ok(Some(event)) => {
                    self.handle_event(event).await;
                }
                Ok(None) => {
                    info!("Event source closed");
                    break;
                }
                Err(e) if e.is_retryable() => {
                    warn!("Event source error, retrying: {}", e);
                    tokio::time::sleep(SOURCE_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Route one event to its manager
    ///
    /// Returns true if a handler accepted it. Handler failures are logged
    /// and never stop the dispatcher.
    #[instrument(skip(self, event), fields(table = %event.table, op = %event.op, key = %event.key))]
    pub async fn handle_event(&mut self, event: ConfigEvent) -> bool {
        let Some(&idx) = self.routes.get(&event.table) else {
            debug!("No manager for {}", event.table);
            self.stats.unrouted += 1;
            return false;
        };

        let ConfigEvent { op, key, data, .. } = event;
        let slot = &mut self.slots[idx];

        let handled = match op {
            Operation::Set => {
                let data = data.unwrap_or_default();
                if slot.take_deferred(&key).is_some() {
                    debug!("Replacing deferred entry {}", key);
                }

                let deps = slot.mgr.row_deps(&key, &data);
                if !self.directory.available(&deps) {
                    info!(
                        deps = ?deps.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
                        "{} waiting for dependencies",
                        key
                    );
                    slot.deferred.push(Deferred { key, data, deps });
                    self.stats.deferred += 1;
                    return false;
                }

                let mut ctx = MgrContext::new(&mut self.directory, self.cfg_mgr.as_ref());
                slot.mgr.set_handler(&mut ctx, &key, &data).await
            }
            Operation::Del => {
                if slot.take_deferred(&key).is_some() {
                    debug!("Dropped deferred entry {} on delete", key);
                }

                let mut ctx = MgrContext::new(&mut self.directory, self.cfg_mgr.as_ref());
                slot.mgr.del_handler(&mut ctx, &key, data.as_ref()).await
            }
        };

        self.record(idx, &key, handled);
        self.retry_deferred().await;
        handled
    }

    fn record(&mut self, idx: usize, key: &str, handled: bool) {
        if handled {
            self.stats.handled += 1;
        } else {
            self.stats.failed += 1;
            warn!("{} did not apply {}", self.slots[idx].mgr.name(), key);
        }
    }

    /// Apply deferred SETs whose dependencies appeared
    ///
    /// Runs until the Directory stops changing. Every pass that changes it
    /// consumes at least one deferred entry, so this terminates.
    async fn retry_deferred(&mut self) {
        loop {
            let changes = self.directory.take_changes();
            if changes.is_empty() {
                return;
            }

            for idx in 0..self.slots.len() {
                let ready = {
                    let slot = &mut self.slots[idx];
                    let directory = &self.directory;
                    let mut ready = Vec::new();
                    let mut waiting = Vec::new();
                    for entry in slot.deferred.drain(..) {
                        let touched = entry.deps.iter().any(|d| changes.contains(&d.table));
                        if touched && directory.available(&entry.deps) {
                            ready.push(entry);
                        } else {
                            waiting.push(entry);
                        }
                    }
                    slot.deferred = waiting;
                    ready
                };

                for entry in ready {
                    debug!("Dependencies of {} available, applying", entry.key);
                    let slot = &mut self.slots[idx];
                    let mut ctx = MgrContext::new(&mut self.directory, self.cfg_mgr.as_ref());
                    let handled = slot.mgr.set_handler(&mut ctx, &entry.key, &entry.data).await;
                    self.record(idx, &entry.key, handled);
                }
            }
        }
    }

    /// Log final counters
    pub fn log_stats(&self) {
        let stats = self.stats;
        if stats.failed > 0 {
            error!(?stats, "bgpcfgd stopping with rejected events");
        } else {
            info!(?stats, "bgpcfgd stopping");
        }
    }
}
