//! Resource Ledger: liveness tracking and reclamation.
//!
//! A resource is alive while any of these hold:
//!
//! * it carries an `rdf:type rdfs:Resource` row (explicit assertion),
//! * its reference count is non-zero,
//! * it is pinned (ontology classes and properties, named graphs).
//!
//! Dead resources are reclaimed by [`ResourceLedger::sweep`], which drains a
//! worklist: a reclaimed resource loses all its own rows, which drops the
//! references it held and may queue further resources.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashSet;
use tracing::{debug, info, trace};

use crate::error::{Result, StoreError};
use crate::ontology::{DataType, Ontology};
use crate::storage::schema::quote_ident;
use crate::storage::{resources, OntologyResources, PropertyTableStore};
use crate::types::ResourceId;

/// What started a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepTrigger {
    /// End of an update batch.
    Update,
    /// Full collection (open or explicit request).
    Collection,
}

/// Counters reported by a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepStats {
    /// What started the sweep.
    pub trigger: SweepTrigger,
    /// Worklist entries examined.
    pub examined: u64,
    /// Resources reclaimed.
    pub reclaimed: u64,
    /// Property rows removed while reclaiming.
    pub rows_removed: u64,
    /// Wall time spent.
    pub run_millis: u64,
}

impl SweepStats {
    fn new(trigger: SweepTrigger) -> Self {
        Self {
            trigger,
            examined: 0,
            reclaimed: 0,
            rows_removed: 0,
            run_millis: 0,
        }
    }
}

/// Reference counts, liveness checks and the reclamation worklist.
///
/// Owned by the writer; every mutating method runs inside the writer's
/// transaction, so counts are never observed half-applied.
pub struct ResourceLedger {
    ontology: Arc<Ontology>,
    ids: Arc<OntologyResources>,
    pending: VecDeque<ResourceId>,
    queued: FxHashSet<ResourceId>,
}

impl ResourceLedger {
    pub(crate) fn new(ontology: Arc<Ontology>, ids: Arc<OntologyResources>) -> Self {
        Self {
            ontology,
            ids,
            pending: VecDeque::new(),
            queued: FxHashSet::default(),
        }
    }

    /// Increments the reference count of `target`.
    pub(crate) fn add_reference(&mut self, conn: &Connection, target: ResourceId) -> Result<u64> {
        if !resources::exists(conn, target)? {
            return Err(StoreError::consistency(format!(
                "reference to unknown resource {target}"
            )));
        }
        let count: i64 = conn
            .prepare_cached(
                "INSERT INTO Refcount (ID, Refcount) VALUES (?1, 1)
                 ON CONFLICT(ID) DO UPDATE SET Refcount = Refcount + 1
                 RETURNING Refcount",
            )?
            .query_row(params![target.0], |row| row.get(0))?;
        trace!(resource = target.0, count, "ledger.add_reference");
        Ok(count as u64)
    }

    /// Decrements the reference count of `target`, queueing it at zero.
    pub(crate) fn drop_reference(&mut self, conn: &Connection, target: ResourceId) -> Result<u64> {
        let current = self.reference_count(conn, target)?;
        if current == 0 {
            return Err(StoreError::consistency(format!(
                "reference count of {target} would drop below zero"
            )));
        }
        if current == 1 {
            conn.prepare_cached("DELETE FROM Refcount WHERE ID = ?1")?
                .execute(params![target.0])?;
            self.enqueue(target);
        } else {
            conn.prepare_cached("UPDATE Refcount SET Refcount = Refcount - 1 WHERE ID = ?1")?
                .execute(params![target.0])?;
        }
        trace!(resource = target.0, count = current - 1, "ledger.drop_reference");
        Ok(current - 1)
    }

    /// Queues a resource for a liveness re-check.
    pub(crate) fn enqueue(&mut self, id: ResourceId) {
        if self.queued.insert(id) {
            self.pending.push_back(id);
        }
    }

    /// Number of resources waiting for a liveness check.
    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Forgets queued work. Used when the surrounding transaction rolls back.
    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }

    /// Current reference count; absent rows count as zero.
    pub(crate) fn reference_count(&self, conn: &Connection, id: ResourceId) -> Result<u64> {
        reference_count(conn, id)
    }

    /// `true` when the resource is explicitly asserted as an `rdfs:Resource`.
    pub(crate) fn is_asserted(&self, conn: &Connection, id: ResourceId) -> Result<bool> {
        let rdf_type = self.ontology.rdf_type();
        let sql = format!(
            "SELECT 1 FROM {t} WHERE ID = ?1 AND {v} = ?2",
            t = quote_ident(rdf_type.table_name()),
            v = quote_ident(rdf_type.name()),
        );
        let root = self.ids.class(self.ontology.rdfs_resource().id());
        Ok(conn.prepare_cached(&sql)?.exists(params![id.0, root.0])?)
    }

    /// `true` for ontology resources and named graphs.
    pub(crate) fn is_pinned(&self, conn: &Connection, id: ResourceId) -> Result<bool> {
        Ok(self.ids.contains(id) || resources::is_graph(conn, id)?)
    }

    /// Liveness: asserted, referenced or pinned.
    pub(crate) fn is_alive(&self, conn: &Connection, id: ResourceId) -> Result<bool> {
        Ok(self.is_pinned(conn, id)?
            || self.is_asserted(conn, id)?
            || self.reference_count(conn, id)? > 0)
    }

    /// Drains the worklist, reclaiming every queued resource that is dead.
    pub(crate) fn sweep(&mut self, conn: &Connection) -> Result<SweepStats> {
        self.drain(conn, SweepTrigger::Update)
    }

    /// Queues every dead resource in the store and reclaims them.
    pub(crate) fn collect_garbage(&mut self, conn: &Connection) -> Result<SweepStats> {
        let rdf_type = self.ontology.rdf_type();
        let sql = format!(
            "SELECT r.ID FROM Resource AS r
             WHERE NOT EXISTS (SELECT 1 FROM Refcount AS c WHERE c.ID = r.ID AND c.Refcount > 0)
               AND NOT EXISTS (SELECT 1 FROM Graph AS g WHERE g.ID = r.ID)
               AND NOT EXISTS (SELECT 1 FROM {t} AS t WHERE t.ID = r.ID AND t.{v} = ?1)
             ORDER BY r.ID",
            t = quote_ident(rdf_type.table_name()),
            v = quote_ident(rdf_type.name()),
        );
        let root = self.ids.class(self.ontology.rdfs_resource().id());
        let candidates: Vec<ResourceId> = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![root.0], |row| row.get(0).map(ResourceId))?;
            rows.collect::<std::result::Result<_, _>>()?
        };
        for id in candidates {
            if !self.ids.contains(id) {
                self.enqueue(id);
            }
        }
        self.drain(conn, SweepTrigger::Collection)
    }

    fn drain(&mut self, conn: &Connection, trigger: SweepTrigger) -> Result<SweepStats> {
        let start = Instant::now();
        let mut stats = SweepStats::new(trigger);
        while let Some(id) = self.pending.pop_front() {
            self.queued.remove(&id);
            stats.examined += 1;
            if !resources::exists(conn, id)? {
                if resources::was_allocated(conn, id)? {
                    continue;
                }
                return Err(StoreError::consistency(format!(
                    "sweep of never-allocated resource {id}"
                )));
            }
            if self.is_alive(conn, id)? {
                continue;
            }
            stats.rows_removed += self.reclaim(conn, id)?;
            stats.reclaimed += 1;
        }
        stats.run_millis = start.elapsed().as_millis() as u64;
        log_sweep_stats(&stats);
        Ok(stats)
    }

    /// Removes every row owned by `id`, drops the references it held and
    /// deletes the resource row.
    fn reclaim(&mut self, conn: &Connection, id: ResourceId) -> Result<u64> {
        let ontology = Arc::clone(&self.ontology);
        let store = PropertyTableStore::new(conn, &ontology);
        let mut removed = 0u64;
        for property in ontology.properties() {
            let rows = store.remove_all(property, id)?;
            removed += rows.len() as u64;
            if property.data_type() != DataType::Resource {
                continue;
            }
            for row in rows {
                if let Some(target) = row.value.as_resource() {
                    self.drop_reference(conn, target)?;
                }
            }
        }
        resources::delete(conn, id)?;
        debug!(resource = id.0, rows = removed, "ledger.reclaim");
        Ok(removed)
    }
}

pub(crate) fn reference_count(conn: &Connection, id: ResourceId) -> Result<u64> {
    let count: Option<i64> = conn
        .prepare_cached("SELECT Refcount FROM Refcount WHERE ID = ?1")?
        .query_row(params![id.0], |row| row.get(0))
        .optional()?;
    Ok(count.unwrap_or(0).max(0) as u64)
}

fn log_sweep_stats(stats: &SweepStats) {
    if stats.reclaimed > 0 || stats.trigger == SweepTrigger::Collection {
        info!(
            trigger = ?stats.trigger,
            examined = stats.examined,
            reclaimed = stats.reclaimed,
            rows = stats.rows_removed,
            run_millis = stats.run_millis,
            "ledger.sweep"
        );
        return;
    }
    debug!(
        trigger = ?stats.trigger,
        examined = stats.examined,
        "ledger.sweep.noop"
    );
}
