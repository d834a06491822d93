//! Update Coordinator: the only writer of the property tables.
//!
//! A batch is applied inside one transaction. Every stored or removed
//! resource-valued row is paired with a reference count change, type
//! statements maintain the explicit `rdfs:Resource` assertion, and resources
//! whose liveness may have changed are queued for the ledger's sweep.

mod coordinator;
mod literal;
mod term;

pub(crate) use coordinator::UpdateCoordinator;
pub use term::{Literal, Object, Quad, Term};

/// One operation of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    /// Set-insert the statements.
    Insert(Vec<Quad>),
    /// Remove the statements; absent ones are ignored.
    Delete(Vec<Quad>),
    /// Clear the named properties of each subject (per graph), then insert.
    /// `rdf:type` statements are plain inserts.
    InsertOrReplace(Vec<Quad>),
}

/// Ordered list of operations applied atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    ops: Vec<UpdateOp>,
}

impl UpdateBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an insert.
    pub fn insert(mut self, quads: impl IntoIterator<Item = Quad>) -> Self {
        self.ops.push(UpdateOp::Insert(quads.into_iter().collect()));
        self
    }

    /// Appends a delete.
    pub fn delete(mut self, quads: impl IntoIterator<Item = Quad>) -> Self {
        self.ops.push(UpdateOp::Delete(quads.into_iter().collect()));
        self
    }

    /// Appends an insert-or-replace.
    pub fn insert_or_replace(mut self, quads: impl IntoIterator<Item = Quad>) -> Self {
        self.ops
            .push(UpdateOp::InsertOrReplace(quads.into_iter().collect()));
        self
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// `true` when the batch has no statements at all.
    pub fn is_empty(&self) -> bool {
        self.ops.iter().all(|op| match op {
            UpdateOp::Insert(q) | UpdateOp::Delete(q) | UpdateOp::InsertOrReplace(q) => q.is_empty(),
        })
    }
}

impl From<UpdateOp> for UpdateBatch {
    fn from(op: UpdateOp) -> Self {
        Self { ops: vec![op] }
    }
}

/// Counters describing an applied batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Rows stored.
    pub inserted: u64,
    /// Rows removed by deletes (including cascades of type deletions).
    pub deleted: u64,
    /// Rows cleared by `INSERT OR REPLACE` or overwritten single values.
    pub replaced: u64,
    /// Statements that changed nothing.
    pub unchanged: u64,
    /// Resources allocated by the batch.
    pub resources_created: u64,
    /// Resources reclaimed by the sweep that closed the batch.
    pub reclaimed: u64,
}
