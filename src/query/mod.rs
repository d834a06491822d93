//! Triples Relation: a read-only `(graph, subject, predicate, object)` view
//! over every property table.
//!
//! Querying is two-phase. [`best_index`] turns candidate constraints into a
//! [`TriplesPlan`]; executing the plan with bound arguments yields a
//! [`TriplesCursor`]. Predicate constraints choose which tables are scanned,
//! graph and subject constraints become filters inside each table scan.
//! Object filtering is left to the caller.

mod cursor;
mod plan;
mod render;

pub use cursor::{TripleRow, TriplesCursor};
pub use plan::{
    best_index, Column, Constraint, ConstraintOp, ConstraintUsage, IndexInfo, TriplesPlan,
    UnsupportedOperatorError,
};

use crate::error::Result;
use crate::types::{GraphId, ResourceId};

/// Right-hand side of a column match in a [`TriplePattern`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Match {
    /// `= id`
    Eq(i64),
    /// `!= id`
    Ne(i64),
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Match {
    fn op(self) -> ConstraintOp {
        match self {
            Match::Eq(_) => ConstraintOp::Eq,
            Match::Ne(_) => ConstraintOp::Ne,
            Match::IsNull => ConstraintOp::IsNull,
            Match::IsNotNull => ConstraintOp::IsNotNull,
        }
    }

    fn arg(self) -> Option<i64> {
        match self {
            Match::Eq(v) | Match::Ne(v) => Some(v),
            Match::IsNull | Match::IsNotNull => None,
        }
    }
}

/// Convenience builder for pattern queries.
///
/// Produces the constraint list and argument vector for [`best_index`] and
/// cursor execution.
#[derive(Clone, Debug, Default)]
pub struct TriplePattern {
    matches: Vec<(Column, Match)>,
}

impl TriplePattern {
    /// Matches every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a match on any column.
    pub fn with(mut self, column: Column, m: Match) -> Self {
        self.matches.push((column, m));
        self
    }

    /// Restricts to one graph; `None` selects the default graph.
    pub fn graph(self, graph: Option<GraphId>) -> Self {
        match graph {
            Some(id) => self.with(Column::Graph, Match::Eq(id.0)),
            None => self.with(Column::Graph, Match::IsNull),
        }
    }

    /// Restricts to one subject.
    pub fn subject(self, subject: ResourceId) -> Self {
        self.with(Column::Subject, Match::Eq(subject.0))
    }

    /// Restricts to one predicate.
    pub fn predicate(self, predicate: ResourceId) -> Self {
        self.with(Column::Predicate, Match::Eq(predicate.0))
    }

    /// Plans the pattern, returning the plan and its bound arguments.
    pub fn plan(&self) -> Result<(TriplesPlan, Vec<i64>)> {
        let constraints: Vec<Constraint> = self
            .matches
            .iter()
            .map(|(column, m)| Constraint::new(*column, m.op()))
            .collect();
        let info = best_index(&constraints)?;
        let mut args = vec![0; info.plan.arg_count()];
        for (usage, (_, m)) in info.usage.iter().zip(&self.matches) {
            if let (Some(slot), Some(value)) = (usage.argv_index, m.arg()) {
                args[slot] = value;
            }
        }
        Ok((info.plan, args))
    }
}
