#![forbid(unsafe_code)]

use std::convert::TryFrom;
use std::fmt;

use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Columns of the triples relation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    /// Synthetic per-cursor row counter.
    RowId,
    /// Graph id; NULL for the default graph.
    Graph,
    /// Subject resource id.
    Subject,
    /// Predicate (property) resource id.
    Predicate,
    /// Object in canonical string form.
    Object,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Column::RowId => "rowid",
            Column::Graph => "graph",
            Column::Subject => "subject",
            Column::Predicate => "predicate",
            Column::Object => "object",
        };
        f.write_str(name)
    }
}

/// Comparison operators a query layer may offer for pushdown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
    /// `GLOB`
    Glob,
    /// `MATCH`
    Match,
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            ConstraintOp::Eq => "=",
            ConstraintOp::Ne => "!=",
            ConstraintOp::IsNull => "IS NULL",
            ConstraintOp::IsNotNull => "IS NOT NULL",
            ConstraintOp::Lt => "<",
            ConstraintOp::Le => "<=",
            ConstraintOp::Gt => ">",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Like => "LIKE",
            ConstraintOp::Glob => "GLOB",
            ConstraintOp::Match => "MATCH",
        };
        f.write_str(op)
    }
}

/// Error raised when an operator cannot be pushed into a table scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedOperatorError;

/// The subset of [`ConstraintOp`] the relation evaluates itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum MatchOp {
    Eq,
    IsNull,
}

/// Base match plus negation flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct MatchSpec {
    op: MatchOp,
    negated: bool,
}

impl TryFrom<ConstraintOp> for MatchSpec {
    type Error = UnsupportedOperatorError;

    fn try_from(value: ConstraintOp) -> std::result::Result<Self, Self::Error> {
        let (op, negated) = match value {
            ConstraintOp::Eq => (MatchOp::Eq, false),
            ConstraintOp::Ne => (MatchOp::Eq, true),
            ConstraintOp::IsNull => (MatchOp::IsNull, false),
            ConstraintOp::IsNotNull => (MatchOp::IsNull, true),
            _ => return Err(UnsupportedOperatorError),
        };
        Ok(Self { op, negated })
    }
}

/// A candidate constraint offered during planning.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    /// Constrained column.
    pub column: Column,
    /// Operator.
    pub op: ConstraintOp,
    /// Unusable constraints are ignored (their right-hand side is not yet
    /// available to the caller).
    pub usable: bool,
}

impl Constraint {
    /// A usable constraint.
    pub fn new(column: Column, op: ConstraintOp) -> Self {
        Self {
            column,
            op,
            usable: true,
        }
    }
}

/// How a constraint is consumed by the plan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintUsage {
    /// Zero-based position of the constraint's right-hand side in the
    /// argument list passed at execution. `None` when the constraint is not
    /// honored or takes no argument.
    pub argv_index: Option<usize>,
    /// `true` when the scan fully evaluates the constraint.
    pub omit: bool,
}

/// One honored constraint on a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ColumnMatch {
    pub(crate) op: MatchOp,
    pub(crate) negated: bool,
    /// Argument slot; present for `Eq` matches only.
    pub(crate) slot: Option<usize>,
}

/// Opaque plan token handed from planning to execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriplesPlan {
    pub(crate) graph: Vec<ColumnMatch>,
    pub(crate) subject: Vec<ColumnMatch>,
    pub(crate) predicate: Vec<ColumnMatch>,
    arg_count: usize,
    estimated_cost: f64,
}

const WEIGHT_GRAPH: u64 = 1 << 10;
const WEIGHT_PREDICATE: u64 = 1 << 20;
const WEIGHT_SUBJECT: u64 = 1 << 30;
const FULL_SCAN_COST: f64 = 1e12;

impl TriplesPlan {
    /// Number of arguments execution expects.
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Relative cost; lower is cheaper.
    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost
    }

    /// `true` when at least one constraint on `column` is honored.
    pub fn constrains(&self, column: Column) -> bool {
        !self.matches(column).is_empty()
    }

    /// `true` when some honored constraint on `column` is negated.
    pub fn is_negated(&self, column: Column) -> bool {
        self.matches(column).iter().any(|m| m.negated)
    }

    fn matches(&self, column: Column) -> &[ColumnMatch] {
        match column {
            Column::Graph => &self.graph,
            Column::Subject => &self.subject,
            Column::Predicate => &self.predicate,
            Column::RowId | Column::Object => &[],
        }
    }

    pub(crate) fn check_args(&self, args: &[i64]) -> Result<()> {
        if args.len() != self.arg_count {
            return Err(StoreError::InvalidArgument(format!(
                "plan expects {} arguments, got {}",
                self.arg_count,
                args.len()
            )));
        }
        Ok(())
    }
}

/// Result of [`best_index`]: the plan and per-constraint usage, in the order
/// the constraints were offered.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexInfo {
    /// Plan token for execution.
    pub plan: TriplesPlan,
    /// Usage of each offered constraint.
    pub usage: Vec<ConstraintUsage>,
}

/// Chooses the constraints to push into per-table scans.
///
/// Graph, subject and predicate accept `=`, `!=`, `IS NULL` and
/// `IS NOT NULL`; every honored constraint is evaluated by the scan. Any
/// usable constraint on the object or rowid column, or with another
/// operator, rejects the whole plan.
pub fn best_index(constraints: &[Constraint]) -> Result<IndexInfo> {
    let mut plan = TriplesPlan::default();
    let mut usage = vec![ConstraintUsage::default(); constraints.len()];
    let mut cost_divisor = 1u64;

    for (idx, constraint) in constraints.iter().enumerate() {
        if !constraint.usable {
            continue;
        }
        let reject = || {
            warn!(column = %constraint.column, op = %constraint.op, "triples.plan.rejected");
            StoreError::UnsupportedConstraint {
                column: constraint.column,
                op: constraint.op,
            }
        };
        let (target, weight) = match constraint.column {
            Column::Graph => (&mut plan.graph, WEIGHT_GRAPH),
            Column::Subject => (&mut plan.subject, WEIGHT_SUBJECT),
            Column::Predicate => (&mut plan.predicate, WEIGHT_PREDICATE),
            Column::RowId | Column::Object => return Err(reject()),
        };
        let MatchSpec { op, negated } =
            MatchSpec::try_from(constraint.op).map_err(|UnsupportedOperatorError| reject())?;
        let slot = match op {
            MatchOp::Eq => {
                let slot = plan.arg_count;
                plan.arg_count += 1;
                Some(slot)
            }
            MatchOp::IsNull => None,
        };
        target.push(ColumnMatch { op, negated, slot });
        usage[idx] = ConstraintUsage {
            argv_index: slot,
            omit: true,
        };
        if op == MatchOp::Eq && !negated {
            cost_divisor |= weight;
        }
    }

    plan.estimated_cost = FULL_SCAN_COST / cost_divisor as f64;
    debug!(
        graph = plan.graph.len(),
        subject = plan.subject.len(),
        predicate = plan.predicate.len(),
        cost = plan.estimated_cost,
        "triples.plan"
    );
    Ok(IndexInfo { plan, usage })
}
