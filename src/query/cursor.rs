#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use super::plan::{ColumnMatch, MatchOp, TriplesPlan};
use super::render::object_expr;
use crate::error::Result;
use crate::ontology::Ontology;
use crate::storage::schema::quote_ident;
use crate::storage::OntologyResources;
use crate::types::{GraphId, ResourceId};

/// One row of the triples relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TripleRow {
    /// Per-cursor counter starting at 1. Not stable across cursors.
    pub rowid: i64,
    /// Graph of the statement; `None` is the default graph.
    pub graph: Option<GraphId>,
    /// Subject id.
    pub subject: ResourceId,
    /// Predicate (property) resource id.
    pub predicate: ResourceId,
    /// Object in canonical string form.
    pub object: String,
}

struct TableScan {
    table: String,
    predicate: ResourceId,
    sql: String,
}

/// Sequential scan over the property tables selected by a plan.
///
/// Tables are read one after another in keyset pages, so no statement stays
/// borrowed between calls to `next`. Dropping the cursor early is fine.
pub struct TriplesCursor<'conn> {
    conn: &'conn Connection,
    tables: Vec<TableScan>,
    filter_args: Vec<i64>,
    current: usize,
    last_storage_rowid: i64,
    table_rows: u64,
    buffer: VecDeque<TripleRow>,
    rowid: i64,
    batch_size: usize,
    finished: bool,
}

impl<'conn> TriplesCursor<'conn> {
    pub(crate) fn new(
        conn: &'conn Connection,
        ontology: &Arc<Ontology>,
        ids: &OntologyResources,
        plan: &TriplesPlan,
        args: &[i64],
        batch_size: usize,
    ) -> Result<Self> {
        plan.check_args(args)?;
        let batch_size = batch_size.max(1);
        let mut filter_args = Vec::new();
        let mut tables = Vec::new();
        for property in ontology.properties() {
            let predicate = ids.property(property.id());
            if !plan
                .predicate
                .iter()
                .all(|m| predicate_matches(m, predicate, args))
            {
                continue;
            }
            let value_col = format!("t.{}", quote_ident(property.name()));
            let Some(object) = object_expr(property.data_type(), &value_col) else {
                continue;
            };
            let graph_col = format!("t.{}", quote_ident(&property.graph_column()));
            let mut filters = Vec::new();
            // Same arguments for every table; only the column names differ.
            filter_args.clear();
            for m in &plan.graph {
                filters.push(filter_sql(&graph_col, m, args, &mut filter_args));
            }
            for m in &plan.subject {
                filters.push(filter_sql("t.ID", m, args, &mut filter_args));
            }
            let mut sql = format!(
                "SELECT t.ROWID, {graph_col}, t.ID, {object} FROM {table} AS t \
                 WHERE t.ROWID > ?1 AND {value_col} IS NOT NULL",
                table = quote_ident(property.table_name()),
            );
            for filter in filters {
                sql.push_str(" AND ");
                sql.push_str(&filter);
            }
            sql.push_str(&format!(" ORDER BY t.ROWID LIMIT {batch_size}"));
            tables.push(TableScan {
                table: property.table_name().to_string(),
                predicate,
                sql,
            });
        }
        debug!(tables = tables.len(), "triples.open");
        Ok(Self {
            conn,
            finished: tables.is_empty(),
            tables,
            filter_args,
            current: 0,
            last_storage_rowid: 0,
            table_rows: 0,
            buffer: VecDeque::new(),
            rowid: 0,
            batch_size,
        })
    }

    /// Number of property tables the cursor will visit.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Releases the cursor before exhaustion.
    pub fn close(self) {
        debug!(rows = self.rowid, finished = self.finished, "triples.close");
    }

    /// Loads the next non-empty page; `false` once every table is exhausted.
    fn fill(&mut self) -> Result<bool> {
        while let Some(scan) = self.tables.get(self.current) {
            let mut stmt = self.conn.prepare_cached(&scan.sql)?;
            let params =
                std::iter::once(self.last_storage_rowid).chain(self.filter_args.iter().copied());
            let mut rows = stmt.query(params_from_iter(params))?;
            let mut fetched = 0usize;
            while let Some(row) = rows.next()? {
                fetched += 1;
                self.last_storage_rowid = row.get(0)?;
                let object = match row.get_ref(3)? {
                    ValueRef::Null => continue,
                    ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                    ValueRef::Integer(i) => i.to_string(),
                    ValueRef::Real(r) => r.to_string(),
                    ValueRef::Blob(_) => continue,
                };
                self.rowid += 1;
                self.buffer.push_back(TripleRow {
                    rowid: self.rowid,
                    graph: row.get::<_, Option<i64>>(1)?.map(GraphId),
                    subject: ResourceId(row.get(2)?),
                    predicate: scan.predicate,
                    object,
                });
            }
            self.table_rows += self.buffer.len() as u64;
            if fetched < self.batch_size {
                debug!(table = %scan.table, rows = self.table_rows, "triples.scan");
                self.current += 1;
                self.last_storage_rowid = 0;
                self.table_rows = 0;
            }
            if !self.buffer.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for TriplesCursor<'_> {
    type Item = Result<TripleRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(row) = self.buffer.pop_front() {
            return Some(Ok(row));
        }
        if self.finished {
            return None;
        }
        match self.fill() {
            Ok(true) => self.buffer.pop_front().map(Ok),
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn predicate_matches(m: &ColumnMatch, predicate: ResourceId, args: &[i64]) -> bool {
    match (m.op, m.slot) {
        (MatchOp::Eq, Some(slot)) => (args[slot] == predicate.0) != m.negated,
        (MatchOp::Eq, None) => false,
        (MatchOp::IsNull, _) => m.negated,
    }
}

/// Renders one graph/subject match, appending its argument.
fn filter_sql(column: &str, m: &ColumnMatch, args: &[i64], out_args: &mut Vec<i64>) -> String {
    match (m.op, m.slot) {
        (MatchOp::IsNull, _) if m.negated => format!("{column} IS NOT NULL"),
        (MatchOp::IsNull, _) => format!("{column} IS NULL"),
        (MatchOp::Eq, Some(slot)) => {
            out_args.push(args[slot]);
            let param = out_args.len() + 1;
            if m.negated {
                format!("{column} != ?{param}")
            } else {
                format!("{column} = ?{param}")
            }
        }
        (MatchOp::Eq, None) => "0".to_string(),
    }
}
