#![forbid(unsafe_code)]

use rusqlite::{params, Connection, OptionalExtension};
use smallvec::SmallVec;

use super::schema::quote_ident;
use super::value::Value;
use crate::error::Result;
use crate::ontology::{Ontology, Property};
use crate::types::{GraphId, ResourceId};

/// Values of one property for one subject. Single-valued properties hold at
/// most one entry per graph.
pub type Values = SmallVec<[Value; 1]>;

/// A stored value together with the graph its statement belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredValue {
    /// The value.
    pub value: Value,
    /// Graph of the statement; `None` is the default graph.
    pub graph: Option<GraphId>,
}

/// Result of [`PropertyTableStore::put`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// The row already existed.
    Unchanged,
    /// A new row was stored.
    Inserted,
    /// A single-valued property was overwritten; holds the previous value.
    Replaced(Value),
}

/// Primitive CRUD over per-property tables.
///
/// Mutations here never touch reference counts; callers pair every change
/// with the matching ledger adjustment.
pub struct PropertyTableStore<'a> {
    conn: &'a Connection,
    ontology: &'a Ontology,
}

struct TableSql {
    table: String,
    value: String,
    graph: String,
}

impl TableSql {
    fn new(property: &Property) -> Self {
        Self {
            table: quote_ident(property.table_name()),
            value: quote_ident(property.name()),
            graph: quote_ident(&property.graph_column()),
        }
    }
}

impl<'a> PropertyTableStore<'a> {
    /// Wraps a connection (usually an open transaction).
    pub fn new(conn: &'a Connection, ontology: &'a Ontology) -> Self {
        Self { conn, ontology }
    }

    /// All values of `property` for `subject`, across graphs.
    pub fn get(&self, property: &Property, subject: ResourceId) -> Result<Values> {
        Ok(self
            .rows(property, subject)?
            .into_iter()
            .map(|stored| stored.value)
            .collect())
    }

    /// Values of `property` for `subject` within one graph.
    pub fn get_in_graph(
        &self,
        property: &Property,
        subject: ResourceId,
        graph: Option<GraphId>,
    ) -> Result<Values> {
        let t = TableSql::new(property);
        let sql = format!(
            "SELECT {v} FROM {t} WHERE ID = ?1 AND {v} IS NOT NULL AND IFNULL({g}, 0) = IFNULL(?2, 0)",
            v = t.value,
            t = t.table,
            g = t.graph,
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params![subject.0, graph.map(i64::from)])?;
        let mut out = Values::new();
        while let Some(row) = rows.next()? {
            out.push(Value::from_sql(property.data_type(), row.get_ref(0)?)?);
        }
        Ok(out)
    }

    /// All rows of `property` for `subject`, with their graphs.
    pub fn rows(&self, property: &Property, subject: ResourceId) -> Result<Vec<StoredValue>> {
        let t = TableSql::new(property);
        let sql = format!(
            "SELECT {v}, {g} FROM {t} WHERE ID = ?1 AND {v} IS NOT NULL ORDER BY ROWID",
            v = t.value,
            g = t.graph,
            t = t.table,
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params![subject.0])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(StoredValue {
                value: Value::from_sql(property.data_type(), row.get_ref(0)?)?,
                graph: row.get::<_, Option<i64>>(1)?.map(GraphId),
            });
        }
        Ok(out)
    }

    /// Stores a value.
    ///
    /// Multi-valued properties have set semantics: storing an existing
    /// (subject, value, graph) row is a no-op. Single-valued properties keep
    /// one value per (subject, graph) and overwrite it.
    pub fn put(
        &self,
        property: &Property,
        subject: ResourceId,
        value: &Value,
        graph: Option<GraphId>,
    ) -> Result<PutOutcome> {
        let t = TableSql::new(property);
        let graph_arg = graph.map(i64::from);
        if property.multiple_values() {
            let sql = format!(
                "INSERT OR IGNORE INTO {t} (ID, {v}, {g}) VALUES (?1, ?2, ?3)",
                t = t.table,
                v = t.value,
                g = t.graph,
            );
            let changed = self
                .conn
                .prepare_cached(&sql)?
                .execute(params![subject.0, value.to_sql(), graph_arg])?;
            return Ok(if changed == 0 {
                PutOutcome::Unchanged
            } else {
                PutOutcome::Inserted
            });
        }

        let select = format!(
            "SELECT {v} FROM {t} WHERE ID = ?1 AND IFNULL({g}, 0) = IFNULL(?2, 0)",
            v = t.value,
            t = t.table,
            g = t.graph,
        );
        let previous = self
            .conn
            .prepare_cached(&select)?
            .query_row(params![subject.0, graph_arg], |row| {
                row.get::<_, rusqlite::types::Value>(0)
            })
            .optional()?;
        match previous {
            Some(rusqlite::types::Value::Null) | None => {
                let sql = format!(
                    "INSERT OR REPLACE INTO {t} (ID, {v}, {g}) VALUES (?1, ?2, ?3)",
                    t = t.table,
                    v = t.value,
                    g = t.graph,
                );
                self.conn
                    .prepare_cached(&sql)?
                    .execute(params![subject.0, value.to_sql(), graph_arg])?;
                Ok(PutOutcome::Inserted)
            }
            Some(raw) => {
                let old = Value::from_sql(property.data_type(), (&raw).into())?;
                if &old == value {
                    return Ok(PutOutcome::Unchanged);
                }
                let sql = format!(
                    "UPDATE {t} SET {v} = ?3 WHERE ID = ?1 AND IFNULL({g}, 0) = IFNULL(?2, 0)",
                    t = t.table,
                    v = t.value,
                    g = t.graph,
                );
                self.conn
                    .prepare_cached(&sql)?
                    .execute(params![subject.0, graph_arg, value.to_sql()])?;
                Ok(PutOutcome::Replaced(old))
            }
        }
    }

    /// Removes one row. Returns `false` when no such row existed.
    pub fn remove(
        &self,
        property: &Property,
        subject: ResourceId,
        value: &Value,
        graph: Option<GraphId>,
    ) -> Result<bool> {
        let t = TableSql::new(property);
        let sql = format!(
            "DELETE FROM {t} WHERE ID = ?1 AND {v} = ?2 AND IFNULL({g}, 0) = IFNULL(?3, 0)",
            t = t.table,
            v = t.value,
            g = t.graph,
        );
        let removed = self
            .conn
            .prepare_cached(&sql)?
            .execute(params![subject.0, value.to_sql(), graph.map(i64::from)])?;
        Ok(removed > 0)
    }

    /// Clears every value of `property` for `subject` in every graph and
    /// returns what was removed.
    pub fn remove_all(&self, property: &Property, subject: ResourceId) -> Result<Vec<StoredValue>> {
        let removed = self.rows(property, subject)?;
        if !removed.is_empty() {
            let t = TableSql::new(property);
            let sql = format!("DELETE FROM {t} WHERE ID = ?1", t = t.table);
            self.conn.prepare_cached(&sql)?.execute(params![subject.0])?;
        }
        Ok(removed)
    }

    /// Clears every value of `property` for `subject` within one graph.
    pub fn remove_all_in_graph(
        &self,
        property: &Property,
        subject: ResourceId,
        graph: Option<GraphId>,
    ) -> Result<Values> {
        let removed = self.get_in_graph(property, subject, graph)?;
        if !removed.is_empty() {
            let t = TableSql::new(property);
            let sql = format!(
                "DELETE FROM {t} WHERE ID = ?1 AND IFNULL({g}, 0) = IFNULL(?2, 0)",
                t = t.table,
                g = t.graph,
            );
            self.conn
                .prepare_cached(&sql)?
                .execute(params![subject.0, graph.map(i64::from)])?;
        }
        Ok(removed)
    }

    /// Values stored under `property` or any of its sub-properties.
    pub fn values_with_subproperties(
        &self,
        property: &Property,
        subject: ResourceId,
    ) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        let chain = std::iter::once(property).chain(
            property
                .sub_properties()
                .iter()
                .map(|id| self.ontology.property_by_id(*id)),
        );
        for prop in chain {
            for value in self.get(prop, subject)? {
                if !out.contains(&value) {
                    out.push(value);
                }
            }
        }
        Ok(out)
    }

    /// Number of rows stored for `property`.
    pub fn row_count(&self, property: &Property) -> Result<u64> {
        let sql = format!(
            "SELECT count(*) FROM {t}",
            t = quote_ident(property.table_name())
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
