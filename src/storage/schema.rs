#![forbid(unsafe_code)]

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::ontology::{Ontology, Property};

/// Wraps an identifier in double quotes for use in generated SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

const BASE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Resource (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        Uri TEXT UNIQUE,
        BlankNode INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS Refcount (
        ID INTEGER PRIMARY KEY,
        Refcount INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS Graph (
        ID INTEGER PRIMARY KEY
    );
";

/// Creates the bookkeeping tables and one table per ontology property.
///
/// Safe to run on every open; existing tables are left alone.
pub(crate) fn bootstrap(conn: &Connection, ontology: &Ontology) -> Result<()> {
    conn.execute_batch(BASE_SCHEMA)?;
    for property in ontology.properties() {
        conn.execute_batch(&property_table_sql(property))?;
    }
    debug!(tables = ontology.properties().len(), "schema.bootstrap");
    Ok(())
}

fn property_table_sql(property: &Property) -> String {
    let table = property.table_name();
    let value = quote_ident(property.name());
    let graph = quote_ident(&property.graph_column());
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {t} (ID INTEGER NOT NULL, {value} {affinity}, {graph} INTEGER);",
        t = quote_ident(table),
        affinity = property.data_type().sql_affinity(),
    );
    let unique = if property.multiple_values() {
        format!("ID, {value}, IFNULL({graph}, 0)")
    } else {
        format!("ID, IFNULL({graph}, 0)")
    };
    sql.push_str(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {idx} ON {t} ({unique});",
        idx = quote_ident(&format!("{table}_ID")),
        t = quote_ident(table),
    ));
    if property.range().is_some() {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS {idx} ON {t} ({value});",
            idx = quote_ident(&format!("{table}_value")),
            t = quote_ident(table),
        ));
    }
    sql
}
