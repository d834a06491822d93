use rusqlite::Connection;
use tracing::warn;

use super::store::Store;
use crate::error::{Result, SchemaError};
use crate::ledger;
use crate::query::{TriplePattern, TriplesCursor, TriplesPlan};
use crate::storage::{resources, PropertyTableStore, Value};
use crate::types::ResourceId;

/// A consistent read-only view of the store.
///
/// Everything read through one session, cursors included, reflects the
/// state as of the moment the session started.
pub struct ReadSession<'s> {
    store: &'s Store,
    /// Read-only connection with an open read transaction; taken on drop.
    conn: Option<Connection>,
}

impl<'s> ReadSession<'s> {
    pub(crate) fn begin(store: &'s Store, conn: Connection) -> Result<Self> {
        conn.execute_batch("BEGIN")?;
        // The snapshot is pinned by the first read.
        if let Err(err) = conn.query_row("SELECT count(*) FROM Graph", [], |row| row.get::<_, i64>(0)) {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(err.into());
        }
        Ok(Self {
            store,
            conn: Some(conn),
        })
    }

    fn conn(&self) -> &Connection {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("session connection taken before drop"),
        }
    }

    /// Id of a live resource, by IRI or prefixed name.
    pub fn resource_id(&self, uri: &str) -> Result<Option<ResourceId>> {
        let iri = self.store.ontology().namespaces().resolve(uri);
        resources::lookup(self.conn(), &iri)
    }

    /// External name of a resource.
    pub fn uri_of(&self, id: ResourceId) -> Result<Option<String>> {
        resources::uri_of(self.conn(), id)
    }

    /// Resource id of a property, usable as a predicate constraint.
    pub fn predicate_id(&self, property: &str) -> Result<ResourceId> {
        let property = self
            .store
            .ontology()
            .property(property)
            .ok_or_else(|| SchemaError::UnknownProperty(property.to_string()))?;
        Ok(self.store.ids().property(property.id()))
    }

    /// Current reference count of a resource.
    pub fn reference_count(&self, id: ResourceId) -> Result<u64> {
        ledger::reference_count(self.conn(), id)
    }

    /// Values of `property` for the subject named `subject`.
    pub fn values(&self, subject: &str, property: &str) -> Result<Vec<Value>> {
        self.read_values(subject, property, false)
    }

    /// Values of `property` and of all its sub-properties.
    pub fn values_with_subproperties(&self, subject: &str, property: &str) -> Result<Vec<Value>> {
        self.read_values(subject, property, true)
    }

    fn read_values(&self, subject: &str, property: &str, inherited: bool) -> Result<Vec<Value>> {
        let ontology = self.store.ontology();
        let property = ontology
            .property(property)
            .ok_or_else(|| SchemaError::UnknownProperty(property.to_string()))?;
        let Some(subject) = self.resource_id(subject)? else {
            return Ok(Vec::new());
        };
        let tables = PropertyTableStore::new(self.conn(), ontology);
        if inherited {
            tables.values_with_subproperties(property, subject)
        } else {
            Ok(tables.get(property, subject)?.into_vec())
        }
    }

    /// Executes a plan produced by [`best_index`](crate::query::best_index).
    pub fn scan(&self, plan: &TriplesPlan, args: &[i64]) -> Result<TriplesCursor<'_>> {
        TriplesCursor::new(
            self.conn(),
            self.store.ontology(),
            self.store.ids(),
            plan,
            args,
            self.store.config().scan_batch_size,
        )
    }

    /// Plans and executes a pattern.
    pub fn triples(&self, pattern: &TriplePattern) -> Result<TriplesCursor<'_>> {
        let (plan, args) = pattern.plan()?;
        self.scan(&plan, &args)
    }
}

impl Drop for ReadSession<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.execute_batch("COMMIT") {
                Ok(()) => self.store.release_reader(conn),
                Err(err) => warn!(error = %err, "read_session.end_failed"),
            }
        }
    }
}
