#![forbid(unsafe_code)]

use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;

use crate::error::{Result, StoreError};
use crate::ontology::{vocab, Ontology};
use crate::types::{ClassId, GraphId, PropertyId, ResourceId};

/// Looks up the identifier of a live resource by IRI.
pub(crate) fn lookup(conn: &Connection, uri: &str) -> Result<Option<ResourceId>> {
    let mut stmt = conn.prepare_cached("SELECT ID FROM Resource WHERE Uri = ?1")?;
    Ok(stmt
        .query_row(params![uri], |row| row.get(0))
        .optional()?
        .map(ResourceId))
}

/// Returns the external name of a resource.
pub(crate) fn uri_of(conn: &Connection, id: ResourceId) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached("SELECT Uri FROM Resource WHERE ID = ?1")?;
    Ok(stmt
        .query_row(params![id.0], |row| row.get::<_, Option<String>>(0))
        .optional()?
        .flatten())
}

/// Returns the id for `uri`, allocating a fresh one on first mention.
///
/// The second element is `true` when the resource was created by this call.
pub(crate) fn ensure(conn: &Connection, uri: &str) -> Result<(ResourceId, bool)> {
    if let Some(id) = lookup(conn, uri)? {
        return Ok((id, false));
    }
    conn.prepare_cached("INSERT INTO Resource (Uri) VALUES (?1)")?
        .execute(params![uri])?;
    Ok((ResourceId(conn.last_insert_rowid()), true))
}

/// Allocates an anonymous resource named `urn:bnode:<id>`.
pub(crate) fn create_blank(conn: &Connection) -> Result<ResourceId> {
    conn.prepare_cached("INSERT INTO Resource (Uri, BlankNode) VALUES (NULL, 1)")?
        .execute([])?;
    let id = ResourceId(conn.last_insert_rowid());
    conn.prepare_cached("UPDATE Resource SET Uri = ?2 WHERE ID = ?1")?
        .execute(params![id.0, format!("{}{}", vocab::BNODE_PREFIX, id.0)])?;
    Ok(id)
}

/// `true` while the resource row exists.
pub(crate) fn exists(conn: &Connection, id: ResourceId) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM Resource WHERE ID = ?1")?;
    Ok(stmt.exists(params![id.0])?)
}

/// `true` when `id` was handed out at some point, even if since reclaimed.
pub(crate) fn was_allocated(conn: &Connection, id: ResourceId) -> Result<bool> {
    if id.0 <= 0 {
        return Ok(false);
    }
    let seq: Option<i64> = conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = 'Resource'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seq.is_some_and(|seq| id.0 <= seq))
}

/// Removes the resource row. The identifier is never handed out again.
pub(crate) fn delete(conn: &Connection, id: ResourceId) -> Result<()> {
    conn.prepare_cached("DELETE FROM Resource WHERE ID = ?1")?
        .execute(params![id.0])?;
    Ok(())
}

/// Registers `uri` as a named graph, creating the resource if needed.
pub(crate) fn ensure_graph(conn: &Connection, uri: &str) -> Result<GraphId> {
    let (id, _) = ensure(conn, uri)?;
    conn.prepare_cached("INSERT OR IGNORE INTO Graph (ID) VALUES (?1)")?
        .execute(params![id.0])?;
    Ok(GraphId(id.0))
}

/// Looks up an existing named graph.
pub(crate) fn lookup_graph(conn: &Connection, uri: &str) -> Result<Option<GraphId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT Graph.ID FROM Graph JOIN Resource ON Resource.ID = Graph.ID WHERE Resource.Uri = ?1",
    )?;
    Ok(stmt
        .query_row(params![uri], |row| row.get(0))
        .optional()?
        .map(GraphId))
}

/// `true` when `id` names a graph.
pub(crate) fn is_graph(conn: &Connection, id: ResourceId) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM Graph WHERE ID = ?1")?;
    Ok(stmt.exists(params![id.0])?)
}

/// Resource identifiers of every ontology class and property.
///
/// Built at open; these resources are pinned and never reclaimed.
#[derive(Clone, Debug)]
pub struct OntologyResources {
    classes: Vec<ResourceId>,
    properties: Vec<ResourceId>,
    class_by_resource: FxHashMap<ResourceId, ClassId>,
    property_by_resource: FxHashMap<ResourceId, PropertyId>,
}

impl OntologyResources {
    /// Ensures a Resource row exists for every ontology entry.
    pub(crate) fn register(conn: &Connection, ontology: &Ontology) -> Result<Self> {
        let mut classes = Vec::with_capacity(ontology.classes().len());
        let mut class_by_resource = FxHashMap::default();
        for class in ontology.classes() {
            let (id, _) = ensure(conn, class.uri())?;
            classes.push(id);
            class_by_resource.insert(id, class.id());
        }
        let mut properties = Vec::with_capacity(ontology.properties().len());
        let mut property_by_resource = FxHashMap::default();
        for property in ontology.properties() {
            let (id, _) = ensure(conn, property.uri())?;
            if class_by_resource.contains_key(&id) {
                return Err(StoreError::Config(format!(
                    "'{}' is declared both as a class and a property",
                    property.name()
                )));
            }
            properties.push(id);
            property_by_resource.insert(id, property.id());
        }
        Ok(Self {
            classes,
            properties,
            class_by_resource,
            property_by_resource,
        })
    }

    /// Resource id of a class.
    pub fn class(&self, id: ClassId) -> ResourceId {
        self.classes[id.index()]
    }

    /// Resource id of a property.
    pub fn property(&self, id: PropertyId) -> ResourceId {
        self.properties[id.index()]
    }

    /// Class named by a resource id, if any.
    pub fn class_of(&self, id: ResourceId) -> Option<ClassId> {
        self.class_by_resource.get(&id).copied()
    }

    /// Property named by a resource id, if any.
    pub fn property_of(&self, id: ResourceId) -> Option<PropertyId> {
        self.property_by_resource.get(&id).copied()
    }

    /// `true` for ontology resources.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.class_by_resource.contains_key(&id) || self.property_by_resource.contains_key(&id)
    }
}
