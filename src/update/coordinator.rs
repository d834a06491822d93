use lru::LruCache;
use rusqlite::Connection;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::literal::coerce;
use super::term::{Object, Quad, Term};
use super::{UpdateBatch, UpdateOp, UpdateSummary};
use crate::db::SweepPolicy;
use crate::error::{Result, SchemaError};
use crate::ledger::ResourceLedger;
use crate::ontology::{Class, DataType, Ontology, Property};
use crate::storage::{resources, OntologyResources, PropertyTableStore, PutOutcome, Value};
use crate::types::{ClassId, GraphId, PropertyId, ResourceId};

/// Applies one batch inside the caller's transaction.
///
/// Nothing here commits or rolls back; on error the caller drops the
/// transaction and discards the ledger's queued work.
pub(crate) struct UpdateCoordinator<'a> {
    conn: &'a Connection,
    ontology: &'a Ontology,
    ids: &'a OntologyResources,
    ledger: &'a mut ResourceLedger,
    cache: &'a mut LruCache<String, ResourceId>,
    implicit_create: bool,
    blanks: FxHashMap<String, ResourceId>,
    created: Vec<ResourceId>,
    summary: UpdateSummary,
}

impl<'a> UpdateCoordinator<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        ontology: &'a Ontology,
        ids: &'a OntologyResources,
        ledger: &'a mut ResourceLedger,
        cache: &'a mut LruCache<String, ResourceId>,
        implicit_create: bool,
    ) -> Self {
        Self {
            conn,
            ontology,
            ids,
            ledger,
            cache,
            implicit_create,
            blanks: FxHashMap::default(),
            created: Vec::new(),
            summary: UpdateSummary::default(),
        }
    }

    /// Applies every operation, then sweeps according to `policy`.
    pub(crate) fn apply(mut self, batch: &UpdateBatch, policy: SweepPolicy) -> Result<UpdateSummary> {
        for op in batch.ops() {
            match op {
                UpdateOp::Insert(quads) => {
                    for quad in quads {
                        self.insert_quad(quad)?;
                    }
                }
                UpdateOp::Delete(quads) => {
                    for quad in quads {
                        self.delete_quad(quad)?;
                    }
                }
                UpdateOp::InsertOrReplace(quads) => self.replace_quads(quads)?,
            }
        }
        for id in std::mem::take(&mut self.created) {
            self.ledger.enqueue(id);
        }
        match policy {
            SweepPolicy::Immediate => {
                let stats = self.ledger.sweep(self.conn)?;
                self.summary.reclaimed = stats.reclaimed;
                if stats.reclaimed > 0 {
                    self.cache.clear();
                }
            }
            SweepPolicy::Deferred => self.ledger.discard_pending(),
        }
        Ok(self.summary)
    }

    fn store(&self) -> PropertyTableStore<'a> {
        PropertyTableStore::new(self.conn, self.ontology)
    }

    fn property(&self, name: &str) -> Result<&'a Property> {
        self.ontology
            .property(name)
            .ok_or_else(|| SchemaError::UnknownProperty(name.to_string()).into())
    }

    fn is_rdf_type(&self, property: &Property) -> bool {
        property.id() == self.ontology.rdf_type().id()
    }

    fn class_object(&self, object: &Object) -> Result<&'a Class> {
        match object {
            Object::Resource(Term::Iri(iri)) => self
                .ontology
                .class(iri)
                .ok_or_else(|| SchemaError::UnknownClass(iri.clone()).into()),
            Object::Resource(blank @ Term::Blank(_)) => {
                Err(SchemaError::UnknownClass(blank.to_string()).into())
            }
            Object::Literal(_) => Err(SchemaError::LiteralInResourcePosition("rdf:type object").into()),
        }
    }

    /// Id for a term, allocating it if needed.
    fn resolve_for_write(&mut self, term: &Term) -> Result<ResourceId> {
        match term {
            Term::Iri(name) => {
                let iri = self.ontology.namespaces().resolve(name);
                if let Some(id) = self.cache.get(&*iri) {
                    return Ok(*id);
                }
                let (id, created) = resources::ensure(self.conn, &iri)?;
                if created {
                    self.created.push(id);
                    self.summary.resources_created += 1;
                }
                self.cache.put(iri.into_owned(), id);
                Ok(id)
            }
            Term::Blank(label) => {
                if let Some(id) = self.blanks.get(label) {
                    return Ok(*id);
                }
                let id = resources::create_blank(self.conn)?;
                self.blanks.insert(label.clone(), id);
                self.created.push(id);
                self.summary.resources_created += 1;
                Ok(id)
            }
        }
    }

    /// Id for a term that must already exist; `None` otherwise.
    fn resolve_existing(&mut self, term: &Term) -> Result<Option<ResourceId>> {
        match term {
            Term::Iri(name) => {
                let iri = self.ontology.namespaces().resolve(name);
                if let Some(id) = self.cache.get(&*iri) {
                    return Ok(Some(*id));
                }
                let found = resources::lookup(self.conn, &iri)?;
                if let Some(id) = found {
                    self.cache.put(iri.into_owned(), id);
                }
                Ok(found)
            }
            Term::Blank(label) => Ok(self.blanks.get(label).copied()),
        }
    }

    fn graph_for_write(&mut self, graph: Option<&str>) -> Result<Option<GraphId>> {
        graph
            .map(|uri| resources::ensure_graph(self.conn, uri))
            .transpose()
    }

    /// Outer `None`: the named graph does not exist, so nothing can match.
    fn existing_graph(&self, graph: Option<&str>) -> Result<Option<Option<GraphId>>> {
        match graph {
            None => Ok(Some(None)),
            Some(uri) => Ok(resources::lookup_graph(self.conn, uri)?.map(Some)),
        }
    }

    fn insert_quad(&mut self, quad: &Quad) -> Result<()> {
        let property = self.property(&quad.predicate)?;
        let graph = self.graph_for_write(quad.graph.as_deref())?;
        let subject = self.resolve_for_write(&quad.subject)?;
        if self.is_rdf_type(property) {
            let class = self.class_object(&quad.object)?;
            return self.insert_type(subject, class.id(), graph);
        }
        self.check_domain(subject, &quad.subject, property, graph)?;
        let value = self.value_for_write(property, &quad.object)?;
        self.store_value(property, subject, value, graph)
    }

    /// Stores the class and all its super-classes, `rdfs:Resource` included.
    fn insert_type(&mut self, subject: ResourceId, class: ClassId, graph: Option<GraphId>) -> Result<()> {
        let rdf_type = self.ontology.rdf_type();
        let chain: Vec<ClassId> = std::iter::once(class)
            .chain(self.ontology.class_by_id(class).super_classes().iter().copied())
            .collect();
        for cid in chain {
            let value = Value::Resource(self.ids.class(cid));
            self.store_value(rdf_type, subject, value, graph)?;
        }
        Ok(())
    }

    fn has_class(&self, subject: ResourceId, class: ClassId) -> Result<bool> {
        let wanted = Value::Resource(self.ids.class(class));
        Ok(self
            .store()
            .get(self.ontology.rdf_type(), subject)?
            .contains(&wanted))
    }

    fn check_domain(
        &mut self,
        subject: ResourceId,
        term: &Term,
        property: &Property,
        graph: Option<GraphId>,
    ) -> Result<()> {
        let domain = property.domain();
        if self.has_class(subject, domain)? {
            return Ok(());
        }
        if self.implicit_create {
            debug!(subject = subject.0, domain = %self.ontology.class_by_id(domain).name(), "update.implicit_create");
            return self.insert_type(subject, domain, graph);
        }
        Err(SchemaError::DomainViolation {
            subject: term.to_string(),
            domain: self.ontology.class_by_id(domain).name().to_string(),
            property: property.name().to_string(),
        }
        .into())
    }

    fn value_for_write(&mut self, property: &Property, object: &Object) -> Result<Value> {
        match (property.data_type(), object) {
            (DataType::Resource, Object::Resource(term)) => {
                Ok(Value::Resource(self.resolve_for_write(term)?))
            }
            (_, Object::Literal(literal)) => Ok(coerce(property, literal)?),
            (_, Object::Resource(_)) => Err(resource_mismatch(property).into()),
        }
    }

    fn value_for_delete(&mut self, property: &Property, object: &Object) -> Result<Option<Value>> {
        match (property.data_type(), object) {
            (DataType::Resource, Object::Resource(term)) => {
                Ok(self.resolve_existing(term)?.map(Value::Resource))
            }
            (_, Object::Literal(literal)) => Ok(Some(coerce(property, literal)?)),
            (_, Object::Resource(_)) => Err(resource_mismatch(property).into()),
        }
    }

    fn store_value(
        &mut self,
        property: &Property,
        subject: ResourceId,
        value: Value,
        graph: Option<GraphId>,
    ) -> Result<()> {
        match self.store().put(property, subject, &value, graph)? {
            PutOutcome::Unchanged => self.summary.unchanged += 1,
            PutOutcome::Inserted => {
                if let Some(target) = value.as_resource() {
                    self.ledger.add_reference(self.conn, target)?;
                }
                self.summary.inserted += 1;
            }
            PutOutcome::Replaced(old) => {
                if let Some(target) = value.as_resource() {
                    self.ledger.add_reference(self.conn, target)?;
                }
                if let Some(target) = old.as_resource() {
                    self.ledger.drop_reference(self.conn, target)?;
                }
                self.summary.replaced += 1;
            }
        }
        Ok(())
    }

    fn delete_quad(&mut self, quad: &Quad) -> Result<()> {
        let property = self.property(&quad.predicate)?;
        let class = if self.is_rdf_type(property) {
            Some(self.class_object(&quad.object)?)
        } else {
            None
        };
        let Some(graph) = self.existing_graph(quad.graph.as_deref())? else {
            self.summary.unchanged += 1;
            return Ok(());
        };
        let Some(subject) = self.resolve_existing(&quad.subject)? else {
            self.summary.unchanged += 1;
            return Ok(());
        };
        if let Some(class) = class {
            return self.delete_type(subject, class.id(), graph);
        }
        let Some(value) = self.value_for_delete(property, &quad.object)? else {
            self.summary.unchanged += 1;
            return Ok(());
        };
        if self.store().remove(property, subject, &value, graph)? {
            if let Some(target) = value.as_resource() {
                self.ledger.drop_reference(self.conn, target)?;
            }
            self.summary.deleted += 1;
        } else {
            self.summary.unchanged += 1;
        }
        Ok(())
    }

    /// Removes `class` and its subclasses from the subject, along with the
    /// values of properties whose domain was removed. Removing
    /// `rdfs:Resource` deletes the resource's data outright.
    fn delete_type(&mut self, subject: ResourceId, class: ClassId, graph: Option<GraphId>) -> Result<()> {
        if class == self.ontology.rdfs_resource().id() {
            return self.delete_resource(subject, graph);
        }
        let rdf_type = self.ontology.rdf_type();
        let mut removed = FxHashSet::default();
        for value in self.store().get_in_graph(rdf_type, subject, graph)? {
            let Some(current) = value.as_resource().and_then(|id| self.ids.class_of(id)) else {
                continue;
            };
            if !self.ontology.is_subclass_of(current, class) {
                continue;
            }
            if self.store().remove(rdf_type, subject, &value, graph)? {
                self.ledger
                    .drop_reference(self.conn, self.ids.class(current))?;
                self.summary.deleted += 1;
                removed.insert(current);
            }
        }
        if removed.is_empty() {
            self.summary.unchanged += 1;
            return Ok(());
        }
        self.clear_domains(subject, &removed, graph)
    }

    fn delete_resource(&mut self, subject: ResourceId, graph: Option<GraphId>) -> Result<()> {
        let classes: FxHashSet<ClassId> = self
            .store()
            .get_in_graph(self.ontology.rdf_type(), subject, graph)?
            .iter()
            .filter_map(|value| value.as_resource().and_then(|id| self.ids.class_of(id)))
            .collect();
        let mut removed = 0;
        for property in self.ontology.properties() {
            removed += self.clear_values(property, subject, graph)?;
        }
        self.summary.deleted += removed;
        if removed == 0 {
            self.summary.unchanged += 1;
        }
        self.clear_domains(subject, &classes, graph)?;
        self.ledger.enqueue(subject);
        Ok(())
    }

    /// Clears the values of properties whose domain is in `removed`. The
    /// clearing stays in `graph` while the subject still carries the domain
    /// class elsewhere and covers every graph once it carries it nowhere.
    fn clear_domains(
        &mut self,
        subject: ResourceId,
        removed: &FxHashSet<ClassId>,
        graph: Option<GraphId>,
    ) -> Result<()> {
        let mut orphaned = FxHashSet::default();
        for class in removed {
            if !self.has_class(subject, *class)? {
                orphaned.insert(*class);
            }
        }
        for property in self.ontology.properties() {
            if self.is_rdf_type(property) || !removed.contains(&property.domain()) {
                continue;
            }
            self.summary.deleted += if orphaned.contains(&property.domain()) {
                self.clear_all_values(property, subject)?
            } else {
                self.clear_values(property, subject, graph)?
            };
        }
        Ok(())
    }

    /// Clears a property for the subject in one graph, dropping references.
    fn clear_values(&mut self, property: &Property, subject: ResourceId, graph: Option<GraphId>) -> Result<u64> {
        let removed = self.store().remove_all_in_graph(property, subject, graph)?;
        for value in &removed {
            if let Some(target) = value.as_resource() {
                self.ledger.drop_reference(self.conn, target)?;
            }
        }
        Ok(removed.len() as u64)
    }

    /// Clears a property for the subject in every graph, dropping references.
    fn clear_all_values(&mut self, property: &Property, subject: ResourceId) -> Result<u64> {
        let removed = self.store().remove_all(property, subject)?;
        for row in &removed {
            if let Some(target) = row.value.as_resource() {
                self.ledger.drop_reference(self.conn, target)?;
            }
        }
        Ok(removed.len() as u64)
    }

    fn replace_quads(&mut self, quads: &[Quad]) -> Result<()> {
        let mut cleared: FxHashSet<(ResourceId, Option<GraphId>, PropertyId)> = FxHashSet::default();
        for quad in quads {
            let property = self.property(&quad.predicate)?;
            if self.is_rdf_type(property) {
                continue;
            }
            let graph = self.graph_for_write(quad.graph.as_deref())?;
            let subject = self.resolve_for_write(&quad.subject)?;
            if cleared.insert((subject, graph, property.id())) {
                self.summary.replaced += self.clear_values(property, subject, graph)?;
            }
        }
        for quad in quads {
            self.insert_quad(quad)?;
        }
        Ok(())
    }
}

fn resource_mismatch(property: &Property) -> SchemaError {
    SchemaError::DatatypeMismatch {
        property: property.name().to_string(),
        expected: property.data_type(),
        found: "resource".to_string(),
    }
}
