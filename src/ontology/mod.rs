//! Read-only ontology metadata consumed by every storage component.
//!
//! An [`Ontology`] is built once (through [`OntologyBuilder`] or an
//! [`OntologyDescription`]) and shared behind an `Arc`. Super-class and
//! super-property chains are resolved transitively at build time so the write
//! and read paths never walk them.

mod description;
mod namespaces;
pub mod vocab;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::SchemaError;
use crate::types::{ClassId, PropertyId};

pub use description::{ClassDescription, OntologyDescription, PropertyDescription};
pub use namespaces::Namespaces;

/// Value datatype of a property.
///
/// The set is closed: adding a variant forces every conversion site
/// (storage affinity, literal coercion, triples rendering) to handle it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// `xsd:string`
    String,
    /// `xsd:integer`
    Integer,
    /// `xsd:boolean`
    Boolean,
    /// `xsd:date`
    Date,
    /// `xsd:dateTime`
    DateTime,
    /// Reference to another resource.
    Resource,
    /// Any other range. Stored as text, never surfaced by the triples relation.
    Unbound,
}

impl DataType {
    fn from_xsd(iri: &str) -> Option<Self> {
        match iri {
            vocab::XSD_STRING => Some(DataType::String),
            vocab::XSD_INTEGER => Some(DataType::Integer),
            vocab::XSD_BOOLEAN => Some(DataType::Boolean),
            vocab::XSD_DATE => Some(DataType::Date),
            vocab::XSD_DATETIME => Some(DataType::DateTime),
            _ => None,
        }
    }

    /// SQLite column affinity used for the value column.
    pub(crate) fn sql_affinity(self) -> &'static str {
        match self {
            DataType::String | DataType::Unbound => "TEXT",
            DataType::Integer
            | DataType::Boolean
            | DataType::Date
            | DataType::DateTime
            | DataType::Resource => "INTEGER",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "xsd:string",
            DataType::Integer => "xsd:integer",
            DataType::Boolean => "xsd:boolean",
            DataType::Date => "xsd:date",
            DataType::DateTime => "xsd:dateTime",
            DataType::Resource => "resource",
            DataType::Unbound => "rdfs:Literal",
        };
        f.write_str(name)
    }
}

/// Ontology class.
#[derive(Clone, Debug)]
pub struct Class {
    id: ClassId,
    uri: String,
    name: String,
    super_classes: Vec<ClassId>,
}

impl Class {
    /// Position of the class inside the ontology.
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Full IRI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Prefixed name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every ancestor class, transitively, excluding the class itself.
    pub fn super_classes(&self) -> &[ClassId] {
        &self.super_classes
    }
}

/// Ontology property.
#[derive(Clone, Debug)]
pub struct Property {
    id: PropertyId,
    uri: String,
    name: String,
    table_name: String,
    data_type: DataType,
    multiple_values: bool,
    domain: ClassId,
    range: Option<ClassId>,
    super_properties: Vec<PropertyId>,
    sub_properties: Vec<PropertyId>,
}

impl Property {
    /// Position of the property inside the ontology.
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Full IRI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Prefixed name; also the name of the value column.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the backing property table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Value datatype.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// `true` for multi-valued properties.
    pub fn multiple_values(&self) -> bool {
        self.multiple_values
    }

    /// Domain class.
    pub fn domain(&self) -> ClassId {
        self.domain
    }

    /// Range class for resource-valued properties.
    pub fn range(&self) -> Option<ClassId> {
        self.range
    }

    /// Every ancestor property, transitively.
    pub fn super_properties(&self) -> &[PropertyId] {
        &self.super_properties
    }

    /// Every descendant property, transitively.
    pub fn sub_properties(&self) -> &[PropertyId] {
        &self.sub_properties
    }

    /// Name of the graph column.
    pub(crate) fn graph_column(&self) -> String {
        format!("{}:graph", self.name)
    }
}

/// Immutable ontology shared by the store.
#[derive(Debug)]
pub struct Ontology {
    namespaces: Namespaces,
    classes: Vec<Class>,
    properties: Vec<Property>,
    class_by_uri: FxHashMap<String, ClassId>,
    property_by_uri: FxHashMap<String, PropertyId>,
    rdf_type: PropertyId,
    rdfs_resource: ClassId,
}

impl Ontology {
    /// Starts a builder preloaded with the core vocabulary.
    pub fn builder() -> OntologyBuilder {
        OntologyBuilder::new()
    }

    /// Namespace table.
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Looks up a property by full IRI or prefixed name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        let key = self.namespaces.expand(name)?;
        self.property_by_uri
            .get(&key)
            .map(|id| &self.properties[id.index()])
    }

    /// Looks up a class by full IRI or prefixed name.
    pub fn class(&self, name: &str) -> Option<&Class> {
        let key = self.namespaces.expand(name)?;
        self.class_by_uri
            .get(&key)
            .map(|id| &self.classes[id.index()])
    }

    /// Property by position.
    pub fn property_by_id(&self, id: PropertyId) -> &Property {
        &self.properties[id.index()]
    }

    /// Class by position.
    pub fn class_by_id(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    /// All properties in declaration order (core vocabulary first).
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// All classes in declaration order (core vocabulary first).
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// The `rdf:type` property.
    pub fn rdf_type(&self) -> &Property {
        self.property_by_id(self.rdf_type)
    }

    /// The `rdfs:Resource` class.
    pub fn rdfs_resource(&self) -> &Class {
        self.class_by_id(self.rdfs_resource)
    }

    /// `true` when `class` is `ancestor` or one of its subclasses.
    pub fn is_subclass_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        class == ancestor || self.class_by_id(class).super_classes.contains(&ancestor)
    }
}

/// Declarative property definition fed to [`OntologyBuilder`].
#[derive(Clone, Debug)]
pub struct PropertyDef {
    name: String,
    domain: String,
    range: String,
    multiple_values: bool,
    super_properties: Vec<String>,
}

impl PropertyDef {
    /// Single-valued property with the given domain class and range.
    pub fn new(name: impl Into<String>, domain: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            range: range.into(),
            multiple_values: false,
            super_properties: Vec::new(),
        }
    }

    /// Marks the property multi-valued.
    pub fn multi(mut self) -> Self {
        self.multiple_values = true;
        self
    }

    /// Declares a direct super-property.
    pub fn sub_property_of(mut self, parent: impl Into<String>) -> Self {
        self.super_properties.push(parent.into());
        self
    }
}

/// Builder that resolves names and inheritance chains into an [`Ontology`].
#[derive(Clone, Debug)]
pub struct OntologyBuilder {
    namespaces: Namespaces,
    classes: Vec<(String, Vec<String>)>,
    properties: Vec<PropertyDef>,
}

impl Default for OntologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OntologyBuilder {
    /// Creates a builder with the core `rdf`/`rdfs` vocabulary.
    pub fn new() -> Self {
        let mut builder = Self {
            namespaces: Namespaces::default(),
            classes: Vec::new(),
            properties: Vec::new(),
        };
        builder = builder
            .class("rdfs:Resource", &[])
            .class("rdfs:Class", &["rdfs:Resource"])
            .class("rdf:Property", &["rdfs:Resource"])
            .property(PropertyDef::new("rdf:type", "rdfs:Resource", "rdfs:Class").multi())
            .property(PropertyDef::new("rdfs:label", "rdfs:Resource", "xsd:string"))
            .property(PropertyDef::new("rdfs:comment", "rdfs:Resource", "xsd:string"));
        builder
    }

    /// Registers a namespace prefix.
    pub fn namespace(mut self, prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix, iri);
        self
    }

    /// Declares a class with its direct super-classes.
    pub fn class(mut self, name: impl Into<String>, super_classes: &[&str]) -> Self {
        self.classes.push((
            name.into(),
            super_classes.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Declares a property.
    pub fn property(mut self, def: PropertyDef) -> Self {
        self.properties.push(def);
        self
    }

    /// Resolves every name and chain; fails on unknown references or cycles.
    pub fn build(self) -> Result<Arc<Ontology>, SchemaError> {
        let namespaces = self.namespaces;
        let expand = |name: &str| {
            namespaces
                .expand(name)
                .ok_or_else(|| SchemaError::UnknownPrefix(name.to_string()))
        };

        let mut class_by_uri = FxHashMap::default();
        let mut class_uris = Vec::with_capacity(self.classes.len());
        for (idx, (name, _)) in self.classes.iter().enumerate() {
            let uri = expand(name)?;
            if class_by_uri.insert(uri.clone(), ClassId(idx as u32)).is_some() {
                return Err(SchemaError::Duplicate(name.clone()));
            }
            class_uris.push(uri);
        }
        let rdfs_resource = class_by_uri[vocab::RDFS_RESOURCE];

        let mut direct_supers = Vec::with_capacity(self.classes.len());
        for (name, supers) in &self.classes {
            let mut resolved = Vec::with_capacity(supers.len());
            for parent in supers {
                let uri = expand(parent)?;
                let id = class_by_uri
                    .get(&uri)
                    .copied()
                    .ok_or_else(|| SchemaError::UnknownClass(parent.clone()))?;
                resolved.push(id.index());
            }
            if resolved.is_empty() && class_by_uri[&expand(name)?] != rdfs_resource {
                resolved.push(rdfs_resource.index());
            }
            direct_supers.push(resolved);
        }
        let class_closure = transitive_closure(&direct_supers, |idx| {
            self.classes[idx].0.clone()
        })?;

        let classes: Vec<Class> = class_uris
            .into_iter()
            .zip(class_closure)
            .enumerate()
            .map(|(idx, (uri, supers))| Class {
                id: ClassId(idx as u32),
                name: namespaces.compact(&uri),
                uri,
                super_classes: supers.into_iter().map(|i| ClassId(i as u32)).collect(),
            })
            .collect();

        let mut property_by_uri = FxHashMap::default();
        let mut partial = Vec::with_capacity(self.properties.len());
        for (idx, def) in self.properties.iter().enumerate() {
            let uri = expand(&def.name)?;
            if property_by_uri.insert(uri.clone(), PropertyId(idx as u32)).is_some() {
                return Err(SchemaError::Duplicate(def.name.clone()));
            }
            let domain = class_by_uri
                .get(&expand(&def.domain)?)
                .copied()
                .ok_or_else(|| SchemaError::UnknownClass(def.domain.clone()))?;
            let range_uri = expand(&def.range)?;
            let (data_type, range) = if let Some(dt) = DataType::from_xsd(&range_uri) {
                (dt, None)
            } else if let Some(class) = class_by_uri.get(&range_uri) {
                (DataType::Resource, Some(*class))
            } else if range_uri.starts_with(vocab::XSD_NS) || range_uri == vocab::RDFS_LITERAL {
                (DataType::Unbound, None)
            } else {
                return Err(SchemaError::UnknownClass(def.range.clone()));
            };
            partial.push((uri, domain, data_type, range));
        }

        let mut direct_super_props = Vec::with_capacity(self.properties.len());
        for def in &self.properties {
            let mut resolved = Vec::with_capacity(def.super_properties.len());
            for parent in &def.super_properties {
                let id = property_by_uri
                    .get(&expand(parent)?)
                    .copied()
                    .ok_or_else(|| SchemaError::UnknownProperty(parent.clone()))?;
                resolved.push(id.index());
            }
            direct_super_props.push(resolved);
        }
        let super_closure = transitive_closure(&direct_super_props, |idx| {
            self.properties[idx].name.clone()
        })?;
        let mut sub_closure: Vec<Vec<PropertyId>> = vec![Vec::new(); super_closure.len()];
        for (idx, supers) in super_closure.iter().enumerate() {
            for parent in supers {
                sub_closure[*parent].push(PropertyId(idx as u32));
            }
        }

        let properties: Vec<Property> = partial
            .into_iter()
            .zip(super_closure.into_iter().zip(sub_closure))
            .zip(&self.properties)
            .enumerate()
            .map(|(idx, (((uri, domain, data_type, range), (supers, subs)), def))| {
                let name = namespaces.compact(&uri);
                let table_name = format!("{}_{}", classes[domain.index()].name, name);
                Property {
                    id: PropertyId(idx as u32),
                    uri,
                    name,
                    table_name,
                    data_type,
                    multiple_values: def.multiple_values,
                    domain,
                    range,
                    super_properties: supers.into_iter().map(|i| PropertyId(i as u32)).collect(),
                    sub_properties: subs,
                }
            })
            .collect();

        let rdf_type = property_by_uri[vocab::RDF_TYPE];
        debug!(
            classes = classes.len(),
            properties = properties.len(),
            "ontology.build"
        );
        Ok(Arc::new(Ontology {
            namespaces,
            classes,
            properties,
            class_by_uri,
            property_by_uri,
            rdf_type,
            rdfs_resource,
        }))
    }
}

/// Expands direct parent lists into full ancestor sets, rejecting cycles.
fn transitive_closure(
    direct: &[Vec<usize>],
    name_of: impl Fn(usize) -> String,
) -> Result<Vec<Vec<usize>>, SchemaError> {
    let mut closure = Vec::with_capacity(direct.len());
    for start in 0..direct.len() {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = direct[start].clone();
        while let Some(next) = stack.pop() {
            if next == start {
                return Err(SchemaError::OntologyCycle(name_of(start)));
            }
            if seen.insert(next) {
                stack.extend(direct[next].iter().copied());
            }
        }
        closure.push(seen.into_iter().collect());
    }
    Ok(closure)
}
