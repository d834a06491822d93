use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::{Ontology, OntologyBuilder, PropertyDef};
use crate::error::{Result, StoreError};

/// Serializable ontology description, typically loaded from TOML.
///
/// ```toml
/// [namespaces]
/// nie = "http://tracker.api.gnome.org/ontology/v3/nie#"
///
/// [[classes]]
/// name = "nie:InformationElement"
///
/// [[properties]]
/// name = "nie:title"
/// domain = "nie:InformationElement"
/// range = "xsd:string"
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OntologyDescription {
    /// Prefix to namespace IRI.
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    /// Class declarations, in any order.
    #[serde(default)]
    pub classes: Vec<ClassDescription>,
    /// Property declarations.
    #[serde(default)]
    pub properties: Vec<PropertyDescription>,
}

/// One class entry of an [`OntologyDescription`].
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDescription {
    /// Prefixed name or IRI.
    pub name: String,
    /// Direct super-classes. Empty means `rdfs:Resource`.
    #[serde(default)]
    pub super_classes: Vec<String>,
}

/// One property entry of an [`OntologyDescription`].
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyDescription {
    /// Prefixed name or IRI.
    pub name: String,
    /// Domain class.
    pub domain: String,
    /// Range: an `xsd:` datatype or a class.
    pub range: String,
    /// Multi-valued when `true`.
    #[serde(default)]
    pub multiple_values: bool,
    /// Direct super-properties.
    #[serde(default)]
    pub super_properties: Vec<String>,
}

impl OntologyDescription {
    /// Parses a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|err| StoreError::Config(err.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Converts the description into a builder.
    pub fn into_builder(self) -> OntologyBuilder {
        let mut builder = OntologyBuilder::new();
        for (prefix, iri) in self.namespaces {
            builder = builder.namespace(prefix, iri);
        }
        for class in &self.classes {
            let supers: Vec<&str> = class.super_classes.iter().map(String::as_str).collect();
            builder = builder.class(class.name.clone(), &supers);
        }
        for prop in self.properties {
            let mut def = PropertyDef::new(prop.name, prop.domain, prop.range);
            if prop.multiple_values {
                def = def.multi();
            }
            for parent in prop.super_properties {
                def = def.sub_property_of(parent);
            }
            builder = builder.property(def);
        }
        builder
    }

    /// Builds the ontology.
    pub fn build(self) -> Result<Arc<Ontology>> {
        Ok(self.into_builder().build()?)
    }
}
