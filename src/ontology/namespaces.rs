use std::borrow::Cow;
use std::collections::BTreeMap;

use super::vocab::{RDFS_NS, RDF_NS, XSD_NS};

/// Prefix table used to expand and compact names.
#[derive(Clone, Debug)]
pub struct Namespaces {
    prefixes: BTreeMap<String, String>,
}

impl Default for Namespaces {
    fn default() -> Self {
        let mut prefixes = BTreeMap::new();
        prefixes.insert("rdf".to_string(), RDF_NS.to_string());
        prefixes.insert("rdfs".to_string(), RDFS_NS.to_string());
        prefixes.insert("xsd".to_string(), XSD_NS.to_string());
        Self { prefixes }
    }
}

impl Namespaces {
    /// Registers (or overrides) a prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    /// Returns the namespace IRI bound to `prefix`.
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Expands `prefix:local` into a full IRI.
    ///
    /// Absolute IRIs are returned unchanged; names with an unknown prefix
    /// yield `None`.
    pub fn expand(&self, name: &str) -> Option<String> {
        if is_absolute(name) {
            return Some(name.to_string());
        }
        let (prefix, local) = name.split_once(':')?;
        self.prefixes
            .get(prefix)
            .map(|ns| format!("{ns}{local}"))
    }

    /// Expands a name with a registered prefix; anything else is kept
    /// verbatim.
    pub fn resolve<'n>(&self, name: &'n str) -> Cow<'n, str> {
        match self.expand(name) {
            Some(iri) if iri != name => Cow::Owned(iri),
            _ => Cow::Borrowed(name),
        }
    }

    /// Compacts a full IRI using the longest matching namespace.
    pub fn compact(&self, iri: &str) -> String {
        self.prefixes
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()) && iri.len() > ns.len())
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{prefix}:{}", &iri[ns.len()..]))
            .unwrap_or_else(|| iri.to_string())
    }

    /// Iterates over `(prefix, namespace)` pairs in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes
            .iter()
            .map(|(prefix, ns)| (prefix.as_str(), ns.as_str()))
    }
}

fn is_absolute(name: &str) -> bool {
    name.contains("://") || name.starts_with("urn:")
}
