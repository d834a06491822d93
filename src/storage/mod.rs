//! Physical storage: bookkeeping tables, resource identifiers and the
//! per-property tables.
//!
//! Every RDF property is backed by its own table holding
//! `(ID, value, graph)` rows. There is no physical triples table; the
//! [`query`](crate::query) module stitches the tables back together.

/// Property Table Store.
///
/// Typed get/put/remove against a single property table.
mod property_table;

/// Resource table access and ontology resource registration.
pub(crate) mod resources;

/// Schema bootstrap for the bookkeeping and property tables.
pub(crate) mod schema;

mod value;

pub use property_table::{PropertyTableStore, PutOutcome, StoredValue, Values};
pub use resources::OntologyResources;
pub use value::Value;
