//! Tinystore: an embedded RDF triple store over SQLite.
//!
//! Every ontology property is stored in its own table. Writes go through
//! [`Store::update`], which keeps per-resource reference counts in step with
//! each change and reclaims resources that are neither asserted nor
//! referenced. Reads go through [`ReadSession`]s, which expose the property
//! tables as one `(graph, subject, predicate, object)` relation.

#![warn(missing_docs)]

pub mod db;
pub mod error;
pub mod ledger;
pub mod ontology;
pub mod query;
pub mod storage;
pub mod types;
pub mod update;

pub use db::{ReadSession, Store, StoreConfig, SweepPolicy, SyncMode};
pub use error::{Result, SchemaError, StoreError};
pub use ledger::{SweepStats, SweepTrigger};
pub use ontology::{DataType, Ontology, OntologyBuilder, OntologyDescription, PropertyDef};
pub use query::{
    best_index, Column, Constraint, ConstraintOp, Match, TriplePattern, TripleRow, TriplesCursor,
    TriplesPlan,
};
pub use storage::Value;
pub use types::{GraphId, ResourceId};
pub use update::{Literal, Object, Quad, Term, UpdateBatch, UpdateOp, UpdateSummary};
