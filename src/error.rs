use std::io;

use thiserror::Error;
use tracing::error;

use crate::ontology::DataType;
use crate::query::{Column, ConstraintOp};

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Top-level error returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write or ontology referenced something the schema does not allow.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// A triples pattern tried to constrain a column that cannot be pushed down.
    #[error("unsupported constraint: {op} on {column}")]
    UnsupportedConstraint {
        /// Column the constraint targeted.
        column: Column,
        /// Operator of the rejected constraint.
        op: ConstraintOp,
    },
    /// Bound arguments do not match the plan they are executed with.
    #[error("invalid query argument: {0}")]
    InvalidArgument(String),
    /// Internal bookkeeping was found inconsistent. Never recovered.
    #[error("consistency violation: {0}")]
    Consistency(String),
    /// Error raised by the relational engine.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// I/O error while reading configuration or ontology files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors caused by data that does not fit the ontology.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Referenced property is not part of the ontology.
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    /// Referenced class is not part of the ontology.
    #[error("unknown class '{0}'")]
    UnknownClass(String),
    /// Value does not match the property's datatype.
    #[error("property '{property}' expects {expected}, got {found}")]
    DatatypeMismatch {
        /// Property being written.
        property: String,
        /// Datatype declared by the ontology.
        expected: DataType,
        /// Short description of the supplied value.
        found: String,
    },
    /// Literal text could not be parsed as the property's datatype.
    #[error("invalid {datatype} literal '{lexical}'")]
    InvalidLiteral {
        /// Datatype the literal was parsed as.
        datatype: DataType,
        /// Offending lexical form.
        lexical: String,
    },
    /// Subject is not an instance of the property's domain.
    #[error("subject {subject} is not a {domain}, cannot have property '{property}'")]
    DomainViolation {
        /// Subject name.
        subject: String,
        /// Domain class the property requires.
        domain: String,
        /// Property being written.
        property: String,
    },
    /// Literal used where a resource is required.
    #[error("literal cannot be used as {0}")]
    LiteralInResourcePosition(&'static str),
    /// Super-class or super-property chain loops back on itself.
    #[error("ontology cycle through '{0}'")]
    OntologyCycle(String),
    /// Two ontology entries declare the same name.
    #[error("duplicate ontology entry '{0}'")]
    Duplicate(String),
    /// Prefixed name uses an undeclared prefix.
    #[error("unknown namespace prefix in '{0}'")]
    UnknownPrefix(String),
}

impl StoreError {
    pub(crate) fn consistency(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(reason = %msg, "store.consistency_violation");
        StoreError::Consistency(msg)
    }

    /// Returns `true` for errors that callers are expected to handle.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::Consistency(_))
    }
}
