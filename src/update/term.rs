use std::fmt;

use time::{Date, OffsetDateTime};

use crate::ontology::vocab;

/// A resource named in an update: an IRI or a batch-scoped blank node label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Absolute IRI (stored verbatim).
    Iri(String),
    /// Blank node label; labels are only meaningful within one batch.
    Blank(String),
}

impl Term {
    /// IRI term.
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    /// Blank node term.
    pub fn blank(label: impl Into<String>) -> Self {
        Term::Blank(label.into())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Blank(label) => write!(f, "_:{label}"),
        }
    }
}

/// A literal value.
///
/// `Lexical` literals are parsed against the datatype of the property they
/// are stored under; the typed variants must match it exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    /// Plain lexical form.
    Lexical(String),
    /// `xsd:integer`
    Integer(i64),
    /// `xsd:boolean`
    Boolean(bool),
    /// `xsd:date`
    Date(Date),
    /// `xsd:dateTime`
    DateTime(OffsetDateTime),
}

impl Literal {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Literal::Lexical(_) => "string literal",
            Literal::Integer(_) => "integer literal",
            Literal::Boolean(_) => "boolean literal",
            Literal::Date(_) => "date literal",
            Literal::DateTime(_) => "dateTime literal",
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Lexical(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Lexical(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<Date> for Literal {
    fn from(value: Date) -> Self {
        Literal::Date(value)
    }
}

impl From<OffsetDateTime> for Literal {
    fn from(value: OffsetDateTime) -> Self {
        Literal::DateTime(value)
    }
}

/// Object position of a statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    /// Reference to a resource.
    Resource(Term),
    /// Literal value.
    Literal(Literal),
}

impl Object {
    /// Resource object named by IRI.
    pub fn iri(iri: impl Into<String>) -> Self {
        Object::Resource(Term::iri(iri))
    }

    /// Blank node object.
    pub fn blank(label: impl Into<String>) -> Self {
        Object::Resource(Term::blank(label))
    }

    /// Literal object.
    pub fn literal(value: impl Into<Literal>) -> Self {
        Object::Literal(value.into())
    }
}

impl From<Term> for Object {
    fn from(value: Term) -> Self {
        Object::Resource(value)
    }
}

impl From<Literal> for Object {
    fn from(value: Literal) -> Self {
        Object::Literal(value)
    }
}

/// A statement, optionally scoped to a named graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quad {
    /// Named graph IRI; `None` is the default graph.
    pub graph: Option<String>,
    /// Subject.
    pub subject: Term,
    /// Property IRI or prefixed name.
    pub predicate: String,
    /// Object.
    pub object: Object,
}

impl Quad {
    /// Statement in the default graph.
    pub fn new(subject: Term, predicate: impl Into<String>, object: impl Into<Object>) -> Self {
        Self {
            graph: None,
            subject,
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Type statement `<subject> a <class>`.
    pub fn a(subject: Term, class: impl Into<String>) -> Self {
        Self::new(subject, vocab::RDF_TYPE, Object::iri(class))
    }

    /// Moves the statement into a named graph.
    pub fn in_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(graph) = &self.graph {
            write!(f, "GRAPH <{graph}> {{ ")?;
        }
        write!(f, "{} <{}> ", self.subject, self.predicate)?;
        match &self.object {
            Object::Resource(term) => write!(f, "{term}")?,
            Object::Literal(Literal::Lexical(s)) => write!(f, "{s:?}")?,
            Object::Literal(other) => write!(f, "{other:?}")?,
        }
        if self.graph.is_some() {
            f.write_str(" }")?;
        }
        Ok(())
    }
}
