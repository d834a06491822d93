#![forbid(unsafe_code)]
//! Identifier newtypes shared by every component.

use std::fmt;

/// Internal identifier of a Resource row.
///
/// Identifiers are allocated by the `Resource` table and never reused, even
/// after the resource has been reclaimed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ResourceId(pub i64);

/// Identifier of a named graph. Graphs are resources, so this shares the
/// `Resource` id space; the default graph has no id.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct GraphId(pub i64);

/// Position of a property inside the loaded ontology.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PropertyId(pub u32);

/// Position of a class inside the loaded ontology.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ClassId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ResourceId> for i64 {
    fn from(value: ResourceId) -> Self {
        value.0
    }
}

impl From<GraphId> for ResourceId {
    fn from(value: GraphId) -> Self {
        ResourceId(value.0)
    }
}

impl From<GraphId> for i64 {
    fn from(value: GraphId) -> Self {
        value.0
    }
}

impl PropertyId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl ClassId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
