//! Concepts: the instance vertices of the graph.

use serde::{Deserialize, Serialize};
use super::Value;

/// Opaque concept identifier.
///
/// Ordering is lexicographic on the string form (`"V10" < "V9"`), which is
/// the tie-break every label-propagating program relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(pub String);

impl ConceptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self { Self(s) }
}

impl From<ConceptId> for Value {
    fn from(id: ConceptId) -> Self { Value::String(id.0) }
}

/// Kind of vertex in the compute graph.
///
/// `Casting` vertices are join nodes: one per role player per relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKind {
    Entity,
    Relation,
    Attribute,
    Casting,
}

impl VertexKind {
    /// Entities, relations and attributes are things; castings are not.
    pub fn is_thing(self) -> bool {
        !matches!(self, VertexKind::Casting)
    }
}

/// A concept as the storage layer reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub kind: VertexKind,
    /// Label of the concept's direct type. Castings carry the role label.
    pub type_label: String,
    /// Attribute value; `None` for every other kind.
    pub value: Option<Value>,
}

impl Concept {
    pub fn new(id: ConceptId, kind: VertexKind, type_label: impl Into<String>) -> Self {
        Self { id, kind, type_label: type_label.into(), value: None }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn is_attribute(&self) -> bool {
        self.kind == VertexKind::Attribute
    }
}
