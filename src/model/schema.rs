//! Schema: types, their hierarchy and attribute data types.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Labels of the built-in meta types.
pub mod meta {
    pub const THING: &str = "thing";
    pub const ENTITY: &str = "entity";
    pub const RELATION: &str = "relation";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ROLE: &str = "role";
    pub const RULE: &str = "rule";

    pub const ALL: [&str; 6] = [THING, ENTITY, RELATION, ATTRIBUTE, ROLE, RULE];
}

/// What a schema type describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Meta,
    Entity,
    Relation,
    Attribute,
    Role,
    Rule,
}

impl TypeKind {
    /// Kinds whose instances can be vertices of an analytics run.
    pub fn is_instantiable(self) -> bool {
        matches!(self, TypeKind::Entity | TypeKind::Relation | TypeKind::Attribute)
    }
}

/// Data type of an attribute type's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Long,
    Double,
    String,
    Boolean,
    Date,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Long | DataType::Double)
    }
}

/// A schema type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaType {
    pub label: String,
    pub kind: TypeKind,
    /// Direct supertype; `None` only for `thing`, `role` and `rule`.
    pub sup: Option<String>,
    /// Set on attribute types.
    pub data_type: Option<DataType>,
    /// Attribute types whose instances this type's instances may own.
    pub owns: BTreeSet<String>,
    /// Roles a relation type relates.
    pub relates: BTreeSet<String>,
    /// Marks attribute types created by analytics to hold results.
    pub is_result: bool,
}

impl SchemaType {
    fn with_kind(label: impl Into<String>, kind: TypeKind, sup: Option<&str>) -> Self {
        Self {
            label: label.into(),
            kind,
            sup: sup.map(str::to_owned),
            data_type: None,
            owns: BTreeSet::new(),
            relates: BTreeSet::new(),
            is_result: false,
        }
    }

    pub fn meta(label: &str, sup: Option<&str>) -> Self {
        Self::with_kind(label, TypeKind::Meta, sup)
    }

    pub fn entity(label: impl Into<String>) -> Self {
        Self::with_kind(label, TypeKind::Entity, Some(meta::ENTITY))
    }

    pub fn relation(label: impl Into<String>, roles: &[&str]) -> Self {
        let mut ty = Self::with_kind(label, TypeKind::Relation, Some(meta::RELATION));
        ty.relates = roles.iter().map(|r| r.to_string()).collect();
        ty
    }

    pub fn attribute(label: impl Into<String>, data_type: DataType) -> Self {
        let mut ty = Self::with_kind(label, TypeKind::Attribute, Some(meta::ATTRIBUTE));
        ty.data_type = Some(data_type);
        ty
    }

    pub fn role(label: impl Into<String>) -> Self {
        Self::with_kind(label, TypeKind::Role, Some(meta::ROLE))
    }

    /// Attribute type that stores analytics output.
    pub fn result_attribute(label: impl Into<String>, data_type: DataType) -> Self {
        let mut ty = Self::attribute(label, data_type);
        ty.is_result = true;
        ty
    }

    pub fn sub(mut self, sup: impl Into<String>) -> Self {
        self.sup = Some(sup.into());
        self
    }

    pub fn owning(mut self, attribute: impl Into<String>) -> Self {
        self.owns.insert(attribute.into());
        self
    }
}

/// The meta types every schema starts with.
pub fn meta_types() -> Vec<SchemaType> {
    vec![
        SchemaType::meta(meta::THING, None),
        SchemaType::meta(meta::ENTITY, Some(meta::THING)),
        SchemaType::meta(meta::RELATION, Some(meta::THING)),
        SchemaType::meta(meta::ATTRIBUTE, Some(meta::THING)),
        SchemaType::meta(meta::ROLE, None),
        SchemaType::meta(meta::RULE, None),
    ]
}

// ============================================================================
// Schema
// ============================================================================

/// Read-only view over a set of schema types.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, SchemaType>,
}

impl Schema {
    pub fn new(types: impl IntoIterator<Item = SchemaType>) -> Self {
        Self { types: types.into_iter().map(|t| (t.label.clone(), t)).collect() }
    }

    pub fn get(&self, label: &str) -> Option<&SchemaType> {
        self.types.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.types.contains_key(label)
    }

    pub fn types(&self) -> impl Iterator<Item = &SchemaType> {
        self.types.values()
    }

    /// Whether `label` is `ancestor` or one of its transitive subtypes.
    pub fn is_subtype_of(&self, label: &str, ancestor: &str) -> bool {
        let mut current = Some(label);
        let mut hops = 0;
        while let Some(l) = current {
            if l == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.types.len() {
                return false;
            }
            current = self.types.get(l).and_then(|t| t.sup.as_deref());
        }
        false
    }

    /// `label` and all its transitive subtypes, sorted by label.
    pub fn closure(&self, label: &str) -> Vec<&SchemaType> {
        let mut out: Vec<&SchemaType> = self
            .types
            .values()
            .filter(|t| self.is_subtype_of(&t.label, label))
            .collect();
        out.sort_by(|a, b| a.label.cmp(&b.label));
        out
    }

    /// Whether instances of `owner` may own instances of `attribute`,
    /// directly or through a supertype of either side.
    pub fn may_own(&self, owner: &str, attribute: &str) -> bool {
        let mut current = Some(owner);
        let mut hops = 0;
        while let Some(l) = current {
            let Some(ty) = self.types.get(l) else { return false };
            if ty.owns.iter().any(|a| self.is_subtype_of(attribute, a)) {
                return true;
            }
            hops += 1;
            if hops > self.types.len() {
                return false;
            }
            current = ty.sup.as_deref();
        }
        false
    }
}
