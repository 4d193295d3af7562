//! # Graph Store Trait
//!
//! This is THE contract between analytics and the storage engine that owns
//! the graph. Analytics needs very little from it: type lookup, a handful
//! of instance writes for persisting results, a cheap existential query,
//! and a committed snapshot for the compute phase.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory, optimistic transactions, for testing/embedding |

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::Result;

pub use memory::MemoryBackend;

// ============================================================================
// Existential patterns
// ============================================================================

/// A pattern for `GraphStore::ask`. Answers only "does any match exist".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Some instance whose direct type is one of these labels.
    Isa(Vec<String>),
    /// Some instance of an owner type owning an instance of an attribute type.
    Has { owners: Vec<String>, attributes: Vec<String> },
    /// The concept exists.
    Id(ConceptId),
}

impl Pattern {
    pub fn isa<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> Self {
        Pattern::Isa(labels.into_iter().map(|s| s.as_ref().to_owned()).collect())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Committed graph handed to the compute phase.
///
/// Castings appear as vertices of kind `VertexKind::Casting` whose
/// `type_label` is the role they fill.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub vertices: Vec<Concept>,
    pub edges: Vec<Edge>,
}

// ============================================================================
// Liveness
// ============================================================================

/// Synchronous existence probe used by the runtime's ghost-vertex check.
pub trait Liveness: Send + Sync {
    fn is_alive(&self, id: &ConceptId) -> bool;
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The storage contract consumed by analytics.
///
/// Operations a store cannot serve should return
/// `Error::StorageError("... not supported")` rather than panic.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    async fn begin(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit. Fails with `Error::TxConflict` when a concept this
    /// transaction touched was modified by a later commit.
    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Schema
    // ========================================================================

    async fn get_type(&self, tx: &Self::Tx, label: &str) -> Result<Option<SchemaType>>;

    async fn all_types(&self, tx: &Self::Tx) -> Result<Vec<SchemaType>>;

    /// `label` and all its transitive subtypes. Empty if `label` is unknown.
    async fn subtypes(&self, tx: &Self::Tx, label: &str) -> Result<Vec<SchemaType>> {
        let schema = Schema::new(self.all_types(tx).await?);
        Ok(schema.closure(label).into_iter().cloned().collect())
    }

    /// Define a type, or leave an identical definition in place.
    async fn put_type(&self, tx: &mut Self::Tx, ty: SchemaType) -> Result<()>;

    /// Allow instances of `owner` to own instances of `attribute`.
    async fn set_owns(&self, tx: &mut Self::Tx, owner: &str, attribute: &str) -> Result<()>;

    /// The schema as the compute phase currently sees it. May lag behind
    /// committed schema writes.
    async fn schema_view(&self) -> Result<Schema>;

    // ========================================================================
    // Instances
    // ========================================================================

    async fn get_concept(&self, tx: &Self::Tx, id: &ConceptId) -> Result<Option<Concept>>;

    async fn insert_entity(&self, tx: &mut Self::Tx, type_label: &str) -> Result<ConceptId>;

    /// Insert a relation and one casting per `(role, player)` pair.
    async fn insert_relation(
        &self,
        tx: &mut Self::Tx,
        type_label: &str,
        players: &[(&str, &ConceptId)],
    ) -> Result<ConceptId>;

    /// Get or create the attribute of `type_label` holding `value`.
    async fn put_attribute(
        &self,
        tx: &mut Self::Tx,
        type_label: &str,
        value: Value,
    ) -> Result<ConceptId>;

    async fn attach_attribute(
        &self,
        tx: &mut Self::Tx,
        owner: &ConceptId,
        attribute: &ConceptId,
    ) -> Result<()>;

    /// Remove an ownership. Returns true if it existed.
    async fn detach_attribute(
        &self,
        tx: &mut Self::Tx,
        owner: &ConceptId,
        attribute: &ConceptId,
    ) -> Result<bool>;

    /// Attributes owned by `owner`, as seen by this transaction.
    async fn owned_attributes(&self, tx: &Self::Tx, owner: &ConceptId) -> Result<Vec<Concept>>;

    /// Delete a concept with its castings and ownerships. Returns true if it existed.
    async fn delete_concept(&self, tx: &mut Self::Tx, id: &ConceptId) -> Result<bool>;

    // ========================================================================
    // Queries
    // ========================================================================

    /// Existential check. Must not scan more than needed to find one match.
    async fn ask(&self, tx: &Self::Tx, pattern: &Pattern) -> Result<bool>;

    /// Committed graph for the compute phase.
    async fn snapshot(&self) -> Result<GraphSnapshot>;

    /// Existence probe for the ghost-vertex check.
    fn liveness(&self) -> Arc<dyn Liveness>;
}
