//! # graph-analytics-rs — Bulk-Synchronous-Parallel Graph Analytics
//!
//! Computes global properties of a typed property graph (instance counts,
//! degrees, connected components, k-cores and coreness, shortest paths,
//! numeric statistics over attribute values) by running vertex programs in
//! supersteps over a partitioned snapshot of the graph.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract with storage, `GraphComputer` with the cluster
//! 2. **Programs are data**: every algorithm is a serializable config struct, rebuilt per worker
//! 3. **The barrier is the only synchronization**: registers merge once per superstep
//! 4. **Results are written back through one batched, retrying writer**
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use graph_analytics::{Analytics, AnalyticsConfig, MemoryBackend, SchemaType, TxMode, GraphStore};
//!
//! # async fn example() -> graph_analytics::Result<()> {
//! let store = Arc::new(MemoryBackend::new());
//! let mut tx = store.begin(TxMode::ReadWrite).await?;
//! store.put_type(&mut tx, SchemaType::entity("person")).await?;
//! store.put_type(&mut tx, SchemaType::role("friend")).await?;
//! store.put_type(&mut tx, SchemaType::relation("friendship", &["friend"])).await?;
//! let a = store.insert_entity(&mut tx, "person").await?;
//! let b = store.insert_entity(&mut tx, "person").await?;
//! store.insert_relation(&mut tx, "friendship", &[("friend", &a), ("friend", &b)]).await?;
//! store.commit(tx).await?;
//!
//! let analytics = Analytics::in_memory(store, AnalyticsConfig::default());
//! let clusters = analytics.connected_components(&[], Default::default()).await?;
//! assert_eq!(clusters.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Programs
//!
//! | Program | Result |
//! |---------|--------|
//! | `CountProgram` | instance and ownership counts |
//! | `DegreeProgram` | degree per vertex, optionally persisted |
//! | `ConnectedComponentsProgram` | cluster label per vertex |
//! | `KCoreProgram` / `CorenessProgram` | k-core clusters, coreness per vertex |
//! | `ShortestPathProgram` | all shortest paths between two concepts |
//! | `MedianProgram` | weighted median by distributed quickselect |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod storage;
pub mod tx;
pub mod compute;
pub mod algorithm;
pub mod mapreduce;
pub mod persist;
pub mod analytics;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Concept, ConceptId, VertexKind, Direction, Edge, EdgeKind,
    DataType, Schema, SchemaType, TypeKind, Value, PropertyMap,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, GraphSnapshot, Liveness, Pattern, MemoryBackend};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Re-exports: Compute
// ============================================================================

pub use compute::{
    ComputerResult, GraphComputer, LocalComputer, MapReduce, MapReduceSpec,
    Memory, MessageScope, Operator, ProgramSpec, VertexContext, VertexProgram,
    MAP_REDUCE_MEMORY_KEY,
};

// ============================================================================
// Re-exports: Facade
// ============================================================================

pub use analytics::{Analytics, ClusterOptions};
pub use config::AnalyticsConfig;
pub use persist::BatchedResultWriter;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Expected negative outcome: no path, no core, nothing selected.
    #[error("No result: {0}")]
    NoResult(String),

    #[error("{program} exceeded its iteration limit of {limit} supersteps")]
    IterationLimit { program: String, limit: u32 },

    #[error("Persistence failed after {attempts} attempts: {source}")]
    Persistence { attempts: u32, source: Box<Error> },

    #[error("Transaction conflict: {0}")]
    TxConflict(String),

    #[error("Schema mutation not visible: {0}")]
    SchemaMutation(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn is_no_result(&self) -> bool {
        matches!(self, Error::NoResult(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
