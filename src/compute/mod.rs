//! # BSP Compute Runtime
//!
//! The vertex-program and map-reduce runtimes, and the contract with the
//! component that executes them.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `memory` | aggregator registers and their merge operators |
//! | `program` | `VertexProgram`, `VertexContext`, `MessageScope` |
//! | `mapreduce` | `MapReduce`, `VertexView`, the local executor |
//! | `graph` | index-based compute graph built from a snapshot |
//! | `spec` | serializable `ProgramSpec` / `MapReduceSpec` |
//! | `local` | `LocalComputer`: scoped-thread workers over one snapshot |

pub mod memory;
pub mod program;
pub mod mapreduce;
pub mod graph;
pub mod spec;
pub mod local;

use async_trait::async_trait;

use crate::model::Value;
use crate::Result;

pub use memory::{Memory, MemoryDelta, Operator};
pub use program::{MessageScope, VertexContext, VertexProgram};
pub use mapreduce::{MapReduce, VertexView};
pub use graph::ComputeGraph;
pub use spec::{MapReduceSpec, ProgramSpec, ProgramVariant};
pub use local::LocalComputer;

/// Memory key under which a run's map-reduce output is stored.
pub const MAP_REDUCE_MEMORY_KEY: &str = "__map_reduce";

// ============================================================================
// ComputerResult
// ============================================================================

/// Final registers of a run, plus the map-reduce output if one ran.
#[derive(Debug, Clone)]
pub struct ComputerResult {
    pub memory: Memory,
    /// Supersteps executed by the vertex program (0 without one).
    pub supersteps: u32,
}

impl ComputerResult {
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn map_reduce(&self) -> Option<&Value> {
        self.memory.get(MAP_REDUCE_MEMORY_KEY)
    }
}

// ============================================================================
// GraphComputer Trait
// ============================================================================

/// The cluster compute collaborator: run a vertex program to completion,
/// then an optional map-reduce over the annotated graph.
#[async_trait]
pub trait GraphComputer: Send + Sync {
    async fn compute(
        &self,
        program: Option<&ProgramSpec>,
        map_reduce: Option<&MapReduceSpec>,
    ) -> Result<ComputerResult>;
}
