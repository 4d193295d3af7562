//! The vertex-program contract.
//!
//! ```text
//!   setup(memory)                       once, before superstep 0
//!   ┌─► compute(ctx, memory)            every live vertex, in parallel
//!   │   barrier: deliver messages, merge register deltas
//!   └── terminate(memory) -> stop?      once, on the coordinator
//! ```
//!
//! Messages sent in superstep N are visible in superstep N+1 only. A
//! vertex never sees another vertex's state; the registers it reads are
//! the values merged at the previous barrier.

use std::fmt::Debug;

use crate::model::{Concept, ConceptId, Direction, EdgeKind, PropertyMap, Value, VertexKind};
use crate::Result;
use super::memory::{Memory, MemoryDelta};

// ============================================================================
// Message scopes
// ============================================================================

/// Directed edge-kind filter selecting which neighbours receive a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageScope {
    pub edge: EdgeKind,
    pub direction: Direction,
}

impl MessageScope {
    pub const fn new(edge: EdgeKind, direction: Direction) -> Self {
        Self { edge, direction }
    }
}

// ============================================================================
// VertexProgram
// ============================================================================

/// An iterative, message-passing, per-vertex computation.
///
/// Implementations are immutable run configurations: every worker holds
/// its own copy, rebuilt from the serialized spec before superstep 0.
pub trait VertexProgram: Send + Sync {
    type Message: Clone + Debug + Send + Sync;

    fn name(&self) -> &'static str;

    /// Declare and initialize registers.
    fn setup(&self, memory: &mut Memory);

    fn compute(&self, ctx: &mut VertexContext<'_, Self::Message>, memory: &Memory);

    /// Runs after each barrier. `Ok(true)` stops the run. Returning
    /// `Err(Error::NoResult)` ends the run with an expected empty outcome.
    fn terminate(&self, memory: &mut Memory) -> Result<bool>;

    /// Hard superstep ceiling for a graph of `vertices` vertices.
    /// Exceeding it fails the run.
    fn max_iterations(&self, vertices: usize) -> u32;

    /// Result attribute type to write when the superstep about to run is a
    /// persistence superstep.
    fn persistence(&self, _memory: &Memory) -> Option<String> {
        None
    }
}

// ============================================================================
// VertexContext
// ============================================================================

#[derive(Debug)]
pub(crate) enum Outgoing<M> {
    Scoped(MessageScope, M),
    Direct(ConceptId, M),
}

/// Everything one `compute` call may see and touch.
pub struct VertexContext<'a, M> {
    vertex: &'a Concept,
    state: &'a mut PropertyMap,
    messages: &'a [M],
    outbox: &'a mut Vec<Outgoing<M>>,
    delta: &'a mut MemoryDelta,
    memory: &'a Memory,
    writes: &'a mut Vec<(ConceptId, Value)>,
}

impl<'a, M> VertexContext<'a, M> {
    pub(crate) fn new(
        vertex: &'a Concept,
        state: &'a mut PropertyMap,
        messages: &'a [M],
        outbox: &'a mut Vec<Outgoing<M>>,
        delta: &'a mut MemoryDelta,
        memory: &'a Memory,
        writes: &'a mut Vec<(ConceptId, Value)>,
    ) -> Self {
        Self { vertex, state, messages, outbox, delta, memory, writes }
    }

    pub fn id(&self) -> &'a ConceptId {
        &self.vertex.id
    }

    pub fn kind(&self) -> VertexKind {
        self.vertex.kind
    }

    pub fn type_label(&self) -> &'a str {
        &self.vertex.type_label
    }

    pub fn value(&self) -> Option<&'a Value> {
        self.vertex.value.as_ref()
    }

    pub fn concept(&self) -> &'a Concept {
        self.vertex
    }

    /// Messages delivered this superstep.
    pub fn messages(&self) -> &'a [M] {
        self.messages
    }

    // --- transient state ---

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.state.get(key).and_then(Value::as_int)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.state.get(key).is_some_and(Value::is_truthy)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(Value::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.state.insert(key.to_owned(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }

    // --- outputs ---

    /// Send to every neighbour reached through `scope`.
    pub fn send(&mut self, scope: MessageScope, message: M) {
        self.outbox.push(Outgoing::Scoped(scope, message));
    }

    /// Send to one vertex by id. Unknown ids are dropped at routing.
    pub fn send_to(&mut self, target: &ConceptId, message: M) {
        self.outbox.push(Outgoing::Direct(target.clone(), message));
    }

    /// Contribute to a register; merged at the next barrier.
    pub fn aggregate(&mut self, key: &str, value: impl Into<Value>) {
        self.delta.add(self.memory, key, value.into());
    }

    /// Queue this vertex's result for the current persistence superstep.
    pub fn persist(&mut self, value: impl Into<Value>) {
        self.writes.push((self.vertex.id.clone(), value.into()));
    }
}
