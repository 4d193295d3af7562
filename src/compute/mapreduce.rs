//! The map-reduce contract and its local executor.
//!
//! `map` emits at most one key/value pair per vertex. `reduce` is the one
//! associative fold used both to pre-combine inside a worker and to reduce
//! across workers. `finalize` shapes the reduced map into the result value.

use std::collections::BTreeMap;

use crate::model::{Concept, ConceptId, PropertyMap, Value, VertexKind};
use crate::storage::Liveness;
use super::graph::ComputeGraph;

/// Read-only view of a vertex and the transient state a program left on it.
#[derive(Debug, Clone, Copy)]
pub struct VertexView<'a> {
    vertex: &'a Concept,
    state: &'a PropertyMap,
}

impl<'a> VertexView<'a> {
    pub fn new(vertex: &'a Concept, state: &'a PropertyMap) -> Self {
        Self { vertex, state }
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

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.state.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }
}

/// A single finalization pass over the annotated graph.
pub trait MapReduce: Send + Sync {
    type Key: Ord + Clone + Send;
    type Val: Send;

    fn name(&self) -> &'static str;

    fn map(&self, vertex: &VertexView<'_>) -> Option<(Self::Key, Self::Val)>;

    fn reduce(&self, key: &Self::Key, values: Vec<Self::Val>) -> Self::Val;

    fn finalize(&self, reduced: BTreeMap<Self::Key, Self::Val>) -> Value;
}

/// Run `job` over every live vertex: map and combine per partition in
/// parallel, then reduce across partitions in partition order.
pub fn execute<R: MapReduce>(
    job: &R,
    graph: &ComputeGraph,
    states: &[PropertyMap],
    workers: usize,
    liveness: &dyn Liveness,
) -> Value {
    let chunk = graph.chunk_len(workers);
    let combined: Vec<BTreeMap<R::Key, R::Val>> = std::thread::scope(|s| {
        let handles: Vec<_> = states
            .chunks(chunk)
            .enumerate()
            .map(|(w, part)| {
                s.spawn(move || {
                    let mut groups: BTreeMap<R::Key, Vec<R::Val>> = BTreeMap::new();
                    for (offset, state) in part.iter().enumerate() {
                        let vertex = graph.vertex(w * chunk + offset);
                        if !liveness.is_alive(&vertex.id) {
                            continue;
                        }
                        if let Some((k, v)) = job.map(&VertexView::new(vertex, state)) {
                            groups.entry(k).or_default().push(v);
                        }
                    }
                    groups
                        .into_iter()
                        .map(|(k, vs)| {
                            let v = job.reduce(&k, vs);
                            (k, v)
                        })
                        .collect::<BTreeMap<_, _>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut groups: BTreeMap<R::Key, Vec<R::Val>> = BTreeMap::new();
    for part in combined {
        for (k, v) in part {
            groups.entry(k).or_default().push(v);
        }
    }
    let reduced = groups
        .into_iter()
        .map(|(k, vs)| {
            let v = job.reduce(&k, vs);
            (k, v)
        })
        .collect();
    tracing::debug!(job = job.name(), "map-reduce finalized");
    job.finalize(reduced)
}
