//! In-process `GraphComputer`.
//!
//! The snapshot's vertices are split into `workers` contiguous partitions.
//! Each superstep runs every partition on its own scoped thread against a
//! private program copy, then the coordinator performs the barrier:
//!
//! ```text
//!   worker start   open result writers (persistence supersteps only)
//!   compute        per live vertex, in parallel across partitions
//!   barrier        route messages, merge register deltas (worker order)
//!   worker end     flush result writers (worker order)
//!   terminate      coordinator decides; ceiling checked
//! ```
//!
//! Vertices whose backing record disappeared after the snapshot are skipped
//! without error.

use std::sync::Arc;

use crate::algorithm::helpers;
use crate::algorithm::{
    ConnectedComponentsProgram, CorenessProgram, CountProgram, DegreeProgram, DegreeStatisticsProgram,
    KCoreProgram, MedianProgram, ShortestPathProgram,
};
use crate::config::AnalyticsConfig;
use crate::model::{ConceptId, PropertyMap, Value};
use crate::persist::BatchedResultWriter;
use crate::storage::{GraphStore, Liveness};
use crate::{Error, Result};
use super::graph::ComputeGraph;
use super::mapreduce;
use super::memory::{Memory, MemoryDelta};
use super::program::{Outgoing, VertexContext, VertexProgram};
use super::spec::{MapReduceSpec, ProgramSpec, ProgramVariant};
use super::{ComputerResult, GraphComputer, MAP_REDUCE_MEMORY_KEY};

use async_trait::async_trait;

/// What one worker produced in one superstep.
struct WorkerOutput<M> {
    /// `(sender index, message)` in vertex order.
    outbox: Vec<(usize, Outgoing<M>)>,
    delta: MemoryDelta,
    writes: Vec<(ConceptId, Value)>,
}

pub struct LocalComputer<B: GraphStore> {
    store: Arc<B>,
    config: AnalyticsConfig,
}

impl<B: GraphStore> LocalComputer<B> {
    pub fn new(store: Arc<B>, config: AnalyticsConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Run against an already-built compute graph.
    pub async fn compute_on(
        &self,
        graph: &ComputeGraph,
        program: Option<&ProgramSpec>,
        map_reduce: Option<&MapReduceSpec>,
    ) -> Result<ComputerResult> {
        let liveness = self.store.liveness();
        let mut memory = Memory::new();
        let mut states = vec![PropertyMap::new(); graph.len()];
        let mut supersteps = 0;

        if let Some(spec) = program {
            let wire = spec.to_wire()?;
            let states = &mut states;
            let memory = &mut memory;
            let liveness = &*liveness;
            supersteps = match spec {
                ProgramSpec::Count(_) => self.run_spec::<CountProgram>(graph, &wire, states, memory, liveness).await?,
                ProgramSpec::Degree(_) => self.run_spec::<DegreeProgram>(graph, &wire, states, memory, liveness).await?,
                ProgramSpec::DegreeStatistics(_) => {
                    self.run_spec::<DegreeStatisticsProgram>(graph, &wire, states, memory, liveness).await?
                }
                ProgramSpec::ConnectedComponents(_) => {
                    self.run_spec::<ConnectedComponentsProgram>(graph, &wire, states, memory, liveness).await?
                }
                ProgramSpec::KCore(_) => self.run_spec::<KCoreProgram>(graph, &wire, states, memory, liveness).await?,
                ProgramSpec::Coreness(_) => self.run_spec::<CorenessProgram>(graph, &wire, states, memory, liveness).await?,
                ProgramSpec::ShortestPath(_) => {
                    self.run_spec::<ShortestPathProgram>(graph, &wire, states, memory, liveness).await?
                }
                ProgramSpec::Median(_) => self.run_spec::<MedianProgram>(graph, &wire, states, memory, liveness).await?,
            };
        }

        if let Some(job) = map_reduce {
            let job = MapReduceSpec::from_wire(&job.to_wire()?)?;
            let workers = self.config.workers;
            let live = &*liveness;
            let value = match &job {
                MapReduceSpec::Count(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::Min(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::Max(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::Sum(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::Mean(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::Std(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::ClusterMember(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::ClusterSize(j) => mapreduce::execute(j, graph, &states, workers, live),
                MapReduceSpec::DegreeDistribution(j) => mapreduce::execute(j, graph, &states, workers, live),
            };
            memory.set(MAP_REDUCE_MEMORY_KEY, value);
        }

        Ok(ComputerResult { memory, supersteps })
    }

    /// Rebuild one program copy per worker, plus the coordinator's, from
    /// the wire form, then run.
    async fn run_spec<P: ProgramVariant>(
        &self,
        graph: &ComputeGraph,
        wire: &str,
        states: &mut [PropertyMap],
        memory: &mut Memory,
        liveness: &dyn Liveness,
    ) -> Result<u32> {
        let rebuild = || ProgramSpec::from_wire(wire).and_then(P::from_spec);
        let coordinator = rebuild()?;
        let workers = graph
            .partitions(self.config.workers)
            .iter()
            .map(|_| rebuild())
            .collect::<Result<Vec<P>>>()?;
        self.run(graph, coordinator, workers, states, memory, liveness).await
    }

    /// The superstep loop. Returns the number of supersteps executed.
    pub(crate) async fn run<P: VertexProgram>(
        &self,
        graph: &ComputeGraph,
        coordinator: P,
        workers: Vec<P>,
        states: &mut [PropertyMap],
        memory: &mut Memory,
        liveness: &dyn Liveness,
    ) -> Result<u32> {
        let chunk = graph.chunk_len(self.config.workers);
        let name = coordinator.name();
        let limit = coordinator.max_iterations(graph.len());
        coordinator.setup(memory);
        let mut inbox: Vec<Vec<P::Message>> = vec![Vec::new(); graph.len()];
        let mut superstep = 0u32;

        tracing::info!(program = name, vertices = graph.len(), workers = workers.len(), "vertex program started");

        loop {
            memory.set_superstep(superstep);

            // worker start
            let persistence = coordinator.persistence(memory);
            let mut writers: Vec<BatchedResultWriter<B>> = match &persistence {
                Some(result_type) => {
                    if !self.store.schema_view().await?.contains(result_type) {
                        return Err(Error::SchemaMutation(format!(
                            "result type {result_type} is not visible to {name}"
                        )));
                    }
                    workers
                        .iter()
                        .map(|_| BatchedResultWriter::from_config(self.store.clone(), result_type.clone(), &self.config))
                        .collect()
                }
                None => Vec::new(),
            };

            let outputs: Vec<WorkerOutput<P::Message>> = {
                let memory = &*memory;
                std::thread::scope(|s| {
                    let handles: Vec<_> = states
                        .chunks_mut(chunk)
                        .zip(inbox.chunks(chunk))
                        .zip(&workers)
                        .enumerate()
                        .map(|(w, ((part, messages), program))| {
                            s.spawn(move || compute_partition(program, graph, w * chunk, part, messages, memory, liveness))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                        .collect()
                })
            };

            // barrier
            let mut next: Vec<Vec<P::Message>> = vec![Vec::new(); graph.len()];
            let mut sent = 0usize;
            for (w, output) in outputs.into_iter().enumerate() {
                sent += route(graph, output.outbox, &mut next);
                memory.apply(output.delta);

                // worker end
                match writers.get_mut(w) {
                    Some(writer) => {
                        for (id, value) in output.writes {
                            writer.add(id, value).await?;
                        }
                        writer.flush().await?;
                    }
                    None if !output.writes.is_empty() => {
                        tracing::warn!(
                            program = name,
                            superstep,
                            dropped = output.writes.len(),
                            "results written outside a persistence superstep dropped"
                        );
                    }
                    None => {}
                }
            }
            inbox = next;

            let stop = coordinator.terminate(memory)?;
            tracing::debug!(program = name, superstep, messages = sent, stop, "superstep complete");
            if stop {
                tracing::info!(program = name, supersteps = superstep + 1, "vertex program finished");
                return Ok(superstep + 1);
            }
            superstep += 1;
            if superstep >= limit {
                tracing::error!(program = name, limit, "iteration limit exceeded");
                return Err(Error::IterationLimit { program: name.to_owned(), limit });
            }
        }
    }
}

fn compute_partition<P: VertexProgram>(
    program: &P,
    graph: &ComputeGraph,
    offset: usize,
    states: &mut [PropertyMap],
    inbox: &[Vec<P::Message>],
    memory: &Memory,
    liveness: &dyn Liveness,
) -> WorkerOutput<P::Message> {
    let mut out = WorkerOutput { outbox: Vec::new(), delta: MemoryDelta::new(), writes: Vec::new() };
    let mut outbox = Vec::new();
    for (i, (state, messages)) in states.iter_mut().zip(inbox).enumerate() {
        let idx = offset + i;
        let vertex = graph.vertex(idx);
        if !helpers::is_alive(liveness, &vertex.id) {
            continue;
        }
        let mut ctx = VertexContext::new(vertex, state, messages, &mut outbox, &mut out.delta, memory, &mut out.writes);
        program.compute(&mut ctx, memory);
        out.outbox.extend(outbox.drain(..).map(|m| (idx, m)));
    }
    out
}

/// Deliver one worker's outbox into next superstep's inboxes. Returns the
/// number of messages delivered.
fn route<M: Clone>(graph: &ComputeGraph, outbox: Vec<(usize, Outgoing<M>)>, next: &mut [Vec<M>]) -> usize {
    let mut delivered = 0;
    for (from, message) in outbox {
        match message {
            Outgoing::Scoped(scope, m) => {
                for target in graph.neighbors(from, scope) {
                    next[target].push(m.clone());
                    delivered += 1;
                }
            }
            Outgoing::Direct(id, m) => match graph.index_of(&id) {
                Some(target) => {
                    next[target].push(m);
                    delivered += 1;
                }
                None => tracing::debug!(%id, "message to unknown vertex dropped"),
            },
        }
    }
    delivered
}

#[async_trait]
impl<B: GraphStore> GraphComputer for LocalComputer<B> {
    async fn compute(
        &self,
        program: Option<&ProgramSpec>,
        map_reduce: Option<&MapReduceSpec>,
    ) -> Result<ComputerResult> {
        let graph = ComputeGraph::from_snapshot(self.store.snapshot().await?);
        self.compute_on(&graph, program, map_reduce).await
    }
}
