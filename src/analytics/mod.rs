//! # Analytics Facade
//!
//! The entry point for every analytic query. Each operation:
//!
//! 1. resolves the selected-type set (explicit types and their subtypes,
//!    or every instantiable non-result type),
//! 2. validates its arguments before any compute work starts,
//! 3. runs a cheap existential check and returns an empty result early,
//! 4. creates the result attribute type and waits for the compute phase to
//!    see it (persisting operations only),
//! 5. launches the program / map-reduce pipeline and shapes the result.
//!
//! "No result" outcomes (no path, no core, nothing selected) come back as
//! empty collections or `None`, never as errors.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::algorithm::{
    ConnectedComponentsProgram, CorenessProgram, CountProgram, DegreeProgram, DegreeStatisticsProgram,
    KCoreProgram, MedianProgram, ShortestPathProgram, CORENESS, DEGREE, LINKS, MEDIAN,
};
use crate::compute::{ComputerResult, GraphComputer, LocalComputer, MapReduceSpec, ProgramSpec};
use crate::config::AnalyticsConfig;
use crate::mapreduce::{
    ClusterMemberMapReduce, ClusterSizeMapReduce, CountMapReduce, DegreeDistributionMapReduce, MaxMapReduce,
    MeanMapReduce, MinMapReduce, StdMapReduce, SumMapReduce,
};
use crate::model::{ConceptId, DataType, SchemaType, TypeKind, Value};
use crate::storage::{GraphStore, Pattern};
use crate::tx::TxMode;
use crate::{Error, Result};

/// Result attribute type holding persisted degrees.
pub const DEGREE_RESULT: &str = "degree";
/// Result attribute type holding persisted cluster labels.
pub const CLUSTER_RESULT: &str = "cluster";

/// Cluster -> sorted member ids.
pub type Clusters = BTreeMap<ConceptId, BTreeSet<ConceptId>>;

/// Options of the clustering operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterOptions {
    /// Only the cluster containing this concept.
    pub contains: Option<ConceptId>,
    /// Only clusters of exactly this many members.
    pub size: Option<usize>,
}

impl ClusterOptions {
    pub fn containing(mut self, id: impl Into<ConceptId>) -> Self {
        self.contains = Some(id.into());
        self
    }

    pub fn of_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// Resolved scope of a statistics query.
struct StatisticsScope {
    owners: BTreeSet<String>,
    targets: BTreeSet<String>,
}

// ============================================================================
// Analytics
// ============================================================================

pub struct Analytics<B: GraphStore, C: GraphComputer = LocalComputer<B>> {
    store: Arc<B>,
    computer: C,
    config: AnalyticsConfig,
}

impl<B: GraphStore> Analytics<B> {
    /// Analytics computed in-process over snapshots of `store`.
    pub fn in_memory(store: Arc<B>, config: AnalyticsConfig) -> Self {
        let computer = LocalComputer::new(store.clone(), config.clone());
        Self { store, computer, config }
    }
}

impl<B: GraphStore, C: GraphComputer> Analytics<B, C> {
    pub fn new(store: Arc<B>, computer: C, config: AnalyticsConfig) -> Self {
        Self { store, computer, config }
    }

    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    // ========================================================================
    // Count
    // ========================================================================

    /// Instances of the selected types.
    pub async fn count(&self, types: &[&str]) -> Result<u64> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let selected = self.scope(&tx, types).await?;
        tracing::info!(?selected, "count");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(0);
        }
        let job = CountMapReduce::new(selected);
        let result = self.run(None, Some(job.into())).await?;
        Ok(total(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    /// Instances of the selected types plus ownerships between selected
    /// owners and selected attributes.
    pub async fn count_with_ownerships(&self, types: &[&str]) -> Result<u64> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let selected = self.scope(&tx, types).await?;
        tracing::info!(?selected, "count with ownerships");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(0);
        }
        let program = CountProgram::new(selected.clone());
        let job = CountMapReduce::new(selected).with_ownerships();
        let result = self.run(Some(program.into()), Some(job.into())).await?;
        Ok(total(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub async fn min(&self, of: &[&str], in_types: &[&str]) -> Result<Option<Value>> {
        Ok(present(self.statistic("min", of, in_types, |targets| MinMapReduce { targets }.into()).await?))
    }

    pub async fn max(&self, of: &[&str], in_types: &[&str]) -> Result<Option<Value>> {
        Ok(present(self.statistic("max", of, in_types, |targets| MaxMapReduce { targets }.into()).await?))
    }

    /// Sum of values weighted by how many in-scope owners hold each value.
    pub async fn sum(&self, of: &[&str], in_types: &[&str]) -> Result<Option<Value>> {
        Ok(present(self.statistic("sum", of, in_types, |targets| SumMapReduce { targets }.into()).await?))
    }

    pub async fn mean(&self, of: &[&str], in_types: &[&str]) -> Result<Option<f64>> {
        let value = self.statistic("mean", of, in_types, |targets| MeanMapReduce { targets }.into()).await?;
        Ok(present(value).and_then(|v| v.as_float()))
    }

    /// Population standard deviation.
    pub async fn std(&self, of: &[&str], in_types: &[&str]) -> Result<Option<f64>> {
        let value = self.statistic("std", of, in_types, |targets| StdMapReduce { targets }.into()).await?;
        Ok(present(value).and_then(|v| v.as_float()))
    }

    /// The value at weighted rank `(n - 1) / 2`, in the attribute's own
    /// numeric type.
    pub async fn median(&self, of: &[&str], in_types: &[&str]) -> Result<Option<Value>> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let Some(scope) = self.statistics_scope(&tx, of, in_types).await? else {
            return Ok(None);
        };
        tracing::info!(targets = ?scope.targets, "median");
        let program = MedianProgram::new(scope.owners, scope.targets);
        let result = self.run(Some(program.into()), None).await?;
        Ok(present(result.and_then(|r| r.memory().get(MEDIAN).cloned())))
    }

    async fn statistic(
        &self,
        name: &str,
        of: &[&str],
        in_types: &[&str],
        job: impl FnOnce(BTreeSet<String>) -> MapReduceSpec,
    ) -> Result<Option<Value>> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let Some(scope) = self.statistics_scope(&tx, of, in_types).await? else {
            return Ok(None);
        };
        tracing::info!(statistic = name, targets = ?scope.targets, "statistic");
        let job = job(scope.targets.clone());
        let program = DegreeStatisticsProgram::new(scope.owners, scope.targets);
        let result = self.run(Some(program.into()), Some(job)).await?;
        Ok(result.and_then(|r| r.map_reduce().cloned()))
    }

    /// Validate statistics targets: known, attribute types, numeric, and of
    /// a single data type. `None` when no selected owner holds a target.
    async fn statistics_scope(
        &self,
        tx: &B::Tx,
        of: &[&str],
        in_types: &[&str],
    ) -> Result<Option<StatisticsScope>> {
        if of.is_empty() {
            return Err(Error::Validation("statistics need at least one attribute type".into()));
        }
        let mut targets = BTreeSet::new();
        let mut data_types = BTreeSet::new();
        for label in of {
            let closure = self.store.subtypes(tx, label).await?;
            if closure.is_empty() {
                return Err(Error::UnknownType((*label).to_owned()));
            }
            for ty in closure {
                let data_type = match (ty.kind, ty.data_type) {
                    (TypeKind::Attribute, Some(dt)) => dt,
                    _ => return Err(Error::Validation(format!("{} is not an attribute type", ty.label))),
                };
                if !data_type.is_numeric() {
                    return Err(Error::Validation(format!("{} does not hold numeric values", ty.label)));
                }
                data_types.insert(format!("{data_type:?}"));
                targets.insert(ty.label);
            }
        }
        if data_types.len() > 1 {
            return Err(Error::Validation(format!(
                "statistics targets mix data types: {}",
                data_types.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        let owners = self.scope(tx, in_types).await?;
        let pattern = Pattern::Has {
            owners: owners.iter().cloned().collect(),
            attributes: targets.iter().cloned().collect(),
        };
        if !self.store.ask(tx, &pattern).await? {
            tracing::debug!(?targets, "no owned values in scope");
            return Ok(None);
        }
        Ok(Some(StatisticsScope { owners, targets }))
    }

    // ========================================================================
    // Degree
    // ========================================================================

    /// Degree -> things of the `of` types (default: all selected) with that degree.
    pub async fn degrees(&self, of: &[&str], in_types: &[&str]) -> Result<BTreeMap<i64, BTreeSet<ConceptId>>> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let (selected, targets) = self.degree_scope(&tx, of, in_types).await?;
        tracing::info!(?targets, "degrees");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(BTreeMap::new());
        }
        let job = DegreeDistributionMapReduce::new(targets.clone(), DEGREE);
        let program = DegreeProgram::new(selected, targets);
        let result = self.run(Some(program.into()), Some(job.into())).await?;
        Ok(distribution(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    /// Compute degrees and store each as an owned `degree` attribute.
    pub async fn degrees_and_persist(&self, of: &[&str], in_types: &[&str]) -> Result<()> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let (selected, targets) = self.degree_scope(&tx, of, in_types).await?;
        self.guard_persist(&tx, &selected).await?;
        tracing::info!(?targets, "degrees and persist");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(());
        }
        self.ensure_result_type(DEGREE_RESULT, DataType::Long, &targets).await?;
        let program = DegreeProgram::new(selected, targets).persisting(DEGREE_RESULT);
        self.run(Some(program.into()), None).await?;
        Ok(())
    }

    async fn degree_scope(
        &self,
        tx: &B::Tx,
        of: &[&str],
        in_types: &[&str],
    ) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
        let mut selected = self.scope(tx, in_types).await?;
        let targets = if of.is_empty() { selected.clone() } else { self.scope(tx, of).await? };
        selected.extend(targets.iter().cloned());
        Ok((selected, targets))
    }

    // ========================================================================
    // Connected components
    // ========================================================================

    /// Cluster label -> members.
    pub async fn connected_components(&self, types: &[&str], options: ClusterOptions) -> Result<Clusters> {
        let job = ClusterMemberMapReduce { size: options.size };
        let result = self.components(types, &options, None, job.into()).await?;
        Ok(clusters(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    /// Cluster label -> member count.
    pub async fn connected_component_sizes(
        &self,
        types: &[&str],
        options: ClusterOptions,
    ) -> Result<BTreeMap<ConceptId, u64>> {
        let job = ClusterSizeMapReduce { size: options.size };
        let result = self.components(types, &options, None, job.into()).await?;
        Ok(sizes(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    /// Compute clusters, store each thing's label as an owned `cluster`
    /// attribute, and return the cluster sizes.
    pub async fn connected_components_and_persist(
        &self,
        types: &[&str],
        options: ClusterOptions,
    ) -> Result<BTreeMap<ConceptId, u64>> {
        let job = ClusterSizeMapReduce { size: options.size };
        let result = self.components(types, &options, Some(CLUSTER_RESULT), job.into()).await?;
        Ok(sizes(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    async fn components(
        &self,
        types: &[&str],
        options: &ClusterOptions,
        persist: Option<&str>,
        job: MapReduceSpec,
    ) -> Result<Option<ComputerResult>> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let selected = self.scope(&tx, types).await?;
        if persist.is_some() {
            self.guard_persist(&tx, &selected).await?;
        }
        if let Some(source) = &options.contains {
            self.require_in_scope(&tx, source, &selected).await?;
        }
        tracing::info!(?selected, contains = ?options.contains, size = ?options.size, "connected components");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(None);
        }

        let mut program = ConnectedComponentsProgram::new(selected.clone());
        if let Some(source) = &options.contains {
            program = program.containing(source.clone());
        }
        if let Some(result_type) = persist {
            self.ensure_result_type(result_type, DataType::String, &selected).await?;
            program = program.persisting(result_type);
        }
        self.run(Some(program.into()), Some(job)).await
    }

    // ========================================================================
    // K-core and coreness
    // ========================================================================

    /// Clusters of the k-core: label -> members. Empty when no k-core exists.
    pub async fn k_core(&self, types: &[&str], k: i64) -> Result<Clusters> {
        if k < 2 {
            return Err(Error::Validation(format!("k must be at least 2, got {k}")));
        }
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let selected = self.scope(&tx, types).await?;
        tracing::info!(?selected, k, "k-core");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(Clusters::new());
        }
        let program = KCoreProgram::new(selected, k);
        let result = self.run(Some(program.into()), Some(ClusterMemberMapReduce::default().into())).await?;
        Ok(clusters(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    /// Coreness -> things with that coreness, for every thing in the
    /// `min_k`-core.
    pub async fn coreness(&self, types: &[&str], min_k: i64) -> Result<BTreeMap<i64, BTreeSet<ConceptId>>> {
        if min_k < 2 {
            return Err(Error::Validation(format!("k must be at least 2, got {min_k}")));
        }
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let selected = self.scope(&tx, types).await?;
        tracing::info!(?selected, min_k, "coreness");
        if !self.any_instance(&tx, &selected).await? {
            return Ok(BTreeMap::new());
        }
        let job = DegreeDistributionMapReduce::new(selected.clone(), CORENESS);
        let program = CorenessProgram::new(selected, min_k);
        let result = self.run(Some(program.into()), Some(job.into())).await?;
        Ok(distribution(result.as_ref().and_then(ComputerResult::map_reduce)))
    }

    // ========================================================================
    // Shortest paths
    // ========================================================================

    /// Every shortest path from `from` to `to`, both ends inclusive, sorted.
    pub async fn shortest_paths(
        &self,
        from: &ConceptId,
        to: &ConceptId,
        types: &[&str],
    ) -> Result<Vec<Vec<ConceptId>>> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        let selected = self.scope(&tx, types).await?;
        self.require_in_scope(&tx, from, &selected).await?;
        self.require_in_scope(&tx, to, &selected).await?;
        tracing::info!(%from, %to, "shortest paths");
        if from == to {
            return Ok(vec![vec![from.clone()]]);
        }
        let program = ShortestPathProgram::new(selected, from.clone(), to.clone());
        let Some(result) = self.run(Some(program.into()), None).await? else {
            return Ok(Vec::new());
        };
        let links = links(result.memory().get(LINKS));
        let mut paths = Vec::new();
        enumerate_paths(&links, to, &mut vec![from.clone()], &mut paths);
        paths.sort();
        Ok(paths)
    }

    /// One shortest path, the smallest in id order.
    pub async fn shortest_path(
        &self,
        from: &ConceptId,
        to: &ConceptId,
        types: &[&str],
    ) -> Result<Option<Vec<ConceptId>>> {
        Ok(self.shortest_paths(from, to, types).await?.into_iter().next())
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    /// The selected-type set: the closure of `types`, or every instantiable
    /// non-result type when `types` is empty.
    async fn scope(&self, tx: &B::Tx, types: &[&str]) -> Result<BTreeSet<String>> {
        if types.is_empty() {
            return Ok(self
                .store
                .all_types(tx)
                .await?
                .into_iter()
                .filter(|t| t.kind.is_instantiable() && !t.is_result)
                .map(|t| t.label)
                .collect());
        }
        let mut selected = BTreeSet::new();
        for label in types {
            let closure = self.store.subtypes(tx, label).await?;
            if closure.is_empty() {
                return Err(Error::UnknownType((*label).to_owned()));
            }
            selected.extend(closure.into_iter().filter(|t| t.kind.is_instantiable()).map(|t| t.label));
        }
        Ok(selected)
    }

    async fn any_instance(&self, tx: &B::Tx, selected: &BTreeSet<String>) -> Result<bool> {
        if selected.is_empty() {
            return Ok(false);
        }
        self.store.ask(tx, &Pattern::isa(selected)).await
    }

    async fn require_in_scope(&self, tx: &B::Tx, id: &ConceptId, selected: &BTreeSet<String>) -> Result<()> {
        if !self.store.ask(tx, &Pattern::Id(id.clone())).await? {
            return Err(Error::NotFound(format!("concept {id}")));
        }
        let concept = self
            .store
            .get_concept(tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("concept {id}")))?;
        if !selected.contains(&concept.type_label) {
            return Err(Error::Validation(format!("{id} of type {} is outside the selected types", concept.type_label)));
        }
        Ok(())
    }

    /// Persisting over previous results would feed analytics its own output.
    async fn guard_persist(&self, tx: &B::Tx, selected: &BTreeSet<String>) -> Result<()> {
        for label in selected {
            let is_result = self.store.get_type(tx, label).await?.is_some_and(|t| t.is_result);
            if is_result {
                return Err(Error::Validation(format!("cannot persist results over result type {label}")));
            }
        }
        Ok(())
    }

    /// Create `label` as a result attribute type owned by every `owners`
    /// type, then wait until the compute phase's schema view shows it.
    async fn ensure_result_type(&self, label: &str, data_type: DataType, owners: &BTreeSet<String>) -> Result<()> {
        let mut tx = self.store.begin(TxMode::ReadWrite).await?;
        match self.store.get_type(&tx, label).await? {
            Some(existing) if !existing.is_result => {
                return Err(Error::Validation(format!("{label} exists and is not a result type")));
            }
            Some(_) => {}
            None => self.store.put_type(&mut tx, SchemaType::result_attribute(label, data_type)).await?,
        }
        for owner in owners {
            self.store.set_owns(&mut tx, owner, label).await?;
        }
        self.store.commit(tx).await?;

        for check in 1..=self.config.schema_visibility_checks {
            let schema = self.store.schema_view().await?;
            let visible = schema.contains(label) && owners.iter().all(|o| schema.may_own(o, label));
            if visible {
                tracing::debug!(result_type = label, checks = check, "result type visible");
                return Ok(());
            }
            tracing::debug!(result_type = label, check, "result type not yet visible");
        }
        Err(Error::SchemaMutation(format!(
            "result type {label} not visible after {} checks",
            self.config.schema_visibility_checks
        )))
    }

    async fn run(&self, program: Option<ProgramSpec>, job: Option<MapReduceSpec>) -> Result<Option<ComputerResult>> {
        match self.computer.compute(program.as_ref(), job.as_ref()).await {
            Ok(result) => Ok(Some(result)),
            Err(Error::NoResult(reason)) => {
                tracing::info!(%reason, "no result");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Result shaping
// ============================================================================

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn id_set(value: &Value) -> BTreeSet<ConceptId> {
    value
        .as_list()
        .map(|l| l.iter().filter_map(Value::as_str).map(ConceptId::from).collect())
        .unwrap_or_default()
}

fn total(value: Option<&Value>) -> u64 {
    value
        .and_then(Value::as_map)
        .map(|m| m.values().filter_map(Value::as_int).sum::<i64>())
        .unwrap_or(0)
        .max(0) as u64
}

fn clusters(value: Option<&Value>) -> Clusters {
    value
        .and_then(Value::as_map)
        .map(|m| m.iter().map(|(label, members)| (ConceptId::from(label.as_str()), id_set(members))).collect())
        .unwrap_or_default()
}

fn sizes(value: Option<&Value>) -> BTreeMap<ConceptId, u64> {
    value
        .and_then(Value::as_map)
        .map(|m| {
            m.iter()
                .filter_map(|(label, n)| Some((ConceptId::from(label.as_str()), n.as_int()?.max(0) as u64)))
                .collect()
        })
        .unwrap_or_default()
}

fn distribution(value: Option<&Value>) -> BTreeMap<i64, BTreeSet<ConceptId>> {
    let mut out = BTreeMap::new();
    for row in value.and_then(Value::as_list).unwrap_or_default() {
        if let Some([key, members]) = row.as_list() {
            if let Some(key) = key.as_int() {
                out.insert(key, id_set(members));
            }
        }
    }
    out
}

fn links(value: Option<&Value>) -> BTreeMap<ConceptId, BTreeSet<ConceptId>> {
    clusters(value)
}

fn enumerate_paths(
    links: &BTreeMap<ConceptId, BTreeSet<ConceptId>>,
    to: &ConceptId,
    path: &mut Vec<ConceptId>,
    out: &mut Vec<Vec<ConceptId>>,
) {
    let Some(last) = path.last().cloned() else { return };
    if last == *to {
        out.push(path.clone());
        return;
    }
    for next in links.get(&last).into_iter().flatten() {
        path.push(next.clone());
        enumerate_paths(links, to, path, out);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_enumerate_all_paths_through_diamond() {
        let id = |s: &str| ConceptId::from(s);
        let mut links = BTreeMap::new();
        links.insert(id("a"), [id("b"), id("c")].into());
        links.insert(id("b"), [id("d")].into());
        links.insert(id("c"), [id("d")].into());
        let mut paths = Vec::new();
        enumerate_paths(&links, &id("d"), &mut vec![id("a")], &mut paths);
        assert_eq!(paths, vec![vec![id("a"), id("b"), id("d")], vec![id("a"), id("c"), id("d")]]);
    }

    #[test]
    fn test_distribution_parsing() {
        let value = Value::List(vec![Value::List(vec![Value::Int(2), Value::from(vec!["V1", "V3"])])]);
        let parsed = distribution(Some(&value));
        assert_eq!(parsed.get(&2).map(BTreeSet::len), Some(2));
        assert!(distribution(None).is_empty());
    }
}
