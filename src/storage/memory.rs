//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses plain HashMaps behind one `RwLock`.
//!
//! ## Transactions
//!
//! - **Buffered writes**: a read-write transaction records its writes and
//!   applies them atomically in `commit()`. `rollback()` discards them.
//! - **Optimistic commit**: every concept carries the sequence number of the
//!   commit that last modified it. A transaction that touched a concept
//!   modified after it began fails with `Error::TxConflict`.
//! - **Lagging schema view**: `schema_view()` can be configured to keep
//!   serving the previous schema for a number of reads after a schema commit,
//!   which is what a cluster's metadata cache looks like to the compute phase.
//!
//! Use this store for:
//! - Testing programs, the runtime and the facade
//! - Embedding analytics in applications that don't need persistence

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{GraphSnapshot, GraphStore, Liveness, Pattern};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    state: RwLock<GraphState>,
    visible_schema: Mutex<VisibleSchema>,
    next_id: AtomicU64,
    next_tx_id: AtomicU64,
    /// Reads of `schema_view()` that keep returning the stale schema after a schema commit.
    schema_lag: u32,
    /// Pending forced commit failures (test hook).
    commit_failures: AtomicU32,
}

#[derive(Debug, Clone)]
struct Casting {
    id: ConceptId,
    role: String,
    relation: ConceptId,
    player: ConceptId,
}

#[derive(Default)]
struct GraphState {
    types: HashMap<String, SchemaType>,
    things: HashMap<ConceptId, Concept>,
    castings: HashMap<ConceptId, Casting>,
    /// owner → attributes
    owns: HashMap<ConceptId, BTreeSet<ConceptId>>,
    /// attribute → owners
    owned_by: HashMap<ConceptId, BTreeSet<ConceptId>>,
    /// (attribute type, value key) → attribute
    attribute_index: HashMap<(String, String), ConceptId>,
    /// thing → castings it takes part in, as relation or as player
    castings_of: HashMap<ConceptId, Vec<ConceptId>>,
    /// concept → commit sequence that last modified or deleted it
    modified: HashMap<ConceptId, u64>,
    seq: u64,
}

struct VisibleSchema {
    types: Vec<SchemaType>,
    pending: Option<(Vec<SchemaType>, u32)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_schema_propagation_lag(0)
    }

    /// Schema commits become visible to `schema_view()` only after `reads`
    /// further reads of it.
    pub fn with_schema_propagation_lag(reads: u32) -> Self {
        let mut state = GraphState::default();
        for ty in meta_types() {
            state.types.insert(ty.label.clone(), ty);
        }
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(state),
                visible_schema: Mutex::new(VisibleSchema { types: meta_types(), pending: None }),
                next_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
                schema_lag: reads,
                commit_failures: AtomicU32::new(0),
            }),
        }
    }

    /// Make the next `n` read-write commits fail with `Error::TxConflict`.
    pub fn inject_commit_failures(&self, n: u32) {
        self.inner.commit_failures.store(n, Ordering::SeqCst);
    }

    /// Number of instances (castings excluded).
    pub fn thing_count(&self) -> usize {
        self.inner.state.read().things.len()
    }

    fn next_concept_id(&self) -> ConceptId {
        ConceptId(format!("V{}", self.inner.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

#[derive(Debug, Clone)]
enum WriteOp {
    PutType(SchemaType),
    InsertThing(Concept),
    InsertCasting(Casting),
    Attach(ConceptId, ConceptId),
    Detach(ConceptId, ConceptId),
    Delete(ConceptId),
}

/// In-memory transaction: a write buffer plus the concepts it touched.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    start_seq: u64,
    ops: Vec<WriteOp>,
    touched: HashSet<ConceptId>,
    new_types: HashMap<String, SchemaType>,
    new_things: HashMap<ConceptId, Concept>,
    new_attributes: HashMap<(String, String), ConceptId>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

impl MemoryTx {
    fn require_write(&self) -> Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(Error::TxError(format!("{} is read-only", self.id)))
        }
    }
}

// ============================================================================
// Helpers over committed state + transaction overlay
// ============================================================================

impl GraphState {
    fn schema_with(&self, tx: &MemoryTx) -> Schema {
        let mut types = self.types.clone();
        for (label, ty) in &tx.new_types {
            types.insert(label.clone(), ty.clone());
        }
        Schema::new(types.into_values())
    }

    fn concept(&self, tx: &MemoryTx, id: &ConceptId) -> Option<Concept> {
        if let Some(c) = tx.new_things.get(id) {
            return Some(c.clone());
        }
        if let Some(c) = self.things.get(id) {
            return Some(c.clone());
        }
        self.castings
            .get(id)
            .map(|c| Concept::new(c.id.clone(), VertexKind::Casting, c.role.clone()))
    }

    fn owned_ids(&self, tx: &MemoryTx, owner: &ConceptId) -> BTreeSet<ConceptId> {
        let mut ids = self.owns.get(owner).cloned().unwrap_or_default();
        for op in &tx.ops {
            match op {
                WriteOp::Attach(o, a) if o == owner => { ids.insert(a.clone()); }
                WriteOp::Detach(o, a) if o == owner => { ids.remove(a); }
                _ => {}
            }
        }
        ids
    }

    fn remove_concept(&mut self, id: &ConceptId, seq: u64) -> bool {
        let Some(concept) = self.things.remove(id) else { return false };
        self.modified.insert(id.clone(), seq);

        if let Some(value) = &concept.value {
            self.attribute_index.remove(&(concept.type_label.clone(), value.dedup_key()));
        }
        for attr in self.owns.remove(id).unwrap_or_default() {
            if let Some(owners) = self.owned_by.get_mut(&attr) {
                owners.remove(id);
            }
            self.modified.insert(attr, seq);
        }
        for owner in self.owned_by.remove(id).unwrap_or_default() {
            if let Some(attrs) = self.owns.get_mut(&owner) {
                attrs.remove(id);
            }
            self.modified.insert(owner, seq);
        }
        for casting_id in self.castings_of.remove(id).unwrap_or_default() {
            let Some(casting) = self.castings.remove(&casting_id) else { continue };
            self.modified.insert(casting_id.clone(), seq);
            let other = if casting.relation == *id { &casting.player } else { &casting.relation };
            if let Some(list) = self.castings_of.get_mut(other) {
                list.retain(|c| *c != casting_id);
            }
            self.modified.insert(other.clone(), seq);
        }
        true
    }

    fn apply(&mut self, op: WriteOp, seq: u64) {
        match op {
            WriteOp::PutType(ty) => {
                self.types.insert(ty.label.clone(), ty);
            }
            WriteOp::InsertThing(concept) => {
                if let Some(value) = &concept.value {
                    self.attribute_index
                        .insert((concept.type_label.clone(), value.dedup_key()), concept.id.clone());
                }
                self.modified.insert(concept.id.clone(), seq);
                self.things.insert(concept.id.clone(), concept);
            }
            WriteOp::InsertCasting(casting) => {
                if !self.things.contains_key(&casting.player) {
                    return;
                }
                for end in [&casting.relation, &casting.player] {
                    self.castings_of.entry(end.clone()).or_default().push(casting.id.clone());
                    self.modified.insert(end.clone(), seq);
                }
                self.modified.insert(casting.id.clone(), seq);
                self.castings.insert(casting.id.clone(), casting);
            }
            WriteOp::Attach(owner, attr) => {
                if !self.things.contains_key(&owner) || !self.things.contains_key(&attr) {
                    return;
                }
                self.owns.entry(owner.clone()).or_default().insert(attr.clone());
                self.owned_by.entry(attr.clone()).or_default().insert(owner.clone());
                self.modified.insert(owner, seq);
                self.modified.insert(attr, seq);
            }
            WriteOp::Detach(owner, attr) => {
                if let Some(attrs) = self.owns.get_mut(&owner) {
                    attrs.remove(&attr);
                }
                if let Some(owners) = self.owned_by.get_mut(&attr) {
                    owners.remove(&owner);
                }
                self.modified.insert(owner, seq);
                self.modified.insert(attr, seq);
            }
            WriteOp::Delete(id) => {
                self.remove_concept(&id, seq);
            }
        }
    }
}

fn value_matches(data_type: DataType, value: &Value) -> bool {
    matches!(
        (data_type, value),
        (DataType::Long, Value::Int(_))
            | (DataType::Double, Value::Float(_))
            | (DataType::String, Value::String(_))
            | (DataType::Boolean, Value::Bool(_))
            | (DataType::Date, Value::Date(_) | Value::DateTime(_))
    )
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        let start_seq = self.inner.state.read().seq;
        Ok(MemoryTx {
            id,
            mode,
            start_seq,
            ops: Vec::new(),
            touched: HashSet::new(),
            new_types: HashMap::new(),
            new_things: HashMap::new(),
            new_attributes: HashMap::new(),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<()> {
        if tx.ops.is_empty() {
            return Ok(());
        }
        let injected = self
            .inner
            .commit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::TxConflict(format!("{} aborted by injected failure", tx.id)));
        }

        let mut state = self.inner.state.write();
        if let Some(id) = tx
            .touched
            .iter()
            .find(|id| state.modified.get(*id).is_some_and(|seq| *seq > tx.start_seq))
        {
            return Err(Error::TxConflict(format!("{id} was modified after {} began", tx.id)));
        }

        state.seq += 1;
        let seq = state.seq;
        let schema_changed = !tx.new_types.is_empty();
        for op in tx.ops {
            state.apply(op, seq);
        }

        if schema_changed {
            let types: Vec<SchemaType> = state.types.values().cloned().collect();
            drop(state);
            let mut visible = self.inner.visible_schema.lock();
            if self.inner.schema_lag == 0 {
                visible.types = types;
                visible.pending = None;
            } else {
                visible.pending = Some((types, self.inner.schema_lag));
            }
        }
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // Schema
    // ========================================================================

    async fn get_type(&self, tx: &MemoryTx, label: &str) -> Result<Option<SchemaType>> {
        if let Some(ty) = tx.new_types.get(label) {
            return Ok(Some(ty.clone()));
        }
        Ok(self.inner.state.read().types.get(label).cloned())
    }

    async fn all_types(&self, tx: &MemoryTx) -> Result<Vec<SchemaType>> {
        let state = self.inner.state.read();
        let mut types = state.types.clone();
        for (label, ty) in &tx.new_types {
            types.insert(label.clone(), ty.clone());
        }
        Ok(types.into_values().collect())
    }

    async fn put_type(&self, tx: &mut MemoryTx, ty: SchemaType) -> Result<()> {
        tx.require_write()?;
        let existing = self.get_type(tx, &ty.label).await?;
        if let Some(existing) = existing {
            if existing == ty {
                return Ok(());
            }
            if existing.kind != ty.kind || existing.data_type != ty.data_type {
                return Err(Error::ConstraintViolation(format!(
                    "type {} is already defined differently", ty.label
                )));
            }
        }
        if let Some(sup) = &ty.sup {
            if self.get_type(tx, sup).await?.is_none() {
                return Err(Error::UnknownType(sup.clone()));
            }
        }
        tx.new_types.insert(ty.label.clone(), ty.clone());
        tx.ops.push(WriteOp::PutType(ty));
        Ok(())
    }

    async fn set_owns(&self, tx: &mut MemoryTx, owner: &str, attribute: &str) -> Result<()> {
        tx.require_write()?;
        let attr = self
            .get_type(tx, attribute)
            .await?
            .ok_or_else(|| Error::UnknownType(attribute.to_owned()))?;
        if attr.kind != TypeKind::Attribute {
            return Err(Error::ConstraintViolation(format!("{attribute} is not an attribute type")));
        }
        let mut ty = self
            .get_type(tx, owner)
            .await?
            .ok_or_else(|| Error::UnknownType(owner.to_owned()))?;
        if ty.owns.insert(attribute.to_owned()) {
            tx.new_types.insert(ty.label.clone(), ty.clone());
            tx.ops.push(WriteOp::PutType(ty));
        }
        Ok(())
    }

    async fn schema_view(&self) -> Result<Schema> {
        let mut visible = self.inner.visible_schema.lock();
        if let Some((types, remaining)) = visible.pending.take() {
            if remaining == 0 {
                visible.types = types;
            } else {
                visible.pending = Some((types, remaining - 1));
            }
        }
        Ok(Schema::new(visible.types.iter().cloned()))
    }

    // ========================================================================
    // Instances
    // ========================================================================

    async fn get_concept(&self, tx: &MemoryTx, id: &ConceptId) -> Result<Option<Concept>> {
        Ok(self.inner.state.read().concept(tx, id))
    }

    async fn insert_entity(&self, tx: &mut MemoryTx, type_label: &str) -> Result<ConceptId> {
        tx.require_write()?;
        let ty = self
            .get_type(tx, type_label)
            .await?
            .ok_or_else(|| Error::UnknownType(type_label.to_owned()))?;
        if ty.kind != TypeKind::Entity {
            return Err(Error::TypeError { expected: "entity type".into(), got: type_label.into() });
        }
        let id = self.next_concept_id();
        let concept = Concept::new(id.clone(), VertexKind::Entity, type_label);
        tx.new_things.insert(id.clone(), concept.clone());
        tx.ops.push(WriteOp::InsertThing(concept));
        Ok(id)
    }

    async fn insert_relation(
        &self,
        tx: &mut MemoryTx,
        type_label: &str,
        players: &[(&str, &ConceptId)],
    ) -> Result<ConceptId> {
        tx.require_write()?;
        let schema = self.inner.state.read().schema_with(tx);
        let ty = schema
            .get(type_label)
            .ok_or_else(|| Error::UnknownType(type_label.to_owned()))?;
        if ty.kind != TypeKind::Relation {
            return Err(Error::TypeError { expected: "relation type".into(), got: type_label.into() });
        }
        for (role, player) in players {
            let relates = schema
                .types()
                .filter(|t| schema.is_subtype_of(type_label, &t.label))
                .any(|t| t.relates.contains(*role));
            if !relates {
                return Err(Error::ConstraintViolation(format!("{type_label} does not relate {role}")));
            }
            if self.inner.state.read().concept(tx, player).is_none() {
                return Err(Error::NotFound(format!("role player {player}")));
            }
        }

        let id = self.next_concept_id();
        let concept = Concept::new(id.clone(), VertexKind::Relation, type_label);
        tx.new_things.insert(id.clone(), concept.clone());
        tx.ops.push(WriteOp::InsertThing(concept));
        for (role, player) in players {
            let casting = Casting {
                id: self.next_concept_id(),
                role: role.to_string(),
                relation: id.clone(),
                player: (*player).clone(),
            };
            tx.touched.insert((*player).clone());
            tx.ops.push(WriteOp::InsertCasting(casting));
        }
        Ok(id)
    }

    async fn put_attribute(
        &self,
        tx: &mut MemoryTx,
        type_label: &str,
        value: Value,
    ) -> Result<ConceptId> {
        tx.require_write()?;
        let ty = self
            .get_type(tx, type_label)
            .await?
            .ok_or_else(|| Error::UnknownType(type_label.to_owned()))?;
        let data_type = match (ty.kind, ty.data_type) {
            (TypeKind::Attribute, Some(dt)) => dt,
            _ => {
                return Err(Error::TypeError { expected: "attribute type".into(), got: type_label.into() });
            }
        };
        if !value_matches(data_type, &value) {
            return Err(Error::TypeError {
                expected: format!("{data_type:?}"),
                got: value.type_name().to_owned(),
            });
        }

        let key = (type_label.to_owned(), value.dedup_key());
        if let Some(id) = tx.new_attributes.get(&key) {
            return Ok(id.clone());
        }
        if let Some(id) = self.inner.state.read().attribute_index.get(&key).cloned() {
            tx.touched.insert(id.clone());
            return Ok(id);
        }
        let id = self.next_concept_id();
        let concept = Concept::new(id.clone(), VertexKind::Attribute, type_label).with_value(value);
        tx.new_attributes.insert(key, id.clone());
        tx.new_things.insert(id.clone(), concept.clone());
        tx.ops.push(WriteOp::InsertThing(concept));
        Ok(id)
    }

    async fn attach_attribute(
        &self,
        tx: &mut MemoryTx,
        owner: &ConceptId,
        attribute: &ConceptId,
    ) -> Result<()> {
        tx.require_write()?;
        let (owner_concept, attr_concept, schema) = {
            let state = self.inner.state.read();
            (state.concept(tx, owner), state.concept(tx, attribute), state.schema_with(tx))
        };
        let owner_concept = owner_concept.ok_or_else(|| Error::NotFound(format!("owner {owner}")))?;
        let attr_concept = attr_concept.ok_or_else(|| Error::NotFound(format!("attribute {attribute}")))?;
        if !attr_concept.is_attribute() || !owner_concept.kind.is_thing() {
            return Err(Error::ConstraintViolation(format!("{owner} cannot own {attribute}")));
        }
        if !schema.may_own(&owner_concept.type_label, &attr_concept.type_label) {
            return Err(Error::ConstraintViolation(format!(
                "{} may not own {}", owner_concept.type_label, attr_concept.type_label
            )));
        }
        tx.touched.insert(owner.clone());
        tx.touched.insert(attribute.clone());
        tx.ops.push(WriteOp::Attach(owner.clone(), attribute.clone()));
        Ok(())
    }

    async fn detach_attribute(
        &self,
        tx: &mut MemoryTx,
        owner: &ConceptId,
        attribute: &ConceptId,
    ) -> Result<bool> {
        tx.require_write()?;
        let existed = self.inner.state.read().owned_ids(tx, owner).contains(attribute);
        if existed {
            tx.touched.insert(owner.clone());
            tx.touched.insert(attribute.clone());
            tx.ops.push(WriteOp::Detach(owner.clone(), attribute.clone()));
        }
        Ok(existed)
    }

    async fn owned_attributes(&self, tx: &MemoryTx, owner: &ConceptId) -> Result<Vec<Concept>> {
        let state = self.inner.state.read();
        Ok(state
            .owned_ids(tx, owner)
            .iter()
            .filter_map(|id| state.concept(tx, id))
            .collect())
    }

    async fn delete_concept(&self, tx: &mut MemoryTx, id: &ConceptId) -> Result<bool> {
        tx.require_write()?;
        let exists = self.inner.state.read().things.contains_key(id);
        if exists {
            tx.touched.insert(id.clone());
            tx.ops.push(WriteOp::Delete(id.clone()));
        }
        Ok(exists)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn ask(&self, tx: &MemoryTx, pattern: &Pattern) -> Result<bool> {
        let state = self.inner.state.read();
        let found = match pattern {
            Pattern::Isa(labels) => state
                .things
                .values()
                .chain(tx.new_things.values())
                .any(|c| labels.iter().any(|l| *l == c.type_label)),
            Pattern::Has { owners, attributes } => state.owns.iter().any(|(owner, attrs)| {
                let owner_matches = state
                    .things
                    .get(owner)
                    .is_some_and(|c| owners.contains(&c.type_label));
                owner_matches
                    && attrs.iter().any(|a| {
                        state.things.get(a).is_some_and(|c| attributes.contains(&c.type_label))
                    })
            }),
            Pattern::Id(id) => state.concept(tx, id).is_some(),
        };
        Ok(found)
    }

    async fn snapshot(&self) -> Result<GraphSnapshot> {
        let state = self.inner.state.read();
        let mut vertices: Vec<Concept> = state.things.values().cloned().collect();
        vertices.extend(
            state
                .castings
                .values()
                .map(|c| Concept::new(c.id.clone(), VertexKind::Casting, c.role.clone())),
        );
        vertices.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges = Vec::new();
        for casting in state.castings.values() {
            edges.push(Edge::new(casting.relation.clone(), casting.id.clone(), EdgeKind::Casting));
            edges.push(Edge::new(casting.id.clone(), casting.player.clone(), EdgeKind::RolePlayer));
        }
        for (owner, attrs) in &state.owns {
            for attr in attrs {
                edges.push(Edge::new(owner.clone(), attr.clone(), EdgeKind::Ownership));
            }
        }
        edges.sort_by(|a, b| (&a.src, &a.dst).cmp(&(&b.src, &b.dst)));
        Ok(GraphSnapshot { vertices, edges })
    }

    fn liveness(&self) -> Arc<dyn Liveness> {
        Arc::new(MemoryLiveness(Arc::clone(&self.inner)))
    }
}

// ============================================================================
// Liveness
// ============================================================================

struct MemoryLiveness(Arc<MemoryInner>);

impl Liveness for MemoryLiveness {
    fn is_alive(&self, id: &ConceptId) -> bool {
        let state = self.0.state.read();
        state.things.contains_key(id) || state.castings.contains_key(id)
    }
}
