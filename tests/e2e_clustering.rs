//! End-to-end tests for connected components, k-core and coreness.
//!
//! Each test builds a small graph through the `GraphStore` API of
//! `MemoryBackend`, then runs the facade: scope -> pre-check -> program ->
//! map-reduce -> shaped result.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use graph_analytics::{
    Analytics, AnalyticsConfig, ClusterOptions, ConceptId, Error, GraphStore, MemoryBackend, SchemaType, TxMode,
    Value,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn set(ids: &[&ConceptId]) -> BTreeSet<ConceptId> {
    ids.iter().map(|id| (*id).clone()).collect()
}

/// `n` people, each befriending the next.
async fn setup_chain(n: usize) -> (Arc<MemoryBackend>, Vec<ConceptId>) {
    let db = Arc::new(MemoryBackend::new());
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("person")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("friend")).await.unwrap();
    db.put_type(&mut tx, SchemaType::relation("friendship", &["friend"])).await.unwrap();
    let mut e = Vec::new();
    for _ in 0..n {
        e.push(db.insert_entity(&mut tx, "person").await.unwrap());
    }
    for pair in e.windows(2) {
        db.insert_relation(&mut tx, "friendship", &[("friend", &pair[0]), ("friend", &pair[1])]).await.unwrap();
    }
    db.commit(tx).await.unwrap();
    (db, e)
}

/// e1 -r1- e2 -r2- e3, e2 -r3- e4. Returns (store, entities, relations).
async fn setup_path() -> (Arc<MemoryBackend>, Vec<ConceptId>, Vec<ConceptId>) {
    let db = Arc::new(MemoryBackend::new());
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("person")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("friend")).await.unwrap();
    db.put_type(&mut tx, SchemaType::relation("friendship", &["friend"])).await.unwrap();
    let mut e = Vec::new();
    for _ in 0..4 {
        e.push(db.insert_entity(&mut tx, "person").await.unwrap());
    }
    let mut r = Vec::new();
    for (a, b) in [(0, 1), (1, 2), (1, 3)] {
        r.push(
            db.insert_relation(&mut tx, "friendship", &[("friend", &e[a]), ("friend", &e[b])])
                .await
                .unwrap(),
        );
    }
    db.commit(tx).await.unwrap();
    (db, e, r)
}

/// Two 4-cliques of friendships (e1..e4, e5..e8) joined by a collaboration
/// e4 - e5, plus e9 collaborating with e1 and with e2.
async fn setup_cores() -> (Arc<MemoryBackend>, Vec<ConceptId>) {
    let db = Arc::new(MemoryBackend::new());
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("person")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("friend")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("collaborator")).await.unwrap();
    db.put_type(&mut tx, SchemaType::relation("friendship", &["friend"])).await.unwrap();
    db.put_type(&mut tx, SchemaType::relation("collaboration", &["collaborator"])).await.unwrap();
    let mut e = Vec::new();
    for _ in 0..9 {
        e.push(db.insert_entity(&mut tx, "person").await.unwrap());
    }
    for clique in [[0, 1, 2, 3], [4, 5, 6, 7]] {
        for i in 0..4 {
            for j in (i + 1)..4 {
                let (a, b) = (&e[clique[i]], &e[clique[j]]);
                db.insert_relation(&mut tx, "friendship", &[("friend", a), ("friend", b)]).await.unwrap();
            }
        }
    }
    for (a, b) in [(3, 4), (8, 0), (8, 1)] {
        db.insert_relation(&mut tx, "collaboration", &[("collaborator", &e[a]), ("collaborator", &e[b])])
            .await
            .unwrap();
    }
    db.commit(tx).await.unwrap();
    (db, e)
}

fn analytics(db: &Arc<MemoryBackend>) -> Analytics<MemoryBackend> {
    Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(3))
}

// ============================================================================
// 1. Connected components
// ============================================================================

#[tokio::test]
async fn test_path_graph_is_one_cluster_of_seven() {
    let (db, e, r) = setup_path().await;
    let clusters = analytics(&db).connected_components(&[], ClusterOptions::default()).await.unwrap();

    assert_eq!(clusters.len(), 1);
    let members = clusters.values().next().unwrap();
    let mut expected = set(&e.iter().collect::<Vec<_>>());
    expected.extend(r.iter().cloned());
    assert_eq!(members, &expected);

    // castings V6 V7 V9 V10 V12 V13 seed too; V9 outranks every member id
    let label = clusters.keys().next().unwrap();
    assert_eq!(label.as_str(), "V9");
    assert!(!members.contains(label));
}

#[tokio::test]
async fn test_casting_label_is_persisted_as_is() {
    let (db, e, _r) = setup_path().await;
    let sizes = analytics(&db).connected_components_and_persist(&[], ClusterOptions::default()).await.unwrap();
    assert_eq!(sizes, BTreeMap::from([(ConceptId::from("V9"), 7)]));

    let tx = db.begin(TxMode::ReadOnly).await.unwrap();
    let owned = db.owned_attributes(&tx, &e[0]).await.unwrap();
    let labels: Vec<_> = owned.into_iter().filter(|c| c.type_label == "cluster").filter_map(|c| c.value).collect();
    assert_eq!(labels, vec![Value::from("V9")]);
}

#[tokio::test]
async fn test_cluster_sizes_and_size_filter() {
    let (db, _e, _r) = setup_path().await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let loner = db.insert_entity(&mut tx, "person").await.unwrap();
    db.commit(tx).await.unwrap();

    let a = analytics(&db);
    let sizes = a.connected_component_sizes(&[], ClusterOptions::default()).await.unwrap();
    let mut counts: Vec<u64> = sizes.values().copied().collect();
    counts.sort();
    assert_eq!(counts, vec![1, 7]);
    assert_eq!(sizes.get(&loner), Some(&1));

    let only_singletons = a.connected_components(&[], ClusterOptions::default().of_size(1)).await.unwrap();
    assert_eq!(only_singletons.len(), 1);
    assert_eq!(only_singletons.get(&loner), Some(&set(&[&loner])));
}

#[tokio::test]
async fn test_cluster_containing_a_concept() {
    let (db, e, _r) = setup_path().await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let x = db.insert_entity(&mut tx, "person").await.unwrap();
    let y = db.insert_entity(&mut tx, "person").await.unwrap();
    let xy = db.insert_relation(&mut tx, "friendship", &[("friend", &x), ("friend", &y)]).await.unwrap();
    db.commit(tx).await.unwrap();

    let a = analytics(&db);
    let clusters = a.connected_components(&[], ClusterOptions::default().containing(x.clone())).await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters.get(&x), Some(&set(&[&x, &y, &xy])));

    let clusters = a.connected_components(&[], ClusterOptions::default().containing(e[0].clone())).await.unwrap();
    assert_eq!(clusters.values().next().map(BTreeSet::len), Some(7));

    let err = a
        .connected_components(&[], ClusterOptions::default().containing(ConceptId::from("V999")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_scope_restricts_the_induced_subgraph() {
    let (db, e, _r) = setup_path().await;
    // without the relation type, nobody is connected
    let clusters = analytics(&db).connected_components(&["person"], ClusterOptions::default()).await.unwrap();
    assert_eq!(clusters.len(), 4);
    for id in &e {
        assert_eq!(clusters.get(id), Some(&set(&[id])));
    }
}

#[tokio::test]
async fn test_same_cluster_is_an_equivalence() {
    let (db, e) = setup_cores().await;
    let clusters = analytics(&db).connected_components(&[], ClusterOptions::default()).await.unwrap();

    let mut cluster_of: BTreeMap<&ConceptId, &ConceptId> = BTreeMap::new();
    for (label, members) in &clusters {
        for m in members {
            assert!(cluster_of.insert(m, label).is_none(), "{m} in two clusters");
        }
    }
    for id in &e {
        assert_eq!(cluster_of.get(id), cluster_of.get(&e[0]));
    }
}

#[tokio::test]
async fn test_long_chain_is_one_cluster() {
    let (db, e) = setup_chain(60).await;
    let a = analytics(&db);
    let sizes = a.connected_component_sizes(&[], ClusterOptions::default()).await.unwrap();
    assert_eq!(sizes.values().copied().collect::<Vec<_>>(), vec![119]);

    let sizes = a.connected_component_sizes(&[], ClusterOptions::default().containing(e[0].clone())).await.unwrap();
    assert_eq!(sizes, BTreeMap::from([(e[0].clone(), 119)]));
}

#[tokio::test]
async fn test_unknown_type_is_rejected_before_compute() {
    let (db, _e, _r) = setup_path().await;
    let err = analytics(&db).connected_components(&["robot"], ClusterOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::UnknownType(t) if t == "robot"));
}

// ============================================================================
// 2. K-core
// ============================================================================

#[tokio::test]
async fn test_three_core_is_the_two_cliques() {
    let (db, e) = setup_cores().await;
    let clusters = analytics(&db).k_core(&[], 3).await.unwrap();
    assert_eq!(clusters.len(), 1);
    let members = clusters.values().next().unwrap();
    assert_eq!(members, &e[..8].iter().cloned().collect::<BTreeSet<_>>());
}

#[tokio::test]
async fn test_two_core_includes_the_pendant() {
    let (db, e) = setup_cores().await;
    let clusters = analytics(&db).k_core(&[], 2).await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters.values().next().unwrap(), &e.iter().cloned().collect::<BTreeSet<_>>());
}

#[tokio::test]
async fn test_no_core_is_empty_not_an_error() {
    let (db, _e) = setup_cores().await;
    let clusters = analytics(&db).k_core(&[], 5).await.unwrap();
    assert!(clusters.is_empty());

    let (db, _e, _r) = setup_path().await;
    assert!(analytics(&db).k_core(&[], 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_long_chain_peels_away() {
    let (db, _e) = setup_chain(200).await;
    let a = analytics(&db);
    assert!(a.k_core(&[], 2).await.unwrap().is_empty());

    let coreness = a.coreness(&["person", "friendship"], 2).await.unwrap();
    assert!(coreness.is_empty(), "a chain has no 2-core: {coreness:?}");
}

#[tokio::test]
async fn test_k_core_monotone_in_k() {
    let (db, _e) = setup_cores().await;
    let a = analytics(&db);
    let members = |c: BTreeMap<ConceptId, BTreeSet<ConceptId>>| c.into_values().flatten().collect::<BTreeSet<_>>();
    let two = members(a.k_core(&[], 2).await.unwrap());
    let three = members(a.k_core(&[], 3).await.unwrap());
    let four = members(a.k_core(&[], 4).await.unwrap());
    assert!(three.is_subset(&two));
    assert!(four.is_subset(&three));
    assert!(four.is_empty());
}

#[tokio::test]
async fn test_k_below_two_rejected() {
    let (db, _e) = setup_cores().await;
    assert!(matches!(analytics(&db).k_core(&[], 1).await, Err(Error::Validation(_))));
    assert!(matches!(analytics(&db).coreness(&[], 0).await, Err(Error::Validation(_))));
}

// ============================================================================
// 3. Coreness
// ============================================================================

#[tokio::test]
async fn test_coreness_matches_direct_k_core() {
    let (db, e) = setup_cores().await;
    let a = analytics(&db);
    let coreness = a.coreness(&[], 2).await.unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(2, set(&[&e[8]]));
    expected.insert(3, e[..8].iter().cloned().collect::<BTreeSet<_>>());
    assert_eq!(coreness, expected);

    // a vertex's coreness is the largest k whose k-core keeps it
    for (k, ids) in &coreness {
        let kept: BTreeSet<ConceptId> = a.k_core(&[], *k).await.unwrap().into_values().flatten().collect();
        let dropped: BTreeSet<ConceptId> = a.k_core(&[], k + 1).await.unwrap().into_values().flatten().collect();
        for id in ids {
            assert!(kept.contains(id));
            assert!(!dropped.contains(id));
        }
    }
}

#[tokio::test]
async fn test_coreness_above_min_k_only() {
    let (db, e) = setup_cores().await;
    let coreness = analytics(&db).coreness(&[], 3).await.unwrap();
    assert_eq!(coreness.len(), 1);
    assert_eq!(coreness.get(&3), Some(&e[..8].iter().cloned().collect::<BTreeSet<_>>()));
}
