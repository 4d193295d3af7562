//! End-to-end tests for instance counts and degree distributions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use graph_analytics::{
    Analytics, AnalyticsConfig, ConceptId, DataType, Error, GraphStore, MemoryBackend, SchemaType, TxMode, Value,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn ids(list: &[&ConceptId]) -> BTreeSet<ConceptId> {
    list.iter().map(|id| (*id).clone()).collect()
}

/// e1 -r1- e2 -r2- e3, e2 -r3- e4. e1 owns age 30, e3 owns age 30 and
/// e4 owns age 41. Returns (store, entities, relations, ages).
async fn setup() -> (Arc<MemoryBackend>, Vec<ConceptId>, Vec<ConceptId>, Vec<ConceptId>) {
    let db = Arc::new(MemoryBackend::new());
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::attribute("age", DataType::Long)).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("person").owning("age")).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("company")).await.unwrap();
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
    let thirty = db.put_attribute(&mut tx, "age", Value::Int(30)).await.unwrap();
    let forty_one = db.put_attribute(&mut tx, "age", Value::Int(41)).await.unwrap();
    db.attach_attribute(&mut tx, &e[0], &thirty).await.unwrap();
    db.attach_attribute(&mut tx, &e[2], &thirty).await.unwrap();
    db.attach_attribute(&mut tx, &e[3], &forty_one).await.unwrap();
    db.commit(tx).await.unwrap();
    (db, e, r, vec![thirty, forty_one])
}

fn analytics(db: &Arc<MemoryBackend>) -> Analytics<MemoryBackend> {
    Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(2))
}

// ============================================================================
// 1. Count
// ============================================================================

#[tokio::test]
async fn test_count_all_instances() {
    let (db, _e, _r, _ages) = setup().await;
    let a = analytics(&db);
    // 4 people + 3 friendships + 2 ages; castings are not instances
    assert_eq!(a.count(&[]).await.unwrap(), 9);
    assert_eq!(a.count(&["person"]).await.unwrap(), 4);
    assert_eq!(a.count(&["friendship", "age"]).await.unwrap(), 5);
}

#[tokio::test]
async fn test_count_with_no_instances_is_zero() {
    let (db, _e, _r, _ages) = setup().await;
    assert_eq!(analytics(&db).count(&["company"]).await.unwrap(), 0);

    let empty = Arc::new(MemoryBackend::new());
    assert_eq!(analytics(&empty).count(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_count_with_ownerships() {
    let (db, _e, _r, _ages) = setup().await;
    let a = analytics(&db);
    // 4 people + 2 ages + 3 ownerships
    assert_eq!(a.count_with_ownerships(&["person", "age"]).await.unwrap(), 9);
    // ownerships need both ends in scope
    assert_eq!(a.count_with_ownerships(&["person"]).await.unwrap(), 4);
}

#[tokio::test]
async fn test_count_unknown_type() {
    let (db, _e, _r, _ages) = setup().await;
    let err = analytics(&db).count(&["planet"]).await.unwrap_err();
    assert!(matches!(err, Error::UnknownType(t) if t == "planet"));
}

// ============================================================================
// 2. Degrees
// ============================================================================

#[tokio::test]
async fn test_degrees_over_every_type() {
    let (db, e, r, ages) = setup().await;
    let degrees = analytics(&db).degrees(&[], &[]).await.unwrap();

    let mut expected = BTreeMap::new();
    // e4 plays in r3 and owns 41; e1 and e3 play once and own 30
    expected.insert(1, ids(&[&ages[1]]));
    expected.insert(2, ids(&[&e[0], &e[2], &e[3], &r[0], &r[1], &r[2], &ages[0]]));
    expected.insert(3, ids(&[&e[1]]));
    assert_eq!(degrees, expected);
}

#[tokio::test]
async fn test_degrees_of_a_subset() {
    let (db, e, _r, _ages) = setup().await;
    let degrees = analytics(&db).degrees(&["person"], &["person", "friendship"]).await.unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(1, ids(&[&e[0], &e[2], &e[3]]));
    expected.insert(3, ids(&[&e[1]]));
    assert_eq!(degrees, expected);
}

#[tokio::test]
async fn test_degree_counts_only_in_scope_edges() {
    let (db, e, _r, _ages) = setup().await;
    // friendships out of scope: people only see their ages
    let degrees = analytics(&db).degrees(&["person"], &["age"]).await.unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(0, ids(&[&e[1]]));
    expected.insert(1, ids(&[&e[0], &e[2], &e[3]]));
    assert_eq!(degrees, expected);
}

#[tokio::test]
async fn test_degree_sum_is_twice_the_edges() {
    let (db, _e, _r, _ages) = setup().await;
    let degrees = analytics(&db).degrees(&[], &[]).await.unwrap();
    let total: i64 = degrees.iter().map(|(d, members)| d * members.len() as i64).sum();
    // 6 role-player edges + 3 ownerships, each counted at both ends
    assert_eq!(total, 18);
}

#[tokio::test]
async fn test_degrees_without_instances() {
    let (db, _e, _r, _ages) = setup().await;
    assert!(analytics(&db).degrees(&["company"], &["company"]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_count_does_not_change_degrees() {
    let (db, _e, _r, _ages) = setup().await;
    let base = analytics(&db).degrees(&[], &[]).await.unwrap();
    for workers in [1, 5, 32] {
        let a = Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(workers));
        assert_eq!(a.degrees(&[], &[]).await.unwrap(), base, "workers = {workers}");
    }
}
