//! End-to-end tests for shortest paths.
//!
//! Paths alternate things and relations; castings are traversed but never
//! reported. Ownership edges join an owner and its attribute directly.

use std::sync::Arc;

use graph_analytics::{
    Analytics, AnalyticsConfig, ConceptId, DataType, Error, GraphStore, MemoryBackend, SchemaType, TxMode, Value,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

async fn schema(db: &MemoryBackend) {
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::attribute("name", DataType::String)).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("person").owning("name")).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("city")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("friend")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("resident")).await.unwrap();
    db.put_type(&mut tx, SchemaType::role("place")).await.unwrap();
    db.put_type(&mut tx, SchemaType::relation("friendship", &["friend"])).await.unwrap();
    db.put_type(&mut tx, SchemaType::relation("residence", &["resident", "place"])).await.unwrap();
    db.commit(tx).await.unwrap();
}

/// `n` people and friendships between the given index pairs.
async fn setup_friends(n: usize, pairs: &[(usize, usize)]) -> (Arc<MemoryBackend>, Vec<ConceptId>, Vec<ConceptId>) {
    let db = Arc::new(MemoryBackend::new());
    schema(&db).await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let mut e = Vec::new();
    for _ in 0..n {
        e.push(db.insert_entity(&mut tx, "person").await.unwrap());
    }
    let mut r = Vec::new();
    for (a, b) in pairs {
        r.push(
            db.insert_relation(&mut tx, "friendship", &[("friend", &e[*a]), ("friend", &e[*b])])
                .await
                .unwrap(),
        );
    }
    db.commit(tx).await.unwrap();
    (db, e, r)
}

fn analytics(db: &Arc<MemoryBackend>) -> Analytics<MemoryBackend> {
    Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(3))
}

fn path(ids: &[&ConceptId]) -> Vec<ConceptId> {
    ids.iter().map(|id| (*id).clone()).collect()
}

// ============================================================================
// 1. Single shortest path
// ============================================================================

#[tokio::test]
async fn test_path_through_two_relations() {
    let (db, e, r) = setup_friends(4, &[(0, 1), (1, 2), (1, 3)]).await;
    let paths = analytics(&db).shortest_paths(&e[0], &e[2], &[]).await.unwrap();
    assert_eq!(paths, vec![path(&[&e[0], &r[0], &e[1], &r[1], &e[2]])]);

    let one = analytics(&db).shortest_path(&e[0], &e[2], &[]).await.unwrap();
    assert_eq!(one, Some(path(&[&e[0], &r[0], &e[1], &r[1], &e[2]])));
}

#[tokio::test]
async fn test_path_is_reversible() {
    let (db, e, r) = setup_friends(4, &[(0, 1), (1, 2), (1, 3)]).await;
    let paths = analytics(&db).shortest_paths(&e[3], &e[0], &[]).await.unwrap();
    assert_eq!(paths, vec![path(&[&e[3], &r[2], &e[1], &r[0], &e[0]])]);
}

#[tokio::test]
async fn test_path_from_player_to_its_relation() {
    let (db, e, r) = setup_friends(2, &[(0, 1)]).await;
    let paths = analytics(&db).shortest_paths(&e[0], &r[0], &[]).await.unwrap();
    assert_eq!(paths, vec![path(&[&e[0], &r[0]])]);
}

#[tokio::test]
async fn test_path_over_ownership() {
    let (db, e, r) = setup_friends(2, &[(0, 1)]).await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let name = db.put_attribute(&mut tx, "name", Value::from("alice")).await.unwrap();
    db.attach_attribute(&mut tx, &e[0], &name).await.unwrap();
    db.attach_attribute(&mut tx, &e[1], &name).await.unwrap();
    db.commit(tx).await.unwrap();

    let a = analytics(&db);
    assert_eq!(a.shortest_paths(&e[0], &name, &[]).await.unwrap(), vec![path(&[&e[0], &name])]);

    // the shared name and the friendship are both two hops
    let paths = a.shortest_paths(&e[0], &e[1], &[]).await.unwrap();
    let mut expected = vec![path(&[&e[0], &name, &e[1]]), path(&[&e[0], &r[0], &e[1]])];
    expected.sort();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn test_ownership_hops_cost_as_much_as_relation_hops() {
    // e0 and e1 share a name, e1 and e2 share another, e0 befriends e2
    let (db, e, r) = setup_friends(3, &[(0, 2)]).await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let first = db.put_attribute(&mut tx, "name", Value::from("ann")).await.unwrap();
    let second = db.put_attribute(&mut tx, "name", Value::from("bob")).await.unwrap();
    db.attach_attribute(&mut tx, &e[0], &first).await.unwrap();
    db.attach_attribute(&mut tx, &e[1], &first).await.unwrap();
    db.attach_attribute(&mut tx, &e[1], &second).await.unwrap();
    db.attach_attribute(&mut tx, &e[2], &second).await.unwrap();
    db.commit(tx).await.unwrap();

    let paths = analytics(&db).shortest_paths(&e[0], &e[2], &[]).await.unwrap();
    assert_eq!(paths, vec![path(&[&e[0], &r[0], &e[2]])]);
}

#[tokio::test]
async fn test_tied_paths_through_ownership_and_relation_middles() {
    // e0 -friendship- e1 -owns- name, and e0 -owns- nick -owned by- e2 -owns- name
    let (db, e, r) = setup_friends(3, &[(0, 1)]).await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let name = db.put_attribute(&mut tx, "name", Value::from("carol")).await.unwrap();
    let nick = db.put_attribute(&mut tx, "name", Value::from("cee")).await.unwrap();
    db.attach_attribute(&mut tx, &e[1], &name).await.unwrap();
    db.attach_attribute(&mut tx, &e[2], &name).await.unwrap();
    db.attach_attribute(&mut tx, &e[0], &nick).await.unwrap();
    db.attach_attribute(&mut tx, &e[2], &nick).await.unwrap();
    db.commit(tx).await.unwrap();

    let paths = analytics(&db).shortest_paths(&e[0], &name, &[]).await.unwrap();
    let mut expected = vec![path(&[&e[0], &r[0], &e[1], &name]), path(&[&e[0], &nick, &e[2], &name])];
    expected.sort();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn test_same_source_and_destination() {
    let (db, e, _r) = setup_friends(2, &[(0, 1)]).await;
    let paths = analytics(&db).shortest_paths(&e[1], &e[1], &[]).await.unwrap();
    assert_eq!(paths, vec![vec![e[1].clone()]]);
}

// ============================================================================
// 2. Multiple shortest paths
// ============================================================================

#[tokio::test]
async fn test_all_paths_through_a_diamond() {
    // e1 - e2 - e4 and e1 - e3 - e4
    let (db, e, r) = setup_friends(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]).await;
    let paths = analytics(&db).shortest_paths(&e[0], &e[3], &[]).await.unwrap();

    let mut expected = vec![
        path(&[&e[0], &r[0], &e[1], &r[2], &e[3]]),
        path(&[&e[0], &r[1], &e[2], &r[3], &e[3]]),
    ];
    expected.sort();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn test_longer_detour_is_not_reported() {
    // direct friendship plus a two-hop detour
    let (db, e, r) = setup_friends(3, &[(0, 2), (0, 1), (1, 2)]).await;
    let paths = analytics(&db).shortest_paths(&e[0], &e[2], &[]).await.unwrap();
    assert_eq!(paths, vec![path(&[&e[0], &r[0], &e[2]])]);
}

#[tokio::test]
async fn test_paths_in_a_ladder() {
    // two rungs between two rails: 0-1-2 on top, 3-4-5 below, rungs 0-3 and 2-5
    let (db, e, _r) = setup_friends(6, &[(0, 1), (1, 2), (3, 4), (4, 5), (0, 3), (2, 5)]).await;
    let paths = analytics(&db).shortest_paths(&e[0], &e[5], &[]).await.unwrap();
    assert_eq!(paths.len(), 2);
    for p in &paths {
        assert_eq!(p.len(), 7, "4 things + 3 relations: {p:?}");
        assert_eq!(p.first(), Some(&e[0]));
        assert_eq!(p.last(), Some(&e[5]));
    }
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

// ============================================================================
// 3. No path and argument errors
// ============================================================================

#[tokio::test]
async fn test_disconnected_pair_has_no_path() {
    let (db, e, _r) = setup_friends(4, &[(0, 1), (2, 3)]).await;
    let a = analytics(&db);
    assert!(a.shortest_paths(&e[0], &e[3], &[]).await.unwrap().is_empty());
    assert_eq!(a.shortest_path(&e[0], &e[3], &[]).await.unwrap(), None);
}

#[tokio::test]
async fn test_scope_hides_relations() {
    let (db, e, _r) = setup_friends(2, &[(0, 1)]).await;
    let paths = analytics(&db).shortest_paths(&e[0], &e[1], &["person"]).await.unwrap();
    assert!(paths.is_empty());
}

#[tokio::test]
async fn test_path_across_relation_types() {
    let (db, e, r) = setup_friends(2, &[(0, 1)]).await;
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    let city = db.insert_entity(&mut tx, "city").await.unwrap();
    let lives = db.insert_relation(&mut tx, "residence", &[("resident", &e[1]), ("place", &city)]).await.unwrap();
    db.commit(tx).await.unwrap();

    let a = analytics(&db);
    let paths = a.shortest_paths(&e[0], &city, &[]).await.unwrap();
    assert_eq!(paths, vec![path(&[&e[0], &r[0], &e[1], &lives, &city])]);

    // city out of scope
    let err = a.shortest_paths(&e[0], &city, &["person", "friendship"]).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_unknown_endpoint() {
    let (db, e, _r) = setup_friends(2, &[(0, 1)]).await;
    let err = analytics(&db).shortest_paths(&e[0], &ConceptId::from("V404"), &[]).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
