//! End-to-end tests for numeric statistics over attribute values.
//!
//! Values are weighted by how many in-scope owners reference them: one
//! attribute `age = 20` owned by two people counts twice.

use std::sync::Arc;

use graph_analytics::{
    Analytics, AnalyticsConfig, DataType, Error, GraphStore, MemoryBackend, SchemaType, TxMode, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Helpers
// ============================================================================

/// People aged 10, 20, 20, 30 (one shared `age = 20` attribute), two of
/// them with a weight; one dog aged 3; a company owning nothing.
async fn setup() -> Arc<MemoryBackend> {
    let db = Arc::new(MemoryBackend::new());
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::attribute("age", DataType::Long)).await.unwrap();
    db.put_type(&mut tx, SchemaType::attribute("weight", DataType::Double)).await.unwrap();
    db.put_type(&mut tx, SchemaType::attribute("name", DataType::String)).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("person").owning("age").owning("weight").owning("name"))
        .await
        .unwrap();
    db.put_type(&mut tx, SchemaType::entity("dog").owning("age")).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("company")).await.unwrap();

    let mut people = Vec::new();
    for age in [10, 20, 20, 30] {
        let p = db.insert_entity(&mut tx, "person").await.unwrap();
        let a = db.put_attribute(&mut tx, "age", Value::Int(age)).await.unwrap();
        db.attach_attribute(&mut tx, &p, &a).await.unwrap();
        people.push(p);
    }
    for (p, w) in people.iter().zip([60.0, 80.5]) {
        let a = db.put_attribute(&mut tx, "weight", Value::Float(w)).await.unwrap();
        db.attach_attribute(&mut tx, p, &a).await.unwrap();
    }
    let name = db.put_attribute(&mut tx, "name", Value::from("rex")).await.unwrap();
    db.attach_attribute(&mut tx, &people[0], &name).await.unwrap();

    let dog = db.insert_entity(&mut tx, "dog").await.unwrap();
    let three = db.put_attribute(&mut tx, "age", Value::Int(3)).await.unwrap();
    db.attach_attribute(&mut tx, &dog, &three).await.unwrap();
    db.insert_entity(&mut tx, "company").await.unwrap();
    db.commit(tx).await.unwrap();
    db
}

fn analytics(db: &Arc<MemoryBackend>) -> Analytics<MemoryBackend> {
    Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(3))
}

/// One owner per value, so the weighted multiset is exactly `values`.
async fn store_of(values: &[Value], data_type: DataType) -> Arc<MemoryBackend> {
    let db = Arc::new(MemoryBackend::new());
    let mut tx = db.begin(TxMode::ReadWrite).await.unwrap();
    db.put_type(&mut tx, SchemaType::attribute("score", data_type)).await.unwrap();
    db.put_type(&mut tx, SchemaType::entity("player").owning("score")).await.unwrap();
    for v in values {
        let p = db.insert_entity(&mut tx, "player").await.unwrap();
        let s = db.put_attribute(&mut tx, "score", v.clone()).await.unwrap();
        db.attach_attribute(&mut tx, &p, &s).await.unwrap();
    }
    db.commit(tx).await.unwrap();
    db
}

/// Deterministic pseudo-random sequence (64-bit LCG).
fn lcg(seed: u64, n: usize) -> Vec<u64> {
    let mut x = seed;
    (0..n)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            x >> 33
        })
        .collect()
}

fn reference_median_int(values: &[i64]) -> i64 {
    let mut sorted = values.to_vec();
    sorted.sort();
    sorted[(sorted.len() - 1) / 2]
}

fn reference_median_float(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[(sorted.len() - 1) / 2]
}

// ============================================================================
// 1. Min, max, sum, mean, std
// ============================================================================

#[tokio::test]
async fn test_integer_statistics_over_people() {
    let db = setup().await;
    let a = analytics(&db);
    assert_eq!(a.min(&["age"], &["person"]).await.unwrap(), Some(Value::Int(10)));
    assert_eq!(a.max(&["age"], &["person"]).await.unwrap(), Some(Value::Int(30)));
    assert_eq!(a.sum(&["age"], &["person"]).await.unwrap(), Some(Value::Int(80)));
    assert_eq!(a.mean(&["age"], &["person"]).await.unwrap(), Some(20.0));

    let std = a.std(&["age"], &["person"]).await.unwrap().unwrap();
    assert!((std - 50f64.sqrt()).abs() < 1e-9, "Expected sqrt(50), got: {std}");
}

#[tokio::test]
async fn test_default_scope_includes_every_owner() {
    let db = setup().await;
    let a = analytics(&db);
    assert_eq!(a.min(&["age"], &[]).await.unwrap(), Some(Value::Int(3)));
    assert_eq!(a.sum(&["age"], &[]).await.unwrap(), Some(Value::Int(83)));
    assert_eq!(a.median(&["age"], &[]).await.unwrap(), Some(Value::Int(20)));
}

#[tokio::test]
async fn test_double_statistics() {
    let db = setup().await;
    let a = analytics(&db);
    assert_eq!(a.min(&["weight"], &[]).await.unwrap(), Some(Value::Float(60.0)));
    assert_eq!(a.max(&["weight"], &[]).await.unwrap(), Some(Value::Float(80.5)));
    assert_eq!(a.sum(&["weight"], &[]).await.unwrap(), Some(Value::Float(140.5)));
    assert_eq!(a.mean(&["weight"], &[]).await.unwrap(), Some(70.25));
    assert_eq!(a.std(&["weight"], &[]).await.unwrap(), Some(10.25));
}

#[tokio::test]
async fn test_no_owner_in_scope_is_none() {
    let db = setup().await;
    let a = analytics(&db);
    assert_eq!(a.min(&["age"], &["company"]).await.unwrap(), None);
    assert_eq!(a.mean(&["age"], &["company"]).await.unwrap(), None);
    assert_eq!(a.median(&["age"], &["company"]).await.unwrap(), None);
}

#[tokio::test]
async fn test_statistics_are_worker_independent() {
    let db = setup().await;
    let base = analytics(&db);
    let sum = base.sum(&["age"], &[]).await.unwrap();
    let mean = base.mean(&["age"], &[]).await.unwrap().unwrap();
    let std = base.std(&["age"], &[]).await.unwrap().unwrap();
    for workers in [1, 2, 16] {
        let a = Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(workers));
        assert_eq!(a.sum(&["age"], &[]).await.unwrap(), sum);
        assert!((a.mean(&["age"], &[]).await.unwrap().unwrap() - mean).abs() < 1e-9);
        assert!((a.std(&["age"], &[]).await.unwrap().unwrap() - std).abs() < 1e-9);
    }
}

// ============================================================================
// 2. Validation
// ============================================================================

#[tokio::test]
async fn test_statistics_reject_bad_targets() {
    let db = setup().await;
    let a = analytics(&db);
    assert!(matches!(a.mean(&[], &[]).await, Err(Error::Validation(_))));
    assert!(matches!(a.mean(&["person"], &[]).await, Err(Error::Validation(_))));
    assert!(matches!(a.sum(&["name"], &[]).await, Err(Error::Validation(_))));
    assert!(matches!(a.max(&["age", "weight"], &[]).await, Err(Error::Validation(_))));
    assert!(matches!(a.median(&["name"], &[]).await, Err(Error::Validation(_))));
    assert!(matches!(a.min(&["height"], &[]).await, Err(Error::UnknownType(t)) if t == "height"));
    assert!(matches!(a.min(&["age"], &["robot"]).await, Err(Error::UnknownType(t)) if t == "robot"));
}

// ============================================================================
// 3. Median
// ============================================================================

#[tokio::test]
async fn test_weighted_median() {
    let db = setup().await;
    // weighted multiset 10, 20, 20, 30
    assert_eq!(analytics(&db).median(&["age"], &["person"]).await.unwrap(), Some(Value::Int(20)));
}

#[tokio::test]
async fn test_median_of_one_and_two() {
    let db = store_of(&[Value::Int(7)], DataType::Long).await;
    assert_eq!(analytics(&db).median(&["score"], &[]).await.unwrap(), Some(Value::Int(7)));

    let db = store_of(&[Value::Int(9), Value::Int(3)], DataType::Long).await;
    assert_eq!(analytics(&db).median(&["score"], &[]).await.unwrap(), Some(Value::Int(3)));
}

#[tokio::test]
async fn test_median_of_fifty_doubles() {
    let values: Vec<f64> = lcg(7, 50).into_iter().map(|x| (x % 100_000) as f64 / 7.0 - 5000.0).collect();
    let db = store_of(&values.iter().map(|v| Value::Float(*v)).collect::<Vec<_>>(), DataType::Double).await;
    let median = analytics(&db).median(&["score"], &[]).await.unwrap();
    assert_eq!(median, Some(Value::Float(reference_median_float(&values))));
}

#[tokio::test]
async fn test_median_of_ten_thousand_longs() {
    let values: Vec<i64> = lcg(42, 10_000).into_iter().map(|x| (x % 1000) as i64 - 500).collect();
    let db = store_of(&values.iter().map(|v| Value::Int(*v)).collect::<Vec<_>>(), DataType::Long).await;
    let a = Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(8));
    let median = a.median(&["score"], &[]).await.unwrap();
    assert_eq!(median, Some(Value::Int(reference_median_int(&values))));
}

#[tokio::test]
async fn test_median_with_duplicates_only() {
    let db = store_of(&vec![Value::Int(5); 12], DataType::Long).await;
    assert_eq!(analytics(&db).median(&["score"], &[]).await.unwrap(), Some(Value::Int(5)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_median_matches_sorted_reference(values in prop::collection::vec(-50i64..50, 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let median = rt.block_on(async {
            let db = store_of(&values.iter().map(|v| Value::Int(*v)).collect::<Vec<_>>(), DataType::Long).await;
            analytics(&db).median(&["score"], &[]).await.unwrap()
        });
        prop_assert_eq!(median, Some(Value::Int(reference_median_int(&values))));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_sum_mean_std_independent_of_workers(
        values in prop::collection::vec(-1000i64..1000, 1..30),
        workers in 1usize..9,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (sum, mean, std) = rt.block_on(async {
            let db = store_of(&values.iter().map(|v| Value::Int(*v)).collect::<Vec<_>>(), DataType::Long).await;
            let a = Analytics::in_memory(db.clone(), AnalyticsConfig::default().with_workers(workers));
            (
                a.sum(&["score"], &[]).await.unwrap(),
                a.mean(&["score"], &[]).await.unwrap().unwrap(),
                a.std(&["score"], &[]).await.unwrap().unwrap(),
            )
        });

        let n = values.len() as f64;
        let expected_mean = values.iter().sum::<i64>() as f64 / n;
        let expected_std = (values.iter().map(|v| (*v as f64 - expected_mean).powi(2)).sum::<f64>() / n).sqrt();
        prop_assert_eq!(sum, Some(Value::Int(values.iter().sum())));
        prop_assert!((mean - expected_mean).abs() < 1e-9, "mean {} vs {}", mean, expected_mean);
        prop_assert!((std - expected_std).abs() < 1e-6, "std {} vs {}", std, expected_std);
    }
}
