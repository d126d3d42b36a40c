//! Tests for secondary indexes
//!
//! These tests verify:
//! - The total order over JSON values
//! - Inclusive range bounds via binary search
//! - Index and full-scan paths return identical results
//! - Fallback when the index is missing or corrupt
//! - Stale indexes keep their old view until rebuilt

use std::cmp::Ordering;
use std::fs;

use serde_json::{json, Value};
use tablestore::storage::index::{compare_values, filter_range, range_bounds, sort_by_field};
use tablestore::{Config, Engine, Record};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

async fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .flush_delay_ms(20)
        .build();
    let engine = Engine::connect(config).await.unwrap();
    (temp_dir, engine)
}

fn prices(records: &[Record]) -> Vec<Value> {
    records.iter().map(|r| r["price"].clone()).collect()
}

/// Deterministic pseudo-random table with mixed value types, duplicates and
/// missing fields
fn generated_table(seed: u64, len: usize) -> Vec<Record> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };

    (0..len)
        .map(|id| {
            let roll = next();
            let score = match roll % 7 {
                0 => Value::Null,
                1 => json!(format!("s{}", next() % 20)),
                2 => json!((next() % 50) as f64 / 4.0),
                3 => json!(roll % 2 == 0),
                _ => json!(next() % 30),
            };
            if roll % 11 == 0 {
                json!({ "id": id })
            } else {
                json!({ "id": id, "score": score })
            }
        })
        .collect()
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_compare_values_orders_types() {
    let ascending = [
        Value::Null,
        json!(false),
        json!(true),
        json!(-3),
        json!(2.5),
        json!(10),
        json!(""),
        json!("2024-01-02"),
        json!("2024-10-01"),
        json!("b"),
        json!([1]),
        json!([1, 2]),
        json!({}),
        json!({"a": 1}),
    ];

    for pair in ascending.windows(2) {
        assert_eq!(
            compare_values(&pair[0], &pair[1]),
            Ordering::Less,
            "{} should sort before {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_compare_numbers_across_representations() {
    assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
    assert_eq!(compare_values(&json!(2), &json!(1.5)), Ordering::Greater);
    assert_eq!(
        compare_values(&json!(u64::MAX), &json!(i64::MAX)),
        Ordering::Greater
    );
    assert_eq!(compare_values(&json!(-1), &json!(u64::MAX)), Ordering::Less);
}

#[test]
fn test_compare_large_integers_with_floats_exactly() {
    // 2^53 + 1 has no f64 representation
    let above = json!(9_007_199_254_740_993_i64);
    let float = json!(9_007_199_254_740_992.0_f64);
    let exact = json!(9_007_199_254_740_992_i64);

    assert_eq!(compare_values(&above, &float), Ordering::Greater);
    assert_eq!(compare_values(&float, &exact), Ordering::Equal);
    assert_eq!(compare_values(&exact, &above), Ordering::Less);
    assert_eq!(compare_values(&json!(u64::MAX), &json!(1.0e19)), Ordering::Greater);
    assert_eq!(compare_values(&json!(-3), &json!(-2.5)), Ordering::Less);
    assert_eq!(compare_values(&json!(0), &json!(-0.0)), Ordering::Equal);
}

#[test]
fn test_range_over_large_mixed_numbers_matches_scan() {
    let table: Vec<Record> = [
        json!(9_007_199_254_740_993_i64),
        json!(9_007_199_254_740_992.0_f64),
        json!(9_007_199_254_740_992_i64),
        json!(9_007_199_254_740_994.5_f64),
    ]
    .into_iter()
    .map(|price| json!({ "price": price }))
    .collect();

    let mut sorted = table.clone();
    sort_by_field(&mut sorted, "price");
    assert_eq!(
        prices(&sorted),
        vec![
            json!(9_007_199_254_740_992.0_f64),
            json!(9_007_199_254_740_992_i64),
            json!(9_007_199_254_740_993_i64),
            json!(9_007_199_254_740_994.5_f64),
        ]
    );

    let min = json!(9_007_199_254_740_993_i64);
    let (lo, hi) = range_bounds(&sorted, "price", &min, &min);
    assert_eq!(sorted[lo..hi].to_vec(), filter_range(&table, "price", &min, &min));
    assert_eq!(hi - lo, 1);
}

#[test]
fn test_sort_by_field_is_stable_and_treats_missing_as_null() {
    let mut records = vec![
        json!({"id": 1, "price": 5}),
        json!({"id": 2}),
        json!({"id": 3, "price": 5}),
        json!({"id": 4, "price": 1}),
    ];

    sort_by_field(&mut records, "price");

    let ids: Vec<Value> = records.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(2), json!(4), json!(1), json!(3)]);
}

// =============================================================================
// Range Bound Tests
// =============================================================================

#[test]
fn test_range_bounds_are_inclusive() {
    let sorted: Vec<Record> = [1, 2, 2, 3, 5]
        .iter()
        .map(|p| json!({ "price": p }))
        .collect();

    assert_eq!(range_bounds(&sorted, "price", &json!(2), &json!(3)), (1, 4));
    assert_eq!(range_bounds(&sorted, "price", &json!(4), &json!(4)), (4, 4));
    assert_eq!(range_bounds(&sorted, "price", &json!(0), &json!(100)), (0, 5));
    assert_eq!(range_bounds(&sorted, "price", &json!(6), &json!(9)), (5, 5));
}

#[test]
fn test_range_bounds_with_inverted_range_is_empty() {
    let sorted: Vec<Record> = [1, 2, 3].iter().map(|p| json!({ "price": p })).collect();

    let (lo, hi) = range_bounds(&sorted, "price", &json!(3), &json!(1));
    assert_eq!(lo, hi);
}

#[test]
fn test_filter_range_matches_binary_search() {
    for seed in 1..20 {
        let table = generated_table(seed, 60);
        let mut sorted = table.clone();
        sort_by_field(&mut sorted, "score");

        for (min, max) in [
            (json!(3), json!(12)),
            (Value::Null, json!(true)),
            (json!("s1"), json!("s9")),
            (json!(0), json!("zzz")),
        ] {
            let (lo, hi) = range_bounds(&sorted, "score", &min, &max);
            assert_eq!(sorted[lo..hi].to_vec(), filter_range(&table, "score", &min, &max));
        }
    }
}

// =============================================================================
// Engine Index Tests
// =============================================================================

#[tokio::test]
async fn test_build_index_writes_sorted_file() {
    let (temp, engine) = setup_temp_engine().await;

    engine
        .put(
            "products",
            vec![
                json!({"id": 1, "price": 30}),
                json!({"id": 2, "price": 10}),
                json!({"id": 3, "price": 20}),
            ],
        )
        .await
        .unwrap();

    let info = engine.build_index("products", "price").await.unwrap();
    assert_eq!(info.len, 3);

    let text = fs::read_to_string(temp.path().join("products.price.idx")).unwrap();
    let on_disk: Vec<Record> = serde_json::from_str(&text).unwrap();
    assert_eq!(prices(&on_disk), vec![json!(10), json!(20), json!(30)]);
}

#[tokio::test]
async fn test_range_query_via_index() {
    let (_temp, engine) = setup_temp_engine().await;

    engine
        .put(
            "products",
            (1..=10).map(|i| json!({"id": i, "price": i * 10})).collect(),
        )
        .await
        .unwrap();
    engine.build_index("products", "price").await.unwrap();

    let hits = engine
        .range_query("products", "price", &json!(25), &json!(60))
        .await
        .unwrap();

    assert_eq!(prices(&hits), vec![json!(30), json!(40), json!(50), json!(60)]);
}

#[tokio::test]
async fn test_range_query_without_index_scans() {
    let (_temp, engine) = setup_temp_engine().await;

    engine
        .put(
            "products",
            vec![
                json!({"id": 1, "price": 30}),
                json!({"id": 2, "price": 10}),
                json!({"id": 3, "price": 20}),
            ],
        )
        .await
        .unwrap();

    let hits = engine
        .range_query("products", "price", &json!(10), &json!(20))
        .await
        .unwrap();

    assert_eq!(prices(&hits), vec![json!(10), json!(20)]);
}

#[tokio::test]
async fn test_index_and_fallback_are_equivalent() {
    let (_temp, engine) = setup_temp_engine().await;

    for seed in 1..=5 {
        let table = format!("generated_{}", seed);
        engine.put(&table, generated_table(seed, 80)).await.unwrap();

        let ranges = [
            (json!(5), json!(20)),
            (Value::Null, json!(false)),
            (json!("s3"), json!("s7")),
            (json!(2.25), json!("s0")),
            (Value::Null, json!({"max": true})),
        ];

        engine.build_index(&table, "score").await.unwrap();
        let mut via_index = Vec::new();
        for (min, max) in &ranges {
            via_index.push(engine.range_query(&table, "score", min, max).await.unwrap());
        }

        assert!(engine.drop_index(&table, "score").await.unwrap());
        for ((min, max), indexed) in ranges.iter().zip(&via_index) {
            let scanned = engine.range_query(&table, "score", min, max).await.unwrap();
            assert_eq!(&scanned, indexed, "range [{}, {}] differs", min, max);
        }
    }
}

#[tokio::test]
async fn test_corrupt_index_falls_back_to_scan() {
    let (temp, engine) = setup_temp_engine().await;

    engine
        .put(
            "products",
            vec![json!({"id": 1, "price": 5}), json!({"id": 2, "price": 15})],
        )
        .await
        .unwrap();
    fs::write(temp.path().join("products.price.idx"), b"[{ truncated").unwrap();

    let hits = engine
        .range_query("products", "price", &json!(0), &json!(10))
        .await
        .unwrap();

    assert_eq!(hits.to_vec(), vec![json!({"id": 1, "price": 5})]);
}

#[tokio::test]
async fn test_stale_index_returns_old_view_until_rebuilt() {
    let (_temp, engine) = setup_temp_engine().await;

    engine
        .put("products", vec![json!({"id": 1, "price": 5})])
        .await
        .unwrap();
    engine.build_index("products", "price").await.unwrap();

    engine
        .put(
            "products",
            vec![json!({"id": 1, "price": 5}), json!({"id": 2, "price": 7})],
        )
        .await
        .unwrap();

    let stale = engine
        .range_query("products", "price", &json!(0), &json!(10))
        .await
        .unwrap();
    assert_eq!(stale.len(), 1);

    engine.build_index("products", "price").await.unwrap();
    let fresh = engine
        .range_query("products", "price", &json!(0), &json!(10))
        .await
        .unwrap();
    assert_eq!(fresh.len(), 2);
}

#[tokio::test]
async fn test_drop_missing_index_reports_false() {
    let (_temp, engine) = setup_temp_engine().await;

    assert!(!engine.drop_index("products", "price").await.unwrap());
}
