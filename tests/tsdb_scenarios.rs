//! End-to-end scenario coverage through the public `Tsdb` facade: ring
//! wrap, counter-reset retention, bucketed rate queries, selector/alias
//! substitution, descriptor allocation idempotency, and the scalar
//! function family (`ts_bucket`/`clamp`/`null_if_outside`/`align_time`).

use std::collections::BTreeMap;
use tsdb::prelude::*;

#[test]
fn scenario_a_ring_wrap_keeps_only_most_recent_slots() {
    let db = Tsdb::new();
    let id = db
        .write_gauge(None, 1_000_000, 0.0, Some("cpu"), &BTreeMap::new(), Some(1), Some(3))
        .unwrap();
    for (i, v) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
        db.write_gauge(Some(id), 1_000_000 + i, v, None, &BTreeMap::new(), None, None).unwrap();
    }
    let samples = db.read_range(id, 1_000_000, 1_000_003).unwrap();
    let ts_values: Vec<(i64, f32)> = samples.iter().map(|s| (s.ts, s.value)).collect();
    assert_eq!(ts_values, vec![(1_000_001, 1.0), (1_000_002, 2.0), (1_000_003, 3.0)]);
}

#[test]
fn scenario_b_counter_reset_is_retained_raw() {
    let db = Tsdb::new();
    let id = db
        .write_counter(None, 2_000_000, 100.0, Some("requests"), &BTreeMap::new(), Some(1), Some(4))
        .unwrap();
    db.write_counter(Some(id), 2_000_001, 90.0, None, &BTreeMap::new(), None, None).unwrap();
    let samples = db.read_range(id, 2_000_000, 2_000_001).unwrap();
    let values: Vec<f32> = samples.iter().map(|s| s.value).collect();
    assert_eq!(values, vec![100.0, 90.0]);
}

#[test]
fn scenario_c_bucket_rate_over_counter_nulls_on_reset() {
    let db = Tsdb::new();
    let id = db
        .write_counter(None, 0, 100.0, Some("requests"), &BTreeMap::new(), Some(10), Some(100))
        .unwrap();
    db.write_counter(Some(id), 10, 200.0, None, &BTreeMap::new(), None, None).unwrap();
    db.write_counter(Some(id), 20, 50.0, None, &BTreeMap::new(), None, None).unwrap();

    let rows = db
        .run_sql(
            &[id],
            0,
            20,
            "WITH b AS (SELECT ts_bucket(ts, 10) bucket, max(value) v FROM samples GROUP BY bucket) \
             SELECT bucket, bucket_rate(v, LAG(v) OVER (ORDER BY bucket), 10) rate FROM b ORDER BY bucket",
        )
        .unwrap();

    assert_eq!(rows.len(), 3);
    let rate = |i: usize| rows[i].iter().find(|(name, _)| name == "rate").unwrap().1.clone();
    assert_eq!(rate(0), Cell::Null);
    assert_eq!(rate(1), Cell::Float64(10.0));
    assert_eq!(rate(2), Cell::Null);
}

#[test]
fn scenario_d_selector_substitution_resolves_to_metric_id() {
    let db = Tsdb::new();
    let mut tags = BTreeMap::new();
    tags.insert("role".to_string(), "web".to_string());
    let id = db
        .write_gauge(None, 0, 10.0, Some("cpu"), &tags, Some(1), Some(10))
        .unwrap();
    db.write_gauge(Some(id), 1, 20.0, None, &BTreeMap::new(), None, None).unwrap();

    let selectors = vec![Selector { metric: "cpu".to_string(), tags, alias: Some("CPU".to_string()) }];
    let resolved = resolve_selectors(db.descriptor_catalog(), &selectors, 10).unwrap();
    assert_eq!(resolved[0].metric_ids, vec![id]);

    let sql = substitute_aliases("SELECT avg(value) v FROM samples WHERE metric_id = {{CPU}}", &resolved).unwrap();
    assert_eq!(sql, format!("SELECT avg(value) v FROM samples WHERE metric_id = {id}"));

    let rows = db.run_sql(&[id], 0, 1, &sql).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].1, Cell::Float64(15.0));
}

#[test]
fn scenario_e_descriptor_allocation_without_id_is_idempotent() {
    let db = Tsdb::new();
    let mut tags = BTreeMap::new();
    tags.insert("env".to_string(), "qa".to_string());
    let id1 = db
        .write_gauge(None, 0, 1.0, Some("foo"), &tags, Some(2), Some(10))
        .unwrap();
    let id2 = db
        .write_gauge(None, 1, 2.0, Some("foo"), &tags, Some(2), Some(10))
        .unwrap();
    assert_eq!(id1, id2);
}

#[test]
fn scenario_f_ts_bucket_clamp_null_if_outside_align_time() {
    let db = Tsdb::new();
    let id = db
        .write_gauge(None, 0, -5.0, Some("gauge"), &BTreeMap::new(), Some(1), Some(10))
        .unwrap();
    for (ts, v) in [(1, 0.5), (2, 5.0), (3, 15.0)] {
        db.write_gauge(Some(id), ts, v, None, &BTreeMap::new(), None, None).unwrap();
    }

    let rows = db
        .run_sql(
            &[id],
            0,
            3,
            "SELECT clamp(value, 0.0, 10.0) c, null_if_outside(value, 0.0, 10.0) n, align_time(ts, 60, 0) a \
             FROM samples ORDER BY ts",
        )
        .unwrap();

    assert_eq!(rows.len(), 4);
    let col = |row: usize, name: &str| rows[row].iter().find(|(n, _)| n == name).unwrap().1.clone();

    assert_eq!(col(0, "c"), Cell::Float64(0.0));
    assert_eq!(col(0, "n"), Cell::Null);
    assert_eq!(col(1, "c"), Cell::Float64(0.5));
    assert_eq!(col(1, "n"), Cell::Float64(0.5));
    assert_eq!(col(2, "c"), Cell::Float64(5.0));
    assert_eq!(col(2, "n"), Cell::Float64(5.0));
    assert_eq!(col(3, "c"), Cell::Float64(10.0));
    assert_eq!(col(3, "n"), Cell::Null);
    for row in 0..4 {
        assert_eq!(col(row, "a"), Cell::Int64(0));
    }
}

#[test]
fn invariant_delete_metric_makes_it_behave_as_if_it_never_existed() {
    let db = Tsdb::new();
    let id = db
        .write_gauge(None, 0, 1.0, Some("ephemeral"), &BTreeMap::new(), Some(1), Some(5))
        .unwrap();
    db.delete_metric(id).unwrap();

    assert!(db.read_range(id, 0, 100).unwrap().is_empty());
    assert_eq!(db.lookup("ephemeral", &BTreeMap::new()).unwrap(), None);
}

#[test]
fn invariant_resolve_selectors_rejects_unknown_alias_in_sql() {
    let db = Tsdb::new();
    let id = db
        .write_gauge(None, 0, 1.0, Some("cpu"), &BTreeMap::new(), Some(1), Some(5))
        .unwrap();
    let selectors = vec![Selector { metric: "cpu".to_string(), tags: BTreeMap::new(), alias: Some("A".to_string()) }];
    let resolved = resolve_selectors(db.descriptor_catalog(), &selectors, 10).unwrap();
    assert_eq!(resolved[0].metric_ids, vec![id]);
    let err = substitute_aliases("SELECT * FROM samples WHERE metric_id = {{B}}", &resolved).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn retention_rewrite_preserves_gauge_history_under_a_new_shape() {
    let db = Tsdb::new();
    let id = db
        .write_gauge(None, 0, 1.0, Some("cpu"), &BTreeMap::new(), Some(1), Some(3))
        .unwrap();
    db.write_gauge(Some(id), 1, 2.0, None, &BTreeMap::new(), None, None).unwrap();
    db.retention_rewrite(id, 2, 10).unwrap();

    let record = db.metric_record(id).unwrap().unwrap();
    assert_eq!(record.step, 2);
    assert_eq!(record.slots, 10);
    let values: Vec<f32> = db.read_range(id, 0, i64::MAX).unwrap().into_iter().map(|s| s.value).collect();
    assert_eq!(values, vec![1.0, 2.0]);
}
