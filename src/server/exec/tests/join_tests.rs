use polars::prelude::*;

use super::fixtures::*;
use crate::config::EngineConfig;
use crate::error::AppError;
use crate::ident::{namespace_frame, namespace_plan};
use crate::server::exec::{execute_joins, plan_joins, JoinStep};
use crate::server::plan::JoinKind;

fn pair() -> (DataFrame, DataFrame) {
    let cfg = EngineConfig::default();
    (namespace_frame(people(), "p", &cfg).unwrap(), namespace_frame(orders(), "o", &cfg).unwrap())
}

fn step(kind: JoinKind) -> JoinStep {
    JoinStep { right_source: "o".into(), left_keys: vec!["p__id".into()], right_keys: vec!["o__pid".into()], kind }
}

#[test]
fn namespaced_join_has_no_ambiguous_columns() {
    let (p, o) = pair();
    let out = execute_joins(p, vec![o], &[step(JoinKind::Inner)]).unwrap();
    let mut names: Vec<String> = out.get_column_names().iter().map(|c| c.to_string()).collect();
    assert_eq!(names.len(), 6);
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 6);
    assert!(names.iter().all(|n| n.starts_with("p__") || n.starts_with("o__")));
}

#[test]
fn inner_join_keeps_matching_keys_once() {
    let (p, o) = pair();
    let out = execute_joins(p, vec![o], &[step(JoinKind::Inner)]).unwrap();
    assert_eq!(out.height(), 2);
    assert_eq!(sorted_i64(&out, "p__id"), vec![1, 3]);
    assert_eq!(sorted_i64(&out, "o__pid"), vec![1, 3]);
}

#[test]
fn outer_join_preserves_unmatched_rows_with_nulls() {
    let (p, o) = pair();
    let out = execute_joins(p, vec![o], &[step(JoinKind::Outer)]).unwrap();
    // ids 1,3 match; id 2 (people only) and pid 9 (orders only) survive
    assert_eq!(out.height(), 4);
    assert_eq!(out.column("p__id").unwrap().null_count(), 1);
    assert_eq!(out.column("o__pid").unwrap().null_count(), 1);
    let people_ids = i64_values(&out, "p__id");
    let order_ids = i64_values(&out, "o__pid");
    let unmatched_person = people_ids.iter().zip(order_ids.iter()).find(|(p, _)| **p == Some(2)).unwrap();
    assert_eq!(*unmatched_person.1, None);
}

#[test]
fn left_and_right_joins() {
    let (p, o) = pair();
    let left = execute_joins(p.clone(), vec![o.clone()], &[step(JoinKind::Left)]).unwrap();
    assert_eq!(left.height(), 3);
    assert_eq!(sorted_i64(&left, "p__id"), vec![1, 2, 3]);
    assert_eq!(left.column("o__amount").unwrap().null_count(), 1);

    let right = execute_joins(p, vec![o], &[step(JoinKind::Right)]).unwrap();
    assert_eq!(right.height(), 3);
    assert_eq!(sorted_i64(&right, "o__pid"), vec![1, 3, 9]);
    assert_eq!(right.column("p__name").unwrap().null_count(), 1);
}

#[test]
fn three_way_left_fold_joins_in_declared_order() {
    let cfg = EngineConfig::default();
    let (p, o) = pair();
    let tags = DataFrame::new(vec![
        Series::new("person".into(), &[1i64, 2]).into(),
        Series::new("tag".into(), &["vip", "new"]).into(),
    ]).unwrap();
    let tags = namespace_frame(tags, "t", &cfg).unwrap();
    let steps = vec![
        step(JoinKind::Inner),
        JoinStep { right_source: "t".into(), left_keys: vec!["p__id".into()], right_keys: vec!["t__person".into()], kind: JoinKind::Left },
    ];
    let out = execute_joins(p, vec![o, tags], &steps).unwrap();
    // inner leaves ids 1 and 3; the left join then tags id 1 only
    assert_eq!(out.height(), 2);
    assert_eq!(out.width(), 8);
    assert_eq!(out.column("t__tag").unwrap().null_count(), 1);
}

#[test]
fn multi_key_equality_is_conjunctive() {
    let a = DataFrame::new(vec![
        Series::new("a__k1".into(), &[1i64, 1, 2]).into(),
        Series::new("a__k2".into(), &["x", "y", "x"]).into(),
    ]).unwrap();
    let b = DataFrame::new(vec![
        Series::new("b__k1".into(), &[1i64, 2]).into(),
        Series::new("b__k2".into(), &["y", "y"]).into(),
    ]).unwrap();
    let s = JoinStep {
        right_source: "b".into(),
        left_keys: vec!["a__k1".into(), "a__k2".into()],
        right_keys: vec!["b__k1".into(), "b__k2".into()],
        kind: JoinKind::Inner,
    };
    let out = execute_joins(a, vec![b], &[s]).unwrap();
    assert_eq!(out.height(), 1);
    assert_eq!(str_values(&out, "a__k2"), vec![Some("y".into())]);
}

#[test]
fn key_count_mismatch_is_caught_while_planning() {
    let cfg = EngineConfig::default();
    let mut raw = plan(serde_json::json!({
        "tables_and_join": {
            "primary": { "name": "p.csv", "join_keys": ["id"] },
            "secondaries": [ { "name": "o.csv", "join_keys": ["pid"] } ]
        }
    }));
    raw.tables_and_join.secondaries[0].join_keys.push("created_at".into());
    let q = namespace_plan(&raw, &cfg).unwrap();
    match plan_joins(&q) {
        Err(AppError::JoinColumnMismatch { left_count, right_count, .. }) => {
            assert_eq!((left_count, right_count), (1, 2));
        }
        other => panic!("expected JoinColumnMismatch, got {:?}", other),
    }
}

#[test]
fn missing_or_mistyped_keys() {
    let (p, o) = pair();
    let bad = JoinStep { right_source: "o".into(), left_keys: vec!["p__id".into()], right_keys: vec!["o__nope".into()], kind: JoinKind::Inner };
    assert!(matches!(execute_joins(p.clone(), vec![o.clone()], &[bad]), Err(AppError::ColumnNotFound { .. })));

    let typed = JoinStep { right_source: "o".into(), left_keys: vec!["p__name".into()], right_keys: vec!["o__pid".into()], kind: JoinKind::Inner };
    assert!(matches!(execute_joins(p, vec![o], &[typed]), Err(AppError::SchemaValidation { .. })));
}
