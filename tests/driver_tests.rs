//! Driver Tests
//!
//! Covers:
//! - Connection lifecycle
//! - INSERT / UPDATE / DELETE persisted to the data file
//! - Batches whose later queries reference earlier results
//! - Plan round-trips and error reporting

mod common;

use std::sync::Arc;

use common::{column, connected_driver, create_seeded_store, run, run_single, schemes, val};
use docsql::{DbError, Driver, JsonFileStore};
use docsql_core::{build_context, DocsqlError, JoinType, Limit, QuerySyntax};
use serde_json::json;

#[tokio::test]
async fn test_execute_requires_connection() {
    let (store, _tmp) = create_seeded_store();
    let driver = Driver::new(store);
    let batch = schemes(json!([[
        {"syntax": "SELECT", "args": [val(json!("*"))]},
        {"syntax": "FROM", "args": [val(json!("users"))]}
    ]]));

    assert!(matches!(driver.execute(batch.clone()).await, Err(DbError::NotConnected)));

    let clone = driver.clone();
    clone.connect().await.unwrap();
    assert!(driver.is_connected());
    assert_eq!(driver.execute(batch.clone()).await.unwrap().len(), 1);

    driver.disconnect().await.unwrap();
    assert!(matches!(clone.execute(batch).await, Err(DbError::NotConnected)));
}

#[tokio::test]
async fn test_insert_update_delete_persist() {
    let (driver, store, _tmp) = connected_driver().await;
    let path = store.path().to_path_buf();

    let outputs = run(
        &driver,
        json!([
            [
                {"syntax": "INSERT", "args": [val(json!({"_key": "eve", "name": "Eve", "age": 22}))]},
                {"syntax": "TO", "args": [val(json!("users"))]}
            ],
            [
                {"syntax": "UPDATE", "args": [val(json!("users"))]},
                {"syntax": "SET", "args": [val(json!({"senior": true}))]},
                {"syntax": "WHERE", "args": [val(json!("age"))]},
                {"syntax": "GT", "args": [val(json!(29))]}
            ],
            [
                {"syntax": "DELETE"},
                {"syntax": "FROM", "args": [val(json!("orders"))]},
                {"syntax": "WHERE", "args": [val(json!("amount"))]},
                {"syntax": "LT", "args": [val(json!(25))]}
            ]
        ]),
    )
    .await;
    assert_eq!(outputs, vec![json!(["eve"]), json!(true), json!(true)]);

    let saved = JsonFileStore::open(&path).unwrap().snapshot();
    assert_eq!(saved["users"]["eve"], json!({"name": "Eve", "age": 22}));
    assert_eq!(saved["users"]["alice"]["senior"], json!(true));
    assert_eq!(saved["users"]["bob"].get("senior"), None);
    assert_eq!(saved["orders"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reference_to_earlier_query() {
    let (driver, _store, _tmp) = connected_driver().await;
    let outputs = run(
        &driver,
        json!([
            [
                {"syntax": "SELECT", "args": [val(json!("userId"))]},
                {"syntax": "FROM", "args": [val(json!("orders"))]},
                {"syntax": "WHERE", "args": [val(json!("product"))]},
                {"syntax": "EQ", "args": [val(json!("Widget"))]}
            ],
            [
                {"syntax": "SELECT", "args": [val(json!("name"))]},
                {"syntax": "FROM", "args": [val(json!("users"))]},
                {"syntax": "WHERE", "args": [val(json!("id"))]},
                {"syntax": "IN", "args": [{"kind": "reference", "query": 0}]}
            ]
        ]),
    )
    .await;
    assert_eq!(
        column(&outputs[1], "users", "name"),
        vec![json!("Alice"), json!("Charlie")]
    );
}

#[tokio::test]
async fn test_union_of_references() {
    let (driver, _store, _tmp) = connected_driver().await;
    let select_dept = |dept: &str| {
        json!([
            {"syntax": "SELECT", "args": [val(json!("dept"))]},
            {"syntax": "FROM", "args": [val(json!("users"))]},
            {"syntax": "WHERE", "args": [val(json!("dept"))]},
            {"syntax": "EQ", "args": [val(json!(dept))]}
        ])
    };
    let union = |syntax: &str| {
        json!([
            {"syntax": "SELECT", "args": [val(json!("dept"))]},
            {"syntax": "FROM", "args": [val(json!("users"))]},
            {"syntax": "WHERE", "args": [val(json!("dept"))]},
            {"syntax": "EQ", "args": [val(json!("sales"))]},
            {"syntax": syntax, "args": [{"kind": "reference", "query": 0}]}
        ])
    };

    let outputs = run(&driver, json!([select_dept("eng"), union("UNION")])).await;
    assert_eq!(
        column(&outputs[1], "users", "dept"),
        vec![json!("sales"), json!("eng")]
    );

    let outputs = run(&driver, json!([select_dept("eng"), union("UNION_ALL")])).await;
    assert_eq!(
        column(&outputs[1], "users", "dept"),
        vec![json!("sales"), json!("eng"), json!("eng")]
    );
}

#[tokio::test]
async fn test_forward_reference_fails() {
    let (driver, _store, _tmp) = connected_driver().await;
    let err = driver
        .execute(schemes(json!([[
            {"syntax": "SELECT", "args": [val(json!("*"))]},
            {"syntax": "FROM", "args": [val(json!("users"))]},
            {"syntax": "EXISTS", "args": [{"kind": "reference", "query": 1}]}
        ]])))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidReference { index: 0, query: 1 }));
}

#[tokio::test]
async fn test_malformed_plan_stops_batch() {
    let (driver, store, _tmp) = connected_driver().await;
    let err = driver
        .execute(schemes(json!([
            [
                {"syntax": "INSERT", "args": [val(json!({"_key": "x", "name": "X"}))]},
                {"syntax": "TO", "args": [val(json!("users"))]}
            ],
            [
                {"syntax": "SELECT", "args": [val(json!("*"))]},
                {"syntax": "FROM", "args": [val(json!("users"))]},
                {"syntax": "ORDER_BY", "args": [val(json!("age DESC NULLS"))]}
            ],
            [
                {"syntax": "DELETE"},
                {"syntax": "FROM", "args": [val(json!("users"))]}
            ]
        ])))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Malformed query: There is something wrong with this order by \"age DESC NULLS\""
    );
    assert!(matches!(err, DbError::Query(DocsqlError::MalformedPlan(_))));
    assert_eq!(store.snapshot()["users"]["x"], json!({"name": "X"}));
    assert_eq!(store.snapshot()["users"].as_object().unwrap().len(), 5);
}

#[tokio::test]
async fn test_empty_where_is_rejected() {
    let (driver, _store, _tmp) = connected_driver().await;
    let err = driver
        .execute(schemes(json!([[
            {"syntax": "SELECT", "args": [val(json!("*"))]},
            {"syntax": "FROM", "args": [val(json!("users"))]},
            {"syntax": "WHERE"}
        ]])))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Validation error: Empty WHERE clause");
}

#[test]
fn test_plan_round_trip() {
    let scheme = schemes(json!([[
        {"syntax": "SELECT", "args": [val(json!("name")), val(json!("orders.amount"))]},
        {"syntax": "FROM", "args": [val(json!("users AS u"))]},
        {"syntax": "LEFT_JOIN", "args": [val(json!("orders.userId"))]},
        {"syntax": "ON", "args": [val(json!("users.id"))]},
        {"syntax": "LIMIT", "args": [val(json!(10)), val(json!(-5))]}
    ]]));
    let context = build_context(&scheme[0]).unwrap();

    assert_eq!(context.command, Some(QuerySyntax::Select));
    assert_eq!(context.tables.len(), 1);
    assert_eq!(context.tables[0].name, "users");
    assert_eq!(context.tables[0].alias.as_deref(), Some("u"));
    assert_eq!(context.joins.len(), 1);
    assert_eq!(context.joins[0].join_type, JoinType::Left);
    assert_eq!(context.joins[0].property_a.table_name(), Some("users"));
    assert_eq!(context.joins[0].property_b.table_name(), Some("orders"));
    assert_eq!(context.joins[0].property_b.name, "userId");
    assert_eq!(context.limit, Some(Limit::new(10, Some(-5))));
}

#[tokio::test]
async fn test_memory_store_driver() {
    let store = docsql::MemoryStore::from_value(common::seed_data()).unwrap();
    let driver = Driver::new(Arc::new(store));
    driver.connect().await.unwrap();
    let output = run_single(
        &driver,
        json!([
            {"syntax": "SELECT", "args": [
                {"kind": "function", "function": "SUM", "alias": "total",
                 "params": [{"kind": "property", "name": "amount"}]}
            ]},
            {"syntax": "FROM", "args": [val(json!("orders"))]}
        ]),
    )
    .await;
    assert_eq!(output, json!({"orders": [{"total": 110}]}));
}
