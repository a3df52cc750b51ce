//! Common test utilities for docsql tests
//!
//! Provides shared helper functions for:
//! - Creating seeded file-backed stores
//! - Parsing schemes from JSON
//! - Running batches through a connected driver

#![allow(dead_code)]

use std::sync::Arc;

use docsql::{Driver, JsonFileStore};
use docsql_core::Scheme;
use serde_json::{json, Value};
use tempfile::TempDir;

pub fn seed_data() -> Value {
    json!({
        "users": {
            "alice": {"id": 1, "name": "Alice", "age": 30, "dept": "eng"},
            "bob": {"id": 2, "name": "Bob", "age": 25, "dept": "eng"},
            "charlie": {"id": 3, "name": "Charlie", "age": 35, "dept": "sales"},
            "diana": {"id": 4, "name": "Diana", "age": 28, "dept": "marketing"}
        },
        "orders": {
            "o1": {"userId": 1, "product": "Widget", "amount": 30},
            "o2": {"userId": 1, "product": "Gadget", "amount": 50},
            "o3": {"userId": 3, "product": "Widget", "amount": 20},
            "o4": {"userId": 9, "product": "Thing", "amount": 10}
        }
    })
}

pub fn create_seeded_store() -> (Arc<JsonFileStore>, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = tmp_dir.path().join("data.json");
    std::fs::write(&path, seed_data().to_string()).expect("Failed to seed data file");
    let store = JsonFileStore::open(&path).expect("Failed to open data file");
    (Arc::new(store), tmp_dir)
}

pub async fn connected_driver() -> (Driver, Arc<JsonFileStore>, TempDir) {
    let (store, tmp) = create_seeded_store();
    let driver = Driver::new(store.clone());
    driver.connect().await.unwrap();
    (driver, store, tmp)
}

pub fn schemes(value: Value) -> Vec<Scheme> {
    serde_json::from_value(value).expect("Invalid scheme JSON")
}

pub async fn run(driver: &Driver, value: Value) -> Vec<Value> {
    driver
        .execute(schemes(value))
        .await
        .expect("Query batch failed")
}

pub async fn run_single(driver: &Driver, scheme: Value) -> Value {
    run(driver, Value::Array(vec![scheme]))
        .await
        .into_iter()
        .next()
        .unwrap_or(Value::Null)
}

/// One field of every output row of `table`.
pub fn column(output: &Value, table: &str, field: &str) -> Vec<Value> {
    output[table]
        .as_array()
        .map(|rows| rows.iter().map(|row| row[field].clone()).collect())
        .unwrap_or_default()
}

pub fn val(value: Value) -> Value {
    json!({"kind": "value", "value": value})
}
