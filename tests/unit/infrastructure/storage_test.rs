// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::json;
use std::collections::BTreeMap;

use crawlguard::config::settings::OutputFormat;
use crawlguard::domain::models::execution_result::ExecutionResult;
use crawlguard::infrastructure::storage::ResultStorage;

fn result() -> ExecutionResult {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), vec![json!("Tea"), json!("Coffee")]);
    fields.insert("price".to_string(), vec![json!(1280)]);
    ExecutionResult::success("job-1", "https://shop.example", 200, fields, 1)
}

#[tokio::test]
async fn test_save_json_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ResultStorage::new(dir.path().join("nested").join("outputs"));

    let path = storage.save(&result(), OutputFormat::Json).await.unwrap();

    assert_eq!(path, storage.path_for("job-1", OutputFormat::Json));
    let saved: ExecutionResult =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, result_with_timestamp(&saved));
}

#[tokio::test]
async fn test_save_csv_writes_rows_per_index() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ResultStorage::new(dir.path());

    let path = storage.save(&result(), OutputFormat::Csv).await.unwrap();

    assert!(path.to_string_lossy().ends_with("result_job-1.csv"));
    let csv = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "name,price");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("Tea") && lines[1].contains("1280"));
    assert!(lines[2].contains("Coffee"));
}

fn result_with_timestamp(saved: &ExecutionResult) -> ExecutionResult {
    ExecutionResult {
        timestamp: saved.timestamp,
        ..result()
    }
}
