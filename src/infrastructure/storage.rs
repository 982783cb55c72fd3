// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::settings::OutputFormat;
use crate::domain::models::execution_result::ExecutionResult;
use crate::utils::errors::StorageError;

/// 本地结果存储
///
/// 每个任务一个文件：`{base_path}/result_{job_id}.{json|csv}`
pub struct ResultStorage {
    base_path: PathBuf,
}

impl ResultStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn path_for(&self, job_id: &str, format: OutputFormat) -> PathBuf {
        self.base_path
            .join(format!("result_{}.{}", job_id, format.extension()))
    }

    /// 写入结果，返回文件路径
    pub async fn save(
        &self,
        result: &ExecutionResult,
        format: OutputFormat,
    ) -> Result<PathBuf, StorageError> {
        let path = self.path_for(&result.job_id, format);

        let data = match format {
            OutputFormat::Json => serde_json::to_vec_pretty(result)?,
            OutputFormat::Csv => to_csv(&result.extracted_fields).into_bytes(),
        };

        write_file(&path, &data).await?;
        tracing::info!("Result saved to {}", path.display());
        Ok(path)
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    // 确保目录存在
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

/// 字段名为表头，按下标展开成行，所有单元格加引号
pub fn to_csv(fields: &BTreeMap<String, Vec<Value>>) -> String {
    if fields.is_empty() {
        return String::new();
    }

    let header = fields.keys().cloned().collect::<Vec<_>>().join(",");
    let rows = fields.values().map(Vec::len).max().unwrap_or(0);

    let mut lines = Vec::with_capacity(rows + 1);
    lines.push(header);
    for i in 0..rows {
        let row = fields
            .values()
            .map(|values| {
                let cell = match values.get(i) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                format!("\"{}\"", cell.replace('"', "\"\""))
            })
            .collect::<Vec<_>>()
            .join(",");
        lines.push(row);
    }

    lines.join("\n")
}
