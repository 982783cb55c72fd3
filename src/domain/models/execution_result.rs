// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 执行结果
///
/// 写入后不可变，由执行注册表按任务ID持有。失败的任务同样有一条结果，
/// `error` 中记录终止原因，查询方不会因为任务失败而拿到空值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// 任务ID
    pub job_id: String,
    /// 目标URL
    pub url: String,
    /// 最后一次响应的状态码
    pub status_code: Option<u16>,
    /// 字段名到提取值序列的映射
    pub extracted_fields: BTreeMap<String, Vec<Value>>,
    /// 终止错误
    pub error: Option<String>,
    /// 导航尝试次数
    pub attempts: u32,
    /// 截图（base64）
    pub screenshot: Option<String>,
    /// 完成时间
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// 成功结果
    pub fn success(
        job_id: impl Into<String>,
        url: impl Into<String>,
        status_code: u16,
        extracted_fields: BTreeMap<String, Vec<Value>>,
        attempts: u32,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            url: url.into(),
            status_code: Some(status_code),
            extracted_fields,
            error: None,
            attempts,
            screenshot: None,
            timestamp: Utc::now(),
        }
    }

    /// 失败结果
    pub fn failure(
        job_id: impl Into<String>,
        url: impl Into<String>,
        status_code: Option<u16>,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            url: url.into(),
            status_code,
            extracted_fields: BTreeMap::new(),
            error: Some(error.into()),
            attempts,
            screenshot: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_screenshot(mut self, screenshot: Option<String>) -> Self {
        self.screenshot = screenshot;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
