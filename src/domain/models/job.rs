// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use validator::{Validate, ValidationError};

static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// 字段的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// 去除首尾空白的文本
    #[default]
    Text,
    /// 链接（href 或 src）
    Url,
    /// 图片（href 或 src）
    Image,
    /// 数字
    Number,
}

/// 目标字段描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TargetField {
    /// 字段标签
    #[validate(length(min = 1, message = "label must not be empty"))]
    pub label: String,
    /// CSS 选择器
    #[validate(length(min = 1, message = "selector must not be empty"))]
    pub selector: String,
    /// 数据类型
    #[serde(default, alias = "dataType")]
    pub data_type: DataType,
}

impl TargetField {
    pub fn new(label: impl Into<String>, selector: impl Into<String>, data_type: DataType) -> Self {
        Self {
            label: label.into(),
            selector: selector.into(),
            data_type,
        }
    }

    /// 结果中使用的字段名：空白替换为下划线并转为小写
    pub fn field_name(&self) -> String {
        self.label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
    }
}

/// 任务提交请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobRequest {
    /// 目标 URL
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    /// 需要提取的字段
    #[serde(default)]
    #[validate(nested)]
    pub targets: Vec<TargetField>,
    /// 成功后是否附带截图
    #[serde(default)]
    pub capture_screenshot: bool,
    /// 调用方附带的产物（例如生成的抓取脚本），原样缓存
    #[serde(default)]
    pub artifact: Option<String>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, targets: Vec<TargetField>) -> Self {
        Self {
            url: url.into(),
            targets,
            capture_screenshot: false,
            artifact: None,
        }
    }
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")
            .with_message("url must be an absolute http(s) URL".into())),
    }
}

/// 任务状态枚举
///
/// 状态只能单向推进：
/// Pending → Navigating → Extracting → Completed，
/// Navigating/Extracting → Failed。
/// 在进入导航前被拒绝的任务（限流、robots.txt）也可以从 Pending 直接失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Navigating,
    Extracting,
    Completed,
    Failed,
}

impl JobStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 是否正在运行
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Navigating | JobStatus::Extracting)
    }

    fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Navigating)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Navigating, JobStatus::Extracting)
                | (JobStatus::Navigating, JobStatus::Failed)
                | (JobStatus::Extracting, JobStatus::Completed)
                | (JobStatus::Extracting, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Navigating => write!(f, "navigating"),
            JobStatus::Extracting => write!(f, "extracting"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// 任务不存在
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 抓取任务
///
/// 一次端到端的抓取请求（导航 + 提取），由执行注册表跟踪其生命周期。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    /// 任务ID，由 URL 摘要与创建时间派生
    pub id: String,
    /// 目标URL
    pub url: String,
    /// 有序的目标字段
    pub target_fields: Vec<TargetField>,
    /// 当前状态
    pub status: JobStatus,
    /// 已进行的导航尝试次数
    pub attempt_count: u32,
    /// 是否截图
    pub capture_screenshot: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl ScrapeJob {
    /// 根据提交请求创建新任务
    pub fn new(request: &JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Self::generate_id(&request.url, now),
            url: request.url.clone(),
            target_fields: request.targets.clone(),
            status: JobStatus::Pending,
            attempt_count: 0,
            capture_screenshot: request.capture_screenshot,
            created_at: now,
            updated_at: now,
        }
    }

    /// 生成任务ID：URL 的 SHA-256 前 8 位 + 毫秒时间戳 + 进程内序号
    pub fn generate_id(url: &str, created_at: DateTime<Utc>) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let hash = hex::encode(&digest[..4]);
        let seq = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", hash, created_at.timestamp_millis(), seq)
    }

    /// 推进任务状态
    ///
    /// # 参数
    ///
    /// * `next` - 目标状态
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 转换成功
    /// * `Err(DomainError)` - 转换违反单向生命周期
    pub fn transition(&mut self, next: JobStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start_navigation(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Navigating)
    }

    pub fn start_extraction(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Extracting)
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Completed)
    }

    pub fn fail(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Failed)
    }
}
