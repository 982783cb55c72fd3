// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::job::DomainError;
use crate::engines::navigator::NavigationError;
use crate::engines::traits::DriverError;

/// 任务终止错误
///
/// 导致任务进入 `failed` 的错误。字段级提取失败不在其中，它们只会让对应字段为空。
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Rate limit exceeded for {0}. Please wait before retrying.")]
    RateLimitExceeded(String),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),

    #[error("Browser error: {0}")]
    Browser(#[from] DriverError),

    #[error("Job deadline exceeded")]
    Timeout,

    #[error("Job cancelled")]
    Cancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl JobError {
    /// 最后一次响应的状态码（如有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            JobError::Navigation(NavigationError::HttpStatus { code, .. }) => Some(*code),
            _ => None,
        }
    }

    /// 是否像是被目标站点识别并拦截
    pub fn looks_blocked(&self) -> bool {
        self.status_code() == Some(403) || self.to_string().to_lowercase().contains("blocked")
    }
}

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
