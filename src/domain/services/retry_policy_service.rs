// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::settings::Settings;
use crate::domain::models::retry::{RetryAction, RetryDecision, RetryPolicyEntry};
use crate::utils::retry_policy::exponential_delay;

const DEFAULT_MULTIPLIER: f64 = 2.0;

/// 按 HTTP 状态码决定重试方式
///
/// 纯决策：只计算是否重试、等待多久以及采用的动作，不执行等待。
#[derive(Debug, Clone)]
pub struct StatusRetryPolicy {
    entries: HashMap<u16, RetryPolicyEntry>,
    max_retries: u32,
}

impl StatusRetryPolicy {
    pub fn new(entries: impl IntoIterator<Item = RetryPolicyEntry>, max_retries: u32) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.status_code, e)).collect(),
            max_retries,
        }
    }

    /// 从配置构建策略表，无法解析的状态码会被忽略
    pub fn from_settings(settings: &Settings) -> Self {
        let backoff = &settings.timing.retry_backoff;
        let mut entries = Vec::new();

        for (key, handler) in &settings.error_handling.status_handlers {
            let Ok(status_code) = key.trim().parse::<u16>() else {
                warn!("Ignoring status handler with invalid status code: {}", key);
                continue;
            };

            entries.push(RetryPolicyEntry {
                status_code,
                action: handler.action,
                initial_delay: Duration::from_millis(
                    handler
                        .initial_delay_ms
                        .or(handler.wait_time_ms)
                        .unwrap_or(backoff.initial_ms),
                ),
                max_delay: Duration::from_millis(
                    handler.max_delay_ms.unwrap_or(backoff.max_delay_ms),
                ),
                multiplier: handler.multiplier.unwrap_or(DEFAULT_MULTIPLIER),
                wait_time: Duration::from_millis(handler.wait_time_ms.unwrap_or(0)),
            });
        }

        Self::new(entries, settings.error_handling.max_retries)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn entry(&self, status_code: u16) -> Option<&RetryPolicyEntry> {
        self.entries.get(&status_code)
    }

    /// 第 `attempt` 次尝试（从 0 开始）得到 `status_code` 后的决策
    pub fn decide(&self, status_code: u16, attempt: u32) -> RetryDecision {
        let Some(entry) = self.entries.get(&status_code) else {
            return RetryDecision::give_up();
        };

        let wait_time = match entry.action {
            RetryAction::None => return RetryDecision::give_up(),
            RetryAction::Backoff => exponential_delay(
                entry.initial_delay,
                entry.multiplier,
                attempt,
                entry.max_delay,
            ),
            RetryAction::RotateIdentity
            | RetryAction::RotateIdentityAndProxy
            | RetryAction::Retry => entry.wait_time,
        };

        let should_retry = attempt < self.max_retries;
        if should_retry {
            info!(
                "Status {}: {}, waiting {}ms",
                status_code,
                entry.action,
                wait_time.as_millis()
            );
        }

        RetryDecision {
            should_retry,
            wait_time,
            action: entry.action,
        }
    }
}
