// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use crate::config::settings::{BackoffSettings, Settings};

/// 重试策略配置
///
/// 传输层失败（超时、DNS、连接重置）使用的指数退避
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_backoff(&BackoffSettings::default(), 3)
    }
}

impl RetryPolicy {
    /// 从配置创建
    pub fn from_settings(settings: &Settings) -> Self {
        Self::from_backoff(
            &settings.timing.retry_backoff,
            settings.error_handling.max_retries,
        )
    }

    pub fn from_backoff(backoff: &BackoffSettings, max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(backoff.initial_ms),
            max_backoff: Duration::from_millis(backoff.max_delay_ms),
            backoff_multiplier: backoff.multiplier,
        }
    }

    /// 计算第 `attempt` 次尝试失败后的退避时间（`attempt` 从 0 开始）
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        exponential_delay(
            self.initial_backoff,
            self.backoff_multiplier,
            attempt,
            self.max_backoff,
        )
    }

    /// 是否应该重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// `min(initial * multiplier^attempt, max)`
pub fn exponential_delay(
    initial: Duration,
    multiplier: f64,
    attempt: u32,
    max: Duration,
) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw_ms = initial.as_millis() as f64 * multiplier.powi(exponent);
    let capped_ms = raw_ms.min(max.as_millis() as f64);

    if capped_ms.is_nan() || capped_ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis(capped_ms.round() as u64)
}
