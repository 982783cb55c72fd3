// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::config::settings::RateLimitSettings;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// 滑动窗口限流器
///
/// 每个标识（代理地址或 `local`）保存最近一小时内的请求时间戳。
/// 同一标识的检查与记录在 DashMap 的分片锁内完成，并发调用不会超发。
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    limits: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(limits: RateLimitSettings) -> Self {
        Self {
            windows: DashMap::new(),
            limits,
        }
    }

    /// 检查并记录一次请求
    ///
    /// 最近 60 秒内的请求数达到 `requests_per_minute`，或最近一小时内达到
    /// `requests_per_hour` 时拒绝，且不记录本次请求。
    pub fn check_and_record(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut window = self.windows.entry(identifier.to_string()).or_default();

        while window
            .front()
            .is_some_and(|ts| now.saturating_duration_since(*ts) >= HOUR)
        {
            window.pop_front();
        }

        let hourly = window.len();
        let last_minute = window
            .iter()
            .rev()
            .take_while(|ts| now.saturating_duration_since(**ts) < MINUTE)
            .count();

        if last_minute >= self.limits.requests_per_minute as usize {
            warn!(
                "Rate limit exceeded for {}: {} requests in the last minute",
                identifier, last_minute
            );
            metrics::counter!("crawlguard_rate_limit_rejected_total", "window" => "minute")
                .increment(1);
            return false;
        }

        if hourly >= self.limits.requests_per_hour as usize {
            warn!(
                "Rate limit exceeded for {}: {} requests in the last hour",
                identifier, hourly
            );
            metrics::counter!("crawlguard_rate_limit_rejected_total", "window" => "hour")
                .increment(1);
            return false;
        }

        window.push_back(now);
        true
    }

    /// 当前窗口内记录的请求数（不做清理）
    pub fn recorded(&self, identifier: &str) -> usize {
        self.windows
            .get(identifier)
            .map(|window| window.len())
            .unwrap_or(0)
    }
}
