// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::settings::ProxySettings;
use crate::domain::models::proxy::{ProxyRecord, ProxyStats};

struct RotatorState {
    records: Vec<ProxyRecord>,
    cursor: usize,
}

/// 代理轮换服务
///
/// 维护每个代理的失败计数与冷却时间。冷却采用惰性判断：
/// 每次选择时检查 `cooldown_until`，到期的代理清零后重新参与轮换，
/// 不需要后台定时任务。
pub struct ProxyRotator {
    enabled: bool,
    rotation: bool,
    max_failures: u32,
    cooldown: Duration,
    state: Mutex<RotatorState>,
}

impl ProxyRotator {
    pub fn new(settings: &ProxySettings) -> Self {
        let records = settings.list.iter().map(ProxyRecord::new).collect();
        Self {
            enabled: settings.enabled,
            rotation: settings.rotation,
            max_failures: settings.max_failures.max(1),
            cooldown: settings.cooldown_period(),
            state: Mutex::new(RotatorState { records, cursor: 0 }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.state.lock().records.is_empty()
    }

    /// 选择下一个代理
    ///
    /// 未启用代理或列表为空时返回 `None`。所有代理都被禁用时清空全部失败计数，
    /// 返回第一个代理，保证调用方总能继续。
    pub fn next(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let mut state = self.state.lock();
        if state.records.is_empty() {
            return None;
        }

        for record in state.records.iter_mut() {
            if record.failure_count >= self.max_failures && record.cooldown_expired(now) {
                info!("Proxy re-enabled after cooldown: {}", record.address);
                record.reset();
            }
        }

        let eligible: Vec<usize> = state
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.failure_count < self.max_failures)
            .map(|(i, _)| i)
            .collect();

        if eligible.is_empty() {
            warn!("All proxies are disabled, resetting failure counters");
            for record in state.records.iter_mut() {
                record.reset();
            }
            state.cursor = 0;
            return Some(state.records[0].address.clone());
        }

        let index = if self.rotation {
            state.cursor = (state.cursor + 1) % eligible.len();
            eligible[state.cursor]
        } else {
            eligible[0]
        };

        Some(state.records[index].address.clone())
    }

    /// 记录一次代理失败，达到阈值后进入冷却
    pub fn record_failure(&self, proxy: &str) {
        let now = Instant::now();
        let mut state = self.state.lock();

        let Some(record) = state.records.iter_mut().find(|r| r.address == proxy) else {
            debug!("Ignoring failure for unknown proxy: {}", proxy);
            return;
        };

        record.failure_count = record.failure_count.saturating_add(1);
        metrics::counter!("crawlguard_proxy_failures_total").increment(1);

        if record.failure_count >= self.max_failures && record.cooldown_until.is_none() {
            record.cooldown_until = Some(now + self.cooldown);
            warn!(
                "Proxy disabled after {} failures: {} (cooldown {:?})",
                record.failure_count, proxy, self.cooldown
            );
        }
    }

    /// 代理池统计
    pub fn stats(&self) -> ProxyStats {
        let now = Instant::now();
        let state = self.state.lock();

        ProxyStats {
            total_proxies: state.records.len(),
            active_proxies: state
                .records
                .iter()
                .filter(|r| r.is_eligible(self.max_failures, now))
                .count(),
            proxy_failures: state
                .records
                .iter()
                .filter(|r| r.failure_count > 0)
                .map(|r| (r.address.clone(), r.failure_count))
                .collect(),
        }
    }
}
