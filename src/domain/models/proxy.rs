// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use tokio::time::Instant;

/// 代理记录
///
/// 每个配置的代理对应一条，生命周期与进程相同。失败次数达到阈值后进入冷却，
/// 冷却结束（或代理池整体被重置）时失败次数归零。
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    /// 代理地址
    pub address: String,
    /// 连续失败次数
    pub failure_count: u32,
    /// 冷却结束时间
    pub cooldown_until: Option<Instant>,
}

impl ProxyRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            failure_count: 0,
            cooldown_until: None,
        }
    }

    /// 冷却是否已经结束
    pub fn cooldown_expired(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now >= until)
    }

    /// 是否可以被选中
    pub fn is_eligible(&self, max_failures: u32, now: Instant) -> bool {
        self.failure_count < max_failures || self.cooldown_expired(now)
    }

    /// 清空失败计数与冷却
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.cooldown_until = None;
    }
}

/// 代理池统计
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProxyStats {
    /// 配置的代理总数
    pub total_proxies: usize,
    /// 当前可用代理数
    pub active_proxies: usize,
    /// 有失败记录的代理及其失败次数
    pub proxy_failures: Vec<(String, u32)>,
}
