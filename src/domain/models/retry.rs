// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 状态码对应的处理动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
    /// 指数退避后重试
    #[serde(alias = "exponential_backoff")]
    Backoff,
    /// 更换身份（User-Agent 与请求头）后重试
    #[serde(alias = "rotate_headers")]
    RotateIdentity,
    /// 更换身份与代理后重试
    #[serde(alias = "rotate_proxy_and_headers")]
    RotateIdentityAndProxy,
    /// 等待固定时间后直接重试
    Retry,
    /// 不处理
    #[default]
    None,
}

impl fmt::Display for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RetryAction::Backoff => write!(f, "backoff"),
            RetryAction::RotateIdentity => write!(f, "rotate_identity"),
            RetryAction::RotateIdentityAndProxy => write!(f, "rotate_identity_and_proxy"),
            RetryAction::Retry => write!(f, "retry"),
            RetryAction::None => write!(f, "none"),
        }
    }
}

/// 重试策略表中的一项
///
/// 由配置构建，运行期间不可变。`initial_delay` 和 `multiplier` 只对
/// [`RetryAction::Backoff`] 有意义，其余动作使用固定的 `wait_time`。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicyEntry {
    /// HTTP 状态码
    pub status_code: u16,
    /// 处理动作
    pub action: RetryAction,
    /// 退避初始等待
    pub initial_delay: Duration,
    /// 退避上限
    pub max_delay: Duration,
    /// 退避乘数
    pub multiplier: f64,
    /// 非退避动作的固定等待
    pub wait_time: Duration,
}

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryDecision {
    /// 是否应该重试
    pub should_retry: bool,
    /// 下次尝试前需要等待的时间
    pub wait_time: Duration,
    /// 建议的动作
    pub action: RetryAction,
}

impl RetryDecision {
    /// 不重试的决策
    pub fn give_up() -> Self {
        Self {
            should_retry: false,
            wait_time: Duration::ZERO,
            action: RetryAction::None,
        }
    }
}
