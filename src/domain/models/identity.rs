// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 请求身份
///
/// 单次尝试使用的 User-Agent 与请求头组合。每次尝试重新生成，不持久化。
/// `headers` 中已经包含 `User-Agent`，如有 referer 也包含 `Referer`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User-Agent
    pub user_agent: String,
    /// 完整请求头
    pub headers: HashMap<String, String>,
    /// 来源页
    pub referer: Option<String>,
}

impl Identity {
    /// 除 User-Agent 外的请求头，供浏览器设置额外请求头时使用
    pub fn extra_headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("user-agent"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
