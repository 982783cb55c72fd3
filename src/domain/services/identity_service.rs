// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use rand::seq::IndexedRandom;
use std::collections::HashMap;

use crate::config::settings::HeaderSettings;
use crate::domain::models::identity::Identity;

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 身份生成器
///
/// 从 User-Agent 池中随机挑选一个，与默认请求头合并
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    user_agents: Vec<String>,
    default_headers: HashMap<String, String>,
}

impl IdentityGenerator {
    pub fn new(settings: &HeaderSettings) -> Self {
        Self {
            user_agents: settings.user_agents.clone(),
            default_headers: settings.default.clone(),
        }
    }

    pub fn generate(&self, referer: Option<&str>) -> Identity {
        let user_agent = self
            .user_agents
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string());

        let mut headers = self.default_headers.clone();
        headers.insert("User-Agent".to_string(), user_agent.clone());
        if let Some(referer) = referer {
            headers.insert("Referer".to_string(), referer.to_string());
        }

        Identity {
            user_agent,
            headers,
            referer: referer.map(str::to_string),
        }
    }
}
