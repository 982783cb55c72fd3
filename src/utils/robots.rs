// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::utils::retry_policy::RetryPolicy;

const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Robots.txt检查器接口
#[async_trait]
pub trait RobotsCheckerTrait: Send + Sync {
    /// 检查URL是否被允许访问
    async fn is_allowed(&self, url_str: &str, user_agent: &str) -> Result<bool>;
    /// 获取爬取延迟
    async fn get_crawl_delay(&self, url_str: &str, user_agent: &str) -> Result<Option<Duration>>;
}

/// 缓存的Robots.txt内容
#[derive(Clone)]
struct CachedRobots {
    content: String,
    expires_at: Instant,
}

/// Robots.txt检查器
///
/// 按站点缓存 robots.txt 一小时。抓取失败、404 和其他非 5xx 错误都视为允许全部。
#[derive(Clone)]
pub struct RobotsChecker {
    client: Client,
    memory_cache: Arc<Mutex<HashMap<String, CachedRobots>>>,
    retry_policy: RetryPolicy,
}

#[async_trait]
impl RobotsCheckerTrait for RobotsChecker {
    async fn is_allowed(&self, url_str: &str, user_agent: &str) -> Result<bool> {
        let content = self.get_robots_content(url_str).await?;
        let url = Url::parse(url_str)?;
        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&content, user_agent, url.as_str()))
    }

    async fn get_crawl_delay(&self, url_str: &str, user_agent: &str) -> Result<Option<Duration>> {
        let content = self.get_robots_content(url_str).await?;
        Ok(parse_crawl_delay(&content, user_agent))
    }
}

impl Default for RobotsChecker {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl RobotsChecker {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            memory_cache: Arc::new(Mutex::new(HashMap::new())),
            retry_policy: RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(500),
                max_backoff: Duration::from_secs(5),
                ..Default::default()
            },
        }
    }

    /// 获取Robots.txt内容（带缓存）
    async fn get_robots_content(&self, url_str: &str) -> Result<String> {
        let url = Url::parse(url_str)?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid URL: {}", url_str))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let robots_url = format!("{}://{}:{}/robots.txt", url.scheme(), host, port);

        {
            let mut cache = self.memory_cache.lock();
            if let Some(cached) = cache.get(&robots_url) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.content.clone());
                }
                cache.remove(&robots_url);
            }
        }

        let content = self.fetch_robots(&robots_url).await;

        self.memory_cache.lock().insert(
            robots_url,
            CachedRobots {
                content: content.clone(),
                expires_at: Instant::now() + CACHE_TTL,
            },
        );

        Ok(content)
    }

    async fn fetch_robots(&self, robots_url: &str) -> String {
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .get(robots_url)
                .timeout(Duration::from_secs(5))
                .send()
                .await;

            let last_error = match response {
                Ok(resp) if resp.status().is_success() => {
                    return resp.text().await.unwrap_or_default();
                }
                Ok(resp) if resp.status().is_server_error() => {
                    anyhow::anyhow!("Server error: {}", resp.status())
                }
                // 404 表示没有 robots.txt，其余 4xx 同样按允许处理
                Ok(_) => return String::new(),
                Err(e) => anyhow::anyhow!("Request failed: {}", e),
            };

            if !self.retry_policy.should_retry(attempt) {
                tracing::warn!(
                    "Failed to fetch robots.txt from {}: {}",
                    robots_url,
                    last_error
                );
                return String::new();
            }

            tokio::time::sleep(self.retry_policy.calculate_backoff(attempt)).await;
            attempt += 1;
        }
    }
}

/// 解析适用于 `user_agent` 的 Crawl-delay
///
/// 具体的 User-agent 分组优先于 `*`
fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<Duration> {
    let mut current_agent_matched = false;
    let mut specific_agent_found = false;
    let mut delay: Option<f64> = None;
    let user_agent = user_agent.to_lowercase();

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_lowercase().as_str() {
            "user-agent" => {
                if value == "*" {
                    current_agent_matched = !specific_agent_found;
                } else if !value.is_empty() && user_agent.contains(&value.to_lowercase()) {
                    if !specific_agent_found {
                        delay = None;
                    }
                    current_agent_matched = true;
                    specific_agent_found = true;
                } else {
                    current_agent_matched = false;
                }
            }
            "crawl-delay" if current_agent_matched => {
                if let Ok(d) = value.parse::<f64>() {
                    delay = Some(d);
                }
            }
            _ => {}
        }
    }

    delay
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64)
}
