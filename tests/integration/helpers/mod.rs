// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crawlguard::config::settings::{DelayRange, DriverKind, Settings, StatusHandlerSettings};
use crawlguard::domain::models::identity::Identity;
use crawlguard::domain::models::retry::RetryAction;
use crawlguard::engines::traits::{
    BrowserPage, DriverError, ElementHandle, NavigationResponse, Viewport,
};

/// 不等待、不扩容、不检查 robots.txt 的测试配置，状态码处理的等待缩短到毫秒级
#[allow(dead_code)]
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();

    settings.browser.driver = DriverKind::Http;
    settings.browser.human_behavior.enabled = false;

    settings.timing.min_delay_ms = 0;
    settings.timing.max_delay_ms = 0;
    settings.timing.page_load_delay = DelayRange { min_ms: 0, max_ms: 0 };
    settings.timing.retry_backoff.initial_ms = 5;
    settings.timing.retry_backoff.max_delay_ms = 20;

    settings.error_handling.timeout_ms = 5_000;
    settings.error_handling.status_handlers = HashMap::from([
        (
            "429".to_string(),
            StatusHandlerSettings {
                action: RetryAction::Backoff,
                initial_delay_ms: Some(10),
                max_delay_ms: Some(50),
                ..Default::default()
            },
        ),
        (
            "500".to_string(),
            StatusHandlerSettings {
                action: RetryAction::Retry,
                wait_time_ms: Some(5),
                ..Default::default()
            },
        ),
        (
            "401".to_string(),
            StatusHandlerSettings {
                action: RetryAction::RotateIdentity,
                wait_time_ms: Some(5),
                ..Default::default()
            },
        ),
    ]);

    settings.concurrency.ramp_up.enabled = false;
    settings.misc.respect_robots_txt = false;
    settings
}

/// 模拟元素
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
}

#[allow(dead_code)]
impl MockElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl ElementHandle for MockElement {
    async fn text_content(&self) -> Result<Option<String>, DriverError> {
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.attributes.get(name).cloned())
    }
}

/// 模拟页面
///
/// 选择器对应固定的元素列表，`failing_selectors` 中的选择器查询时报错；
/// `fail_interactions` 为真时鼠标与滚动操作全部失败。
#[derive(Default)]
pub struct MockPage {
    pub elements: HashMap<String, Vec<MockElement>>,
    pub failing_selectors: Vec<String>,
    pub fail_interactions: bool,
    pub mouse_moves: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub last_scroll: parking_lot::Mutex<Option<(i64, Duration)>>,
}

#[allow(dead_code)]
impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elements(mut self, selector: &str, elements: Vec<MockElement>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }

    pub fn with_failing_selector(mut self, selector: &str) -> Self {
        self.failing_selectors.push(selector.to_string());
        self
    }

    pub fn failing_interactions(mut self) -> Self {
        self.fail_interactions = true;
        self
    }

    pub fn mouse_move_count(&self) -> usize {
        self.mouse_moves.load(Ordering::SeqCst)
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn navigate(
        &mut self,
        url: &str,
        _timeout: Duration,
    ) -> Result<NavigationResponse, DriverError> {
        Ok(NavigationResponse {
            status_code: 200,
            content: String::new(),
            final_url: url.to_string(),
        })
    }

    async fn evaluate(&self, _script: &str, _args: Vec<Value>) -> Result<Value, DriverError> {
        Ok(Value::Null)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn mouse_move(&self, _x: f64, _y: f64, _steps: u32) -> Result<(), DriverError> {
        self.mouse_moves.fetch_add(1, Ordering::SeqCst);
        if self.fail_interactions {
            return Err(DriverError::Other("mouse detached".to_string()));
        }
        Ok(())
    }

    async fn scroll(&self, delta_y: i64, duration: Duration) -> Result<(), DriverError> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        *self.last_scroll.lock() = Some((delta_y, duration));
        if self.fail_interactions {
            return Err(DriverError::Other("page detached".to_string()));
        }
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        if self.failing_selectors.iter().any(|s| s == selector) {
            return Err(DriverError::Element(format!("query failed: {}", selector)));
        }
        Ok(self
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn ElementHandle>)
            .collect())
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: 1280,
            height: 720,
        }
    }

    async fn apply_identity(&mut self, _identity: &Identity) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// 商品列表页
#[allow(dead_code)]
pub fn product_page() -> String {
    r#"<html><body>
        <h1 class="title">  週末セール  </h1>
        <ul>
            <li class="product"><a class="link" href="/items/1">Tea</a><span class="price">¥1,280</span></li>
            <li class="product"><a class="link" href="/items/2">Coffee</a><span class="price">¥980</span></li>
        </ul>
        <img class="hero" src="/img/hero.png">
    </body></html>"#
        .to_string()
}
