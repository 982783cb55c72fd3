// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};

use crate::config::settings::BrowserSettings;
use crate::domain::models::identity::Identity;
use crate::engines::traits::{
    BrowserDriver, BrowserPage, DriverError, ElementHandle, NavigationResponse, PageOptions,
    Viewport,
};

fn cdp_error(e: CdpError) -> DriverError {
    if matches!(e, CdpError::Timeout) {
        return DriverError::Timeout;
    }
    let message = e.to_string();
    if message.contains("net::ERR_") {
        DriverError::Network(message)
    } else {
        DriverError::Other(message)
    }
}

/// Chromium 浏览器驱动
///
/// 通过 CDP 控制一个共享的 Chromium 实例，首次打开页面时才启动（或连接远程实例）。
/// 指定代理的页面运行在独立的浏览器上下文中，页面关闭时上下文一并销毁。
pub struct ChromiumDriver {
    settings: BrowserSettings,
    browser: OnceCell<Arc<Browser>>,
    pages: Arc<Semaphore>,
}

impl ChromiumDriver {
    /// `pool_size` 为同时打开的页面上限
    pub fn new(settings: BrowserSettings, pool_size: usize) -> Self {
        Self {
            settings,
            browser: OnceCell::new(),
            pages: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    async fn browser(&self) -> Result<Arc<Browser>, DriverError> {
        self.browser
            .get_or_try_init(|| async {
                let (browser, mut handler) = if let Some(url) = &self.settings.remote_debugging_url
                {
                    tracing::info!("Connecting to remote Chrome instance at: {}", url);
                    Browser::connect(url).await.map_err(|e| {
                        DriverError::Other(format!("Failed to connect to remote Chrome: {}", e))
                    })?
                } else {
                    let mut builder = BrowserConfig::builder()
                        .request_timeout(Duration::from_secs(30))
                        .window_size(self.settings.viewport.width, self.settings.viewport.height)
                        .args(self.settings.launch_args.clone());
                    if !self.settings.headless {
                        builder = builder.with_head();
                    }

                    tracing::info!("Launching Chromium (headless: {})", self.settings.headless);
                    Browser::launch(builder.build().map_err(DriverError::Other)?)
                        .await
                        .map_err(cdp_error)?
                };

                tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });

                Ok(Arc::new(browser))
            })
            .await
            .cloned()
    }

    async fn prepare_page(page: &Page, options: &PageOptions) -> Result<(), DriverError> {
        for script in &options.stealth_scripts {
            page.evaluate_on_new_document(script.as_str())
                .await
                .map_err(cdp_error)?;
        }

        page.execute(SetDeviceMetricsOverrideParams::new(
            options.viewport.width as i64,
            options.viewport.height as i64,
            1.0,
            false,
        ))
        .await
        .map_err(cdp_error)?;

        page.execute(SetTimezoneOverrideParams::new(options.timezone_id.clone()))
            .await
            .map_err(cdp_error)?;

        let mut locale = SetLocaleOverrideParams::default();
        locale.locale = Some(options.locale.clone());
        page.execute(locale).await.map_err(cdp_error)?;

        set_identity(page, &options.identity).await
    }
}

async fn set_identity(page: &Page, identity: &Identity) -> Result<(), DriverError> {
    page.set_user_agent(identity.user_agent.as_str())
        .await
        .map_err(cdp_error)?;

    let headers = serde_json::to_value(identity.extra_headers())
        .map_err(|e| DriverError::Other(e.to_string()))?;
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
        .await
        .map_err(cdp_error)?;
    Ok(())
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open_page(&self, options: &PageOptions) -> Result<Box<dyn BrowserPage>, DriverError> {
        let permit = self
            .pages
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        let browser = self.browser().await?;

        let mut target = CreateTargetParams::new("about:blank");
        let context_id = match &options.proxy {
            Some(proxy) => {
                let params = CreateBrowserContextParams::builder()
                    .proxy_server(proxy.clone())
                    .dispose_on_detach(true)
                    .build();
                let context = browser.execute(params).await.map_err(cdp_error)?;
                let id = context.result.browser_context_id.clone();
                target.browser_context_id = Some(id.clone());
                Some(id)
            }
            None => None,
        };

        let page = match browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                if let Some(id) = context_id {
                    if let Err(dispose) =
                        browser.execute(DisposeBrowserContextParams::new(id)).await
                    {
                        tracing::warn!("Failed to dispose browser context: {}", dispose);
                    }
                }
                return Err(cdp_error(e));
            }
        };

        let mut chromium_page = ChromiumPage {
            page,
            browser,
            context_id,
            viewport: options.viewport,
            mouse: Mutex::new((0.0, 0.0)),
            permit: Some(permit),
        };

        if let Err(e) = Self::prepare_page(&chromium_page.page, options).await {
            if let Err(close) = chromium_page.close().await {
                tracing::warn!("Failed to close page after setup error: {}", close);
            }
            return Err(e);
        }

        Ok(Box::new(chromium_page))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// Chromium 页面
pub struct ChromiumPage {
    page: Page,
    browser: Arc<Browser>,
    context_id: Option<BrowserContextId>,
    viewport: Viewport,
    mouse: Mutex<(f64, f64)>,
    permit: Option<OwnedSemaphorePermit>,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, DriverError> {
        let page = &self.page;
        tokio::time::timeout(timeout, async {
            page.goto(url).await.map_err(cdp_error)?;

            // 取不到主文档响应时按 200 处理
            let status_code = page
                .wait_for_navigation_response()
                .await
                .map_err(cdp_error)?
                .and_then(|request| request.response.as_ref().map(|r| r.status))
                .and_then(|status| u16::try_from(status).ok())
                .unwrap_or(200);

            let content = page.content().await.map_err(cdp_error)?;
            let final_url = page
                .url()
                .await
                .map_err(cdp_error)?
                .unwrap_or_else(|| url.to_string());

            Ok(NavigationResponse {
                status_code,
                content,
                final_url,
            })
        })
        .await?
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        let expression = if args.is_empty() {
            script.to_string()
        } else {
            let args =
                serde_json::to_string(&args).map_err(|e| DriverError::Other(e.to_string()))?;
            format!("({})(...{})", script, args)
        };

        let result = self.page.evaluate(expression).await.map_err(cdp_error)?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(cdp_error)
    }

    async fn mouse_move(&self, x: f64, y: f64, steps: u32) -> Result<(), DriverError> {
        let (from_x, from_y) = *self.mouse.lock();
        let steps = steps.max(1);

        for step in 1..=steps {
            let t = step as f64 / steps as f64;
            let point = Point {
                x: from_x + (x - from_x) * t,
                y: from_y + (y - from_y) * t,
            };
            self.page.move_mouse(point).await.map_err(cdp_error)?;
        }

        *self.mouse.lock() = (x, y);
        Ok(())
    }

    async fn scroll(&self, delta_y: i64, duration: Duration) -> Result<(), DriverError> {
        self.page
            .evaluate(format!(
                "window.scrollBy({{ top: {}, behavior: 'smooth' }})",
                delta_y
            ))
            .await
            .map_err(cdp_error)?;
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            // 没有匹配元素时 CDP 返回 NotFound
            Err(CdpError::NotFound) => return Ok(Vec::new()),
            Err(e) => return Err(DriverError::Element(e.to_string())),
        };

        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn ElementHandle>)
            .collect())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn apply_identity(&mut self, identity: &Identity) -> Result<(), DriverError> {
        set_identity(&self.page, identity).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let Some(permit) = self.permit.take() else {
            return Ok(());
        };

        let result = self.page.clone().close().await.map_err(cdp_error);
        if let Some(id) = self.context_id.take() {
            if let Err(e) = self
                .browser
                .execute(DisposeBrowserContextParams::new(id))
                .await
            {
                tracing::warn!("Failed to dispose browser context: {}", e);
            }
        }
        drop(permit);
        result
    }
}

struct ChromiumElement {
    element: Element,
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn text_content(&self) -> Result<Option<String>, DriverError> {
        self.element
            .inner_text()
            .await
            .map_err(|e| DriverError::Element(e.to_string()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.element
            .attribute(name)
            .await
            .map_err(|e| DriverError::Element(e.to_string()))
    }
}
