// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::models::identity::Identity;
use crate::engines::traits::{
    BrowserDriver, BrowserPage, DriverError, ElementHandle, NavigationResponse, PageOptions,
    Viewport,
};

/// HTTP 驱动
///
/// 基于reqwest实现，不执行 JavaScript。适合静态页面，
/// 鼠标与滚动操作直接忽略，脚本执行和截图不受支持。
#[derive(Debug, Default, Clone)]
pub struct HttpDriver;

impl HttpDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn open_page(&self, options: &PageOptions) -> Result<Box<dyn BrowserPage>, DriverError> {
        // 每个页面独立的 client，cookie 互不影响
        let mut builder = reqwest::Client::builder().cookie_store(true);

        if let Some(proxy_url) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DriverError::Other(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Box::new(HttpPage {
            client,
            headers: header_map(&options.identity),
            viewport: options.viewport,
            document: None,
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn header_map(identity: &Identity) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in &identity.headers {
        // 压缩格式交给 reqwest 协商，它只解码自己声明过的编码
        if k.eq_ignore_ascii_case("accept-encoding") {
            continue;
        }
        if let (Ok(k), Ok(v)) = (
            HeaderName::from_bytes(k.as_bytes()),
            HeaderValue::from_str(v),
        ) {
            headers.insert(k, v);
        }
    }
    headers
}

/// HTTP 页面，保存最近一次导航得到的文档
pub struct HttpPage {
    client: reqwest::Client,
    headers: HeaderMap,
    viewport: Viewport,
    document: Option<String>,
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, DriverError> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content = response.text().await?;
        self.document = Some(content.clone());

        Ok(NavigationResponse {
            status_code,
            content,
            final_url,
        })
    }

    async fn evaluate(&self, _script: &str, _args: Vec<Value>) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported("evaluate"))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::Unsupported("screenshot"))
    }

    async fn mouse_move(&self, _x: f64, _y: f64, _steps: u32) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll(&self, _delta_y: i64, _duration: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        let Some(document) = &self.document else {
            return Ok(Vec::new());
        };
        Ok(select_snapshots(document, selector)?
            .into_iter()
            .map(|snapshot| Box::new(snapshot) as Box<dyn ElementHandle>)
            .collect())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn apply_identity(&mut self, identity: &Identity) -> Result<(), DriverError> {
        self.headers = header_map(identity);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.document = None;
        Ok(())
    }
}

/// `scraper::Html` 不能跨 await 持有，查询时直接拷贝出元素的文本和属性
fn select_snapshots(document: &str, selector: &str) -> Result<Vec<ElementSnapshot>, DriverError> {
    let selector = Selector::parse(selector)
        .map_err(|e| DriverError::Element(format!("Invalid selector '{}': {}", selector, e)))?;
    let html = Html::parse_document(document);

    Ok(html
        .select(&selector)
        .map(|element| ElementSnapshot {
            text: element.text().collect::<Vec<_>>().join(""),
            attributes: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
        .collect())
}

struct ElementSnapshot {
    text: String,
    attributes: HashMap<String, String>,
}

#[async_trait]
impl ElementHandle for ElementSnapshot {
    async fn text_content(&self) -> Result<Option<String>, DriverError> {
        Ok(Some(self.text.clone()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.attributes.get(name).cloned())
    }
}
