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
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::settings::{BrowserSettings, ViewportSettings};
use crate::domain::models::identity::Identity;

/// 浏览器驱动错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 连接失败、DNS 解析失败、连接被重置等
    #[error("Network error: {0}")]
    Network(String),
    /// 当前驱动不支持该操作
    #[error("Unsupported by driver: {0}")]
    Unsupported(&'static str),
    /// 元素查询或读取失败
    #[error("Element error: {0}")]
    Element(String),
    /// 其他错误
    #[error("Driver error: {0}")]
    Other(String),
}

impl DriverError {
    /// 是否为传输层错误，传输层错误按指数退避重试
    pub fn is_transport(&self) -> bool {
        matches!(self, DriverError::Timeout | DriverError::Network(_))
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DriverError::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() {
            DriverError::Network(e.to_string())
        } else {
            DriverError::Other(e.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for DriverError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DriverError::Timeout
    }
}

/// 视口大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl From<ViewportSettings> for Viewport {
    fn from(v: ViewportSettings) -> Self {
        Self {
            width: v.width,
            height: v.height,
        }
    }
}

/// 打开页面时的参数
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// 页面使用的身份
    pub identity: Identity,
    /// 出口代理
    pub proxy: Option<String>,
    /// 视口大小
    pub viewport: Viewport,
    /// 语言区域
    pub locale: String,
    /// 时区
    pub timezone_id: String,
    /// 在每个文档加载前执行的脚本
    pub stealth_scripts: Vec<String>,
}

impl PageOptions {
    pub fn new(settings: &BrowserSettings, identity: Identity, proxy: Option<String>) -> Self {
        Self {
            identity,
            proxy,
            viewport: settings.viewport.into(),
            locale: settings.locale.clone(),
            timezone_id: settings.timezone_id.clone(),
            stealth_scripts: settings.stealth_scripts.clone(),
        }
    }
}

/// 导航响应
#[derive(Debug, Clone)]
pub struct NavigationResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 页面内容
    pub content: String,
    /// 重定向后的最终地址
    pub final_url: String,
}

impl NavigationResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// 浏览器驱动特质
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 按给定身份与代理打开一个新页面
    async fn open_page(&self, options: &PageOptions) -> Result<Box<dyn BrowserPage>, DriverError>;

    /// 驱动名称
    fn name(&self) -> &'static str;
}

/// 已打开的页面
///
/// 调用方负责在所有退出路径上调用 [`BrowserPage::close`]；`close` 可以重复调用。
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// 导航到 `url`，返回主文档的状态码与内容
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, DriverError>;

    /// 在页面中执行脚本
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError>;

    /// 截图，返回 PNG 字节
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// 分 `steps` 步把鼠标移动到 `(x, y)`
    async fn mouse_move(&self, x: f64, y: f64, steps: u32) -> Result<(), DriverError>;

    /// 在 `duration` 内平滑滚动 `delta_y` 像素
    async fn scroll(&self, delta_y: i64, duration: Duration) -> Result<(), DriverError>;

    /// 查询匹配选择器的元素
    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError>;

    /// 当前视口大小
    fn viewport(&self) -> Viewport;

    /// 在已打开的页面上切换身份（User-Agent 与请求头）
    async fn apply_identity(&mut self, identity: &Identity) -> Result<(), DriverError>;

    /// 关闭页面并释放浏览器上下文
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// 页面元素
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// 元素的文本内容
    async fn text_content(&self) -> Result<Option<String>, DriverError>;

    /// 元素属性
    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
}
