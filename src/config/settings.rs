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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::models::retry::RetryAction;

/// 应用程序配置设置
///
/// 反爬策略的全部配置项：时间参数、请求头池、代理列表、限流阈值、
/// 按状态码的重试动作以及并发限制。进程启动时加载一次，之后只读。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 时间相关配置
    pub timing: TimingSettings,
    /// 请求头配置
    pub headers: HeaderSettings,
    /// 代理配置
    pub proxy: ProxySettings,
    /// 错误处理配置
    pub error_handling: ErrorHandlingSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 并发控制配置
    pub concurrency: ConcurrencySettings,
    /// 其他配置
    pub misc: MiscSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 毫秒区间
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DelayRange {
    /// 最小值（毫秒）
    pub min_ms: u64,
    /// 最大值（毫秒）
    pub max_ms: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 500,
            max_ms: 2000,
        }
    }
}

/// 时间配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// 请求前随机等待的最小值（毫秒）
    pub min_delay_ms: u64,
    /// 请求前随机等待的最大值（毫秒）
    pub max_delay_ms: u64,
    /// 页面加载后的额外等待
    pub page_load_delay: DelayRange,
    /// 传输层失败时的指数退避
    pub retry_backoff: BackoffSettings,
    /// 按时间段调整等待时间
    pub time_based_behavior: TimeBasedBehaviorSettings,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: 1000,
            max_delay_ms: 5000,
            page_load_delay: DelayRange::default(),
            retry_backoff: BackoffSettings::default(),
            time_based_behavior: TimeBasedBehaviorSettings::default(),
        }
    }
}

/// 指数退避配置
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// 初始等待（毫秒）
    pub initial_ms: u64,
    /// 退避乘数
    pub multiplier: f64,
    /// 最大等待（毫秒）
    pub max_delay_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30000,
        }
    }
}

/// 时间段行为配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeBasedBehaviorSettings {
    /// 是否启用
    pub enabled: bool,
    /// 深夜时段
    pub night_hours: NightHoursSettings,
    /// 周末乘数
    pub weekend_multiplier: f64,
}

impl Default for TimeBasedBehaviorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            night_hours: NightHoursSettings::default(),
            weekend_multiplier: 1.2,
        }
    }
}

/// 深夜时段配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NightHoursSettings {
    /// 开始小时（含）
    pub start: u32,
    /// 结束小时（不含）
    pub end: u32,
    /// 等待时间乘数
    pub delay_multiplier: f64,
}

impl Default for NightHoursSettings {
    fn default() -> Self {
        Self {
            start: 23,
            end: 6,
            delay_multiplier: 1.5,
        }
    }
}

/// 请求头配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderSettings {
    /// User-Agent 轮换池
    pub user_agents: Vec<String>,
    /// 每个请求都携带的默认请求头
    pub default: HashMap<String, String>,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let default = [
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "ja,en-US;q=0.9,en;q=0.8"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("DNT", "1"),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Cache-Control", "max-age=0"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            user_agents,
            default,
        }
    }
}

/// 代理配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// 是否启用代理
    pub enabled: bool,
    /// 代理地址列表
    pub list: Vec<String>,
    /// 是否轮换代理
    pub rotation: bool,
    /// 失败次数阈值
    pub max_failures: u32,
    /// 禁用后的冷却时间（毫秒）
    pub cooldown_period_ms: u64,
    /// 同一出口的请求频率限制
    pub rate_limit: RateLimitSettings,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            list: Vec::new(),
            rotation: true,
            max_failures: 3,
            cooldown_period_ms: 300_000,
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl ProxySettings {
    pub fn cooldown_period(&self) -> Duration {
        Duration::from_millis(self.cooldown_period_ms)
    }
}

/// 速率限制配置设置
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// 每分钟请求数上限
    pub requests_per_minute: u32,
    /// 每小时请求数上限
    pub requests_per_hour: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            requests_per_hour: 100,
        }
    }
}

/// 错误处理配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingSettings {
    /// 全局最大重试次数
    pub max_retries: u32,
    /// 单次导航超时（毫秒）
    pub timeout_ms: u64,
    /// 整个任务的超时（毫秒），为空表示不限制
    pub job_timeout_ms: Option<u64>,
    /// 按 HTTP 状态码配置的处理方式，键为状态码字符串
    pub status_handlers: HashMap<String, StatusHandlerSettings>,
}

impl Default for ErrorHandlingSettings {
    fn default() -> Self {
        let mut status_handlers = HashMap::new();
        status_handlers.insert(
            "429".to_string(),
            StatusHandlerSettings {
                action: RetryAction::Backoff,
                initial_delay_ms: Some(5000),
                max_delay_ms: Some(60000),
                ..Default::default()
            },
        );
        status_handlers.insert(
            "403".to_string(),
            StatusHandlerSettings {
                action: RetryAction::RotateIdentityAndProxy,
                wait_time_ms: Some(3000),
                ..Default::default()
            },
        );
        status_handlers.insert(
            "401".to_string(),
            StatusHandlerSettings {
                action: RetryAction::RotateIdentity,
                wait_time_ms: Some(2000),
                ..Default::default()
            },
        );
        status_handlers.insert(
            "500".to_string(),
            StatusHandlerSettings {
                action: RetryAction::Retry,
                wait_time_ms: Some(5000),
                ..Default::default()
            },
        );
        status_handlers.insert(
            "503".to_string(),
            StatusHandlerSettings {
                action: RetryAction::Backoff,
                initial_delay_ms: Some(10000),
                ..Default::default()
            },
        );

        Self {
            max_retries: 3,
            timeout_ms: 30000,
            job_timeout_ms: None,
            status_handlers,
        }
    }
}

impl ErrorHandlingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }
}

/// 单个状态码的处理配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusHandlerSettings {
    /// 处理动作
    pub action: RetryAction,
    /// 指数退避初始等待（毫秒）
    pub initial_delay_ms: Option<u64>,
    /// 指数退避最大等待（毫秒）
    pub max_delay_ms: Option<u64>,
    /// 固定等待（毫秒）
    pub wait_time_ms: Option<u64>,
    /// 退避乘数，默认 2
    pub multiplier: Option<f64>,
}

impl Default for StatusHandlerSettings {
    fn default() -> Self {
        Self {
            action: RetryAction::Retry,
            initial_delay_ms: None,
            max_delay_ms: None,
            wait_time_ms: None,
            multiplier: None,
        }
    }
}

/// 浏览器驱动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// 基于 CDP 的 Chromium
    #[default]
    Chromium,
    /// 不执行 JavaScript 的 HTTP 抓取
    Http,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// 驱动类型
    pub driver: DriverKind,
    /// 是否无头模式
    pub headless: bool,
    /// 远程 Chrome 调试地址，设置后不再本地启动
    pub remote_debugging_url: Option<String>,
    /// 浏览器启动参数
    pub launch_args: Vec<String>,
    /// 视口大小
    pub viewport: ViewportSettings,
    /// 语言区域
    pub locale: String,
    /// 时区
    pub timezone_id: String,
    /// 人类行为模拟
    pub human_behavior: HumanBehaviorSettings,
    /// 页面创建时注入的脚本
    pub stealth_scripts: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        let launch_args = [
            "--disable-blink-features=AutomationControlled",
            "--disable-dev-shm-usage",
            "--no-sandbox",
            "--disable-setuid-sandbox",
            "--disable-web-security",
            "--disable-features=IsolateOrigins,site-per-process",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let stealth_scripts = [
            "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })",
            "window.chrome = { runtime: {} }",
            "const originalQuery = window.navigator.permissions.query; \
             window.navigator.permissions.query = (parameters) => ( \
               parameters.name === 'notifications' ? \
                 Promise.resolve({ state: Notification.permission }) : \
                 originalQuery(parameters) \
             )",
            "Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] })",
            "Object.defineProperty(navigator, 'languages', { get: () => ['ja-JP', 'ja', 'en-US', 'en'] })",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            driver: DriverKind::Chromium,
            headless: true,
            remote_debugging_url: None,
            launch_args,
            viewport: ViewportSettings::default(),
            locale: "ja-JP".to_string(),
            timezone_id: "Asia/Tokyo".to_string(),
            human_behavior: HumanBehaviorSettings::default(),
            stealth_scripts,
        }
    }
}

/// 视口配置
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// 人类行为模拟配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HumanBehaviorSettings {
    /// 总开关
    pub enabled: bool,
    /// 随机鼠标移动
    pub mouse_movement: bool,
    /// 随机滚动
    pub scroll_behavior: bool,
    /// 滚动持续时间区间（毫秒）
    pub scroll_speed: DelayRange,
}

impl Default for HumanBehaviorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mouse_movement: true,
            scroll_behavior: true,
            scroll_speed: DelayRange {
                min_ms: 100,
                max_ms: 500,
            },
        }
    }
}

/// 并发控制配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// 最大并发任务数
    pub max_concurrent: usize,
    /// 同时打开的浏览器页面上限
    pub pool_size: usize,
    /// 阶段性扩容
    pub ramp_up: RampUpSettings,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            pool_size: 5,
            ramp_up: RampUpSettings::default(),
        }
    }
}

/// 阶段性扩容配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RampUpSettings {
    pub enabled: bool,
    pub initial_concurrency: usize,
    /// 每次增加并发的间隔（毫秒）
    pub increment_interval_ms: u64,
    pub max_concurrency: usize,
}

impl Default for RampUpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_concurrency: 1,
            increment_interval_ms: 60000,
            max_concurrency: 5,
        }
    }
}

/// 结果输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// 其他配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiscSettings {
    /// 记录已访问 URL
    pub track_visited_urls: bool,
    /// 遵守 robots.txt
    pub respect_robots_txt: bool,
    /// 是否把结果写入文件
    pub save_output: bool,
    /// 结果输出目录
    pub output_dir: String,
    /// 结果输出格式
    pub output_format: OutputFormat,
}

impl Default for MiscSettings {
    fn default() -> Self {
        Self {
            track_visited_urls: true,
            respect_robots_txt: true,
            save_output: false,
            output_dir: "./data/outputs".to_string(),
            output_format: OutputFormat::Json,
        }
    }
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 默认日志过滤规则，RUST_LOG 优先
    pub level: String,
    /// 是否输出 JSON 格式
    pub json: bool,
    /// 被检测时是否发出告警日志
    pub detections_alert: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info,crawlguard=debug".to_string(),
            json: false,
            detections_alert: true,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `CRAWLGUARD__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// 在默认来源之上再叠加一个指定的配置文件
    pub fn with_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    fn load(extra_file: Option<&str>) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let builder = builder.add_source(
            Environment::with_prefix("CRAWLGUARD")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("proxy.list")
                .with_list_parse_key("headers.user_agents")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 检查配置之间的约束
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.min_delay_ms > self.timing.max_delay_ms {
            return Err(ConfigError::Message(
                "timing.min_delay_ms must not exceed timing.max_delay_ms".to_string(),
            ));
        }
        if self.timing.page_load_delay.min_ms > self.timing.page_load_delay.max_ms {
            return Err(ConfigError::Message(
                "timing.page_load_delay.min_ms must not exceed max_ms".to_string(),
            ));
        }
        if self.headers.user_agents.is_empty() {
            return Err(ConfigError::Message(
                "headers.user_agents must contain at least one entry".to_string(),
            ));
        }
        if self.proxy.max_failures == 0 {
            return Err(ConfigError::Message(
                "proxy.max_failures must be at least 1".to_string(),
            ));
        }
        if self.concurrency.max_concurrent == 0 {
            return Err(ConfigError::Message(
                "concurrency.max_concurrent must be at least 1".to_string(),
            ));
        }
        // 每个运行中的任务同时最多持有一个页面
        if self.concurrency.pool_size < self.concurrency.max_concurrent {
            return Err(ConfigError::Message(format!(
                "concurrency.pool_size ({}) must be at least concurrency.max_concurrent ({})",
                self.concurrency.pool_size, self.concurrency.max_concurrent
            )));
        }
        Ok(())
    }
}
