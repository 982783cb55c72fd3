// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::models::identity::Identity;
use crate::domain::models::retry::RetryAction;
use crate::domain::services::identity_service::IdentityGenerator;
use crate::domain::services::proxy_service::ProxyRotator;
use crate::domain::services::retry_policy_service::StatusRetryPolicy;
use crate::engines::traits::{
    BrowserDriver, BrowserPage, DriverError, NavigationResponse, PageOptions,
};
use crate::utils::retry_policy::RetryPolicy;

/// 导航错误类型
#[derive(Error, Debug)]
pub enum NavigationError {
    /// 传输层失败，重试次数已用完
    #[error("Network error after {attempts} attempts: {source}")]
    Network {
        attempts: u32,
        #[source]
        source: DriverError,
    },
    /// 非 2xx 响应，且策略不再重试
    #[error("HTTP error {code} after {attempts} attempts")]
    HttpStatus { code: u16, attempts: u32 },
    /// 不可重试的驱动错误
    #[error("Browser driver error: {0}")]
    Driver(#[source] DriverError),
    /// 被取消
    #[error("Navigation cancelled")]
    Cancelled,
}

impl NavigationError {
    /// 已进行的尝试次数（如已知）
    pub fn attempts(&self) -> Option<u32> {
        match self {
            NavigationError::Network { attempts, .. }
            | NavigationError::HttpStatus { attempts, .. } => Some(*attempts),
            NavigationError::Driver(_) | NavigationError::Cancelled => None,
        }
    }
}

/// 成功的导航
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: NavigationResponse,
    /// 包含成功那一次在内的尝试次数
    pub attempts: u32,
}

/// 页面会话
///
/// 持有当前页面以及它使用的身份和代理。更换代理需要新的浏览器上下文，
/// 旧页面先关闭并归还页面池名额，再打开新页面。
pub struct PageSession {
    driver: Arc<dyn BrowserDriver>,
    page: Box<dyn BrowserPage>,
    options: PageOptions,
    closed: bool,
}

impl PageSession {
    pub async fn open(
        driver: Arc<dyn BrowserDriver>,
        options: PageOptions,
    ) -> Result<Self, DriverError> {
        let page = driver.open_page(&options).await?;
        debug!(
            "Opened {} page (proxy: {})",
            driver.name(),
            options.proxy.as_deref().unwrap_or("none")
        );
        Ok(Self {
            driver,
            page,
            options,
            closed: false,
        })
    }

    pub fn page(&self) -> &dyn BrowserPage {
        self.page.as_ref()
    }

    pub fn page_mut(&mut self) -> &mut dyn BrowserPage {
        self.page.as_mut()
    }

    pub fn identity(&self) -> &Identity {
        &self.options.identity
    }

    pub fn proxy(&self) -> Option<&str> {
        self.options.proxy.as_deref()
    }

    /// 在当前页面上切换身份
    pub async fn rotate_identity(&mut self, identity: Identity) -> Result<(), DriverError> {
        self.page.apply_identity(&identity).await?;
        self.options.identity = identity;
        Ok(())
    }

    /// 用新的身份和代理重新打开页面
    pub async fn reopen(
        &mut self,
        identity: Identity,
        proxy: Option<String>,
    ) -> Result<(), DriverError> {
        let mut options = self.options.clone();
        options.identity = identity;
        options.proxy = proxy;

        if let Err(e) = self.page.close().await {
            warn!("Failed to close previous page: {}", e);
        }
        match self.driver.open_page(&options).await {
            Ok(page) => {
                self.page = page;
                self.options = options;
                Ok(())
            }
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    /// 关闭页面，可重复调用
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.page.close().await {
            warn!("Failed to close page: {}", e);
        }
    }
}

/// 导航重试器
///
/// 单个页面导航的有界重试循环：传输层失败按指数退避重试，
/// 非 2xx 响应交给 [`StatusRetryPolicy`] 决定，总尝试次数不超过 `max_retries + 1`。
pub struct Navigator {
    backoff: RetryPolicy,
    status_policy: Arc<StatusRetryPolicy>,
    identities: Arc<IdentityGenerator>,
    proxies: Arc<ProxyRotator>,
    timeout: Duration,
}

impl Navigator {
    pub fn new(
        backoff: RetryPolicy,
        status_policy: Arc<StatusRetryPolicy>,
        identities: Arc<IdentityGenerator>,
        proxies: Arc<ProxyRotator>,
        timeout: Duration,
    ) -> Self {
        Self {
            backoff,
            status_policy,
            identities,
            proxies,
            timeout,
        }
    }

    /// 导航到 `url`，成功时返回 2xx 响应
    pub async fn fetch(
        &self,
        session: &mut PageSession,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, NavigationError> {
        let max_retries = self.backoff.max_retries;
        let mut attempt: u32 = 0;

        loop {
            info!(
                "Navigating to {} (attempt {}/{})",
                url,
                attempt + 1,
                max_retries + 1
            );
            metrics::counter!("crawlguard_navigation_attempts_total").increment(1);

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(NavigationError::Cancelled),
                result = tokio::time::timeout(
                    self.timeout,
                    session.page_mut().navigate(url, self.timeout),
                ) => result.map_err(DriverError::from).and_then(|r| r),
            };

            match outcome {
                Ok(response) if response.is_success() => {
                    return Ok(FetchOutcome {
                        response,
                        attempts: attempt + 1,
                    })
                }
                Ok(response) => {
                    let code = response.status_code;
                    let decision = self.status_policy.decide(code, attempt);
                    if !decision.should_retry {
                        return Err(NavigationError::HttpStatus {
                            code,
                            attempts: attempt + 1,
                        });
                    }

                    warn!(
                        "HTTP {} from {}, retrying with action {} after {}ms",
                        code,
                        url,
                        decision.action,
                        decision.wait_time.as_millis()
                    );
                    Self::wait(decision.wait_time, cancel).await?;
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(NavigationError::Cancelled),
                        result = self.apply_action(session, decision.action) => result?,
                    }
                }
                Err(e) if e.is_transport() => {
                    if let Some(proxy) = session.proxy() {
                        self.proxies.record_failure(proxy);
                    }
                    if attempt >= max_retries {
                        return Err(NavigationError::Network {
                            attempts: attempt + 1,
                            source: e,
                        });
                    }

                    let wait = self.backoff.calculate_backoff(attempt);
                    warn!(
                        "Navigation to {} failed: {}, retrying in {}ms",
                        url,
                        e,
                        wait.as_millis()
                    );
                    Self::wait(wait, cancel).await?;
                }
                Err(e) => return Err(NavigationError::Driver(e)),
            }

            attempt += 1;
        }
    }

    async fn apply_action(
        &self,
        session: &mut PageSession,
        action: RetryAction,
    ) -> Result<(), NavigationError> {
        let referer = session.identity().referer.clone();
        match action {
            RetryAction::RotateIdentity => {
                let identity = self.identities.generate(referer.as_deref());
                session
                    .rotate_identity(identity)
                    .await
                    .map_err(NavigationError::Driver)?;
            }
            RetryAction::RotateIdentityAndProxy => {
                if let Some(proxy) = session.proxy() {
                    self.proxies.record_failure(proxy);
                }
                let identity = self.identities.generate(referer.as_deref());
                let proxy = self.proxies.next();
                session
                    .reopen(identity, proxy)
                    .await
                    .map_err(NavigationError::Driver)?;
            }
            RetryAction::Backoff | RetryAction::Retry | RetryAction::None => {}
        }
        Ok(())
    }

    async fn wait(duration: Duration, cancel: &CancellationToken) -> Result<(), NavigationError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(NavigationError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
