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

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::settings::Settings;
use crate::domain::models::execution_result::ExecutionResult;
use crate::domain::models::job::{JobStatus, ScrapeJob};
use crate::domain::services::extraction_service::ExtractionService;
use crate::domain::services::human_behavior_service::HumanBehaviorSimulator;
use crate::domain::services::identity_service::IdentityGenerator;
use crate::domain::services::proxy_service::ProxyRotator;
use crate::domain::services::rate_limiting_service::RateLimiter;
use crate::domain::services::visited_url_service::VisitedUrlTracker;
use crate::engines::navigator::{Navigator, PageSession};
use crate::engines::traits::{BrowserDriver, PageOptions};
use crate::infrastructure::registry::ExecutionRegistry;
use crate::infrastructure::storage::ResultStorage;
use crate::utils::errors::JobError;
use crate::utils::robots::RobotsCheckerTrait;
use crate::utils::timing::{random_delay_in, time_adjusted_delay};

/// 未使用代理时的限流标识
pub const LOCAL_IDENTIFIER: &str = "local";

/// 成功抓取得到的页面数据
struct PageData {
    status_code: u16,
    fields: BTreeMap<String, Vec<Value>>,
    screenshot: Option<String>,
}

/// 抓取工作者
///
/// 执行单个任务的完整流程：身份 → 代理 → 限流 → 导航 → 人类行为 → 提取 → 记录。
/// 无论成功、失败、超时还是取消，打开的页面都会被关闭，并且注册表中一定留下一条结果。
pub struct ScrapeWorker {
    pub(crate) settings: Arc<Settings>,
    pub(crate) driver: Arc<dyn BrowserDriver>,
    pub(crate) registry: Arc<ExecutionRegistry>,
    pub(crate) rate_limiter: Arc<RateLimiter>,
    pub(crate) proxies: Arc<ProxyRotator>,
    pub(crate) identities: Arc<IdentityGenerator>,
    pub(crate) visited: Arc<VisitedUrlTracker>,
    pub(crate) navigator: Navigator,
    pub(crate) behavior: HumanBehaviorSimulator,
    pub(crate) robots: Option<Arc<dyn RobotsCheckerTrait>>,
    pub(crate) storage: Option<ResultStorage>,
}

impl ScrapeWorker {
    /// 执行任务并返回已记录的结果
    #[instrument(skip(self, job, cancel), fields(job_id = %job.id, url = %job.url))]
    pub async fn process(&self, job: ScrapeJob, cancel: CancellationToken) -> ExecutionResult {
        let mut session: Option<PageSession> = None;

        let outcome = {
            let pipeline = self.execute(&job, &mut session, &cancel);
            match self.settings.error_handling.job_timeout() {
                Some(deadline) => tokio::time::timeout(deadline, pipeline)
                    .await
                    .unwrap_or(Err(JobError::Timeout)),
                None => pipeline.await,
            }
        };

        if let Some(mut session) = session.take() {
            session.close().await;
        }

        self.finish(&job, outcome).await
    }

    async fn execute(
        &self,
        job: &ScrapeJob,
        session: &mut Option<PageSession>,
        cancel: &CancellationToken,
    ) -> Result<PageData, JobError> {
        if self.visited.is_visited(&job.url) {
            info!("URL already visited: {}", job.url);
        }

        let identity = self.identities.generate(None);

        let mut crawl_delay = None;
        if self.settings.misc.respect_robots_txt {
            if let Some(robots) = &self.robots {
                match robots.is_allowed(&job.url, &identity.user_agent).await {
                    Ok(true) => {}
                    Ok(false) => return Err(JobError::RobotsDisallowed(job.url.clone())),
                    Err(e) => warn!("robots.txt check failed for {}: {}", job.url, e),
                }
                crawl_delay = robots
                    .get_crawl_delay(&job.url, &identity.user_agent)
                    .await
                    .ok()
                    .flatten();
            }
        }

        let proxy = self.proxies.next();
        let identifier = proxy.as_deref().unwrap_or(LOCAL_IDENTIFIER);
        if !self.rate_limiter.check_and_record(identifier) {
            return Err(JobError::RateLimitExceeded(identifier.to_string()));
        }

        let delay = time_adjusted_delay(&self.settings.timing).max(crawl_delay.unwrap_or_default());
        debug!("Waiting {}ms before request", delay.as_millis());
        sleep_or_cancel(delay, cancel).await?;

        let options = PageOptions::new(&self.settings.browser, identity, proxy);
        let opened = cancellable(cancel, PageSession::open(self.driver.clone(), options)).await??;
        let session = session.insert(opened);

        self.registry.transition(&job.id, JobStatus::Navigating)?;
        let fetched = match self.navigator.fetch(session, &job.url, cancel).await {
            Ok(fetched) => fetched,
            Err(e) => {
                if let Some(attempts) = e.attempts() {
                    self.registry.set_attempts(&job.id, attempts);
                }
                return Err(e.into());
            }
        };
        self.registry.set_attempts(&job.id, fetched.attempts);

        sleep_or_cancel(random_delay_in(&self.settings.timing.page_load_delay), cancel).await?;
        cancellable(cancel, self.behavior.simulate(session.page())).await?;

        self.registry.transition(&job.id, JobStatus::Extracting)?;
        let fields = cancellable(
            cancel,
            ExtractionService::extract(session.page(), &job.target_fields),
        )
        .await?;

        let screenshot = if job.capture_screenshot {
            match cancellable(cancel, session.page().screenshot()).await? {
                Ok(bytes) => Some(BASE64.encode(bytes)),
                Err(e) => {
                    warn!("Screenshot failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(PageData {
            status_code: fetched.response.status_code,
            fields,
            screenshot,
        })
    }

    async fn finish(
        &self,
        job: &ScrapeJob,
        outcome: Result<PageData, JobError>,
    ) -> ExecutionResult {
        let attempts = self
            .registry
            .get_job(&job.id)
            .map(|j| j.attempt_count)
            .unwrap_or_default();

        let result = match outcome {
            Ok(data) => {
                if let Err(e) = self.registry.transition(&job.id, JobStatus::Completed) {
                    error!("Failed to complete job {}: {}", job.id, e);
                }
                self.visited.mark_visited(&job.url);
                metrics::counter!("crawlguard_jobs_total", "status" => "completed").increment(1);
                info!(
                    "Job {} completed with {} fields",
                    job.id,
                    data.fields.len()
                );

                ExecutionResult::success(&job.id, &job.url, data.status_code, data.fields, attempts)
                    .with_screenshot(data.screenshot)
            }
            Err(e) => {
                error!("Scraper execution failed: {}", e);
                if e.looks_blocked() && self.settings.logging.detections_alert {
                    error!(
                        target: "detection",
                        job_id = %job.id,
                        url = %job.url,
                        error = %e,
                        "Scraper blocked during execution"
                    );
                }
                if let Err(transition_error) = self.registry.transition(&job.id, JobStatus::Failed) {
                    debug!("Job {} not moved to failed: {}", job.id, transition_error);
                }
                metrics::counter!("crawlguard_jobs_total", "status" => "failed").increment(1);

                ExecutionResult::failure(&job.id, &job.url, e.status_code(), e.to_string(), attempts)
            }
        };

        if let Err(e) = self.registry.record_result(result.clone()) {
            error!("Failed to record result for job {}: {}", job.id, e);
        }

        if self.settings.misc.save_output {
            if let Some(storage) = &self.storage {
                if let Err(e) = storage
                    .save(&result, self.settings.misc.output_format)
                    .await
                {
                    warn!("Failed to save result for job {}: {}", job.id, e);
                }
            }
        }

        result
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<(), JobError> {
    cancellable(cancel, tokio::time::sleep(duration)).await
}

async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output, JobError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        output = future => Ok(output),
    }
}
