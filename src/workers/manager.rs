// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use validator::Validate;

use crate::config::settings::{DriverKind, Settings};
use crate::domain::models::execution_result::ExecutionResult;
use crate::domain::models::job::{JobRequest, JobStatus, ScrapeJob};
use crate::domain::services::human_behavior_service::HumanBehaviorSimulator;
use crate::domain::services::identity_service::IdentityGenerator;
use crate::domain::services::proxy_service::ProxyRotator;
use crate::domain::services::rate_limiting_service::RateLimiter;
use crate::domain::services::retry_policy_service::StatusRetryPolicy;
use crate::domain::services::visited_url_service::VisitedUrlTracker;
use crate::engines::chromium_engine::ChromiumDriver;
use crate::engines::http_engine::HttpDriver;
use crate::engines::navigator::Navigator;
use crate::engines::traits::BrowserDriver;
use crate::infrastructure::registry::{ExecutionRegistry, RegistryStats};
use crate::infrastructure::storage::ResultStorage;
use crate::queue::governor::ConcurrencyGovernor;
use crate::utils::errors::JobError;
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::robots::{RobotsChecker, RobotsCheckerTrait};
use crate::workers::scrape_worker::ScrapeWorker;

/// 抓取服务
///
/// 对外的任务提交入口。进程启动时创建一次，持有所有共享状态
/// （限流窗口、代理状态、已访问集合、执行注册表），并把它们注入到每个任务中。
/// 需要在 Tokio 运行时内创建。
pub struct ScrapeService {
    worker: Arc<ScrapeWorker>,
    registry: Arc<ExecutionRegistry>,
    governor: Arc<ConcurrencyGovernor>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl ScrapeService {
    /// 按配置选择浏览器驱动
    pub fn from_settings(settings: Settings) -> Self {
        let driver: Arc<dyn BrowserDriver> = match settings.browser.driver {
            DriverKind::Chromium => Arc::new(ChromiumDriver::new(
                settings.browser.clone(),
                settings.concurrency.pool_size,
            )),
            DriverKind::Http => Arc::new(HttpDriver::new()),
        };
        let robots: Arc<dyn RobotsCheckerTrait> = Arc::new(RobotsChecker::default());
        Self::new(settings, driver, Some(robots))
    }

    pub fn new(
        settings: Settings,
        driver: Arc<dyn BrowserDriver>,
        robots: Option<Arc<dyn RobotsCheckerTrait>>,
    ) -> Self {
        let settings = Arc::new(settings);

        let proxies = Arc::new(ProxyRotator::new(&settings.proxy));
        let visited = Arc::new(VisitedUrlTracker::new(settings.misc.track_visited_urls));
        let identities = Arc::new(IdentityGenerator::new(&settings.headers));
        let registry = Arc::new(ExecutionRegistry::new(proxies.clone(), visited.clone()));

        let navigator = Navigator::new(
            RetryPolicy::from_settings(&settings),
            Arc::new(StatusRetryPolicy::from_settings(&settings)),
            identities.clone(),
            proxies.clone(),
            settings.error_handling.timeout(),
        );

        let storage = settings
            .misc
            .save_output
            .then(|| ResultStorage::new(&settings.misc.output_dir));

        let worker = Arc::new(ScrapeWorker {
            settings: settings.clone(),
            driver,
            registry: registry.clone(),
            rate_limiter: Arc::new(RateLimiter::new(settings.proxy.rate_limit)),
            proxies,
            identities,
            visited,
            navigator,
            behavior: HumanBehaviorSimulator::new(settings.browser.human_behavior.clone()),
            robots,
            storage,
        });

        let governor = Arc::new(ConcurrencyGovernor::new(&settings.concurrency));
        if settings.concurrency.ramp_up.enabled {
            governor.start_ramp_up(std::time::Duration::from_millis(
                settings.concurrency.ramp_up.increment_interval_ms,
            ));
        }

        Self {
            worker,
            registry,
            governor,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// 提交任务并在后台执行，返回任务ID
    pub fn submit_job(&self, request: JobRequest) -> Result<String, JobError> {
        let job = self.register(request)?;
        let job_id = job.id.clone();

        let worker = self.worker.clone();
        let governor = self.governor.clone();
        let cancel = self.cancel.child_token();
        self.tracker.spawn(async move {
            Self::run(worker, governor, job, cancel).await;
        });

        Ok(job_id)
    }

    /// 提交任务并等待结果
    pub async fn execute_job(&self, request: JobRequest) -> Result<ExecutionResult, JobError> {
        let job = self.register(request)?;
        let result = Self::run(
            self.worker.clone(),
            self.governor.clone(),
            job,
            self.cancel.child_token(),
        )
        .await;
        Ok(result)
    }

    fn register(&self, request: JobRequest) -> Result<ScrapeJob, JobError> {
        request
            .validate()
            .map_err(|e| JobError::Validation(e.to_string()))?;

        let job = ScrapeJob::new(&request);
        self.registry.submit(job.clone());
        if let Some(artifact) = request.artifact {
            self.registry.attach_artifact(&job.id, artifact)?;
        }
        Ok(job)
    }

    async fn run(
        worker: Arc<ScrapeWorker>,
        governor: Arc<ConcurrencyGovernor>,
        job: ScrapeJob,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let permit = tokio::select! {
            _ = cancel.cancelled() => None,
            permit = governor.acquire() => permit.ok(),
        };

        match permit {
            Some(_permit) => worker.process(job, cancel).await,
            None => {
                warn!("Job {} cancelled before it started", job.id);
                let result = ExecutionResult::failure(
                    &job.id,
                    &job.url,
                    None,
                    JobError::Cancelled.to_string(),
                    0,
                );
                if let Err(e) = worker.registry.transition(&job.id, JobStatus::Failed) {
                    error!("Failed to mark job {} as failed: {}", job.id, e);
                }
                if let Err(e) = worker.registry.record_result(result.clone()) {
                    error!("Failed to record result for job {}: {}", job.id, e);
                }
                result
            }
        }
    }

    pub fn get_result(&self, job_id: &str) -> Option<ExecutionResult> {
        self.registry.get_result(job_id)
    }

    pub fn get_stats(&self) -> RegistryStats {
        self.registry.get_stats()
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// 等待所有已提交的任务结束
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// 取消所有运行中的任务并等待它们释放资源
    pub async fn shutdown(&self) {
        info!("Shutting down scrape service");
        self.cancel.cancel();
        self.governor.shutdown();
        self.wait_idle().await;
    }
}
