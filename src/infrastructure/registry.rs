// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::execution_result::ExecutionResult;
use crate::domain::models::job::{DomainError, JobStatus, ScrapeJob};
use crate::domain::models::proxy::ProxyStats;
use crate::domain::services::proxy_service::ProxyRotator;
use crate::domain::services::visited_url_service::VisitedUrlTracker;

/// 注册表统计
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RegistryStats {
    /// 导航或提取中的任务数
    pub running_count: usize,
    pub pending_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    /// 已缓存的结果数
    pub cached_result_count: usize,
    /// 已缓存的附加产物数
    pub cached_artifact_count: usize,
    /// 已访问 URL 数
    pub visited_url_count: usize,
    /// 代理池统计
    pub proxy: ProxyStats,
}

/// 执行注册表
///
/// 跟踪任务生命周期，缓存执行结果和调用方附加的产物（例如生成的抓取脚本）。
/// 所有映射都以任务ID为键，可被并发任务同时读写。
pub struct ExecutionRegistry {
    jobs: DashMap<String, ScrapeJob>,
    results: DashMap<String, ExecutionResult>,
    artifacts: DashMap<String, String>,
    proxies: Arc<ProxyRotator>,
    visited: Arc<VisitedUrlTracker>,
}

impl ExecutionRegistry {
    pub fn new(proxies: Arc<ProxyRotator>, visited: Arc<VisitedUrlTracker>) -> Self {
        Self {
            jobs: DashMap::new(),
            results: DashMap::new(),
            artifacts: DashMap::new(),
            proxies,
            visited,
        }
    }

    /// 登记新任务，返回任务ID
    pub fn submit(&self, job: ScrapeJob) -> String {
        let id = job.id.clone();
        debug!("Job {} submitted for {}", id, job.url);
        self.jobs.insert(id.clone(), job);
        id
    }

    /// 推进任务状态，只能向前
    pub fn transition(&self, job_id: &str, status: JobStatus) -> Result<(), DomainError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DomainError::JobNotFound(job_id.to_string()))?;
        job.transition(status)?;
        debug!("Job {} -> {}", job_id, status);
        Ok(())
    }

    /// 更新导航尝试次数
    pub fn set_attempts(&self, job_id: &str, attempts: u32) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.attempt_count = attempts;
        }
    }

    /// 记录执行结果，每个任务只能写入一次
    pub fn record_result(&self, result: ExecutionResult) -> Result<(), DomainError> {
        if !self.jobs.contains_key(&result.job_id) {
            return Err(DomainError::JobNotFound(result.job_id));
        }

        match self.results.entry(result.job_id.clone()) {
            Entry::Occupied(_) => {
                warn!("Result for job {} already recorded", result.job_id);
                Err(DomainError::ValidationError(format!(
                    "result for job {} already recorded",
                    result.job_id
                )))
            }
            Entry::Vacant(entry) => {
                entry.insert(result);
                Ok(())
            }
        }
    }

    pub fn get_result(&self, job_id: &str) -> Option<ExecutionResult> {
        self.results.get(job_id).map(|r| r.value().clone())
    }

    pub fn get_job(&self, job_id: &str) -> Option<ScrapeJob> {
        self.jobs.get(job_id).map(|j| j.value().clone())
    }

    /// 为任务附加产物，后写入的覆盖先写入的
    pub fn attach_artifact(&self, job_id: &str, artifact: String) -> Result<(), DomainError> {
        if !self.jobs.contains_key(job_id) {
            return Err(DomainError::JobNotFound(job_id.to_string()));
        }
        self.artifacts.insert(job_id.to_string(), artifact);
        Ok(())
    }

    pub fn get_artifact(&self, job_id: &str) -> Option<String> {
        self.artifacts.get(job_id).map(|a| a.value().clone())
    }

    /// 正在导航或提取的任务
    pub fn running_jobs(&self) -> Vec<ScrapeJob> {
        self.jobs
            .iter()
            .filter(|j| j.status.is_running())
            .map(|j| j.value().clone())
            .collect()
    }

    pub fn get_stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            cached_result_count: self.results.len(),
            cached_artifact_count: self.artifacts.len(),
            visited_url_count: self.visited.len(),
            proxy: self.proxies.stats(),
            ..Default::default()
        };

        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Pending => stats.pending_count += 1,
                JobStatus::Navigating | JobStatus::Extracting => stats.running_count += 1,
                JobStatus::Completed => stats.completed_count += 1,
                JobStatus::Failed => stats.failed_count += 1,
            }
        }

        stats
    }

    /// 移除最后更新早于 `max_age` 的已结束任务及其结果和产物，返回移除数量
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return 0;
        };

        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter(|j| j.status.is_terminal() && j.updated_at <= cutoff)
            .map(|j| j.key().clone())
            .collect();

        for id in &expired {
            self.jobs.remove(id);
            self.results.remove(id);
            self.artifacts.remove(id);
        }

        if !expired.is_empty() {
            debug!("Evicted {} finished jobs", expired.len());
        }
        expired.len()
    }
}
