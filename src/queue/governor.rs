// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::settings::ConcurrencySettings;

/// 并发控制器
///
/// 用信号量限制同时运行的任务数。启用阶段性扩容时从 `initial_concurrency`
/// 开始，每隔 `increment_interval_ms` 增加一个许可，直到
/// `min(max_concurrent, ramp_up.max_concurrency)`。
pub struct ConcurrencyGovernor {
    semaphore: Arc<Semaphore>,
    capacity: Arc<AtomicUsize>,
    limit: usize,
    cancel: CancellationToken,
}

impl ConcurrencyGovernor {
    pub fn new(settings: &ConcurrencySettings) -> Self {
        let max_concurrent = settings.max_concurrent.max(1);
        let (initial, limit) = if settings.ramp_up.enabled {
            let limit = settings.ramp_up.max_concurrency.clamp(1, max_concurrent);
            (settings.ramp_up.initial_concurrency.clamp(1, limit), limit)
        } else {
            (max_concurrent, max_concurrent)
        };

        Self {
            semaphore: Arc::new(Semaphore::new(initial)),
            capacity: Arc::new(AtomicUsize::new(initial)),
            limit,
            cancel: CancellationToken::new(),
        }
    }

    /// 启动扩容后台任务，已达上限时不启动
    pub fn start_ramp_up(&self, increment_interval: Duration) -> Option<JoinHandle<()>> {
        if self.capacity.load(Ordering::SeqCst) >= self.limit {
            return None;
        }

        let semaphore = self.semaphore.clone();
        let capacity = self.capacity.clone();
        let limit = self.limit;
        let cancel = self.cancel.clone();
        let period = increment_interval.max(Duration::from_millis(1));

        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        semaphore.add_permits(1);
                        let current = capacity.fetch_add(1, Ordering::SeqCst) + 1;
                        info!("Concurrency increased to {}", current);
                        if current >= limit {
                            break;
                        }
                    }
                }
            }
        }))
    }

    /// 等待一个运行许可
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// 当前允许的并发数
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 停止扩容并拒绝新的许可请求
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.semaphore.close();
    }
}

impl Drop for ConcurrencyGovernor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
