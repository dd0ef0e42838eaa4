//! 链接健康巡检
//!
//! 分页扫描全部链接，逐条跟踪目标 URL 并把判定写回存储。
//! 单条链接的跟踪或写回失败只记日志，绝不中断整轮巡检；
//! 并发量有上限，避免压垮目标站点或存储写入。
//!
//! 什么时候跑由外部决定：周期后台任务或手动触发端点。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::SweepConfig;
use crate::services::trace::RedirectTracer;
use crate::storage::{HealthStatus, LinkStore};

/// 单条链接的巡检结果
#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub code: String,
    pub url: String,
    pub status: HealthStatus,
}

pub struct HealthSweeper {
    links: Arc<dyn LinkStore>,
    tracer: Arc<RedirectTracer>,
    concurrency: usize,
    page_size: usize,
    cancel: AtomicBool,
}

impl HealthSweeper {
    pub fn new(links: Arc<dyn LinkStore>, tracer: Arc<RedirectTracer>, config: &SweepConfig) -> Self {
        Self {
            links,
            tracer,
            concurrency: config.concurrency.max(1),
            page_size: config.page_size.max(1),
            cancel: AtomicBool::new(false),
        }
    }

    /// 请求在下一页之前停下（优雅关闭用）
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// 扫一轮所有链接，返回逐条结果
    pub async fn sweep(&self) -> Vec<SweepEntry> {
        let mut results = Vec::new();
        let mut offset = 0;

        loop {
            if self.cancelled() {
                info!("health sweep cancelled after {} links", results.len());
                break;
            }

            let page = match self.links.list_page(offset, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    error!("health sweep: page listing at offset {} failed: {}", offset, e);
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            offset += page_len;

            let entries: Vec<SweepEntry> = stream::iter(page)
                .map(|link| {
                    let tracer = Arc::clone(&self.tracer);
                    let links = Arc::clone(&self.links);
                    async move {
                        let status = tracer.trace(link.target.clone()).await;
                        // 写回失败不影响其余链接的评估
                        if let Err(e) = links.set_health(&link.code, status).await {
                            warn!("health status for {} not persisted: {}", link.code, e);
                        }
                        SweepEntry {
                            code: link.code,
                            url: link.target,
                            status,
                        }
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            results.extend(entries);

            if page_len < self.page_size {
                break;
            }
        }

        let broken = results
            .iter()
            .filter(|e| e.status != HealthStatus::Healthy)
            .count();
        info!(
            "health sweep finished: {} links checked, {} unhealthy",
            results.len(),
            broken
        );
        results
    }

    /// 周期巡检后台任务，收到 shutdown 信号即退出
    pub async fn run_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("periodic health sweep every {:?}", interval);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.sweep().await;
                }
                _ = shutdown.changed() => {
                    self.request_cancel();
                    info!("health sweeper stopping");
                    break;
                }
            }
        }
    }
}
