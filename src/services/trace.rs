//! 重定向链跟踪器
//!
//! 给定一个目标 URL，逐跳跟随 301/302 重定向直到终态，产出健康判定。
//! 每一跳是一个禁用自动重定向的 GET 请求，带独立超时；已访问 URL
//! 集合用于环检测。无论对端如何构造重定向链，跟随的跳数都不会超过
//! max_hops——这是最坏延迟的上界。
//!
//! ureq 的请求是同步的，异步调用方通过 `spawn_blocking` 包装；
//! Agent 内部是引用计数的，clone 进阻塞任务没有额外开销。

use std::collections::HashSet;
use std::time::Duration;

use tracing::{trace, warn};
use ureq::Agent;
use url::Url;

use crate::config::TraceConfig;
use crate::storage::HealthStatus;

/// 重定向链跟踪器
///
/// Agent 在构造时创建一次，连接池与超时配置随之固定。
pub struct RedirectTracer {
    agent: Agent,
    max_hops: usize,
}

impl RedirectTracer {
    pub fn from_config(config: &TraceConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.timeout_ms)))
            // 自己逐跳跟，不让 ureq 跟
            .max_redirects(0)
            // 404 等状态也要拿到响应本体来分类
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            max_hops: config.max_hops,
        }
    }

    /// 跟踪一条重定向链（阻塞版本）
    pub fn trace_blocking(&self, url: &str) -> HealthStatus {
        follow_chain(&self.agent, self.max_hops, url)
    }

    /// 跟踪一条重定向链（异步包装，在阻塞线程池中执行）
    pub async fn trace(&self, url: String) -> HealthStatus {
        let agent = self.agent.clone();
        let max_hops = self.max_hops;

        tokio::task::spawn_blocking(move || follow_chain(&agent, max_hops, &url))
            .await
            .unwrap_or_else(|e| {
                warn!("trace task join failed: {}", e);
                HealthStatus::Broken
            })
    }
}

/// 逐跳跟随重定向链直到终态、出错或耗尽跳数预算
fn follow_chain(agent: &Agent, max_hops: usize, url: &str) -> HealthStatus {
    let Ok(mut current) = Url::parse(url) else {
        // 存量数据里的坏 URL 按 broken 处理
        return HealthStatus::Broken;
    };

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(current.to_string());

    // max_hops 次跳转 + 最后一次终态请求
    for hop in 0..=max_hops {
        let response = match agent.get(current.as_str()).call() {
            Ok(resp) => resp,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status().as_u16();
        trace!("trace hop {}: {} -> {}", hop, current, status);

        match status {
            200..=299 => return HealthStatus::Healthy,
            301 | 302 => {
                let Some(location) = response
                    .headers()
                    .get(ureq::http::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    // 重定向却不给 Location，没法继续
                    return HealthStatus::Broken;
                };

                // Location 可能是相对路径，相对当前 URL 解析
                let next = match current.join(location) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!("unresolvable Location \"{}\": {}", location, e);
                        return HealthStatus::Broken;
                    }
                };

                if !visited.insert(next.to_string()) {
                    // 回到走过的 URL，环
                    return HealthStatus::RedirectLoop;
                }
                current = next;
            }
            _ => return HealthStatus::Broken,
        }
    }

    // 跳数预算耗尽仍未终止
    HealthStatus::RedirectLoop
}

/// 传输层错误归类：超时归 timeout，其余一律 broken
fn classify_transport_error(err: &ureq::Error) -> HealthStatus {
    match err {
        ureq::Error::Timeout(_) => HealthStatus::Timeout,
        ureq::Error::Io(io_err)
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) =>
        {
            HealthStatus::Timeout
        }
        _ => HealthStatus::Broken,
    }
}
