//! Webhook 通知器
//!
//! 把 link_created / link_clicked 事件投递到账户注册的端点。
//! 每个端点独立投递：一个端点超时、拒连或回非 2xx，只记日志，
//! 不影响其他端点，也永远不影响触发它的请求。
//! 至多一次语义：单次投递超时 5 秒，不重试。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use ureq::Agent;

use crate::config::WebhookConfig;
use crate::storage::{AccountStore, Link};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    LinkCreated,
    LinkClicked,
}

/// 出站事件负载
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    user_id: String,
    event: WebhookEventKind,
    link: Link,
    /// ISO-8601
    timestamp: String,
}

/// Webhook 通知器
///
/// Clone 共享同一个 Agent、并发额度和账户存储句柄。
#[derive(Clone)]
pub struct WebhookNotifier {
    accounts: Arc<dyn AccountStore>,
    agent: Agent,
    /// 全局并发投递上限，避免扇出风暴占满阻塞线程池
    permits: Arc<Semaphore>,
}

impl WebhookNotifier {
    pub fn new(accounts: Arc<dyn AccountStore>, config: &WebhookConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            accounts,
            agent,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        }
    }

    /// 投递事件到账户的所有端点，全部投递结束后返回
    ///
    /// 端点列表为空时什么都不做。投递失败只记日志。
    pub async fn notify(&self, account_id: &str, event: WebhookEventKind, link: &Link) {
        let endpoints = match self.accounts.webhook_endpoints(account_id).await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("webhook: cannot load endpoints for {}: {}", account_id, e);
                return;
            }
        };
        if endpoints.is_empty() {
            return;
        }

        let payload = WebhookPayload {
            user_id: account_id.to_string(),
            event,
            link: link.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };

        let mut deliveries = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                return;
            };
            let agent = self.agent.clone();
            let body = payload.clone();

            // 每个端点一个阻塞任务，互不等待、互不传染
            deliveries.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let json = match serde_json::to_string(&body) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("webhook payload serialize failed for {}: {}", endpoint, e);
                        return;
                    }
                };
                match agent
                    .post(&endpoint)
                    .content_type("application/json; charset=utf-8")
                    .send(json)
                {
                    Ok(resp) if resp.status().is_success() => {
                        debug!("webhook delivered to {}", endpoint);
                    }
                    Ok(resp) => {
                        warn!("webhook to {} returned {}", endpoint, resp.status());
                    }
                    Err(e) => {
                        warn!("webhook delivery to {} failed: {}", endpoint, e);
                    }
                }
            }));
        }

        for delivery in deliveries {
            let _ = delivery.await;
        }
    }

    /// 发射后不管：投递放到独立任务，调用方立即返回
    pub fn notify_detached(&self, account_id: String, event: WebhookEventKind, link: Link) {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.notify(&account_id, event, &link).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookConfig;
    use crate::storage::memory::MemoryStore;
    use crate::storage::Account;

    #[tokio::test]
    async fn test_notify_without_endpoints_is_noop() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(Account::new("acct-1".to_string()))
            .await
            .unwrap();

        let notifier = WebhookNotifier::new(store, &WebhookConfig::default());
        let link = Link::new(
            "abc".to_string(),
            "acct-1".to_string(),
            "https://example.com".to_string(),
        );

        // 没有端点时直接返回，不 panic、不发请求
        notifier
            .notify("acct-1", WebhookEventKind::LinkCreated, &link)
            .await;
    }

    #[test]
    fn test_event_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&WebhookEventKind::LinkCreated).unwrap(),
            "\"link_created\""
        );
        assert_eq!(
            serde_json::to_string(&WebhookEventKind::LinkClicked).unwrap(),
            "\"link_clicked\""
        );
    }
}
