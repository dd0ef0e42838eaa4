//! Webhook notifier tests
//!
//! Delivery runs against local fixture endpoints. The key property is
//! isolation: one dead endpoint never stops delivery to the others.

mod common;

use std::sync::Arc;
use std::time::Duration;

use shortguard::config::WebhookConfig;
use shortguard::services::{WebhookEventKind, WebhookNotifier};
use shortguard::storage::memory::MemoryStore;
use shortguard::storage::{Account, AccountStore, Link};

use common::{ok_response, serve_script_capturing, unused_addr};

fn fast_config() -> WebhookConfig {
    WebhookConfig {
        timeout_secs: 2,
        max_concurrent: 8,
    }
}

async fn account_with_endpoints(store: &MemoryStore, id: &str, endpoints: Vec<String>) {
    let mut account = Account::new(id.to_string());
    account.webhook_endpoints = endpoints;
    store.upsert(account).await.unwrap();
}

fn sample_link() -> Link {
    Link::new(
        "abc123".to_string(),
        "acct-1".to_string(),
        "https://example.com/landing".to_string(),
    )
}

#[tokio::test]
async fn test_payload_reaches_registered_endpoint() {
    let (addr, rx) = serve_script_capturing(vec![ok_response()]);
    let store = Arc::new(MemoryStore::new());
    account_with_endpoints(&store, "acct-1", vec![format!("http://{}/hook", addr)]).await;

    let notifier = WebhookNotifier::new(store, &fast_config());
    notifier
        .notify("acct-1", WebhookEventKind::LinkClicked, &sample_link())
        .await;

    let request = rx.recv_timeout(Duration::from_secs(5)).expect("delivery");
    assert!(request.starts_with("POST /hook"));
    assert!(request.contains("\"event\":\"link_clicked\""));
    assert!(request.contains("\"userId\":\"acct-1\""));
    assert!(request.contains("\"code\":\"abc123\""));
    assert!(request.contains("\"timestamp\""));
}

/// 一个端点挂了，另一个端点照常收到
#[tokio::test]
async fn test_failing_endpoint_does_not_affect_others() {
    let (good_addr, rx) = serve_script_capturing(vec![ok_response()]);
    let dead_addr = unused_addr();

    let store = Arc::new(MemoryStore::new());
    // 故意把坏端点放在前面
    account_with_endpoints(
        &store,
        "acct-1",
        vec![
            format!("http://{}/hook", dead_addr),
            format!("http://{}/hook", good_addr),
        ],
    )
    .await;

    let notifier = WebhookNotifier::new(store, &fast_config());
    notifier
        .notify("acct-1", WebhookEventKind::LinkCreated, &sample_link())
        .await;

    let request = rx.recv_timeout(Duration::from_secs(5)).expect("delivery");
    assert!(request.contains("\"event\":\"link_created\""));
}

#[tokio::test]
async fn test_account_without_endpoints_sends_nothing() {
    let store = Arc::new(MemoryStore::new());
    account_with_endpoints(&store, "acct-1", Vec::new()).await;

    let notifier = WebhookNotifier::new(store, &fast_config());
    // 立即返回，没有任何投递任务
    notifier
        .notify("acct-1", WebhookEventKind::LinkClicked, &sample_link())
        .await;
}

#[tokio::test]
async fn test_unknown_account_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let notifier = WebhookNotifier::new(store, &fast_config());
    notifier
        .notify("nobody", WebhookEventKind::LinkClicked, &sample_link())
        .await;
}

#[tokio::test]
async fn test_detached_notify_returns_immediately() {
    let (addr, rx) = serve_script_capturing(vec![ok_response()]);
    let store = Arc::new(MemoryStore::new());
    account_with_endpoints(&store, "acct-1", vec![format!("http://{}/hook", addr)]).await;

    let notifier = WebhookNotifier::new(store, &fast_config());
    notifier.notify_detached(
        "acct-1".to_string(),
        WebhookEventKind::LinkClicked,
        sample_link(),
    );

    // 投递在后台完成
    let request = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .expect("delivery");
    assert!(request.contains("link_clicked"));
}
