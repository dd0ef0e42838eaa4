//! Redirect tracer tests
//!
//! Every case runs against a local fixture server; no external network.
//! The fixture serves a scripted sequence of responses, so a "chain" is
//! one listener handing out one hop per connection.

mod common;

use std::time::Duration;

use shortguard::config::TraceConfig;
use shortguard::services::RedirectTracer;
use shortguard::storage::HealthStatus;

use common::{ok_response, redirect_to, serve_script, serve_stalled, status_response, unused_addr};

fn tracer() -> RedirectTracer {
    RedirectTracer::from_config(&TraceConfig::default())
}

fn fast_tracer(timeout_ms: u64) -> RedirectTracer {
    RedirectTracer::from_config(&TraceConfig {
        max_hops: 5,
        timeout_ms,
    })
}

// =============================================================================
// Terminal statuses
// =============================================================================

#[test]
fn test_direct_200_is_healthy() {
    let addr = serve_script(vec![ok_response()]);
    let status = tracer().trace_blocking(&format!("http://{}/page", addr));
    assert_eq!(status, HealthStatus::Healthy);
}

#[test]
fn test_404_is_broken() {
    let addr = serve_script(vec![status_response(404, "Not Found")]);
    let status = tracer().trace_blocking(&format!("http://{}/gone", addr));
    assert_eq!(status, HealthStatus::Broken);
}

#[test]
fn test_server_error_is_broken() {
    let addr = serve_script(vec![status_response(500, "Internal Server Error")]);
    let status = tracer().trace_blocking(&format!("http://{}/oops", addr));
    assert_eq!(status, HealthStatus::Broken);
}

#[test]
fn test_redirect_without_location_is_broken() {
    let addr = serve_script(vec![
        "HTTP/1.1 302 Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    ]);
    let status = tracer().trace_blocking(&format!("http://{}/nowhere", addr));
    assert_eq!(status, HealthStatus::Broken);
}

// =============================================================================
// Redirect chains
// =============================================================================

#[test]
fn test_chain_of_five_hops_ending_in_200_is_healthy() {
    // 5 次 302 + 终点 200，正好在 max_hops=5 的预算内
    let responses = vec![
        redirect_to("/hop1"),
        redirect_to("/hop2"),
        redirect_to("/hop3"),
        redirect_to("/hop4"),
        redirect_to("/hop5"),
        ok_response(),
    ];
    let addr = serve_script(responses);
    let status = tracer().trace_blocking(&format!("http://{}/start", addr));
    assert_eq!(status, HealthStatus::Healthy);
}

#[test]
fn test_relative_location_is_resolved_against_current_url() {
    let responses = vec![redirect_to("relative-page"), ok_response()];
    let addr = serve_script(responses);
    let status = tracer().trace_blocking(&format!("http://{}/dir/start", addr));
    assert_eq!(status, HealthStatus::Healthy);
}

#[test]
fn test_revisiting_a_url_is_a_redirect_loop() {
    // start -> /a -> /b -> /a：第三跳回到走过的 URL
    let responses = vec![redirect_to("/a"), redirect_to("/b"), redirect_to("/a")];
    let addr = serve_script(responses);
    let status = tracer().trace_blocking(&format!("http://{}/start", addr));
    assert_eq!(status, HealthStatus::RedirectLoop);
}

#[test]
fn test_redirect_to_self_is_a_redirect_loop() {
    let addr = serve_script(vec![redirect_to("/start")]);
    let status = tracer().trace_blocking(&format!("http://{}/start", addr));
    assert_eq!(status, HealthStatus::RedirectLoop);
}

#[test]
fn test_six_hops_without_terminal_is_a_redirect_loop() {
    // 6 次互不相同的 302，超出跳数预算
    let responses = (1..=6).map(|i| redirect_to(&format!("/r{}", i))).collect();
    let addr = serve_script(responses);
    let status = tracer().trace_blocking(&format!("http://{}/start", addr));
    assert_eq!(status, HealthStatus::RedirectLoop);
}

// =============================================================================
// Transport failures
// =============================================================================

#[test]
fn test_stalled_connection_times_out() {
    let addr = serve_stalled(Duration::from_secs(5));
    let status = fast_tracer(300).trace_blocking(&format!("http://{}/slow", addr));
    assert_eq!(status, HealthStatus::Timeout);
}

#[test]
fn test_connection_refused_is_broken() {
    let addr = unused_addr();
    let status = fast_tracer(1000).trace_blocking(&format!("http://{}/void", addr));
    assert_eq!(status, HealthStatus::Broken);
}

#[test]
fn test_malformed_stored_url_is_broken() {
    assert_eq!(
        tracer().trace_blocking("not an absolute url"),
        HealthStatus::Broken
    );
}

// =============================================================================
// Async wrapper
// =============================================================================

#[tokio::test]
async fn test_async_trace_matches_blocking_result() {
    let addr = serve_script(vec![ok_response()]);
    let status = tracer().trace(format!("http://{}/page", addr)).await;
    assert_eq!(status, HealthStatus::Healthy);
}
