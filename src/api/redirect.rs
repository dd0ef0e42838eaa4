//! 短码跳转端点
//!
//! RateGuard(redirect) → 查找 → ClickRecorder → 307。
//! 点击记录内部的任何失败都不影响跳转响应。

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use tracing::{debug, trace};

use crate::api::{client_identity, rate_limited_response};
use crate::config::StaticConfig;
use crate::services::{ClickContext, ClickRecorder, RateBucket, RateGuard};
use crate::storage::LinkStore;
use crate::utils::ip::extract_client_ip;
use crate::utils::is_valid_short_code;

pub struct RedirectService;

impl RedirectService {
    /// 根路径：配置了 default_url 就跳过去，否则 404
    pub async fn handle_index(config: web::Data<Arc<StaticConfig>>) -> impl Responder {
        match config.server.default_url {
            Some(ref default_url) => HttpResponse::TemporaryRedirect()
                .insert_header(("Location", default_url.as_str()))
                .finish(),
            None => not_found_response(),
        }
    }

    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        config: web::Data<Arc<StaticConfig>>,
        links: web::Data<Arc<dyn LinkStore>>,
        rate_guard: web::Data<Arc<RateGuard>>,
        recorder: web::Data<Arc<ClickRecorder>>,
    ) -> impl Responder {
        let code = path.into_inner();

        if !is_valid_short_code(&code) {
            // 非法短码直接 404，不打存储
            trace!("Invalid short code rejected: {}", code);
            return not_found_response();
        }

        let identity = client_identity(&req, &config.server.trusted_proxies);
        if !rate_guard.allow(&identity, RateBucket::Redirect) {
            debug!("redirect rate limit hit for {}", identity);
            return rate_limited_response(&rate_guard, RateBucket::Redirect);
        }

        match links.get(&code).await {
            Some(link) if link.active => {
                let ctx = ClickContext {
                    referrer: header_string(&req, "referer"),
                    user_agent: header_string(&req, "user-agent"),
                    ip: extract_client_ip(&req, &config.server.trusted_proxies),
                    query: req.uri().query().map(String::from),
                };
                recorder.record(&link, ctx).await;

                HttpResponse::build(StatusCode::TEMPORARY_REDIRECT)
                    .insert_header(("Location", link.target.clone()))
                    .finish()
            }
            Some(_) => {
                debug!("inactive link: {}", code);
                not_found_response()
            }
            None => {
                debug!("short code not found: {}", code);
                not_found_response()
            }
        }
    }
}

fn header_string(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

fn not_found_response() -> HttpResponse {
    HttpResponse::build(StatusCode::NOT_FOUND)
        .insert_header(("Content-Type", "text/html; charset=utf-8"))
        .insert_header(("Cache-Control", "public, max-age=60")) // 缓存 404
        .body("Not Found")
}
