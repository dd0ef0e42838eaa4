//! HTTP 服务层
//!
//! 路由按职责分组：
//! - `/api` 建链与巡检触发
//! - `/health` 服务自身探活
//! - `/{code}` 短码跳转（最后注册）

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Scope, web};
use serde_json::json;

use crate::config::StaticConfig;
use crate::errors::ShortguardError;
use crate::services::{
    ClickRecorder, HealthSweeper, RateBucket, RateGuard, SafetyClassifier, WebhookNotifier,
};
use crate::storage::{AccountStore, LinkStore, StatsStore};
use crate::utils::ip::extract_client_ip;

pub mod links;
pub mod probes;
pub mod redirect;
pub mod sweep;

pub use probes::AppStartTime;

/// 装配好的应用组件，App 工厂和测试共用同一份接线
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<StaticConfig>,
    pub links: Arc<dyn LinkStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub stats: Arc<dyn StatsStore>,
    pub classifier: Arc<SafetyClassifier>,
    pub rate_guard: Arc<RateGuard>,
    pub recorder: Arc<ClickRecorder>,
    pub sweeper: Arc<HealthSweeper>,
    pub notifier: WebhookNotifier,
    pub app_start_time: AppStartTime,
}

impl AppContext {
    /// 注入组件并挂载全部路由
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.links.clone()))
            .app_data(web::Data::new(self.accounts.clone()))
            .app_data(web::Data::new(self.stats.clone()))
            .app_data(web::Data::new(self.classifier.clone()))
            .app_data(web::Data::new(self.rate_guard.clone()))
            .app_data(web::Data::new(self.recorder.clone()))
            .app_data(web::Data::new(self.sweeper.clone()))
            .app_data(web::Data::new(self.notifier.clone()))
            .app_data(web::Data::new(self.app_start_time.clone()))
            .service(api_routes())
            .service(health_routes())
            .service(redirect_routes());
    }
}

/// `/api` 下的管理端点
pub fn api_routes() -> Scope {
    web::scope("/api")
        .route("/links", web::post().to(links::LinkService::create_link))
        .route(
            "/health/sweep",
            web::post().to(sweep::SweepService::trigger_sweep),
        )
}

/// 服务探活端点
pub fn health_routes() -> Scope {
    web::scope("/health")
        .route("", web::get().to(probes::ProbeService::health_check))
        .route("", web::head().to(probes::ProbeService::health_check))
        .route("/ready", web::get().to(probes::ProbeService::readiness_check))
        .route("/live", web::get().to(probes::ProbeService::liveness_check))
}

/// 短码跳转路由（通配，必须最后注册）
pub fn redirect_routes() -> Scope {
    web::scope("")
        .route("/", web::get().to(redirect::RedirectService::handle_index))
        .route(
            "/{code}",
            web::get().to(redirect::RedirectService::handle_redirect),
        )
        .route(
            "/{code}",
            web::head().to(redirect::RedirectService::handle_redirect),
        )
}

/// 限流的客户端身份：网络地址，取不到时归入 "unknown" 桶
pub(crate) fn client_identity(req: &HttpRequest, trusted_proxies: &[String]) -> String {
    extract_client_ip(req, trusted_proxies).unwrap_or_else(|| "unknown".to_string())
}

/// 429 响应，带重试提示
pub(crate) fn rate_limited_response(guard: &RateGuard, bucket: RateBucket) -> HttpResponse {
    let retry_after = guard.retry_hint_secs(bucket);
    let err = ShortguardError::rate_limited("Rate limit exceeded, try again later");
    HttpResponse::TooManyRequests()
        .insert_header(("Retry-After", retry_after.to_string()))
        .json(json!({
            "success": false,
            "message": err.message(),
            "retryAfterSecs": retry_after,
        }))
}
