//! 建链端点
//!
//! RateGuard(creation) → SafetyClassifier → 持久化 → link_created webhook。
//! 安全规则命中时返回完整警告集合，供前端展示。

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::api::{client_identity, rate_limited_response};
use crate::config::StaticConfig;
use crate::errors::ShortguardError;
use crate::services::{RateBucket, RateGuard, SafetyClassifier, WebhookEventKind, WebhookNotifier};
use crate::storage::{AccountStore, Link, LinkStore, StatsStore};
use crate::utils::{DEFAULT_CODE_LEN, generate_code};

/// 匿名建链归属的账户
const ANONYMOUS_ACCOUNT: &str = "anonymous";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub original_url: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

pub struct LinkService;

impl LinkService {
    #[allow(clippy::too_many_arguments)]
    pub async fn create_link(
        req: HttpRequest,
        body: web::Json<CreateLinkRequest>,
        config: web::Data<Arc<StaticConfig>>,
        links: web::Data<Arc<dyn LinkStore>>,
        accounts: web::Data<Arc<dyn AccountStore>>,
        stats: web::Data<Arc<dyn StatsStore>>,
        classifier: web::Data<Arc<SafetyClassifier>>,
        rate_guard: web::Data<Arc<RateGuard>>,
        notifier: web::Data<WebhookNotifier>,
    ) -> impl Responder {
        let identity = client_identity(&req, &config.server.trusted_proxies);
        if !rate_guard.allow(&identity, RateBucket::Creation) {
            debug!("creation rate limit hit for {}", identity);
            return rate_limited_response(&rate_guard, RateBucket::Creation);
        }

        let classification = classifier.classify(&body.original_url);
        if !classification.is_accepted() {
            let err = ShortguardError::policy_rejection("Destination URL rejected by safety policy");
            warn!(
                "{}: {} ({:?})",
                err.format_simple(),
                body.original_url,
                classification.warnings
            );
            return HttpResponse::UnprocessableEntity().json(json!({
                "success": false,
                "message": err.message(),
                "suspicious": true,
                "warnings": classification.warnings,
            }));
        }

        let code = match allocate_code(links.get_ref().as_ref()).await {
            Some(code) => code,
            None => {
                error!("short code allocation failed, namespace saturated?");
                return HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "message": "Failed to allocate short code",
                }));
            }
        };

        let owner = body
            .account_id
            .clone()
            .unwrap_or_else(|| ANONYMOUS_ACCOUNT.to_string());
        let link = Link::new(code, owner.clone(), body.original_url.trim().to_string());

        if let Err(e) = links.insert(link.clone()).await {
            error!("failed to persist link {}: {}", link.code, e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Failed to persist link",
            }));
        }

        // 聚合计数机会性更新，失败不影响建链结果
        if let Err(e) = accounts.add_links(&owner, 1).await {
            debug!("account link counter for {} not updated: {}", owner, e);
        }
        stats.bump_links(1).await;

        notifier.notify_detached(owner, WebhookEventKind::LinkCreated, link.clone());

        info!("link {} created -> {}", link.code, link.target);
        HttpResponse::Created().json(json!({
            "success": true,
            "link": link,
        }))
    }
}

/// 分配一个未占用的短码：先试短的，撞车就换，多次不中再加长
async fn allocate_code(links: &dyn LinkStore) -> Option<String> {
    for _ in 0..5 {
        let code = generate_code(DEFAULT_CODE_LEN);
        if links.get(&code).await.is_none() {
            return Some(code);
        }
    }
    for _ in 0..5 {
        let code = generate_code(DEFAULT_CODE_LEN + 4);
        if links.get(&code).await.is_none() {
            return Some(code);
        }
    }
    None
}
