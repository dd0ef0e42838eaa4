//! 健康巡检手动触发端点
//!
//! 周期任务之外的另一个触发入口，同一套巡检逻辑。
//! 返回逐条 {code, url, status} 结果。

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::info;

use crate::services::HealthSweeper;

pub struct SweepService;

impl SweepService {
    pub async fn trigger_sweep(sweeper: web::Data<Arc<HealthSweeper>>) -> impl Responder {
        info!("manual health sweep triggered");
        let results = sweeper.sweep().await;

        HttpResponse::Ok().json(json!({
            "checked": results.len(),
            "results": results,
        }))
    }
}
