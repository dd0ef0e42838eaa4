use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, middleware::Compress, web};
use tokio::sync::watch;
use tracing::{info, warn};

use shortguard::api::{AppContext, AppStartTime};
use shortguard::config;
use shortguard::services::{
    ClickRecorder, HealthSweeper, RateGuard, RedirectTracer, SafetyClassifier, WebhookNotifier,
};
use shortguard::services::geoip::GeoIpProvider;
use shortguard::storage::StorageFactory;
use shortguard::system::logging::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 记录程序启动时间
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    dotenvy::dotenv().ok();
    let config = config::init_config();
    let _log_guard = init_logging(&config.logging);

    // 存储与核心组件装配
    let stores = StorageFactory::create(&config.storage)?;
    let classifier = Arc::new(SafetyClassifier::from_config(&config.safety));
    let rate_guard = Arc::new(RateGuard::from_config(&config.rate_limit));
    let tracer = Arc::new(RedirectTracer::from_config(&config.trace));
    let geoip = GeoIpProvider::from_config(&config.analytics).map(Arc::new);
    let notifier = WebhookNotifier::new(stores.accounts.clone(), &config.webhook);
    let recorder = Arc::new(ClickRecorder::new(
        stores.links.clone(),
        stores.accounts.clone(),
        stores.events.clone(),
        stores.stats.clone(),
        geoip,
        notifier.clone(),
        Duration::from_millis(config.analytics.geoip_timeout_ms),
        config.analytics.enable_ip_logging,
    ));
    let sweeper = Arc::new(HealthSweeper::new(
        stores.links.clone(),
        tracer,
        &config.sweep,
    ));

    // 周期巡检后台任务
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_task = if config.sweep.enabled {
        let sweeper = Arc::clone(&sweeper);
        let interval = Duration::from_secs(config.sweep.interval_secs);
        Some(tokio::spawn(sweeper.run_periodic(interval, shutdown_rx)))
    } else {
        info!("periodic health sweep disabled");
        None
    };

    let context = AppContext {
        config: config.clone(),
        links: stores.links.clone(),
        accounts: stores.accounts.clone(),
        stats: stores.stats.clone(),
        classifier,
        rate_guard,
        recorder,
        sweeper,
        notifier,
        app_start_time,
    };

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let cpu_count = config.server.cpu_count.min(32);
    info!(
        "Starting server at http://{} ({} workers)",
        bind_address, cpu_count
    );

    let server = HttpServer::new(move || {
        let context = context.clone();
        App::new()
            .wrap(Compress::default())
            .app_data(web::PayloadConfig::new(64 * 1024))
            .configure(|cfg| context.configure(cfg))
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .workers(cpu_count)
    .bind(&bind_address)?
    .run();

    // 等待服务结束或关闭信号
    tokio::select! {
        res = server => {
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Shutdown signal received");
        }
    }

    // 通知后台任务收尾
    let _ = shutdown_tx.send(true);
    if let Some(task) = sweep_task {
        let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
    }
    info!("Shutdown complete");

    Ok(())
}
