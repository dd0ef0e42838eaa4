//! 外部 GeoIP API 实现
//!
//! 通过外部 HTTP API（如 ip-api.com）查询 IP 归属。
//! 内置 Moka 缓存 + Singleflight 语义，同一 IP 的并发查询只发一次请求。

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{trace, warn};
use ureq::Agent;

use super::provider::{GeoInfo, GeoIpLookup};
use crate::config::AnalyticsConfig;

/// 外部 API 请求超时
const HTTP_TIMEOUT_SECS: u64 = 2;

pub struct ExternalApiProvider {
    agent: Agent,
    api_url_template: String,
    /// IP → GeoInfo 缓存（Option 用于负缓存）
    cache: Cache<String, Option<GeoInfo>>,
}

impl ExternalApiProvider {
    /// 从配置构造：`geoip_api_url` 使用 `{ip}` 作为占位符，
    /// 例如 `http://ip-api.com/json/{ip}?fields=status,countryCode,city`
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
            .build()
            .into();

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.geoip_cache_ttl_secs))
            .max_capacity(config.geoip_cache_capacity)
            .build();

        Self {
            agent,
            api_url_template: config.geoip_api_url.clone(),
            cache,
        }
    }

    /// 同步请求外部 API（在 spawn_blocking 中调用）
    fn fetch_sync(agent: &Agent, url: String) -> Option<GeoInfo> {
        let resp = match agent.get(&url).call() {
            Ok(r) => r,
            Err(e) => {
                warn!("GeoIP API request to \"{}\" failed: {}", url, e);
                return None;
            }
        };

        let json: serde_json::Value = match resp.into_body().read_json() {
            Ok(j) => j,
            Err(e) => {
                warn!("GeoIP API response from \"{}\" parse failed: {}", url, e);
                return None;
            }
        };

        // ip-api.com 成功时返回 {"countryCode": "US", "city": "..."}，
        // 失败时返回 {"status": "fail", ...}；也兼容其他 API 的字段名
        if json["status"].as_str() == Some("fail") {
            trace!("External API returned fail status for \"{}\"", url);
            return None;
        }

        let country = json["countryCode"]
            .as_str()
            .or_else(|| json["country_code"].as_str())
            .or_else(|| json["country"].as_str())
            .map(String::from);
        let city = json["city"].as_str().map(String::from);

        Some(GeoInfo { country, city })
    }

    async fn fetch(&self, ip: &str) -> Option<GeoInfo> {
        let url = self.api_url_template.replace("{ip}", ip);
        let agent = self.agent.clone();

        tokio::task::spawn_blocking(move || Self::fetch_sync(&agent, url))
            .await
            .unwrap_or_else(|e| {
                warn!("GeoIP spawn_blocking failed: {}", e);
                None
            })
    }
}

#[async_trait]
impl GeoIpLookup for ExternalApiProvider {
    /// 查询 IP 地理位置（带缓存 + Singleflight）
    ///
    /// get_with 自带 singleflight 语义：同一 key 的并发调用只执行一次
    /// 闭包，其余调用等待同一个结果。
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let key = ip.to_string();
        self.cache
            .get_with(key, async {
                trace!("GeoIP cache miss for {}, fetching from API", ip);
                self.fetch(ip).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ExternalAPI"
    }
}
