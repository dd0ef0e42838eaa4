//! 点击记录器
//!
//! 每成功解析一次短码调用一次。职责：
//! 1. 原子递增链接的 click_count / last_click（存储端口保证无丢失）
//! 2. 递增所属账户与全局的聚合计数（机会性，允许最终一致）
//! 3. 追加一条点击事件：UA 解析、流量来源推导、GeoIP（尽力而为，
//!    查询失败或超时时相关字段记为 unknown，事件不丢）
//! 4. 异步触发 link_clicked webhook（发射后不管）
//!
//! 持久化失败重试一次，仍失败只记日志——跳转响应优先于分析完整性。

use std::borrow::Cow;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::services::geoip::GeoIpProvider;
use crate::services::ua::parse_user_agent;
use crate::services::webhook::{WebhookEventKind, WebhookNotifier};
use crate::storage::{AccountStore, ClickEvent, EventStore, Link, LinkStore, StatsStore};
use crate::utils::ip::is_private_or_local;

/// 单次点击的请求上下文（从 HTTP 请求同步提取的原始字符串）
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub query: Option<String>,
}

pub struct ClickRecorder {
    links: Arc<dyn LinkStore>,
    accounts: Arc<dyn AccountStore>,
    events: Arc<dyn EventStore>,
    stats: Arc<dyn StatsStore>,
    geoip: Option<Arc<GeoIpProvider>>,
    notifier: WebhookNotifier,
    geoip_timeout: Duration,
    record_ip: bool,
}

impl ClickRecorder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        links: Arc<dyn LinkStore>,
        accounts: Arc<dyn AccountStore>,
        events: Arc<dyn EventStore>,
        stats: Arc<dyn StatsStore>,
        geoip: Option<Arc<GeoIpProvider>>,
        notifier: WebhookNotifier,
        geoip_timeout: Duration,
        record_ip: bool,
    ) -> Self {
        Self {
            links,
            accounts,
            events,
            stats,
            geoip,
            notifier,
            geoip_timeout,
            record_ip,
        }
    }

    /// 记录一次点击
    ///
    /// 任何内部失败都不会向调用方传播——跳转必须成功。
    pub async fn record(&self, link: &Link, ctx: ClickContext) {
        let now = Utc::now();

        // 1. 链接计数（原子端口；失败重试一次）
        if let Err(first) = self.links.record_click(&link.code, now).await {
            warn!(
                "click count update for {} failed: {}, retrying once",
                link.code, first
            );
            if let Err(second) = self.links.record_click(&link.code, now).await {
                error!(
                    "click count update for {} failed after retry: {}",
                    link.code, second
                );
            }
        }

        // 2. 账户与全局聚合
        if let Err(e) = self.accounts.add_clicks(&link.owner, 1).await {
            debug!("account click counter for {} not updated: {}", link.owner, e);
        }
        self.stats.bump_clicks(1).await;

        // 3. 点击事件
        let event = self.build_event(link, &ctx, now).await;
        if let Err(first) = self.events.append(event.clone()).await {
            warn!("click event append failed: {}, retrying once", first);
            if let Err(second) = self.events.append(event).await {
                error!("click event append failed after retry: {}", second);
            }
        }

        // 4. webhook 扇出，不等待
        self.notifier.notify_detached(
            link.owner.clone(),
            WebhookEventKind::LinkClicked,
            link.clone(),
        );
    }

    async fn build_event(
        &self,
        link: &Link,
        ctx: &ClickContext,
        now: chrono::DateTime<Utc>,
    ) -> ClickEvent {
        let mut event = ClickEvent::new(link.code.clone());
        event.timestamp = now;
        event.referrer = ctx.referrer.clone();
        event.source = derive_source(&ctx.query, &ctx.referrer);

        if let Some(ref ua) = ctx.user_agent {
            let device = parse_user_agent(ua);
            event.browser = device.browser;
            event.os = device.os;
            event.device_category = device.category;
            event.is_bot = device.is_bot;
        }

        if self.record_ip {
            event.ip_address = ctx.ip.clone();
        }

        // GeoIP：仅对公网 IP 查询，带独立超时，失败字段留空
        if let Some(ref geoip) = self.geoip
            && let Some(ref ip_str) = ctx.ip
            && let Ok(ip_addr) = ip_str.parse::<IpAddr>()
            && !is_private_or_local(&ip_addr)
        {
            match tokio::time::timeout(self.geoip_timeout, geoip.lookup(ip_str)).await {
                Ok(Some(geo)) => {
                    event.country = geo.country;
                    event.city = geo.city;
                }
                Ok(None) => {}
                Err(_) => debug!("geoip lookup for {} timed out", ip_str),
            }
        }

        event
    }
}

/// 推导流量来源：utm_source 参数 > "ref:{referrer 域名}" > "direct"
fn derive_source(query: &Option<String>, referrer: &Option<String>) -> Option<String> {
    if let Some(query) = query
        && let Some(utm_source) = extract_query_param(query, "utm_source")
    {
        return Some(utm_source.into_owned());
    }

    if let Some(referrer_url) = referrer
        && let Some(domain) = extract_domain(referrer_url)
    {
        return Some(format!("ref:{}", domain));
    }

    Some("direct".to_string())
}

/// 从 query string 提取指定参数值
fn extract_query_param<'a>(query: &'a str, key: &str) -> Option<Cow<'a, str>> {
    for part in query.split('&') {
        if let Some(value) = part.strip_prefix(key).and_then(|s| s.strip_prefix('=')) {
            // urlencoding::decode 返回 Cow，未编码时零分配
            return urlencoding::decode(value).ok();
        }
    }
    None
}

/// 从 URL 提取域名
fn extract_domain(url: &str) -> Option<&str> {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    without_scheme
        .split(&['/', ':', '?', '#'][..])
        .next()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_source_prefers_utm() {
        let query = Some("utm_source=newsletter&utm_medium=email".to_string());
        let referrer = Some("https://t.co/xyz".to_string());
        assert_eq!(
            derive_source(&query, &referrer),
            Some("newsletter".to_string())
        );
    }

    #[test]
    fn test_derive_source_falls_back_to_referrer_domain() {
        let referrer = Some("https://news.ycombinator.com/item?id=1".to_string());
        assert_eq!(
            derive_source(&None, &referrer),
            Some("ref:news.ycombinator.com".to_string())
        );
    }

    #[test]
    fn test_derive_source_defaults_to_direct() {
        assert_eq!(derive_source(&None, &None), Some("direct".to_string()));
    }

    #[test]
    fn test_extract_query_param_decodes() {
        assert_eq!(
            extract_query_param("utm_source=my%20campaign", "utm_source"),
            Some(Cow::from("my campaign"))
        );
        assert_eq!(extract_query_param("other=1", "utm_source"), None);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://example.com/path"),
            Some("example.com")
        );
        assert_eq!(
            extract_domain("http://example.com:8080/x"),
            Some("example.com")
        );
        assert_eq!(extract_domain("https://"), None);
    }
}
