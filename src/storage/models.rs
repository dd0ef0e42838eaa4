use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;

/// 目标 URL 的最近一次可达性判定
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsRefStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Broken,
    Timeout,
    RedirectLoop,
    #[default]
    Unknown,
}

/// 短链接记录
///
/// 创建后只有两组字段会被修改：
/// - click_count / last_click 由点击记录器写入
/// - health 由健康巡检写入
///
/// 两组字段不相交，因此二者之间不需要互斥。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub code: String,
    /// 所属账户（弱引用，仅用于查找）
    pub owner: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
    pub click_count: u64,
    pub last_click: Option<DateTime<Utc>>,
    pub health: HealthStatus,
    pub active: bool,
}

impl Link {
    /// 新建一条待持久化的链接记录
    pub fn new(code: String, owner: String, target: String) -> Self {
        Self {
            code,
            owner,
            target,
            created_at: Utc::now(),
            click_count: 0,
            last_click: None,
            health: HealthStatus::Unknown,
            active: true,
        }
    }
}

/// 点击事件（追加写，核心不修改、不删除）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub referrer: Option<String>,
    /// 流量来源：utm_source 参数、"ref:{domain}" 或 "direct"
    pub source: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_category: Option<String>,
    pub is_bot: bool,
    /// ISO 3166-1 alpha-2 国家代码
    pub country: Option<String>,
    pub city: Option<String>,
    pub ip_address: Option<String>,
}

impl ClickEvent {
    pub fn new(code: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            timestamp: Utc::now(),
            referrer: None,
            source: None,
            browser: None,
            os: None,
            device_category: None,
            is_bot: false,
            country: None,
            city: None,
            ip_address: None,
        }
    }
}

/// 账户记录（归属外部系统，核心只读 webhook 端点、只增计数器）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub webhook_endpoints: Vec<String>,
    pub total_links: u64,
    pub total_clicks: u64,
}

impl Account {
    pub fn new(id: String) -> Self {
        Self {
            id,
            webhook_endpoints: Vec::new(),
            total_links: 0,
            total_clicks: 0,
        }
    }
}

/// 全局聚合统计（机会性更新，允许最终一致）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_links: u64,
    pub total_clicks: u64,
}
