//! 存储端口
//!
//! 核心只依赖这里定义的 trait；具体落在什么存储（内存、SQL、文档库）
//! 是外部协作方的事情。计数器更新是端口的一部分：实现方必须提供
//! 原子自增语义，而不是读-改-写。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::error;

use crate::{
    config::StorageConfig,
    errors::{Result, ShortguardError},
};

pub mod memory;
pub mod models;

pub use models::{Account, ClickEvent, GlobalStats, HealthStatus, Link};

/// 链接存储
#[async_trait::async_trait]
pub trait LinkStore: Send + Sync {
    async fn get(&self, code: &str) -> Option<Link>;
    async fn insert(&self, link: Link) -> Result<()>;
    /// 原子递增 click_count 并刷新 last_click，返回新的计数值。
    /// 并发调用同一 code 不允许丢失任何一次递增。
    async fn record_click(&self, code: &str, at: DateTime<Utc>) -> Result<u64>;
    /// 写入健康状态（并发巡检之间 last-write-wins）
    async fn set_health(&self, code: &str, status: HealthStatus) -> Result<()>;
    /// 分页枚举，供巡检使用；不假设一次调用能取回全量数据
    async fn list_page(&self, offset: usize, limit: usize) -> Result<Vec<Link>>;
    async fn count(&self) -> Result<usize>;
}

/// 账户存储（核心只增计数器、只读 webhook 端点）
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<Account>;
    async fn upsert(&self, account: Account) -> Result<()>;
    /// 原子递增 total_links
    async fn add_links(&self, id: &str, n: u64) -> Result<()>;
    /// 原子递增 total_clicks
    async fn add_clicks(&self, id: &str, n: u64) -> Result<()>;
    async fn webhook_endpoints(&self, id: &str) -> Result<Vec<String>>;
}

/// 点击事件存储（追加写）
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: ClickEvent) -> Result<()>;
    async fn events_for(&self, code: &str) -> Result<Vec<ClickEvent>>;
}

/// 全局统计（机会性更新）
#[async_trait::async_trait]
pub trait StatsStore: Send + Sync {
    async fn bump_links(&self, n: u64);
    async fn bump_clicks(&self, n: u64);
    async fn snapshot(&self) -> GlobalStats;
}

/// 按端口拆分后的存储句柄集合，便于按需注入
#[derive(Clone)]
pub struct Stores {
    pub links: Arc<dyn LinkStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub events: Arc<dyn EventStore>,
    pub stats: Arc<dyn StatsStore>,
}

pub struct StorageFactory;

impl StorageFactory {
    pub fn create(config: &StorageConfig) -> Result<Stores> {
        match config.backend.as_str() {
            "memory" => {
                let store = Arc::new(memory::MemoryStore::new());
                Ok(Stores {
                    links: store.clone(),
                    accounts: store.clone(),
                    events: store.clone(),
                    stats: store,
                })
            }
            other => {
                error!("Unknown storage backend: {}", other);
                Err(ShortguardError::persistence(format!(
                    "Unknown storage backend: {}. Supported: memory",
                    other
                )))
            }
        }
    }
}
