//! 内存存储后端
//!
//! 默认后端，也是测试的基础设施。DashMap 的分片写锁保证
//! `record_click` / `add_clicks` 等计数器更新在条目级别是原子的，
//! 满足端口要求的"无丢失递增"语义。

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::errors::{Result, ShortguardError};
use crate::storage::{
    Account, AccountStore, ClickEvent, EventStore, GlobalStats, HealthStatus, Link, LinkStore,
    StatsStore,
};

pub struct MemoryStore {
    links: DashMap<String, Link>,
    accounts: DashMap<String, Account>,
    events: DashMap<String, Vec<ClickEvent>>,
    total_links: AtomicU64,
    total_clicks: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
            accounts: DashMap::new(),
            events: DashMap::new(),
            total_links: AtomicU64::new(0),
            total_clicks: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LinkStore for MemoryStore {
    async fn get(&self, code: &str) -> Option<Link> {
        self.links.get(code).map(|entry| entry.clone())
    }

    async fn insert(&self, link: Link) -> Result<()> {
        self.links.insert(link.code.clone(), link);
        Ok(())
    }

    async fn record_click(&self, code: &str, at: DateTime<Utc>) -> Result<u64> {
        match self.links.get_mut(code) {
            Some(mut entry) => {
                entry.click_count += 1;
                entry.last_click = Some(at);
                Ok(entry.click_count)
            }
            None => Err(ShortguardError::not_found(format!(
                "link not found: {}",
                code
            ))),
        }
    }

    async fn set_health(&self, code: &str, status: HealthStatus) -> Result<()> {
        match self.links.get_mut(code) {
            Some(mut entry) => {
                entry.health = status;
                Ok(())
            }
            None => Err(ShortguardError::not_found(format!(
                "link not found: {}",
                code
            ))),
        }
    }

    async fn list_page(&self, offset: usize, limit: usize) -> Result<Vec<Link>> {
        // 按 code 排序，保证分页扫描的顺序稳定
        let mut codes: Vec<String> = self.links.iter().map(|e| e.key().clone()).collect();
        codes.sort();

        let page = codes
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|code| self.links.get(&code).map(|e| e.clone()))
            .collect();
        Ok(page)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.links.len())
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, id: &str) -> Option<Account> {
        self.accounts.get(id).map(|entry| entry.clone())
    }

    async fn upsert(&self, account: Account) -> Result<()> {
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn add_links(&self, id: &str, n: u64) -> Result<()> {
        let mut entry = self
            .accounts
            .entry(id.to_string())
            .or_insert_with(|| Account::new(id.to_string()));
        entry.total_links += n;
        Ok(())
    }

    async fn add_clicks(&self, id: &str, n: u64) -> Result<()> {
        let mut entry = self
            .accounts
            .entry(id.to_string())
            .or_insert_with(|| Account::new(id.to_string()));
        entry.total_clicks += n;
        Ok(())
    }

    async fn webhook_endpoints(&self, id: &str) -> Result<Vec<String>> {
        Ok(self
            .accounts
            .get(id)
            .map(|entry| entry.webhook_endpoints.clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, event: ClickEvent) -> Result<()> {
        self.events
            .entry(event.code.clone())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn events_for(&self, code: &str) -> Result<Vec<ClickEvent>> {
        Ok(self
            .events
            .get(code)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl StatsStore for MemoryStore {
    async fn bump_links(&self, n: u64) {
        self.total_links.fetch_add(n, Ordering::Relaxed);
    }

    async fn bump_clicks(&self, n: u64) {
        self.total_clicks.fetch_add(n, Ordering::Relaxed);
    }

    async fn snapshot(&self) -> GlobalStats {
        GlobalStats {
            total_links: self.total_links.load(Ordering::Relaxed),
            total_clicks: self.total_clicks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample_link(code: &str) -> Link {
        Link::new(
            code.to_string(),
            "acct-1".to_string(),
            format!("https://example.com/{}", code),
        )
    }

    #[tokio::test]
    async fn test_record_click_updates_count_and_last_click() {
        let store = MemoryStore::new();
        store.insert(sample_link("abc")).await.unwrap();

        let now = Utc::now();
        assert_eq!(store.record_click("abc", now).await.unwrap(), 1);
        assert_eq!(store.record_click("abc", now).await.unwrap(), 2);

        let link = LinkStore::get(&store, "abc").await.unwrap();
        assert_eq!(link.click_count, 2);
        assert_eq!(link.last_click, Some(now));
    }

    #[tokio::test]
    async fn test_record_click_unknown_code_is_not_found() {
        let store = MemoryStore::new();
        let err = store.record_click("missing", Utc::now()).await.unwrap_err();
        assert!(matches!(err, ShortguardError::NotFound(_)));
    }

    /// 并发递增不允许丢失任何一次点击
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_record_click_loses_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert(sample_link("hot")).await.unwrap();

        const TASKS: usize = 16;
        const CLICKS_PER_TASK: usize = 250;

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..CLICKS_PER_TASK {
                    store.record_click("hot", Utc::now()).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let link = LinkStore::get(&*store, "hot").await.unwrap();
        assert_eq!(link.click_count, (TASKS * CLICKS_PER_TASK) as u64);
    }

    #[tokio::test]
    async fn test_health_and_click_fields_do_not_clobber_each_other() {
        let store = MemoryStore::new();
        store.insert(sample_link("abc")).await.unwrap();

        store.record_click("abc", Utc::now()).await.unwrap();
        store
            .set_health("abc", HealthStatus::Broken)
            .await
            .unwrap();

        let link = LinkStore::get(&store, "abc").await.unwrap();
        assert_eq!(link.click_count, 1);
        assert_eq!(link.health, HealthStatus::Broken);
    }

    #[tokio::test]
    async fn test_list_page_is_stable_and_bounded() {
        let store = MemoryStore::new();
        for code in ["c", "a", "b", "e", "d"] {
            store.insert(sample_link(code)).await.unwrap();
        }

        let first = store.list_page(0, 2).await.unwrap();
        let second = store.list_page(2, 2).await.unwrap();
        let third = store.list_page(4, 2).await.unwrap();

        let codes: Vec<&str> = first
            .iter()
            .chain(second.iter())
            .chain(third.iter())
            .map(|l| l.code.as_str())
            .collect();
        assert_eq!(codes, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_account_counters_are_created_on_demand() {
        let store = MemoryStore::new();
        store.add_clicks("acct-1", 2).await.unwrap();
        store.add_links("acct-1", 1).await.unwrap();

        let account = AccountStore::get(&store, "acct-1").await.unwrap();
        assert_eq!(account.total_clicks, 2);
        assert_eq!(account.total_links, 1);
        assert!(account.webhook_endpoints.is_empty());
    }

    #[tokio::test]
    async fn test_events_append_only() {
        let store = MemoryStore::new();
        store.append(ClickEvent::new("abc".to_string())).await.unwrap();
        store.append(ClickEvent::new("abc".to_string())).await.unwrap();

        let events = store.events_for("abc").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].id, events[1].id);
    }
}
