//! 请求限流
//!
//! 三个互不影响的桶：建链、跳转解析、认证。每个桶按客户端身份
//! （网络地址）独立计数，配额在窗口内耗尽后拒绝，由调用方返回
//! 429 和重试提示。

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::config::RateLimitConfig;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// 限流桶
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBucket {
    /// 建链：默认 10 次 / 15 分钟
    Creation,
    /// 跳转解析：默认 100 次 / 分钟
    Redirect,
    /// 认证：默认 5 次 / 15 分钟
    Auth,
}

struct Bucket {
    limiter: KeyedLimiter,
    window_secs: u64,
}

impl Bucket {
    fn new(limit: u32, window_secs: u64) -> Self {
        let limit = NonZeroU32::new(limit.max(1)).expect("limit is at least 1");
        // GCRA：突发额度 = 窗口配额，令牌按 窗口/配额 的节奏补充
        let period = Duration::from_secs_f64(window_secs.max(1) as f64 / limit.get() as f64);
        let quota = Quota::with_period(period)
            .expect("Invalid rate limit config")
            .allow_burst(limit);

        Self {
            limiter: RateLimiter::keyed(quota),
            window_secs,
        }
    }
}

/// 三桶限流器
pub struct RateGuard {
    creation: Bucket,
    redirect: Bucket,
    auth: Bucket,
}

impl RateGuard {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            creation: Bucket::new(config.creation_limit, config.creation_window_secs),
            redirect: Bucket::new(config.redirect_limit, config.redirect_window_secs),
            auth: Bucket::new(config.auth_limit, config.auth_window_secs),
        }
    }

    fn bucket(&self, bucket: RateBucket) -> &Bucket {
        match bucket {
            RateBucket::Creation => &self.creation,
            RateBucket::Redirect => &self.redirect,
            RateBucket::Auth => &self.auth,
        }
    }

    /// 指定身份在指定桶里是否还有配额
    pub fn allow(&self, identity: &str, bucket: RateBucket) -> bool {
        self.bucket(bucket)
            .limiter
            .check_key(&identity.to_string())
            .is_ok()
    }

    /// 被拒后的重试提示（秒）
    pub fn retry_hint_secs(&self, bucket: RateBucket) -> u64 {
        self.bucket(bucket).window_secs
    }
}
