//! GeoIP 服务模块
//!
//! 点击事件的粗粒度地理归属，支持：
//! - MaxMind GeoLite2 本地数据库
//! - 外部 API fallback (ip-api.com)
//!
//! 查询失败或超时只会让事件字段记为 unknown，不影响点击记录本身。

mod external_api;
mod maxmind;
mod provider;

pub use provider::{GeoInfo, GeoIpLookup, GeoIpProvider};
