//! 静态配置模块
//!
//! 从 TOML 文件和环境变量加载配置，启动后只读。
//! 优先级：ENV > config.toml > 默认值
//! ENV 前缀：SG，分隔符：__
//! 示例：SG__SERVER__PORT=9999

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

static CONFIG: OnceLock<Arc<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .clone()
}

/// Initialize the global configuration
///
/// Loads configuration from "config.toml" in the current directory.
/// If the file doesn't exist, uses in-memory defaults.
pub fn init_config() -> Arc<StaticConfig> {
    CONFIG.get_or_init(|| Arc::new(StaticConfig::load())).clone()
}

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、可信代理
/// - logging: 日志配置
/// - storage: 存储后端选择
/// - safety: 目标 URL 安全规则
/// - trace: 重定向链跟踪参数
/// - sweep: 链接健康巡检参数
/// - rate_limit: 各请求桶的限流窗口
/// - webhook: 出站 webhook 投递参数
/// - analytics: 点击分析与 GeoIP 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl StaticConfig {
    pub fn load() -> Self {
        use config::{Config, Environment, File};

        let path = "config.toml";

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 SG，分隔符 __
            .add_source(
                Environment::with_prefix("SG")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 可信反向代理（单 IP 或 CIDR），来自这些地址的连接使用 X-Forwarded-For
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// 访问根路径时跳转的默认 URL（未配置则返回 404）
    #[serde(default)]
    pub default_url: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 存储后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

/// 目标 URL 安全规则配置
///
/// 内置规则表只是起点；部署方可以通过这里追加自己的模式，
/// 规则追加不需要改动任何匹配代码。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyConfig {
    /// 追加的可疑域名模式（host 后缀匹配）
    #[serde(default)]
    pub extra_domain_patterns: Vec<String>,
    /// 追加的钓鱼关键词组合（两个关键词同时出现才算命中）
    #[serde(default)]
    pub extra_keyword_combos: Vec<(String, String)>,
}

/// 重定向链跟踪配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// 单次跟踪最多跟随的跳转次数
    #[serde(default = "default_trace_max_hops")]
    pub max_hops: usize,
    /// 单个请求的超时（毫秒）
    #[serde(default = "default_trace_timeout_ms")]
    pub timeout_ms: u64,
}

/// 链接健康巡检配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// 是否启动周期巡检后台任务（手动触发端点不受影响）
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// 并发跟踪上限，避免压垮目标站点或存储写入
    #[serde(default = "default_sweep_concurrency")]
    pub concurrency: usize,
    /// 分页扫描的页大小
    #[serde(default = "default_sweep_page_size")]
    pub page_size: usize,
}

/// 限流配置（三个独立的桶）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_creation_limit")]
    pub creation_limit: u32,
    #[serde(default = "default_creation_window_secs")]
    pub creation_window_secs: u64,
    #[serde(default = "default_redirect_limit")]
    pub redirect_limit: u32,
    #[serde(default = "default_redirect_window_secs")]
    pub redirect_window_secs: u64,
    #[serde(default = "default_auth_limit")]
    pub auth_limit: u32,
    #[serde(default = "default_auth_window_secs")]
    pub auth_window_secs: u64,
}

/// Webhook 投递配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// 单次投递超时（秒）
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
    /// 全局并发投递上限
    #[serde(default = "default_webhook_max_concurrent")]
    pub max_concurrent: usize,
}

/// 分析统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// 是否对点击事件做 GeoIP 查询
    #[serde(default)]
    pub enable_geo_lookup: bool,
    /// 是否在点击事件里记录客户端 IP
    #[serde(default = "default_enable_ip_logging")]
    pub enable_ip_logging: bool,
    /// MaxMindDB 文件路径 (GeoLite2-City.mmdb)
    /// 如果配置且文件可读，使用本地解析；否则 fallback 到外部 API
    #[serde(default)]
    pub maxminddb_path: Option<String>,
    /// 外部 GeoIP API URL (fallback)，使用 {ip} 作为占位符
    #[serde(default = "default_geoip_api_url")]
    pub geoip_api_url: String,
    #[serde(default = "default_geoip_cache_ttl_secs")]
    pub geoip_cache_ttl_secs: u64,
    #[serde(default = "default_geoip_cache_capacity")]
    pub geoip_cache_capacity: u64,
    /// 单次 GeoIP 查询超时（毫秒），超时的事件字段记为 unknown
    #[serde(default = "default_geoip_timeout_ms")]
    pub geoip_timeout_ms: u64,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_trace_max_hops() -> usize {
    5
}

fn default_trace_timeout_ms() -> u64 {
    7000
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_sweep_concurrency() -> usize {
    4
}

fn default_sweep_page_size() -> usize {
    100
}

fn default_creation_limit() -> u32 {
    10
}

fn default_creation_window_secs() -> u64 {
    15 * 60
}

fn default_redirect_limit() -> u32 {
    100
}

fn default_redirect_window_secs() -> u64 {
    60
}

fn default_auth_limit() -> u32 {
    5
}

fn default_auth_window_secs() -> u64 {
    15 * 60
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

fn default_webhook_max_concurrent() -> usize {
    8
}

fn default_enable_ip_logging() -> bool {
    true
}

fn default_geoip_api_url() -> String {
    "http://ip-api.com/json/{ip}?fields=status,countryCode,city".to_string()
}

fn default_geoip_cache_ttl_secs() -> u64 {
    15 * 60
}

fn default_geoip_cache_capacity() -> u64 {
    10_000
}

fn default_geoip_timeout_ms() -> u64 {
    2000
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            trusted_proxies: Vec::new(),
            default_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: default_trace_max_hops(),
            timeout_ms: default_trace_timeout_ms(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval_secs(),
            concurrency: default_sweep_concurrency(),
            page_size: default_sweep_page_size(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            creation_limit: default_creation_limit(),
            creation_window_secs: default_creation_window_secs(),
            redirect_limit: default_redirect_limit(),
            redirect_window_secs: default_redirect_window_secs(),
            auth_limit: default_auth_limit(),
            auth_window_secs: default_auth_window_secs(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
            max_concurrent: default_webhook_max_concurrent(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enable_geo_lookup: false,
            enable_ip_logging: default_enable_ip_logging(),
            maxminddb_path: None,
            geoip_api_url: default_geoip_api_url(),
            geoip_cache_ttl_secs: default_geoip_cache_ttl_secs(),
            geoip_cache_capacity: default_geoip_cache_capacity(),
            geoip_timeout_ms: default_geoip_timeout_ms(),
        }
    }
}
