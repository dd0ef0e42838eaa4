//! 目标 URL 安全分类器
//!
//! 在创建短链接之前对目标 URL 做纯规则判定，不做任何网络访问。
//! 规则是一张声明式的 (模式, 标签) 表：全部规则都会执行（不短路），
//! 这样调用方能拿到完整的警告集合用于展示；命中任何规则即拒绝。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use url::Url;

use crate::config::SafetyConfig;

/// 安全警告标签
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WarningTag {
    /// 不是语法合法的绝对 URL
    Malformed,
    /// javascript: / data: / file: 等危险协议
    DangerousScheme,
    /// 合法 URL 但不是 http(s)，无法作为跳转目标
    UnsupportedScheme,
    /// 已知短链域名或常被滥用的免费 TLD
    SuspiciousDomain,
    /// 钓鱼关键词组合
    Phishing,
    /// 明文 HTTP 跳转目标（loopback 除外）
    HttpRedirect,
}

/// 分类结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject,
}

/// 分类结果：结论 + 完整警告集合
#[derive(Debug, Clone)]
pub struct Classification {
    pub verdict: Verdict,
    pub warnings: BTreeSet<WarningTag>,
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}

/// 危险协议（来自浏览器 XSS 载体清单）
const DANGEROUS_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript", "about", "blob"];

/// 内置可疑域名：公共短链服务（短链套短链通常用于隐藏真实目标）
const SHORTENER_DOMAINS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "t.co",
    "is.gd",
    "ow.ly",
    "cutt.ly",
    "rb.gy",
    "shorturl.at",
];

/// 常被滥用的免费 TLD
const ABUSED_FREE_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf", ".gq"];

/// 钓鱼关键词组合：两个关键词同时出现在 URL 中才算命中
const PHISHING_COMBOS: &[(&str, &str)] = &[
    ("login", "verify"),
    ("signin", "verify"),
    ("account", "update"),
    ("account", "suspend"),
    ("security", "update"),
    ("security", "alert"),
    ("password", "reset"),
    ("bank", "confirm"),
];

/// URL 安全分类器
///
/// 规则表在构造时从内置表 + 配置追加项编译一次，之后 `classify`
/// 是纯函数：同一规则表下同一输入永远得到同一结果。
pub struct SafetyClassifier {
    /// (host 模式, 标签)，以 '.' 开头的模式做后缀匹配，否则做域名匹配
    domain_rules: Vec<(String, WarningTag)>,
    /// 钓鱼关键词组合
    keyword_combos: Vec<(String, String)>,
}

impl SafetyClassifier {
    pub fn from_config(config: &SafetyConfig) -> Self {
        let mut domain_rules: Vec<(String, WarningTag)> = SHORTENER_DOMAINS
            .iter()
            .map(|d| (d.to_string(), WarningTag::SuspiciousDomain))
            .chain(
                ABUSED_FREE_TLDS
                    .iter()
                    .map(|t| (t.to_string(), WarningTag::SuspiciousDomain)),
            )
            .collect();
        domain_rules.extend(
            config
                .extra_domain_patterns
                .iter()
                .map(|p| (p.to_lowercase(), WarningTag::SuspiciousDomain)),
        );

        let mut keyword_combos: Vec<(String, String)> = PHISHING_COMBOS
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        keyword_combos.extend(
            config
                .extra_keyword_combos
                .iter()
                .map(|(a, b)| (a.to_lowercase(), b.to_lowercase())),
        );

        Self {
            domain_rules,
            keyword_combos,
        }
    }

    /// 对目标 URL 做分类
    ///
    /// 非法的绝对 URL 直接拒绝并带 `malformed` 标签；其余情况下
    /// 所有规则都会执行，警告集合非空即拒绝。
    pub fn classify(&self, raw_url: &str) -> Classification {
        let trimmed = raw_url.trim();

        let Ok(parsed) = Url::parse(trimmed) else {
            let mut warnings = BTreeSet::new();
            warnings.insert(WarningTag::Malformed);
            return Classification {
                verdict: Verdict::Reject,
                warnings,
            };
        };

        let mut warnings = BTreeSet::new();

        // 协议规则
        let scheme = parsed.scheme().to_ascii_lowercase();
        if DANGEROUS_SCHEMES.contains(&scheme.as_str()) {
            warnings.insert(WarningTag::DangerousScheme);
        } else if scheme != "http" && scheme != "https" {
            warnings.insert(WarningTag::UnsupportedScheme);
        }

        // 明文 HTTP（loopback 目标豁免，方便本地联调）
        if scheme == "http" && !is_loopback_host(&parsed) {
            warnings.insert(WarningTag::HttpRedirect);
        }

        // 域名规则
        let host = parsed
            .host_str()
            .map(|h| h.to_ascii_lowercase())
            .unwrap_or_default();
        for (pattern, tag) in &self.domain_rules {
            if host_matches(&host, pattern) {
                warnings.insert(*tag);
            }
        }

        // 钓鱼关键词组合（对整个 URL 匹配，大小写不敏感）
        let lowered = trimmed.to_lowercase();
        for (first, second) in &self.keyword_combos {
            if lowered.contains(first.as_str()) && lowered.contains(second.as_str()) {
                warnings.insert(WarningTag::Phishing);
            }
        }

        let verdict = if warnings.is_empty() {
            Verdict::Accept
        } else {
            Verdict::Reject
        };
        Classification { verdict, warnings }
    }
}

/// host 是否命中模式：'.tk' 做后缀匹配，'bit.ly' 匹配自身及其子域
fn host_matches(host: &str, pattern: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    if let Some(suffix) = pattern.strip_prefix('.') {
        host.ends_with(pattern) && host.len() > pattern.len() && host != suffix
    } else {
        host == pattern || host.ends_with(&format!(".{}", pattern))
    }
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
