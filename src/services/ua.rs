//! User-Agent 解析
//!
//! 用 woothee 把 UA 字符串解析成点击事件需要的粗粒度设备信息。
//! 解析失败不报错，字段留空。

use woothee::parser::Parser;

/// 粗粒度设备信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub category: Option<String>,
    pub is_bot: bool,
}

/// 解析 UA 字符串
pub fn parse_user_agent(ua: &str) -> DeviceInfo {
    let parser = Parser::new();
    let Some(result) = parser.parse(ua) else {
        return DeviceInfo::default();
    };

    DeviceInfo {
        browser: (result.name != "UNKNOWN").then(|| result.name.to_string()),
        os: (result.os != "UNKNOWN").then(|| result.os.to_string()),
        category: Some(result.category.to_string()),
        is_bot: result.category == "crawler",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chrome_on_windows() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let info = parse_user_agent(ua);

        assert_eq!(info.browser, Some("Chrome".to_string()));
        assert_eq!(info.os, Some("Windows 10".to_string()));
        assert_eq!(info.category, Some("pc".to_string()));
        assert!(!info.is_bot);
    }

    #[test]
    fn test_parse_iphone_safari() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        let info = parse_user_agent(ua);

        assert_eq!(info.browser, Some("Safari".to_string()));
        assert_eq!(info.category, Some("smartphone".to_string()));
        assert!(!info.is_bot);
    }

    #[test]
    fn test_parse_googlebot_flags_bot() {
        let ua = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        let info = parse_user_agent(ua);

        assert_eq!(info.category, Some("crawler".to_string()));
        assert!(info.is_bot);
    }

    #[test]
    fn test_garbage_ua_yields_empty_info() {
        let info = parse_user_agent("");
        assert!(info.browser.is_none());
        assert!(!info.is_bot);
    }
}
