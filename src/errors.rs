use std::fmt;

#[derive(Debug, Clone)]
pub enum ShortguardError {
    Validation(String),
    PolicyRejection(String),
    RateLimited(String),
    Transport(String),
    NotFound(String),
    Persistence(String),
}

impl ShortguardError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortguardError::Validation(_) => "E001",
            ShortguardError::PolicyRejection(_) => "E002",
            ShortguardError::RateLimited(_) => "E003",
            ShortguardError::Transport(_) => "E004",
            ShortguardError::NotFound(_) => "E005",
            ShortguardError::Persistence(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortguardError::Validation(_) => "Validation Error",
            ShortguardError::PolicyRejection(_) => "Policy Rejection",
            ShortguardError::RateLimited(_) => "Rate Limited",
            ShortguardError::Transport(_) => "Transport Error",
            ShortguardError::NotFound(_) => "Resource Not Found",
            ShortguardError::Persistence(_) => "Persistence Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortguardError::Validation(msg) => msg,
            ShortguardError::PolicyRejection(msg) => msg,
            ShortguardError::RateLimited(msg) => msg,
            ShortguardError::Transport(msg) => msg,
            ShortguardError::NotFound(msg) => msg,
            ShortguardError::Persistence(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortguardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 默认使用简洁格式
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortguardError {}

// 便捷的构造函数
impl ShortguardError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortguardError::Validation(msg.into())
    }

    pub fn policy_rejection<T: Into<String>>(msg: T) -> Self {
        ShortguardError::PolicyRejection(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        ShortguardError::RateLimited(msg.into())
    }

    pub fn transport<T: Into<String>>(msg: T) -> Self {
        ShortguardError::Transport(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortguardError::NotFound(msg.into())
    }

    pub fn persistence<T: Into<String>>(msg: T) -> Self {
        ShortguardError::Persistence(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<url::ParseError> for ShortguardError {
    fn from(err: url::ParseError) -> Self {
        ShortguardError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for ShortguardError {
    fn from(err: std::io::Error) -> Self {
        ShortguardError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ShortguardError {
    fn from(err: serde_json::Error) -> Self {
        ShortguardError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortguardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ShortguardError::validation("x").code(), "E001");
        assert_eq!(ShortguardError::policy_rejection("x").code(), "E002");
        assert_eq!(ShortguardError::rate_limited("x").code(), "E003");
        assert_eq!(ShortguardError::transport("x").code(), "E004");
        assert_eq!(ShortguardError::not_found("x").code(), "E005");
        assert_eq!(ShortguardError::persistence("x").code(), "E006");
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = ShortguardError::not_found("no such code: abc123");
        assert_eq!(
            err.to_string(),
            "Resource Not Found: no such code: abc123"
        );
    }

    #[test]
    fn test_from_url_parse_error() {
        let err: ShortguardError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ShortguardError::Validation(_)));
    }
}
