//! 短码生成与校验

use rand::RngExt;

/// 生成短码的字符集（去掉易混淆的 0/O/1/l/I）
const CODE_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 默认短码长度
pub const DEFAULT_CODE_LEN: usize = 6;

/// 生成一个随机短码
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// 校验短码语法
///
/// 非法短码在进存储之前就被拒绝，避免垃圾请求打到后端。
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 32
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
