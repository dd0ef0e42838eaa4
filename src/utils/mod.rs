pub mod ip;
pub mod short_code;

pub use short_code::{generate_code, is_valid_short_code, DEFAULT_CODE_LEN};
