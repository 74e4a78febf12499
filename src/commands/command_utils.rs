use std::str::FromStr;

use crate::resp::RespValue;

/// Parses an ASCII decimal argument.
pub fn parse_number<T: FromStr>(argument: &[u8]) -> Option<T> {
    std::str::from_utf8(argument).ok()?.parse::<T>().ok()
}

pub fn is_keyword(argument: &[u8], keyword: &str) -> bool {
    argument.eq_ignore_ascii_case(keyword.as_bytes())
}

pub fn ok_response() -> RespValue {
    RespValue::SimpleString("OK".to_string())
}
