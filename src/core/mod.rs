pub mod config;
pub mod error;
pub mod map;
pub mod symbols;
pub mod trace;

pub type Address = u64;

/// Parses a base-16 address with an optional 0x prefix.
/// Unlike from_str_radix alone this rejects signs and empty input.
pub fn parse_hex(text: &str) -> Option<Address> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Address::from_str_radix(digits, 16).ok()
}
