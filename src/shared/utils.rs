//! Utility functions and helpers

use rust_decimal::Decimal;

/// Accept `0,41` as well as `0.41`
pub fn normalize_decimal_separator(amount: &str) -> String {
    amount.replace(',', ".")
}

/// Convert an integer amount of base units (e.g. wei) into a decimal amount
pub fn from_base_units(value: &str, decimals: u32) -> Option<Decimal> {
    let units: i128 = value.trim().parse().ok()?;
    Decimal::try_from_i128_with_scale(units, decimals)
        .ok()
        .map(|amount| amount.normalize())
}

/// Shorten a response body for log and error messages
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut)
}
