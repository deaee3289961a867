//! Minor-unit amounts: parsing, display conversion, exact unit formatting.

use rust_decimal::Decimal;

/// Parse a non-negative integer amount given as a decimal string.
pub fn parse_minor(raw: &str) -> Option<i128> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Convert a minor-unit amount into display units as a `Decimal`.
/// Fails when the amount does not fit into 96 bits or `decimals > 28`.
pub fn to_major(minor: i128, decimals: u32) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(minor, decimals).ok()
}

/// Format an integer amount string with `decimals` places, trimming
/// trailing zeros (`"1500000000000000000"`, 18 -> `"1.5"`).
///
/// Works on the digit string directly, so token amounts wider than any
/// native integer type format exactly.
pub fn format_units(raw: &str, decimals: u32) -> Option<String> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = digits.trim_start_matches('0');
    let decimals = decimals as usize;
    let padded = if digits.len() < decimals {
        format!("{}{}", "0".repeat(decimals - digits.len()), digits)
    } else {
        digits.to_string()
    };

    let split = padded.len() - decimals;
    let (integer, fraction) = padded.split_at(split);
    let integer = if integer.is_empty() { "0" } else { integer };
    let fraction = fraction.trim_end_matches('0');
    let sign = if negative && (integer != "0" || !fraction.is_empty()) {
        "-"
    } else {
        ""
    };

    if fraction.is_empty() {
        Some(format!("{sign}{integer}"))
    } else {
        Some(format!("{sign}{integer}.{fraction}"))
    }
}
