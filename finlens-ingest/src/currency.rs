//! Currency symbol detection and amount formatting for display

use finlens_core::Transaction;

const DEFAULT_SYMBOL: &str = "₹";

/// Symbol for a set of transactions, from the first one that names a currency.
/// Single characters are taken as symbols; known codes map to theirs; anything
/// else falls back to the rupee.
pub fn currency_symbol(txns: &[Transaction]) -> String {
    let Some(raw) = txns.iter().find_map(|t| t.currency.as_deref()) else {
        return DEFAULT_SYMBOL.to_string();
    };
    let raw = raw.trim();
    if raw.chars().count() == 1 {
        return raw.to_string();
    }
    match raw.to_ascii_uppercase().as_str() {
        "INR" => "₹",
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        _ => DEFAULT_SYMBOL,
    }
    .to_string()
}

/// `₹1,234.50` style rendering with two decimals
pub fn format_currency(amount: f64, symbol: &str) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{symbol}{grouped}.{frac}")
}
