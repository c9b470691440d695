//! Price text parsing.
//!
//! Scraped prices arrive as display text such as `"12,345원"`; only the
//! digits carry the value.

use rust_decimal::Decimal;

/// Strip every non-digit and parse the remainder.
///
/// Returns `None` when the text holds no digits or too many to represent.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
