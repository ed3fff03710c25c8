//! Amount extraction and parsing.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::patterns::AMOUNT_PHRASE;
use super::{Cascade, FieldExtractor, Strategy};
use crate::normalize::round_amount;

/// Amount strategies in priority order.
pub static AMOUNT: Cascade<Decimal> = Cascade::new(
    "amount",
    &[("amount_phrase", after_amount_phrase as Strategy<Decimal>)],
);

/// Extract the invoice total.
pub fn extract_amount(text: &str) -> Option<Decimal> {
    AMOUNT.extract(text)
}

/// Number following "на сумму", rounded to 2 decimal places.
pub fn after_amount_phrase(text: &str) -> Option<Decimal> {
    let caps = AMOUNT_PHRASE.captures(text)?;
    parse_amount(&caps[1]).map(round_amount)
}

/// Parse a Russian-formatted amount (e.g., "12 345,67" or "12345.67").
pub fn parse_amount(s: &str) -> Option<Decimal> {
    // Keep digits and separators only
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_end_matches([',', '.']);

    // Replace comma with period for decimal
    let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
        cleaned.replace(',', ".")
    } else if cleaned.contains(',') && cleaned.contains('.') {
        // Whichever separator comes last is the decimal one
        let comma_pos = cleaned.rfind(',');
        let dot_pos = cleaned.rfind('.');
        match (comma_pos, dot_pos) {
            (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => cleaned.replace(',', ""),
            _ => cleaned.to_string(),
        }
    } else {
        cleaned.to_string()
    };

    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized).ok()
}
