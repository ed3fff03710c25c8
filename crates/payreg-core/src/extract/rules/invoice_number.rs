//! Invoice number extraction from invoice text and payment memos.
//!
//! Trades precision for recall: the last strategy takes the first integer in
//! the text, so a memo without any document reference can still yield a
//! (possibly wrong) number.

use super::patterns::{FIRST_INTEGER, INVOICE_TRIGGER, NUMBER_SIGN, TITLE_LINE};
use super::{Cascade, FieldExtractor, Strategy};

/// Invoice number strategies in priority order.
pub static INVOICE_NUMBER: Cascade<String> = Cascade::new(
    "invoice_number",
    &[
        ("title_line", title_line as Strategy<String>),
        ("trigger_word", after_trigger_word as Strategy<String>),
        ("number_sign", after_number_sign as Strategy<String>),
        ("first_integer", first_integer as Strategy<String>),
    ],
);

/// Extract the invoice number, trying each strategy in turn.
pub fn extract_invoice_number(text: &str) -> Option<String> {
    INVOICE_NUMBER.extract(text)
}

/// Token after "оплату №" on the "Счет на оплату" title line.
pub fn title_line(text: &str) -> Option<String> {
    TITLE_LINE
        .captures(text)
        .map(|caps| caps[1].trim_end_matches([',', ';']).to_string())
        .filter(|number| !number.is_empty())
}

/// Token containing a digit right after "счет", "накладная", "с/ф", etc.
pub fn after_trigger_word(text: &str) -> Option<String> {
    INVOICE_TRIGGER
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|number| !number.is_empty())
}

/// Token after the "№" sign.
pub fn after_number_sign(text: &str) -> Option<String> {
    NUMBER_SIGN
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|number| !number.is_empty())
}

/// First standalone integer anywhere in the text.
pub fn first_integer(text: &str) -> Option<String> {
    FIRST_INTEGER.captures(text).map(|caps| caps[1].to_string())
}
