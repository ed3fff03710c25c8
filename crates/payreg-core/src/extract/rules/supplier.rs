//! Supplier name extraction.

use super::patterns::{SUPPLIER_ENTREPRENEUR, SUPPLIER_LABEL, SUPPLIER_QUOTED, SUPPLIER_UNQUOTED};
use super::{Cascade, FieldExtractor, Strategy};

/// Lines after the supplier label that are searched for a name.
const LABEL_WINDOW_LINES: usize = 2;

/// Supplier name strategies in priority order.
pub static SUPPLIER: Cascade<String> = Cascade::new(
    "supplier",
    &[
        ("entrepreneur", entrepreneur as Strategy<String>),
        ("quoted_company", quoted_company as Strategy<String>),
        ("unquoted_company", unquoted_company as Strategy<String>),
    ],
);

/// Extract the supplier from the section after the supplier label, or from
/// the whole text when there is no label.
pub fn extract_supplier(text: &str) -> Option<String> {
    SUPPLIER.extract(&supplier_window(text))
}

/// Text following "Поставщик:" / "Получатель:", limited to the first
/// non-empty lines after the label.
pub fn supplier_window(text: &str) -> String {
    let Some(label) = SUPPLIER_LABEL.find(text) else {
        return text.to_string();
    };

    text[label.end()..]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(LABEL_WINDOW_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// "ИП Шайдулин Рустам Ильдарович" -> "ИП Шайдулин",
/// "ИП Павлов Е. В." -> "ИП Павлов Е.В.".
pub fn entrepreneur(text: &str) -> Option<String> {
    let caps = SUPPLIER_ENTREPRENEUR.captures(text)?;
    let surname = title_case(&caps[1]);
    match caps.get(2) {
        Some(initials) => {
            let initials: String = initials
                .as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            Some(format!("ИП {surname} {initials}"))
        }
        None => Some(format!("ИП {surname}")),
    }
}

/// Company name between quotes, without the legal form.
pub fn quoted_company(text: &str) -> Option<String> {
    let caps = SUPPLIER_QUOTED.captures(text)?;
    clean_company_name(&caps[1])
}

/// Company name after the legal form, cut at the first requisites token.
pub fn unquoted_company(text: &str) -> Option<String> {
    let caps = SUPPLIER_UNQUOTED.captures(text)?;
    clean_company_name(&caps[1])
}

fn clean_company_name(raw: &str) -> Option<String> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return None;
    }

    // Fully upper-case names are printed that way on the form, not registered
    let has_lower = name.chars().any(char::is_lowercase);
    if has_lower {
        Some(name)
    } else {
        Some(title_case(&name))
    }
}

/// Title-case each word, keeping hyphenated parts capitalized.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = !c.is_alphanumeric();
        }
    }
    result
}
