//! Date extraction for Russian invoices.

use chrono::NaiveDate;

use super::patterns::{DATE_DMY, DATE_RUSSIAN_LONG, FROM_WORD, TITLE_LINE};
use super::{Cascade, FieldExtractor, Strategy};

/// Invoice date strategies in priority order.
pub static INVOICE_DATE: Cascade<NaiveDate> = Cascade::new(
    "invoice_date",
    &[
        ("title_line", title_line_date as Strategy<NaiveDate>),
        ("numeric_dmy", numeric_dmy as Strategy<NaiveDate>),
        ("russian_long", russian_long as Strategy<NaiveDate>),
    ],
);

/// Extract the invoice date.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    INVOICE_DATE.extract(text)
}

/// Date after "от" on the "Счет на оплату" title line, in either form.
pub fn title_line_date(text: &str) -> Option<NaiveDate> {
    let caps = TITLE_LINE.captures(text)?;
    let tail = caps.get(2)?.as_str();
    let date_part = &tail[FROM_WORD.find(tail)?.end()..];
    numeric_dmy(date_part).or_else(|| russian_long(date_part))
}

/// First valid `DD.MM.YYYY` date in the text.
pub fn numeric_dmy(text: &str) -> Option<NaiveDate> {
    DATE_DMY.captures_iter(text).find_map(|caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// First valid "10 января 2024" date in the text.
pub fn russian_long(text: &str) -> Option<NaiveDate> {
    DATE_RUSSIAN_LONG.captures_iter(text).find_map(|caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month = russian_month_to_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Month number for a Russian month name in the genitive case.
pub fn russian_month_to_number(month: &str) -> Option<u32> {
    let number = match month.to_lowercase().as_str() {
        "января" => 1,
        "февраля" => 2,
        "марта" => 3,
        "апреля" => 4,
        "мая" => 5,
        "июня" => 6,
        "июля" => 7,
        "августа" => 8,
        "сентября" => 9,
        "октября" => 10,
        "ноября" => 11,
        "декабря" => 12,
        _ => return None,
    };
    Some(number)
}
