//! Common regex patterns for Russian invoice and payment-memo extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Invoice number after a document-type trigger word: "счет 15", "по счету №000123",
    // "с/ф 7-А", "тов. накладная 45"
    pub static ref INVOICE_TRIGGER: Regex = Regex::new(
        r"(?i)\b(?:сч[её]т[а-яё]*|фактур[а-яё]*|накладн[а-яё]*|товарн[а-яё]*|тмт|[сc]/?ф|тов\.?\s*накладн[а-яё]*)\b\W*([\w+/\-]*?\d[\w+/\-]*)"
    ).unwrap();

    // Invoice title line: "Счет на оплату № 58 от 10 января 2024 г."
    pub static ref TITLE_LINE: Regex = Regex::new(
        r"(?im)^.*сч[её]т.*оплату\s*№\s*(\S+)(.*)$"
    ).unwrap();

    pub static ref FROM_WORD: Regex = Regex::new(
        r"(?i)\bот\b"
    ).unwrap();

    // Number after the "№" sign
    pub static ref NUMBER_SIGN: Regex = Regex::new(
        r"№\s*([A-Za-zА-Яа-яЁё\d_+/\-]+)"
    ).unwrap();

    pub static ref FIRST_INTEGER: Regex = Regex::new(
        r"\b(\d+)\b"
    ).unwrap();

    // Dates
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b"
    ).unwrap();

    pub static ref DATE_RUSSIAN_LONG: Regex = Regex::new(
        r"(?i)[«\x22]?\b(\d{1,2})\b[»\x22]?\s+(января|февраля|марта|апреля|мая|июня|июля|августа|сентября|октября|ноября|декабря)\s+(\d{4})"
    ).unwrap();

    // Supplier section label
    pub static ref SUPPLIER_LABEL: Regex = Regex::new(
        r"(?i)(?:поставщик|получатель|исполнитель)(?:\s*\([^)\n]*\))?\s*:?"
    ).unwrap();

    // Individual entrepreneur: "ИП Шайдулин Р.И.", "Индивидуальный предприниматель Павлов Е. В."
    pub static ref SUPPLIER_ENTREPRENEUR: Regex = Regex::new(
        r"(?:(?i:индивидуальный\s+предприниматель)|\bИП)\s+([А-ЯЁа-яё][А-ЯЁа-яё\-]+)(?:\s+([А-ЯЁ]\.\s?[А-ЯЁ]\.))?"
    ).unwrap();

    // Company name in quotes: ООО "Корексмаркет", АО «Регион-Снабжение»
    pub static ref SUPPLIER_QUOTED: Regex = Regex::new(
        r#"(?:(?:ООО|ОАО|ЗАО|ПАО|АО|ТОО)\s*)?["«“]([^"»”\n]{2,}?)["»”]"#
    ).unwrap();

    // Company name without quotes, cut at the first requisites token
    pub static ref SUPPLIER_UNQUOTED: Regex = Regex::new(
        r"\b(?:ООО|ОАО|ЗАО|ПАО|АО)\s+([^,\n«\x22]+?)\s*(?:,|(?i:\bИНН\b|\bКПП\b|\bБИК\b|\bОГРН\b|\bр/с\b|\bбанк\b)|\n|$)"
    ).unwrap();

    // Amount after "на сумму"
    pub static ref AMOUNT_PHRASE: Regex = Regex::new(
        r"(?i)на\s+сумму\D*?(\d[\d \u{00a0}.,]*)"
    ).unwrap();

    // Task-tracker task link: https://tracker.example/company/personal/user/1/tasks/task/view/4521/
    pub static ref TASK_LINK: Regex = Regex::new(
        r"/view/(\d+)/?$"
    ).unwrap();

    // Ledger numbers: "Ю-10"
    pub static ref LEDGER_PREFIX: Regex = Regex::new(
        r"[A-ZА-ЯЁ]+"
    ).unwrap();

    pub static ref LEDGER_SUFFIX: Regex = Regex::new(
        r"(\d+)"
    ).unwrap();
}
