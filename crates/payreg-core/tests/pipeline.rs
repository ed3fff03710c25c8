//! End-to-end runs against CSV and XLSX fixtures in a temporary working
//! directory.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};
use tempfile::TempDir;

use payreg_core::error::PdfError;
use payreg_core::table::{read_sheet, Table};
use payreg_core::{
    bank_statement_status, DocumentReader, PayregConfig, PayregError, PaymentStatus, Pipeline,
    Registry, RegistryRecord, RunContext, SourceKind,
};

const REGISTRY_FILE: &str = "Реестр АХЧ 2024.csv";

const REGISTRY_HEADER: &str = "№ счета;Дата счета;Поставщик;Сумма;Статус оплаты;Контроль оплаты;№ задачи Битрикс;ID_Счет_Bitrix;Объект;ТМЦ;№ синей накладной";

fn registry_csv(rows: &[&str]) -> String {
    let mut lines = vec![
        "Реестр АХЧ",
        "Организация: ООО Ромашка",
        "Период: 2024",
        REGISTRY_HEADER,
    ];
    lines.extend_from_slice(rows);
    lines.join("\n") + "\n"
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn load_registry(path: &Path) -> Vec<RegistryRecord> {
    let sheet = read_sheet(path).unwrap();
    let table = Table::from_sheet("registry", sheet, 3).unwrap();
    let mut ctx = RunContext::new(SourceKind::Registry);
    let registry = Registry::from_table(table, &mut ctx).unwrap();
    registry.records().cloned().collect()
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn dec(s: &str) -> Option<Decimal> {
    Some(Decimal::from_str(s).unwrap())
}

fn bank_fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let registry = write(
        dir.path(),
        REGISTRY_FILE,
        &registry_csv(&[
            "123;10.01.2024;ИП Шайдулин;450,00;Черновик;;4521;;;;Ю-7",
            "77;15.01.2024;ООО Лютик;1000,00;Оплачено;;;;;;Ю-9",
            "78;;ООО Лютик;200,00;Черновик;;;;;;Ю-8",
        ]),
    );
    write_bank_statement(dir.path());
    (dir, registry)
}

fn write_bank_statement(dir: &Path) {
    write(
        dir,
        "Платежные поручения январь.csv",
        "Выписка из 1С\n\
         Счет: 40702810000000000000\n\
         Период: январь 2024\n\
         Организация: ООО Ромашка\n\
         Дата;Информация;Сумма;Состояние\n\
         10.01.2024;Оплата по счету 123 от 10.01.2024;450,00;Утверждена\n\
         11.01.2024;Оплата по счету 77 от 15.01.2024;1000,00;Черновик\n\
         12.01.2024;Оплата по счету 999;50,00;Утверждена\n\
         13.01.2024;Оплата по счету 123 повторно;450,00;Черновик\n",
    );
}

#[test]
fn test_bank_statement_updates_status_and_control_dates() {
    let (dir, registry_path) = bank_fixture();
    let pipeline = Pipeline::new(PayregConfig::default());

    let report = pipeline.run_bank_statement(dir.path()).unwrap();
    assert_eq!(report.stats.matched, 2);
    assert_eq!(report.stats.statuses_updated, 1);
    assert_eq!(report.stats.terminal_kept, 1);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.control_dates_set, 2);
    assert!(report.persisted);

    let records = load_registry(&registry_path);
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].payment_status, Some(PaymentStatus::Approved));
    assert_eq!(records[0].payment_control_date, date(2024, 2, 9));
    assert_eq!(records[0].amount, dec("450"));
    assert_eq!(records[0].ledger_number.as_deref(), Some("Ю-7"));

    // Paid rows are final
    assert_eq!(records[1].payment_status, Some(PaymentStatus::Paid));
    // Unknown supplier: same day
    assert_eq!(records[1].payment_control_date, date(2024, 1, 15));

    // No invoice date, no control date
    assert_eq!(records[2].payment_status, Some(PaymentStatus::Draft));
    assert_eq!(records[2].payment_control_date, None);
}

#[test]
fn test_bank_statement_preserves_preamble() {
    let (dir, registry_path) = bank_fixture();
    Pipeline::new(PayregConfig::default())
        .run_bank_statement(dir.path())
        .unwrap();

    let content = fs::read_to_string(&registry_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "Реестр АХЧ");
    assert_eq!(lines[1], "Организация: ООО Ромашка");
    assert_eq!(lines[3], REGISTRY_HEADER);
}

#[test]
fn test_bank_statement_is_idempotent() {
    let (dir, registry_path) = bank_fixture();
    let pipeline = Pipeline::new(PayregConfig::default());

    pipeline.run_bank_statement(dir.path()).unwrap();
    let after_first = fs::read(&registry_path).unwrap();

    let report = pipeline.run_bank_statement(dir.path()).unwrap();
    assert_eq!(report.stats.statuses_updated, 0);
    assert_eq!(report.control_dates_set, 0);
    assert!(!report.persisted);
    assert_eq!(fs::read(&registry_path).unwrap(), after_first);
}

/// Registry workbook with a merged bold title, a date-formatted control
/// column and a second lookup sheet.
fn write_registry_workbook(path: &Path) {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let day = Format::new().set_num_format("dd.mm.yyyy");

    let registry = workbook.add_worksheet();
    registry.set_name("Реестр").unwrap();
    registry.merge_range(0, 0, 0, 10, "Реестр АХЧ", &bold).unwrap();
    registry.write_string(1, 0, "Организация: ООО Ромашка").unwrap();
    registry.write_string(2, 0, "Период: 2024").unwrap();
    for (col, title) in REGISTRY_HEADER.split(';').enumerate() {
        registry.write_string_with_format(3, col as u16, title, &bold).unwrap();
    }

    let rows: [(&str, Option<f64>, &str, f64, &str, Option<f64>, &str); 3] = [
        ("123", Some(45301.0), "ИП Шайдулин", 450.0, "Черновик", None, "Ю-7"),
        ("77", Some(45306.0), "ООО Лютик", 1000.0, "Оплачено", Some(45306.0), "Ю-9"),
        ("78", None, "ООО Лютик", 200.0, "Черновик", None, "Ю-8"),
    ];
    for (i, (number, issued, supplier, amount, status, control, ledger)) in
        rows.iter().enumerate()
    {
        let row = 4 + i as u32;
        registry.write_string(row, 0, *number).unwrap();
        if let Some(serial) = issued {
            registry.write_number_with_format(row, 1, *serial, &day).unwrap();
        }
        registry.write_string(row, 2, *supplier).unwrap();
        registry.write_number(row, 3, *amount).unwrap();
        registry.write_string(row, 4, *status).unwrap();
        if let Some(serial) = control {
            registry.write_number_with_format(row, 5, *serial, &day).unwrap();
        }
        registry.write_string(row, 10, *ledger).unwrap();
    }

    let lookup = workbook.add_worksheet();
    lookup.set_name("Справочник").unwrap();
    lookup.write_string(0, 0, "ИП Шайдулин").unwrap();
    lookup.write_number(0, 1, 30.0).unwrap();

    workbook.save(path).unwrap();
}

fn package_part(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    part.read_to_end(&mut content).unwrap();
    content
}

#[test]
fn test_bank_statement_edits_workbook_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("Реестр АХЧ 2024.xlsx");
    write_registry_workbook(&registry_path);
    write_bank_statement(dir.path());
    let styles_before = package_part(&registry_path, "xl/styles.xml");
    let lookup_before = package_part(&registry_path, "xl/worksheets/sheet2.xml");

    let report = Pipeline::new(PayregConfig::default())
        .run_bank_statement(dir.path())
        .unwrap();
    assert_eq!(report.stats.statuses_updated, 1);
    assert_eq!(report.stats.terminal_kept, 1);
    // 77 already carries its control date
    assert_eq!(report.control_dates_set, 1);
    assert!(report.persisted);

    let mut workbook: Xlsx<_> = open_workbook(&registry_path).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Реестр", "Справочник"]);
    let merges = workbook.worksheet_merge_cells("Реестр").unwrap().unwrap();
    assert_eq!(merges.len(), 1);
    assert_eq!((merges[0].start, merges[0].end), ((0, 0), (0, 10)));

    // Changed cells land at E5 and F5
    let range = workbook.worksheet_range("Реестр").unwrap();
    assert_eq!(range.get_value((4, 4)), Some(&Data::String("Утверждена".into())));
    // Date format borrowed from the control date below
    assert!(matches!(range.get_value((4, 5)), Some(Data::DateTime(_))));
    assert_eq!(range.get_value((5, 4)), Some(&Data::String("Оплачено".into())));
    assert_eq!(range.get_value((1, 0)), Some(&Data::String("Организация: ООО Ромашка".into())));

    assert_eq!(package_part(&registry_path, "xl/styles.xml"), styles_before);
    assert_eq!(package_part(&registry_path, "xl/worksheets/sheet2.xml"), lookup_before);

    let records = load_registry(&registry_path);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].payment_status, Some(PaymentStatus::Approved));
    assert_eq!(records[0].payment_control_date, date(2024, 2, 9));
    assert_eq!(records[2].payment_control_date, None);
}

#[test]
fn test_missing_bank_statement() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), REGISTRY_FILE, &registry_csv(&[]));

    let err = Pipeline::new(PayregConfig::default())
        .run_bank_statement(dir.path())
        .unwrap_err();
    assert!(matches!(
        err,
        PayregError::SourceNotFound {
            kind: SourceKind::BankStatement,
            ..
        }
    ));

    let message = bank_statement_status(dir.path(), &PayregConfig::default());
    assert!(message.contains("bank statement file not found"));
}

#[test]
fn test_unparseable_amount_is_reported_not_fatal() {
    let (dir, _) = bank_fixture();
    write(
        dir.path(),
        "Платежные поручения январь.csv",
        "a\nb\nc\nd\n\
         Дата;Информация;Сумма;Состояние\n\
         10.01.2024;Оплата по счету 123;сорок;Утверждена\n\
         11.01.2024;Оплата по счету 78;200,00;Утверждена\n",
    );

    let report = Pipeline::new(PayregConfig::default())
        .run_bank_statement(dir.path())
        .unwrap();
    assert_eq!(report.parse_failures.len(), 1);
    assert_eq!(report.parse_failures[0].field, "amount");
    assert_eq!(report.stats.statuses_updated, 1);
}

fn tracker_fixture(registry_rows: &[&str], header: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = vec![
        "Реестр АХЧ",
        "Организация: ООО Ромашка",
        "Период: 2024",
        header,
    ];
    lines.extend_from_slice(registry_rows);
    let registry = write(dir.path(), REGISTRY_FILE, &(lines.join("\n") + "\n"));
    write(
        dir.path(),
        "Bitrix выгрузка.csv",
        "ID;Название;Получатель;Объект;Номер счета;Сумма;Статус Счета;Ссылка на задачу\n\
         9001;Расходы АХЧ бумага офисная;ИП Шайдулин;Склад 1;123;450,00;Оплачен;https://crm.example.ru/company/personal/user/1/tasks/task/view/4521/\n\
         9002;Картриджи;ООО Ромашка;Офис;555;300,00;Передан в оплату;https://crm.example.ru/company/personal/user/1/tasks/task/view/4600/\n",
    );
    (dir, registry)
}

#[test]
fn test_task_tracker_backfills_and_fills() {
    let (dir, registry_path) = tracker_fixture(
        &[
            "123;10.01.2024;ИП Шайдулин;450,00;Утверждена;;;;;;Ю-7",
            ";;ООО Ромашка;300,00;Черновик;;4600;;Склад 2;;Ю-8",
        ],
        REGISTRY_HEADER,
    );

    let report = Pipeline::new(PayregConfig::default())
        .run_task_tracker(dir.path())
        .unwrap();
    assert_eq!(report.stats.invoice_numbers_backfilled, 1);
    assert_eq!(report.stats.matched, 2);
    assert!(report.persisted);

    let records = load_registry(&registry_path);

    let first = &records[0];
    assert_eq!(first.payment_status, Some(PaymentStatus::SentToFinance));
    assert_eq!(first.task_ref.as_deref(), Some("4521"));
    assert_eq!(first.finance_invoice_ref.as_deref(), Some("9001"));
    assert_eq!(first.object_ref.as_deref(), Some("Склад 1"));
    assert_eq!(first.line_items.as_deref(), Some("бумага офисная"));

    let second = &records[1];
    assert_eq!(second.invoice_number, "555");
    assert_eq!(second.payment_status, Some(PaymentStatus::Approved));
    assert_eq!(second.finance_invoice_ref.as_deref(), Some("9002"));
    // Fill-only: existing object kept
    assert_eq!(second.object_ref.as_deref(), Some("Склад 2"));
}

#[test]
fn test_task_tracker_schema_violation_leaves_registry_untouched() {
    let header = "№ счета;Дата счета;Поставщик;Сумма;Статус оплаты";
    let (dir, registry_path) = tracker_fixture(
        &["123;10.01.2024;ИП Шайдулин;450,00;Утверждена"],
        header,
    );
    let before = fs::read(&registry_path).unwrap();

    let err = Pipeline::new(PayregConfig::default())
        .run_task_tracker(dir.path())
        .unwrap_err();
    assert!(matches!(err, PayregError::Schema(_)));
    assert_eq!(fs::read(&registry_path).unwrap(), before);
}

/// Serves canned text by file name.
struct CannedReader(BTreeMap<String, String>);

impl DocumentReader for CannedReader {
    fn read_text(&self, path: &Path) -> Result<String, PdfError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.0.get(&name).cloned().ok_or(PdfError::Encrypted)
    }
}

const INVOICE_58: &str = "\
Поставщик: ИП Шайдулин Рустам Ильдарович, ИНН 165000000000
Покупатель: ООО \"Ромашка\"
Счет на оплату № 58 от 10 января 2024 г.
Всего наименований 2, на сумму 12 345,67 руб.
";

const INVOICE_59: &str = "\
Поставщик: ООО \"КОРЕКСМАРКЕТ\", ИНН 7700000000
Покупатель: ООО \"Ромашка\"
Счет на оплату № 59 от 01.02.2024
Всего наименований 1, на сумму 500,00 руб.
";

const INVOICE_123: &str = "\
Поставщик: ИП Шайдулин Рустам Ильдарович
Счет на оплату № 123 от 10.01.2024
на сумму 450,00 руб.
";

fn pdf_fixture(names: &[&str]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let registry = write(
        dir.path(),
        REGISTRY_FILE,
        &registry_csv(&[
            "123;10.01.2024;ИП Шайдулин;450,00;Черновик;09.02.2024;;;;;Ю-7",
            "77;15.01.2024;ООО Лютик;1000,00;Оплачено;15.01.2024;;;;;Ю-9",
        ]),
    );
    for name in names {
        write(dir.path(), name, "%PDF-1.4");
    }
    (dir, registry)
}

fn canned_reader() -> CannedReader {
    CannedReader(
        [
            ("a.pdf", INVOICE_58),
            ("b.pdf", INVOICE_123),
            ("c.pdf", INVOICE_59),
            ("d.pdf", INVOICE_58),
        ]
        .into_iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect(),
    )
}

#[test]
fn test_pdf_invoices_are_appended_with_ledger_numbers() {
    let (dir, registry_path) = pdf_fixture(&["a.pdf", "b.pdf", "broken.pdf", "c.pdf", "d.pdf"]);
    let pipeline = Pipeline::new(PayregConfig::default()).with_document_reader(canned_reader());

    let report = pipeline.run_pdf_invoices(dir.path()).unwrap();
    assert_eq!(report.documents, 4);
    assert_eq!(report.rows_added, 2);
    assert_eq!(report.already_registered, 2);
    assert_eq!(report.ledger_numbers, vec!["Ю-10", "Ю-11"]);
    assert!(report.warnings.iter().any(|w| w.starts_with("broken.pdf")));
    assert!(report.persisted);

    let records = load_registry(&registry_path);
    assert_eq!(records.len(), 4);

    let added = &records[2];
    assert_eq!(added.invoice_number, "58");
    assert_eq!(added.invoice_date, date(2024, 1, 10));
    assert_eq!(added.supplier.as_deref(), Some("ИП Шайдулин"));
    assert_eq!(added.amount, dec("12345.67"));
    assert_eq!(added.ledger_number.as_deref(), Some("Ю-10"));
    assert_eq!(added.payment_control_date, date(2024, 2, 9));

    let added = &records[3];
    assert_eq!(added.invoice_number, "59");
    assert_eq!(added.supplier.as_deref(), Some("Корексмаркет"));
    assert_eq!(added.ledger_number.as_deref(), Some("Ю-11"));
    assert_eq!(added.payment_control_date, date(2024, 2, 29));
}

#[test]
fn test_pdf_rerun_adds_nothing() {
    let (dir, registry_path) = pdf_fixture(&["a.pdf", "c.pdf"]);
    let pipeline = Pipeline::new(PayregConfig::default()).with_document_reader(canned_reader());

    pipeline.run_pdf_invoices(dir.path()).unwrap();
    let after_first = fs::read(&registry_path).unwrap();

    let report = pipeline.run_pdf_invoices(dir.path()).unwrap();
    assert_eq!(report.rows_added, 0);
    assert!(!report.persisted);
    assert_eq!(report.message(), "No new invoices: 2 of 2 documents already registered");
    assert_eq!(fs::read(&registry_path).unwrap(), after_first);
}

#[test]
fn test_no_pdfs_is_a_noop() {
    let (dir, registry_path) = pdf_fixture(&[]);
    let before = fs::read(&registry_path).unwrap();

    let report = Pipeline::new(PayregConfig::default())
        .run_pdf_invoices(dir.path())
        .unwrap();
    assert_eq!(report.message(), "No PDF invoices found");
    assert_eq!(fs::read(&registry_path).unwrap(), before);
}

#[test]
fn test_empty_registry_starts_at_default_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = write(dir.path(), REGISTRY_FILE, &registry_csv(&[]));
    write(dir.path(), "a.pdf", "%PDF-1.4");

    let report = Pipeline::new(PayregConfig::default())
        .with_document_reader(canned_reader())
        .run_pdf_invoices(dir.path())
        .unwrap();
    assert_eq!(report.ledger_numbers, vec!["Ю-1"]);

    let records = load_registry(&registry_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ledger_number.as_deref(), Some("Ю-1"));
}

#[test]
fn test_registry_in_legacy_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Реестр АХЧ.xls", "not really a workbook");
    write(dir.path(), "a.pdf", "%PDF-1.4");

    let err = Pipeline::new(PayregConfig::default())
        .with_document_reader(canned_reader())
        .run_pdf_invoices(dir.path())
        .unwrap_err();
    assert!(matches!(err, PayregError::Table(_)));
}
