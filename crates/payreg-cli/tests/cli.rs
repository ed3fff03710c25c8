//! Command-line behavior of the `payreg` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const INVOICE: &str = "\
Поставщик: ИП Шайдулин Рустам Ильдарович, ИНН 165000000000
Покупатель: ООО \"Ромашка\"
Счет на оплату № 58 от 10 января 2024 г.
Всего наименований 2, на сумму 12 345,67 руб.
";

const REGISTRY: &str = "\
Реестр АХЧ
Организация: ООО Ромашка
Период: 2024
№ счета;Дата счета;Поставщик;Сумма;Статус оплаты;Контроль оплаты;№ задачи Битрикс;ID_Счет_Bitrix;Объект;ТМЦ;№ синей накладной
123;10.01.2024;ИП Шайдулин;450,00;Черновик;;;;;;Ю-7
";

const BANK: &str = "\
Выписка из 1С
Счет: 40702810000000000000
Период: январь 2024
Организация: ООО Ромашка
Дата;Информация;Сумма;Состояние
10.01.2024;Оплата по счету 123 от 10.01.2024;450,00;Утверждена
";

/// `payreg` with its config directory pointed into `home`.
fn payreg(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("payreg").unwrap();
    cmd.env("XDG_CONFIG_HOME", home).env("HOME", home);
    cmd
}

fn workdir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Реестр АХЧ.csv"), REGISTRY).unwrap();
    dir
}

#[test]
fn test_extract_json() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("invoice.txt"), INVOICE).unwrap();

    let pattern = dir.path().join("*.txt");
    payreg(home.path())
        .args(["extract", pattern.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"invoice_number\": \"58\""))
        .stdout(predicate::str::contains("ИП Шайдулин"));
}

#[test]
fn test_extract_summary_csv() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("invoice.txt"), INVOICE).unwrap();
    let summary = dir.path().join("summary.csv");

    let pattern = dir.path().join("*.txt");
    payreg(home.path())
        .args(["extract", pattern.to_str().unwrap(), "--summary"])
        .arg(&summary)
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoice:  58"));

    let content = fs::read_to_string(&summary).unwrap();
    assert!(content.starts_with("filename,status,invoice_number"));
    assert!(content.contains("invoice.txt,complete,58,2024-01-10,ИП Шайдулин,12345.67"));
}

#[test]
fn test_extract_no_match() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("*.pdf");

    payreg(home.path())
        .args(["extract", pattern.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_bank_run_updates_registry() {
    let home = tempfile::tempdir().unwrap();
    let dir = workdir();
    fs::write(dir.path().join("Платежные поручения.csv"), BANK).unwrap();

    payreg(home.path())
        .arg("bank")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank statement reconciled: 1 rows matched, 1 statuses updated"));

    let registry = fs::read_to_string(dir.path().join("Реестр АХЧ.csv")).unwrap();
    assert!(registry.contains("123;10.01.2024;ИП Шайдулин;450,00;Утверждена;09.02.2024"));
}

#[test]
fn test_bank_run_missing_statement() {
    let home = tempfile::tempdir().unwrap();
    let dir = workdir();

    payreg(home.path())
        .arg("bank")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("bank statement file not found"));
}

#[test]
fn test_invoices_without_pdfs() {
    let home = tempfile::tempdir().unwrap();
    let dir = workdir();

    payreg(home.path())
        .arg("invoices")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No PDF invoices found"));
}

#[test]
fn test_config_get_default() {
    let home = tempfile::tempdir().unwrap();

    payreg(home.path())
        .args(["config", "get", "registry.default_ledger_prefix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Ю\""));
}

#[test]
fn test_config_init_and_set() {
    let home = tempfile::tempdir().unwrap();

    payreg(home.path())
        .args(["config", "init"])
        .assert()
        .success();
    payreg(home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    payreg(home.path())
        .args(["config", "set", "bank_statement.header_row", "5"])
        .assert()
        .success();
    payreg(home.path())
        .args(["config", "get", "bank_statement.header_row"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5"));
}

#[test]
fn test_explicit_config_file() {
    let home = tempfile::tempdir().unwrap();
    let dir = workdir();
    let config = dir.path().join("custom.json");
    fs::write(&config, r#"{ "bank_statement": { "marker": "выписка" } }"#).unwrap();

    payreg(home.path())
        .arg("--config")
        .arg(&config)
        .arg("bank")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("bank statement file not found"));
}

#[test]
fn test_config_subcommands_use_explicit_file() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.json");
    fs::write(&config, r#"{ "registry": { "default_ledger_prefix": "Б" } }"#).unwrap();

    payreg(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "registry.default_ledger_prefix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Б\""));

    payreg(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "bank_statement.header_row", "7"])
        .assert()
        .success();
    let saved = fs::read_to_string(&config).unwrap();
    assert!(saved.contains("\"header_row\": 7"));
    assert!(saved.contains("\"default_ledger_prefix\": \"Б\""));

    payreg(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"));

    // The default location is never touched
    assert!(!home.path().join("payreg").exists());
}
