//! One reconciliation run per source type.
//!
//! Every run loads the registry from the working directory, folds one source
//! into it and writes it back in place. Errors abort the run before the
//! registry file is replaced.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::context::{ParseFailure, RunContext};
use crate::error::{PayregError, Result, TableError};
use crate::extract::{InvoiceParser, InvoiceTextParser};
use crate::models::config::PayregConfig;
use crate::models::record::SourceKind;
use crate::normalize::{
    normalize_bank_statement, normalize_invoice_number, normalize_task_tracker, StopWordStripper,
};
use crate::pdf::{DocumentReader, PdfExtractor};
use crate::reconcile::{
    allocate_ledger_numbers, compute_control_dates, merge, FieldPolicy, MergeStats, SupplierTerms,
};
use crate::registry::Registry;
use crate::table::{find_source, list_pdfs, read_sheet, write_sheet_atomic, SheetFormat, Table};

/// Outcome of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: SourceKind,
    /// Registry file the run worked on; `None` when it stopped before
    /// looking for one.
    pub registry_path: Option<PathBuf>,
    pub stats: MergeStats,
    pub control_dates_set: usize,
    /// PDF documents read.
    pub documents: usize,
    /// Invoices skipped because their number is already registered.
    pub already_registered: usize,
    pub rows_added: usize,
    pub ledger_numbers: Vec<String>,
    pub parse_failures: Vec<ParseFailure>,
    pub warnings: Vec<String>,
    pub duplicates_dropped: usize,
    /// Whether the registry file was rewritten.
    pub persisted: bool,
}

impl RunReport {
    fn new(source: SourceKind) -> Self {
        Self {
            source,
            registry_path: None,
            stats: MergeStats::default(),
            control_dates_set: 0,
            documents: 0,
            already_registered: 0,
            rows_added: 0,
            ledger_numbers: Vec::new(),
            parse_failures: Vec::new(),
            warnings: Vec::new(),
            duplicates_dropped: 0,
            persisted: false,
        }
    }

    fn collect(mut self, ctx: RunContext) -> Self {
        let (parse_failures, warnings, duplicates_dropped) = ctx.finish();
        self.parse_failures = parse_failures;
        self.warnings = warnings;
        self.duplicates_dropped = duplicates_dropped;
        self
    }

    /// One-line summary for the user.
    pub fn message(&self) -> String {
        let mut message = match self.source {
            SourceKind::BankStatement => format!(
                "Bank statement reconciled: {} rows matched, {} statuses updated, {} final statuses kept",
                self.stats.matched, self.stats.statuses_updated, self.stats.terminal_kept
            ),
            SourceKind::TaskTracker => format!(
                "Task tracker reconciled: {} rows matched, {} statuses updated, {} fields filled, {} invoice numbers recovered",
                self.stats.matched,
                self.stats.statuses_updated,
                self.stats.fields_filled(),
                self.stats.invoice_numbers_backfilled
            ),
            SourceKind::PdfInvoices if self.documents == 0 => {
                return "No PDF invoices found".to_string();
            }
            SourceKind::PdfInvoices if self.rows_added == 0 => format!(
                "No new invoices: {} of {} documents already registered",
                self.already_registered, self.documents
            ),
            SourceKind::PdfInvoices => format!(
                "Added {} invoices from {} documents ({})",
                self.rows_added,
                self.documents,
                self.ledger_numbers.join(", ")
            ),
            SourceKind::Registry => "Registry loaded".to_string(),
        };

        if self.control_dates_set > 0 {
            message.push_str(&format!("; {} control dates set", self.control_dates_set));
        }
        if !self.parse_failures.is_empty() {
            message.push_str(&format!(
                "; {} cells could not be parsed",
                self.parse_failures.len()
            ));
        }
        if !self.warnings.is_empty() {
            message.push_str(&format!("; {} warnings", self.warnings.len()));
        }
        message
    }
}

/// Runs reconciliations against a working directory.
pub struct Pipeline {
    config: PayregConfig,
    reader: Box<dyn DocumentReader>,
    parser: InvoiceTextParser,
}

impl Pipeline {
    /// Create a pipeline that reads PDFs with [`PdfExtractor`].
    pub fn new(config: PayregConfig) -> Self {
        Self {
            config,
            reader: Box::new(PdfExtractor::new()),
            parser: InvoiceTextParser::new(),
        }
    }

    /// Replace the document reader used by the PDF path.
    pub fn with_document_reader(mut self, reader: impl DocumentReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Run the pipeline for `kind`.
    pub fn run(&self, kind: SourceKind, dir: &Path) -> Result<RunReport> {
        match kind {
            SourceKind::BankStatement => self.run_bank_statement(dir),
            SourceKind::TaskTracker => self.run_task_tracker(dir),
            SourceKind::PdfInvoices => self.run_pdf_invoices(dir),
            SourceKind::Registry => Err(PayregError::Config(
                "the registry is the merge target, not a source".to_string(),
            )),
        }
    }

    /// Update payment statuses from the bank statement.
    pub fn run_bank_statement(&self, dir: &Path) -> Result<RunReport> {
        let mut ctx = RunContext::new(SourceKind::BankStatement);
        let span = ctx.span().clone();
        let _guard = span.enter();

        let (registry_path, mut registry) = self.load_registry(dir, &mut ctx)?;
        let layout = &self.config.bank_statement;
        let table = load_table(dir, &layout.marker, layout.header_row, SourceKind::BankStatement)?;
        let external = normalize_bank_statement(&table, &mut ctx)?;

        let stats = merge(&mut registry, &external, &FieldPolicy::bank_statement())?;
        let control_dates_set = compute_control_dates(&mut registry, &self.supplier_terms());

        let mut report = RunReport::new(SourceKind::BankStatement);
        report.persisted = stats.total_changes() + control_dates_set > 0;
        if report.persisted {
            persist(&registry_path, registry)?;
        }
        report.stats = stats;
        report.control_dates_set = control_dates_set;
        report.registry_path = Some(registry_path);
        Ok(report.collect(ctx))
    }

    /// Update statuses, recover invoice numbers and fill empty reference
    /// fields from the task tracker.
    pub fn run_task_tracker(&self, dir: &Path) -> Result<RunReport> {
        let mut ctx = RunContext::new(SourceKind::TaskTracker);
        let span = ctx.span().clone();
        let _guard = span.enter();

        let stripper = StopWordStripper::new(&self.config.merge.line_item_stop_words)
            .map_err(|e| PayregError::Config(format!("invalid line-item stop word: {e}")))?;

        let (registry_path, mut registry) = self.load_registry(dir, &mut ctx)?;
        let layout = &self.config.task_tracker;
        let table = load_table(dir, &layout.marker, layout.header_row, SourceKind::TaskTracker)?;
        let external = normalize_task_tracker(&table, layout, &mut ctx)?;

        let stats = merge(&mut registry, &external, &FieldPolicy::task_tracker(stripper))?;
        let control_dates_set = compute_control_dates(&mut registry, &self.supplier_terms());

        let mut report = RunReport::new(SourceKind::TaskTracker);
        report.persisted = stats.total_changes() + control_dates_set > 0;
        if report.persisted {
            persist(&registry_path, registry)?;
        }
        report.stats = stats;
        report.control_dates_set = control_dates_set;
        report.registry_path = Some(registry_path);
        Ok(report.collect(ctx))
    }

    /// Append invoices found in PDF documents that the registry does not
    /// know yet.
    pub fn run_pdf_invoices(&self, dir: &Path) -> Result<RunReport> {
        let mut ctx = RunContext::new(SourceKind::PdfInvoices);
        let span = ctx.span().clone();
        let _guard = span.enter();

        let mut report = RunReport::new(SourceKind::PdfInvoices);
        let pdfs = list_pdfs(dir)?;
        if pdfs.is_empty() {
            info!("No PDF files in {}", dir.display());
            return Ok(report.collect(ctx));
        }

        let (registry_path, mut registry) = self.load_registry(dir, &mut ctx)?;
        let mut known: BTreeSet<String> = registry
            .records()
            .filter_map(|r| normalize_invoice_number(&r.invoice_number))
            .collect();

        for path in &pdfs {
            let name = file_name(path);
            let text = match self.reader.read_text(path) {
                Ok(text) => text,
                Err(e) => {
                    ctx.warn(format!("{name}: {e}"));
                    continue;
                }
            };
            report.documents += 1;

            let result = self.parser.parse(&text);
            if !result.is_complete() {
                ctx.warn(format!(
                    "{name}: could not extract {}",
                    result.missing_fields.join(", ")
                ));
            }

            let Some(number) = result
                .invoice
                .invoice_number
                .as_deref()
                .and_then(normalize_invoice_number)
            else {
                continue;
            };
            if !known.insert(number) {
                debug!("{}: invoice already registered", name);
                report.already_registered += 1;
                continue;
            }
            registry.push(result.invoice.into_record());
        }

        report.registry_path = Some(registry_path.clone());
        report.rows_added = registry.inserted_count();
        if report.rows_added == 0 {
            info!("No new invoices among {} documents", report.documents);
            return Ok(report.collect(ctx));
        }

        let allocation =
            allocate_ledger_numbers(&mut registry, &self.config.registry.default_ledger_prefix);
        if !allocation.mixed_prefixes.is_empty() {
            ctx.warn(format!(
                "registry mixes ledger prefixes {}; continuing with {}",
                allocation.mixed_prefixes.join(", "),
                allocation.prefix
            ));
        }
        report.control_dates_set = compute_control_dates(&mut registry, &self.supplier_terms());

        persist(&registry_path, registry)?;
        report.persisted = true;
        report.ledger_numbers = allocation.assigned;
        info!(
            "Added {} invoices as {}",
            report.rows_added,
            report.ledger_numbers.join(", ")
        );
        Ok(report.collect(ctx))
    }

    fn supplier_terms(&self) -> SupplierTerms {
        SupplierTerms::from_config(&self.config.schedule)
    }

    /// Locate and parse the registry. Formats that cannot be written back
    /// are rejected here, before anything is merged.
    fn load_registry(&self, dir: &Path, ctx: &mut RunContext) -> Result<(PathBuf, Registry)> {
        let layout = &self.config.registry;
        let path = find_source(dir, &layout.marker, SourceKind::Registry)?;

        let format = SheetFormat::from_path(&path)?;
        if !format.is_writable() {
            return Err(TableError::UnsupportedFormat(format!(
                "{} cannot be written back; save the registry as .xlsx or .csv",
                file_name(&path)
            ))
            .into());
        }

        let table = Table::from_sheet(file_name(&path), read_sheet(&path)?, layout.header_row)?;
        let registry = Registry::from_table(table, ctx)?;
        Ok((path, registry))
    }
}

/// Locate and split a source table.
fn load_table(dir: &Path, marker: &str, header_row: usize, kind: SourceKind) -> Result<Table> {
    let path = find_source(dir, marker, kind)?;
    let table = Table::from_sheet(file_name(&path), read_sheet(&path)?, header_row)?;
    info!("Loaded {} rows from {}", table.rows.len(), table.name);
    Ok(table)
}

fn persist(path: &Path, registry: Registry) -> Result<()> {
    let sheet = registry.into_table().into_sheet();
    write_sheet_atomic(path, &sheet).map_err(|e| PayregError::Persistence {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn status_message(kind: SourceKind, result: Result<RunReport>) -> String {
    match result {
        Ok(report) => report.message(),
        Err(e) => {
            error!(source = %kind, "Run failed: {}", e);
            format!("Error: {e}")
        }
    }
}

/// Reconcile the bank statement in `dir` and describe the outcome.
pub fn bank_statement_status(dir: &Path, config: &PayregConfig) -> String {
    let kind = SourceKind::BankStatement;
    status_message(kind, Pipeline::new(config.clone()).run(kind, dir))
}

/// Reconcile the task-tracker export in `dir` and describe the outcome.
pub fn task_tracker_status(dir: &Path, config: &PayregConfig) -> String {
    let kind = SourceKind::TaskTracker;
    status_message(kind, Pipeline::new(config.clone()).run(kind, dir))
}

/// Register the PDF invoices in `dir` and describe the outcome.
pub fn pdf_invoices_status(dir: &Path, config: &PayregConfig) -> String {
    let kind = SourceKind::PdfInvoices;
    status_message(kind, Pipeline::new(config.clone()).run(kind, dir))
}
