//! Registry and source record models.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::extract::rules::{AMOUNT, INVOICE_DATE, INVOICE_NUMBER, SUPPLIER};

use super::status::PaymentStatus;

/// A tabular or document input of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The canonical registry itself.
    Registry,
    /// Accounting-system bank statement export.
    BankStatement,
    /// Task-tracker invoice export.
    TaskTracker,
    /// PDF invoice documents.
    PdfInvoices,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::BankStatement => write!(f, "bank statement"),
            Self::TaskTracker => write!(f, "task tracker"),
            Self::PdfInvoices => write!(f, "PDF invoice"),
        }
    }
}

/// One row of the canonical ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Invoice number; empty while pending assignment.
    pub invoice_number: String,

    /// Date the invoice was issued.
    pub invoice_date: Option<NaiveDate>,

    /// Supplier name as written in the registry.
    pub supplier: Option<String>,

    /// Invoice amount, 2 decimal places.
    pub amount: Option<Decimal>,

    /// Current payment status.
    pub payment_status: Option<PaymentStatus>,

    /// Invoice date shifted by the supplier's payment term.
    pub payment_control_date: Option<NaiveDate>,

    /// Task-tracker task identifier.
    pub task_ref: Option<String>,

    /// Task-tracker invoice identifier.
    pub finance_invoice_ref: Option<String>,

    /// Object (site/cost center) the invoice belongs to.
    pub object_ref: Option<String>,

    /// Free-text description of purchased goods.
    pub line_items: Option<String>,

    /// Sequential ledger identifier (`<Prefix>-<N>`), immutable once set.
    pub ledger_number: Option<String>,
}

impl RegistryRecord {
    /// Composite join key, if both parts are present.
    pub fn key(&self) -> Option<CompositeKey> {
        CompositeKey::new(&self.invoice_number, self.amount)
    }

    /// Join key used by the invoice-number backfill pass.
    pub fn task_key(&self) -> Option<TaskKey> {
        TaskKey::new(self.task_ref.as_deref(), self.amount)
    }

    /// Whether the status must not be overwritten from outside.
    pub fn has_terminal_status(&self) -> bool {
        self.payment_status
            .as_ref()
            .is_some_and(PaymentStatus::is_terminal)
    }
}

/// A source row projected onto the registry's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_hint: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance_invoice_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
}

impl ExternalRecord {
    pub fn key(&self) -> Option<CompositeKey> {
        CompositeKey::new(self.invoice_number.as_deref().unwrap_or(""), self.amount)
    }

    pub fn task_key(&self) -> Option<TaskKey> {
        TaskKey::new(self.task_ref.as_deref(), self.amount)
    }
}

/// Fields pulled out of one invoice document. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub supplier: Option<String>,
    pub amount: Option<Decimal>,
}

impl ExtractedInvoice {
    /// Names of the fields that could not be extracted.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            (INVOICE_NUMBER.field(), self.invoice_number.is_none()),
            (INVOICE_DATE.field(), self.invoice_date.is_none()),
            (SUPPLIER.field(), self.supplier.is_none()),
            (AMOUNT.field(), self.amount.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, missing)| missing.then_some(field))
        .collect()
    }

    /// Build a fresh registry row from the extracted fields.
    pub fn into_record(self) -> RegistryRecord {
        RegistryRecord {
            invoice_number: self.invoice_number.unwrap_or_default(),
            invoice_date: self.invoice_date,
            supplier: self.supplier,
            amount: self.amount,
            ..RegistryRecord::default()
        }
    }
}

/// `(invoice_number, amount)`, the join key shared by all sources.
///
/// Both parts are normalized on construction so that `"00123"`/`450.0` and
/// `"123"`/`450.00` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub invoice_number: String,
    pub amount: Decimal,
}

impl CompositeKey {
    pub fn new(invoice_number: &str, amount: Option<Decimal>) -> Option<Self> {
        let invoice_number = crate::normalize::normalize_invoice_number(invoice_number)?;
        let amount = amount?;
        Some(Self {
            invoice_number,
            amount: crate::normalize::round_amount(amount).normalize(),
        })
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {:.2}", self.invoice_number, self.amount)
    }
}

/// `(task_ref, amount)`, used only to backfill missing invoice numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub task_ref: String,
    pub amount: Decimal,
}

impl TaskKey {
    pub fn new(task_ref: Option<&str>, amount: Option<Decimal>) -> Option<Self> {
        let task_ref = crate::normalize::coerce_identifier(task_ref?)?;
        let amount = amount?;
        Some(Self {
            task_ref,
            amount: crate::normalize::round_amount(amount).normalize(),
        })
    }
}
