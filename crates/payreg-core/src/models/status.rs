//! Payment status vocabulary.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Payment status of a registry row.
///
/// The five known states are written back with their registry labels. Any
/// other label coming from a source is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    /// Черновик.
    Draft,
    /// Утверждена.
    Approved,
    /// Отправлен в 1С.
    SentToFinance,
    /// Подготовлено.
    Prepared,
    /// Оплачено.
    Paid,
    /// Intermediate label not in the registry vocabulary.
    Other(String),
}

impl PaymentStatus {
    /// Parse a status cell. Empty input yields `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }

        let status = match trimmed.to_lowercase().as_str() {
            "черновик" | "draft" => Self::Draft,
            "утверждена" | "утвержден" | "утверждено" | "approved" => Self::Approved,
            "отправлен в 1с" | "отправлено в 1с" | "sent_to_finance" | "senttofinance" => {
                Self::SentToFinance
            }
            "подготовлено" | "подготовлен" | "prepared" => Self::Prepared,
            "оплачено" | "paid" => Self::Paid,
            _ => Self::Other(trimmed.to_string()),
        };
        Some(status)
    }

    /// Registry label for this status.
    pub fn label(&self) -> &str {
        match self {
            Self::Draft => "Черновик",
            Self::Approved => "Утверждена",
            Self::SentToFinance => "Отправлен в 1С",
            Self::Prepared => "Подготовлено",
            Self::Paid => "Оплачено",
            Self::Other(label) => label,
        }
    }

    /// Terminal statuses are never overwritten by an external source.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Prepared)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Self::parse(&label).ok_or_else(|| serde::de::Error::custom("empty payment status"))
    }
}
