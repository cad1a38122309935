use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

/// Identifies one portfolio by its `(scope, code)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortfolioRef {
    pub scope: String,
    pub code: String,
}

impl PortfolioRef {
    /// Build a reference, rejecting characters that cannot appear in a URL path segment unescaped.
    pub fn new(scope: impl Into<String>, code: impl Into<String>) -> Result<Self> {
        let scope = scope.into();
        let code = code.into();
        validate_identifier("scope", &scope)?;
        validate_identifier("code", &code)?;
        Ok(Self { scope, code })
    }
}

impl fmt::Display for PortfolioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.code)
    }
}

pub(crate) fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::message(format!("portfolio {kind} must not be empty")));
    }

    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
    {
        return Err(AppError::message(format!(
            "portfolio {kind} `{value}` contains unsupported character `{bad}`"
        )));
    }

    Ok(())
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub values: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(values: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            values,
            next_cursor,
        }
    }

    /// A page with no continuation.
    pub fn last(values: Vec<T>) -> Self {
        Self::new(values, None)
    }

    /// The continuation cursor, treating an empty token as absent.
    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|cursor| !cursor.is_empty())
    }
}

/// A transaction as returned by the transaction query endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub transaction_type: String,
    pub transaction_date: String,
    pub settlement_date: String,
    pub units: f64,
    pub amount: f64,
    pub currency: String,
    pub instrument_uid: String,
}

impl TransactionRecord {
    pub fn with_id(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            ..Self::default()
        }
    }
}

/// Inclusive transaction-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(AppError::message(format!(
                "start date {} is after end date {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    pub window: DateWindow,
    pub page_size: usize,
}

/// A portfolio group with its sub-groups already expanded by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedGroup {
    pub id: PortfolioRef,
    pub portfolios: Vec<PortfolioRef>,
    pub sub_groups: Vec<ExpandedGroup>,
}
