use thiserror::Error;

pub use anyhow::Context;

use crate::api::PortfolioRef;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("{method} {url} failed with status {status}: {body}")]
    Service {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to fetch transactions for {portfolio}")]
    Fetch {
        portfolio: PortfolioRef,
        #[source]
        source: Box<AppError>,
    },
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Config(Vec<String>),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }

    /// True when the remote service answered 404 for the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Service { status: 404, .. })
    }

    pub(crate) fn fetch(portfolio: &PortfolioRef, source: AppError) -> Self {
        AppError::Fetch {
            portfolio: portfolio.clone(),
            source: Box::new(source),
        }
    }
}
