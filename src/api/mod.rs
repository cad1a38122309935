use crate::error::Result;

pub mod auth;
pub mod client;
pub mod decode;
pub mod model;
pub mod request;

pub use auth::TokenProvider;
pub use client::RestClient;
pub use model::{
    DateWindow, ExpandedGroup, Page, PortfolioRef, TransactionQuery, TransactionRecord,
};

/// Transaction query and cancellation endpoints.
///
/// Exists as a trait so the flush pipeline can run against scripted responses in tests.
pub trait TransactionApi: Send + Sync {
    /// Fetch one page of transactions; `cursor` is `None` for the first page.
    fn list_transactions(
        &self,
        portfolio: &PortfolioRef,
        query: &TransactionQuery,
        cursor: Option<&str>,
    ) -> Result<Page<TransactionRecord>>;

    /// The cancellation URL up to and including the `?` that starts its query string.
    fn cancel_url_prefix(&self, portfolio: &PortfolioRef) -> Result<String>;

    fn cancel_transactions(&self, portfolio: &PortfolioRef, transaction_ids: &[String])
        -> Result<()>;
}

/// Portfolio group expansion and scope listing endpoints.
pub trait PortfolioApi: Send + Sync {
    /// `Ok(None)` when the group does not exist.
    fn expand_group(&self, group: &PortfolioRef) -> Result<Option<ExpandedGroup>>;

    fn list_portfolios(
        &self,
        scope: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<PortfolioRef>>;
}
