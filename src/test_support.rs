use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::api::{
    ExpandedGroup, Page, PortfolioApi, PortfolioRef, TransactionApi, TransactionQuery,
    TransactionRecord,
};
use crate::error::{AppError, Result};
use crate::report::Reporter;

pub fn portfolio(scope: &str, code: &str) -> PortfolioRef {
    PortfolioRef::new(scope, code).expect("valid test portfolio")
}

/// Scripted stand-in for the REST client.
///
/// Page cursors are the stringified index of the next page.
#[derive(Default)]
pub struct MockApi {
    transactions: HashMap<PortfolioRef, Vec<Vec<String>>>,
    failing_fetches: HashSet<PortfolioRef>,
    failing_cancels: HashMap<PortfolioRef, HashSet<usize>>,
    groups: HashMap<PortfolioRef, ExpandedGroup>,
    scopes: HashMap<String, Vec<Vec<PortfolioRef>>>,
    pub transaction_requests: Mutex<Vec<(PortfolioRef, Option<String>)>>,
    pub cancel_calls: Mutex<Vec<(PortfolioRef, Vec<String>)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, portfolio: &PortfolioRef, pages: Vec<Vec<&str>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self.transactions.insert(portfolio.clone(), pages);
        self
    }

    /// `count` generated identifiers split into pages of `page_size`.
    pub fn with_transaction_count(
        mut self,
        portfolio: &PortfolioRef,
        count: usize,
        page_size: usize,
    ) -> Self {
        let ids: Vec<String> = (0..count)
            .map(|index| format!("{}-txn-{index:05}", portfolio.code))
            .collect();
        let pages = ids.chunks(page_size.max(1)).map(<[String]>::to_vec).collect();
        self.transactions.insert(portfolio.clone(), pages);
        self
    }

    pub fn failing_fetch(mut self, portfolio: &PortfolioRef) -> Self {
        self.failing_fetches.insert(portfolio.clone());
        self
    }

    /// Make the `index`-th (zero based) cancellation for `portfolio` fail.
    pub fn failing_cancel(mut self, portfolio: &PortfolioRef, index: usize) -> Self {
        self.failing_cancels
            .entry(portfolio.clone())
            .or_default()
            .insert(index);
        self
    }

    pub fn with_group(mut self, group: ExpandedGroup) -> Self {
        self.groups.insert(group.id.clone(), group);
        self
    }

    pub fn with_scope(mut self, scope: &str, pages: Vec<Vec<PortfolioRef>>) -> Self {
        self.scopes.insert(scope.to_string(), pages);
        self
    }

    pub fn cancel_count(&self, portfolio: &PortfolioRef) -> usize {
        self.cancel_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == portfolio)
            .count()
    }
}

fn page_index(cursor: Option<&str>) -> usize {
    cursor.map(|c| c.parse().expect("numeric cursor")).unwrap_or(0)
}

fn paged<T: Clone>(pages: &[Vec<T>], index: usize) -> Page<T> {
    let values = pages.get(index).cloned().unwrap_or_default();
    let next = (index + 1 < pages.len()).then(|| (index + 1).to_string());
    Page::new(values, next)
}

impl TransactionApi for MockApi {
    fn list_transactions(
        &self,
        portfolio: &PortfolioRef,
        _query: &TransactionQuery,
        cursor: Option<&str>,
    ) -> Result<Page<TransactionRecord>> {
        self.transaction_requests
            .lock()
            .unwrap()
            .push((portfolio.clone(), cursor.map(str::to_string)));

        if self.failing_fetches.contains(portfolio) {
            return Err(AppError::Service {
                method: "GET",
                url: format!("mock://{portfolio}/transactions"),
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        let pages = self
            .transactions
            .get(portfolio)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let page = paged(pages, page_index(cursor));
        Ok(Page::new(
            page.values.into_iter().map(|id| TransactionRecord::with_id(id)).collect(),
            page.next_cursor,
        ))
    }

    fn cancel_url_prefix(&self, portfolio: &PortfolioRef) -> Result<String> {
        Ok(format!(
            "https://acme.platform.example/api/transactionportfolios/{}/{}/transactions?",
            portfolio.scope, portfolio.code
        ))
    }

    fn cancel_transactions(&self, portfolio: &PortfolioRef, transaction_ids: &[String]) -> Result<()> {
        let mut calls = self.cancel_calls.lock().unwrap();
        let index = calls.iter().filter(|(p, _)| p == portfolio).count();
        calls.push((portfolio.clone(), transaction_ids.to_vec()));

        let fails = self
            .failing_cancels
            .get(portfolio)
            .map_or(false, |indices| indices.contains(&index));
        if fails {
            return Err(AppError::Service {
                method: "DELETE",
                url: format!("mock://{portfolio}/transactions"),
                status: 500,
                body: "cancel rejected".to_string(),
            });
        }
        Ok(())
    }
}

impl PortfolioApi for MockApi {
    fn expand_group(&self, group: &PortfolioRef) -> Result<Option<ExpandedGroup>> {
        Ok(self.groups.get(group).cloned())
    }

    fn list_portfolios(
        &self,
        scope: &str,
        _page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<PortfolioRef>> {
        let pages = self.scopes.get(scope).map(Vec::as_slice).unwrap_or(&[]);
        Ok(paged(pages, page_index(cursor)))
    }
}

/// Captures every message for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
