use std::fmt;
use std::sync::Arc;

use crate::api::{DateWindow, PortfolioRef, TransactionApi, TransactionQuery};
use crate::config::FlushConfig;
use crate::error::{AppError, Result};
use crate::report::Reporter;

use super::batcher::{batch_transaction_ids, BatchBudget};
use super::paginator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOptions {
    pub page_size: usize,
    pub max_chars: usize,
    /// Log the planned batches instead of cancelling them.
    pub dry_run: bool,
}

impl FlushOptions {
    pub fn from_config(config: &FlushConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_chars: config.max_chars,
            dry_run: false,
        }
    }
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self::from_config(&FlushConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching,
    Batching,
    Flushing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Fetching => "fetching",
            Stage::Batching => "batching",
            Stage::Flushing => "flushing",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Outcome of flushing one portfolio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioFlush {
    pub portfolio: PortfolioRef,
    pub transactions: usize,
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PortfolioFlush {
    fn empty(portfolio: &PortfolioRef) -> Self {
        Self {
            portfolio: portfolio.clone(),
            transactions: 0,
            batches: 0,
            succeeded: 0,
            failed: 0,
        }
    }
}

/// Per-portfolio outcomes in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub portfolios: Vec<PortfolioFlush>,
}

impl FlushSummary {
    pub fn record(&mut self, flush: PortfolioFlush) {
        self.portfolios.push(flush);
    }

    /// `(successful batches, failed batches)` across every portfolio.
    pub fn totals(&self) -> (usize, usize) {
        self.portfolios.iter().fold((0, 0), |(ok, failed), p| {
            (ok + p.succeeded, failed + p.failed)
        })
    }

    pub fn transactions(&self) -> usize {
        self.portfolios.iter().map(|p| p.transactions).sum()
    }

    pub fn batches(&self) -> usize {
        self.portfolios.iter().map(|p| p.batches).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.totals().1 == 0
    }

    pub fn describe(&self) -> String {
        let (succeeded, failed) = self.totals();
        let outcome = if self.is_clean() {
            "all batches succeeded".to_string()
        } else {
            format!("{} succeeded, {} failed", succeeded, failed)
        };
        format!(
            "{} portfolio(s), {} transaction(s) in {} batch(es): {}",
            self.portfolios.len(),
            self.transactions(),
            self.batches(),
            outcome
        )
    }
}

/// Drives fetch, batch and cancel for each portfolio.
pub struct Flusher {
    api: Arc<dyn TransactionApi>,
    reporter: Arc<dyn Reporter>,
    options: FlushOptions,
}

impl Flusher {
    pub fn new(
        api: Arc<dyn TransactionApi>,
        reporter: Arc<dyn Reporter>,
        options: FlushOptions,
    ) -> Self {
        Self {
            api,
            reporter,
            options,
        }
    }

    pub fn options(&self) -> &FlushOptions {
        &self.options
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// Flush every portfolio in order, stopping at the first fetch failure.
    pub fn flush_all(&self, portfolios: &[PortfolioRef], window: DateWindow) -> Result<FlushSummary> {
        let mut summary = FlushSummary::default();
        for portfolio in portfolios {
            summary.record(self.flush_portfolio(portfolio, window)?);
        }
        self.reporter
            .info(&format!("Flush finished: {}", summary.describe()));
        Ok(summary)
    }

    /// Cancel every transaction of `portfolio` inside `window`.
    ///
    /// Fetch failures abort the portfolio. Cancellation failures are logged and
    /// counted per batch without stopping the remaining batches.
    pub fn flush_portfolio(&self, portfolio: &PortfolioRef, window: DateWindow) -> Result<PortfolioFlush> {
        self.enter(portfolio, Stage::Fetching);
        let query = TransactionQuery {
            window,
            page_size: self.options.page_size,
        };
        let transactions = paginator::transactions(self.api.as_ref(), portfolio, query)
            .collect_values()
            .map_err(|err| AppError::fetch(portfolio, err))?;

        let mut outcome = PortfolioFlush::empty(portfolio);
        if transactions.is_empty() {
            self.reporter.info(&format!(
                "No transactions found for {} between {}",
                portfolio, window
            ));
            self.enter(portfolio, Stage::Done);
            return Ok(outcome);
        }
        outcome.transactions = transactions.len();

        self.enter(portfolio, Stage::Batching);
        let prefix = self.api.cancel_url_prefix(portfolio)?;
        let budget = BatchBudget::for_url_prefix(self.options.max_chars, &prefix);
        let batches = batch_transaction_ids(
            transactions.into_iter().map(|record| record.transaction_id),
            budget,
        );
        outcome.batches = batches.len();
        self.reporter.info(&format!(
            "Found {} transaction(s) for {}, split into {} batch(es)",
            outcome.transactions, portfolio, outcome.batches
        ));

        self.enter(portfolio, Stage::Flushing);
        for (index, batch) in batches.iter().enumerate() {
            if self.options.dry_run {
                self.reporter.info(&format!(
                    "[dry run] would cancel batch {} of {} for {} ({} transaction(s), {} chars)",
                    index + 1,
                    outcome.batches,
                    portfolio,
                    batch.len(),
                    budget.base_len + batch.query_len
                ));
                continue;
            }

            match self.api.cancel_transactions(portfolio, &batch.ids) {
                Ok(()) => {
                    outcome.succeeded += 1;
                    self.reporter.debug(&format!(
                        "Cancelled batch {} of {} for {} ({} transaction(s))",
                        index + 1,
                        outcome.batches,
                        portfolio,
                        batch.len()
                    ));
                }
                Err(err) => {
                    outcome.failed += 1;
                    self.reporter.error(&format!(
                        "Failed to cancel batch {} of {} (scope {}, code {}, {} transaction(s)): {}",
                        index + 1,
                        outcome.batches,
                        portfolio.scope,
                        portfolio.code,
                        batch.len(),
                        err
                    ));
                }
            }
        }

        self.enter(portfolio, Stage::Done);
        self.reporter.info(&format!(
            "Flushed {}: {} batch(es) succeeded, {} failed",
            portfolio, outcome.succeeded, outcome.failed
        ));
        Ok(outcome)
    }

    fn enter(&self, portfolio: &PortfolioRef, stage: Stage) {
        self.reporter.debug(&format!("{portfolio}: {stage}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{portfolio, MockApi, RecordingReporter};
    use chrono::{TimeZone, Utc};

    fn window() -> DateWindow {
        DateWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap(),
        )
        .unwrap()
    }

    /// Room for exactly two generated identifiers per batch.
    fn two_per_batch(api: &MockApi, target: &PortfolioRef) -> FlushOptions {
        let prefix = api.cancel_url_prefix(target).unwrap();
        FlushOptions {
            page_size: 4,
            max_chars: prefix.len() + 100,
            dry_run: false,
        }
    }

    fn flusher(
        api: MockApi,
        options: impl FnOnce(&MockApi) -> FlushOptions,
    ) -> (Arc<MockApi>, Arc<RecordingReporter>, Flusher) {
        let options = options(&api);
        let api = Arc::new(api);
        let reporter = Arc::new(RecordingReporter::default());
        let flusher = Flusher::new(api.clone(), reporter.clone(), options);
        (api, reporter, flusher)
    }

    #[test]
    fn failed_batch_is_counted_and_the_rest_continue() {
        let target = portfolio("uk-equities", "growth-01");
        let api = MockApi::new()
            .with_transaction_count(&target, 10, 4)
            .failing_cancel(&target, 2);

        let (api, reporter, flusher) = flusher(api, |api| two_per_batch(api, &target));
        let outcome = flusher.flush_portfolio(&target, window()).unwrap();

        assert_eq!(outcome.transactions, 10);
        assert_eq!(outcome.batches, 5);
        assert_eq!((outcome.succeeded, outcome.failed), (4, 1));
        assert_eq!(api.cancel_count(&target), 5);

        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("batch 3 of 5"), "unexpected: {}", errors[0]);
        assert!(errors[0].contains("scope uk-equities, code growth-01"));
        assert!(errors[0].contains("2 transaction(s)"));
    }

    #[test]
    fn follows_every_page_before_batching() {
        let target = portfolio("uk-equities", "growth-01");
        let api = MockApi::new().with_transaction_count(&target, 10, 4);

        let (api, _reporter, flusher) = flusher(api, |api| two_per_batch(api, &target));
        flusher.flush_portfolio(&target, window()).unwrap();

        let cursors: Vec<Option<String>> = api
            .transaction_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cursor)| cursor.clone())
            .collect();
        assert_eq!(
            cursors,
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );

        let cancelled: Vec<String> = api
            .cancel_calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, ids)| ids.clone())
            .collect();
        assert_eq!(cancelled.len(), 10);
        assert_eq!(cancelled[0], "growth-01-txn-00000");
        assert_eq!(cancelled[9], "growth-01-txn-00009");
    }

    #[test]
    fn portfolio_without_transactions_reports_zero() {
        let target = portfolio("uk-equities", "empty");
        let (api, reporter, flusher) = flusher(MockApi::new(), |_| FlushOptions::default());

        let outcome = flusher.flush_portfolio(&target, window()).unwrap();

        assert_eq!((outcome.succeeded, outcome.failed), (0, 0));
        assert_eq!(outcome.batches, 0);
        assert_eq!(api.cancel_count(&target), 0);
        assert!(reporter
            .infos()
            .iter()
            .any(|line| line.contains("No transactions found for uk-equities/empty")));
    }

    #[test]
    fn fetch_failure_stops_the_sequential_run() {
        let first = portfolio("uk-equities", "first");
        let broken = portfolio("uk-equities", "broken");
        let never = portfolio("uk-equities", "never");
        let api = MockApi::new()
            .with_transaction_count(&first, 3, 10)
            .failing_fetch(&broken)
            .with_transaction_count(&never, 3, 10);

        let (api, _reporter, flusher) = flusher(api, |_| FlushOptions::default());
        let err = flusher
            .flush_all(&[first.clone(), broken.clone(), never.clone()], window())
            .unwrap_err();

        match err {
            AppError::Fetch { portfolio, source } => {
                assert_eq!(portfolio, broken);
                assert!(source.to_string().contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(api.cancel_count(&first), 1);
        assert!(api
            .transaction_requests
            .lock()
            .unwrap()
            .iter()
            .all(|(p, _)| p != &never));
    }

    #[test]
    fn dry_run_plans_without_cancelling() {
        let target = portfolio("uk-equities", "growth-01");
        let api = MockApi::new().with_transaction_count(&target, 10, 4);

        let (api, reporter, flusher) = flusher(api, |api| FlushOptions {
            dry_run: true,
            ..two_per_batch(api, &target)
        });
        let outcome = flusher.flush_portfolio(&target, window()).unwrap();

        assert_eq!(outcome.batches, 5);
        assert_eq!((outcome.succeeded, outcome.failed), (0, 0));
        assert_eq!(api.cancel_count(&target), 0);
        let planned = reporter
            .infos()
            .iter()
            .filter(|line| line.starts_with("[dry run]"))
            .count();
        assert_eq!(planned, 5);
    }

    #[test]
    fn summary_aggregates_across_portfolios() {
        let a = portfolio("uk-equities", "a");
        let b = portfolio("uk-equities", "b");
        let api = MockApi::new()
            .with_transaction_count(&a, 4, 10)
            .with_transaction_count(&b, 2, 10)
            .failing_cancel(&b, 0);

        let (_api, _reporter, flusher) = flusher(api, |_| FlushOptions::default());
        let summary = flusher.flush_all(&[a, b], window()).unwrap();

        assert_eq!(summary.totals(), (1, 1));
        assert_eq!(summary.transactions(), 6);
        assert!(!summary.is_clean());
        assert!(summary.describe().contains("1 succeeded, 1 failed"));
    }

    #[test]
    fn clean_summary_reports_every_batch_succeeded() {
        let a = portfolio("uk-equities", "a");
        let api = MockApi::new().with_transaction_count(&a, 4, 10);

        let (_api, _reporter, flusher) = flusher(api, |_| FlushOptions::default());
        let summary = flusher.flush_all(&[a], window()).unwrap();

        assert!(summary.is_clean());
        assert_eq!(
            summary.describe(),
            "1 portfolio(s), 4 transaction(s) in 1 batch(es): all batches succeeded"
        );
    }
}
