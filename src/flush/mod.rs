use std::sync::Arc;

use crate::api::{DateWindow, PortfolioApi, TransactionApi};
use crate::error::Result;
use crate::report::{LogReporter, Reporter};
use crate::resolve::{resolve_portfolios, PortfolioSelector};

pub mod batcher;
pub mod concurrent;
pub mod orchestrator;
pub mod paginator;

pub use batcher::{batch_transaction_ids, Batch, BatchBudget};
pub use concurrent::flush_concurrently;
pub use orchestrator::{FlushOptions, FlushSummary, Flusher, PortfolioFlush};
pub use paginator::{CursorState, Paginator};

#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}

/// Resolve `selector` and cancel every transaction in `window`, one portfolio at a time.
///
/// Returns `(successful batches, failed batches)`.
pub fn flush_transactions<C>(
    api: Arc<C>,
    selector: &PortfolioSelector,
    window: DateWindow,
    options: FlushOptions,
) -> Result<(usize, usize)>
where
    C: TransactionApi + PortfolioApi + 'static,
{
    let reporter: Arc<dyn Reporter> = Arc::new(LogReporter);
    let portfolios = resolve_portfolios(&*api, selector, options.page_size, reporter.as_ref())?;
    let flusher = Flusher::new(api, reporter, options);
    Ok(flusher.flush_all(&portfolios, window)?.totals())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExpandedGroup;
    use crate::test_support::{portfolio, MockApi};
    use chrono::{TimeZone, Utc};

    #[test]
    fn concurrency_limit_is_at_least_one() {
        assert_eq!(ensure_concurrency_limit(0), 1);
        assert_eq!(ensure_concurrency_limit(8), 8);
    }

    #[test]
    fn flushes_every_portfolio_of_a_group() {
        let group = portfolio("uk-equities", "all-funds");
        let a = portfolio("uk-equities", "fund-a");
        let b = portfolio("uk-equities", "fund-b");
        let api = Arc::new(
            MockApi::new()
                .with_group(ExpandedGroup {
                    id: group.clone(),
                    portfolios: vec![a.clone(), b.clone()],
                    sub_groups: Vec::new(),
                })
                .with_transaction_count(&a, 5, 100)
                .with_transaction_count(&b, 1, 100)
                .failing_cancel(&b, 0),
        );
        let window = DateWindow::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap(),
        )
        .unwrap();

        let totals = flush_transactions(
            api.clone(),
            &PortfolioSelector::Group(group),
            window,
            FlushOptions::default(),
        )
        .unwrap();

        assert_eq!(totals, (1, 1));
        assert_eq!(api.cancel_count(&a), 1);
    }
}
