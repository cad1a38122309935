use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::api::{DateWindow, PortfolioRef};
use crate::error::{AppError, Result};

use super::ensure_concurrency_limit;
use super::orchestrator::{FlushSummary, Flusher, PortfolioFlush};

/// Flush independent portfolios on the blocking pool with at most `limit` in flight.
///
/// Results are collected in input order. A fetch failure does not stop the other
/// portfolios; once all have finished, the first failure in input order is returned.
/// `progress` counts finished portfolios.
pub async fn flush_concurrently(
    flusher: Arc<Flusher>,
    portfolios: Vec<PortfolioRef>,
    window: DateWindow,
    limit: usize,
    progress: Arc<AtomicUsize>,
) -> Result<FlushSummary> {
    let limit = ensure_concurrency_limit(limit);
    progress.store(0, Ordering::SeqCst);

    flusher.reporter().info(&format!(
        "Flushing {} portfolio(s) with up to {} in flight",
        portfolios.len(),
        limit
    ));

    let outcomes: Vec<Result<PortfolioFlush>> = stream::iter(portfolios)
        .map(|portfolio| {
            let flusher = Arc::clone(&flusher);
            let progress = Arc::clone(&progress);
            async move {
                let joined = tokio::task::spawn_blocking(move || {
                    flusher.flush_portfolio(&portfolio, window)
                })
                .await;
                progress.fetch_add(1, Ordering::SeqCst);
                match joined {
                    Ok(outcome) => outcome,
                    Err(err) => Err(AppError::from(err)),
                }
            }
        })
        .buffered(limit)
        .collect()
        .await;

    let mut summary = FlushSummary::default();
    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(flush) => summary.record(flush),
            Err(err) => {
                flusher.reporter().error(&err.to_string());
                first_error.get_or_insert(err);
            }
        }
    }

    flusher
        .reporter()
        .info(&format!("Flush finished: {}", summary.describe()));

    match first_error {
        Some(err) => Err(err),
        None => Ok(summary),
    }
}
