use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::api::{Page, PortfolioApi, PortfolioRef, TransactionApi, TransactionQuery, TransactionRecord};
use crate::error::Result;

/// Where the paginator stands between advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Another request is due; `None` only before the first page.
    Active(Option<String>),
    /// The page just handed out carried no continuation.
    Final,
    Done,
}

/// Lazily walks a cursor-paginated listing, one request per advance.
///
/// Exhaustion is observed one advance after the last page: the iterator yields the
/// final page, moves to [`CursorState::Final`], and only ends on the next call.
/// A failed request is yielded once and ends iteration.
pub struct Paginator<T, F> {
    fetch: F,
    state: CursorState,
    requests: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Paginator<T, F> {
    pub fn new(fetch: F) -> Self
    where
        F: FnMut(Option<&str>) -> Result<Page<T>>,
    {
        Self {
            fetch,
            state: CursorState::Active(None),
            requests: 0,
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Number of page requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl<T, F> Paginator<T, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
{
    /// Drain every page and concatenate the values, stopping at the first error.
    pub fn collect_values(self) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for page in self {
            values.extend(page?.values);
        }
        Ok(values)
    }
}

impl<T, F> Iterator for Paginator<T, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
{
    type Item = Result<Page<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = match std::mem::replace(&mut self.state, CursorState::Done) {
            CursorState::Done | CursorState::Final => return None,
            CursorState::Active(cursor) => cursor,
        };

        self.requests += 1;
        match (self.fetch)(cursor.as_deref()) {
            Ok(page) => {
                self.state = match page.cursor() {
                    Some(next) => CursorState::Active(Some(next.to_string())),
                    None => CursorState::Final,
                };
                Some(Ok(page))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl<T, F> FusedIterator for Paginator<T, F> where F: FnMut(Option<&str>) -> Result<Page<T>> {}

/// Pages through every transaction of `portfolio` inside the query window.
pub fn transactions<'a>(
    api: &'a dyn TransactionApi,
    portfolio: &'a PortfolioRef,
    query: TransactionQuery,
) -> Paginator<
    TransactionRecord,
    impl FnMut(Option<&str>) -> Result<Page<TransactionRecord>> + 'a,
> {
    Paginator::new(move |cursor: Option<&str>| api.list_transactions(portfolio, &query, cursor))
}

/// Pages through every portfolio registered under `scope`.
pub fn scope_portfolios<'a>(
    api: &'a dyn PortfolioApi,
    scope: &'a str,
    page_size: usize,
) -> Paginator<PortfolioRef, impl FnMut(Option<&str>) -> Result<Page<PortfolioRef>> + 'a> {
    Paginator::new(move |cursor: Option<&str>| api.list_portfolios(scope, page_size, cursor))
}
