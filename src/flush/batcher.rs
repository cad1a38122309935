/// Query parameter carrying each identifier in a cancellation request.
pub const TRANSACTION_ID_PARAM: &str = "transactionIds";

/// Characters one identifier adds to the query string: `transactionIds=<id>&`.
pub fn encoded_len(transaction_id: &str) -> usize {
    TRANSACTION_ID_PARAM.len() + 1 + transaction_id.len() + 1
}

/// Character budget for one cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBudget {
    pub max_chars: usize,
    pub base_len: usize,
}

impl BatchBudget {
    pub fn new(max_chars: usize, base_len: usize) -> Self {
        Self {
            max_chars,
            base_len,
        }
    }

    /// Budget for requests sent to `url_prefix`, which includes the trailing `?`.
    pub fn for_url_prefix(max_chars: usize, url_prefix: &str) -> Self {
        Self::new(max_chars, url_prefix.len())
    }

    /// Characters left for the query string.
    pub fn remaining(&self) -> usize {
        self.max_chars.saturating_sub(self.base_len)
    }
}

/// Identifiers sent together in one cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub ids: Vec<String>,
    /// Sum of [`encoded_len`] over `ids`.
    pub query_len: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Greedily split `ids` into order-preserving batches that fit `budget`.
///
/// A batch is closed before the identifier that would bring it to or past the
/// remaining budget. An identifier too long for any batch still travels alone.
pub fn batch_transaction_ids<I, S>(ids: I, budget: BatchBudget) -> Vec<Batch>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let remaining = budget.remaining();
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut running = 0usize;

    for id in ids {
        let id = id.into();
        let encoded = encoded_len(&id);

        if !current.is_empty() && running + encoded >= remaining {
            batches.push(Batch {
                ids: std::mem::take(&mut current),
                query_len: running,
            });
            running = 0;
        }

        running += encoded;
        current.push(id);
    }

    if !current.is_empty() {
        batches.push(Batch {
            ids: current,
            query_len: running,
        });
    }

    batches
}
