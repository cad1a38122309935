pub mod api;
pub mod config;
pub mod error;
pub mod flush;
pub mod records;
pub mod report;
pub mod resolve;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use error::{AppError, Result};
pub use flush::{flush_transactions, Flusher};
