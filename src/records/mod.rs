pub mod export;

pub use export::{export_csv, TransactionExporter, EXPORT_HEADER};
