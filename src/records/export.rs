use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::api::{DateWindow, PortfolioRef, TransactionApi, TransactionQuery, TransactionRecord};
use crate::error::{AppError, Context, Result};
use crate::flush::paginator;
use crate::report::Reporter;

pub const EXPORT_HEADER: [&str; 10] = [
    "scope",
    "code",
    "transactionId",
    "type",
    "transactionDate",
    "settlementDate",
    "units",
    "amount",
    "currency",
    "instrumentUid",
];

/// Writes transactions as CSV rows, one header line first.
pub struct TransactionExporter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> TransactionExporter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(EXPORT_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_transactions(
        &mut self,
        portfolio: &PortfolioRef,
        transactions: &[TransactionRecord],
    ) -> Result<()> {
        for txn in transactions {
            let units = txn.units.to_string();
            let amount = txn.amount.to_string();
            self.writer.write_record([
                portfolio.scope.as_str(),
                portfolio.code.as_str(),
                txn.transaction_id.as_str(),
                txn.transaction_type.as_str(),
                txn.transaction_date.as_str(),
                txn.settlement_date.as_str(),
                units.as_str(),
                amount.as_str(),
                txn.currency.as_str(),
                txn.instrument_uid.as_str(),
            ])?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush buffered rows and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|err| {
            AppError::message(format!("Failed to flush CSV output: {}", err.error()))
        })
    }
}

/// Page through every transaction of `portfolios` in `window` and write them to `path`.
///
/// Rows are staged in a temporary file next to `path`, which only replaces `path`
/// once every portfolio has been exported. Returns the number of rows written.
pub fn export_csv(
    api: &dyn TransactionApi,
    portfolios: &[PortfolioRef],
    window: DateWindow,
    page_size: usize,
    path: &Path,
    reporter: &dyn Reporter,
) -> Result<usize> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create staging file in {}", parent.display()))?;
    let mut exporter = TransactionExporter::new(staging)?;
    let query = TransactionQuery { window, page_size };

    for portfolio in portfolios {
        let before = exporter.rows();
        for page in paginator::transactions(api, portfolio, query) {
            let page = page.map_err(|err| AppError::fetch(portfolio, err))?;
            exporter.write_transactions(portfolio, &page.values)?;
        }
        reporter.info(&format!(
            "Exported {} transaction(s) for {}",
            exporter.rows() - before,
            portfolio
        ));
    }

    let rows = exporter.rows();
    let mut staging = exporter.into_inner()?;
    staging.flush()?;
    staging
        .persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to write export file {}", path.display()))?;

    reporter.info(&format!("Wrote {} row(s) to {}", rows, path.display()));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{portfolio, MockApi, RecordingReporter};
    use chrono::{TimeZone, Utc};

    #[test]
    fn writes_header_and_portfolio_columns() {
        let target = portfolio("uk-equities", "growth-01");
        let record = TransactionRecord {
            transaction_id: "TXN-1".to_string(),
            transaction_type: "Buy".to_string(),
            transaction_date: "2024-03-01T00:00:00Z".to_string(),
            settlement_date: "2024-03-03T00:00:00Z".to_string(),
            units: 150.0,
            amount: 1234.5,
            currency: "GBP".to_string(),
            instrument_uid: "INSTR_00001".to_string(),
        };

        let mut exporter = TransactionExporter::new(Vec::new()).unwrap();
        exporter.write_transactions(&target, &[record]).unwrap();
        let output = String::from_utf8(exporter.into_inner().unwrap()).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[0],
            "scope,code,transactionId,type,transactionDate,settlementDate,units,amount,currency,instrumentUid"
        );
        assert_eq!(
            lines[1],
            "uk-equities,growth-01,TXN-1,Buy,2024-03-01T00:00:00Z,2024-03-03T00:00:00Z,150,1234.5,GBP,INSTR_00001"
        );
    }

    #[test]
    fn exports_every_page_of_every_portfolio() {
        let a = portfolio("uk-equities", "fund-a");
        let b = portfolio("uk-equities", "fund-b");
        let api = MockApi::new()
            .with_transaction_count(&a, 5, 2)
            .with_pages(&b, vec![vec!["b-1"]]);
        let reporter = RecordingReporter::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.csv");
        let window = DateWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        )
        .unwrap();

        let rows = export_csv(&api, &[a, b], window, 2, &path, &reporter).unwrap();

        assert_eq!(rows, 6);
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let ids: Vec<String> = reader
            .records()
            .map(|record| record.unwrap()[2].to_string())
            .collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[0], "fund-a-txn-00000");
        assert_eq!(ids[5], "b-1");
    }

    #[test]
    fn failed_export_leaves_no_partial_file() {
        let good = portfolio("uk-equities", "good");
        let broken = portfolio("uk-equities", "broken");
        let api = MockApi::new()
            .with_transaction_count(&good, 3, 10)
            .failing_fetch(&broken);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.csv");
        let window = DateWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        )
        .unwrap();

        let result = export_csv(
            &api,
            &[good, broken],
            window,
            10,
            &path,
            &RecordingReporter::default(),
        );

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn fetch_failure_names_the_portfolio() {
        let broken = portfolio("uk-equities", "broken");
        let api = MockApi::new().failing_fetch(&broken);
        let dir = tempfile::tempdir().unwrap();
        let window = DateWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();

        let err = export_csv(
            &api,
            &[broken],
            window,
            10,
            &dir.path().join("out.csv"),
            &RecordingReporter::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("uk-equities/broken"));
    }
}
