use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use flush_transactions::api::DateWindow;
use flush_transactions::config::FlushConfig;
use flush_transactions::resolve::PortfolioSelector;
use flush_transactions::utils::date_window;
use flush_transactions::Result;

#[derive(Parser, Debug)]
#[command(name = "flush-transactions")]
#[command(about = "Query, export and cancel portfolio transactions through the platform REST API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Secrets file holding API location and credentials
    #[arg(long, global = true)]
    pub secrets: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cancel every transaction in the date window
    Flush(FlushArgs),

    /// Write every transaction in the date window to a CSV file
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Scope holding the target portfolio(s)
    pub scope: String,

    /// Portfolio code, or group code with --group
    #[arg(short = 'p', long, required_unless_present = "all_in_scope")]
    pub portfolio: Option<String>,

    /// Treat --portfolio as a portfolio group code
    #[arg(short = 'g', long)]
    pub group: bool,

    /// Target every portfolio in the scope
    #[arg(short = 'a', long)]
    pub all_in_scope: bool,

    /// YYYY-MM-DD (from midnight) or RFC 3339
    #[arg(long)]
    pub start_date: String,

    /// YYYY-MM-DD (through 23:59:59) or RFC 3339
    #[arg(long)]
    pub end_date: String,

    /// Transactions requested per page
    #[arg(long)]
    pub page_size: Option<usize>,
}

impl TargetArgs {
    pub fn selector(&self) -> Result<PortfolioSelector> {
        PortfolioSelector::from_args(
            &self.scope,
            self.portfolio.as_deref(),
            self.group,
            self.all_in_scope,
        )
    }

    pub fn window(&self) -> Result<DateWindow> {
        date_window(&self.start_date, &self.end_date)
    }
}

#[derive(Args, Debug)]
pub struct FlushArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Maximum characters in one cancellation request URL
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Portfolios flushed in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Log the planned batches without cancelling anything
    #[arg(long)]
    pub dry_run: bool,
}

impl FlushArgs {
    pub fn apply_overrides(&self, flush: &mut FlushConfig) {
        if let Some(page_size) = self.target.page_size {
            flush.page_size = page_size;
        }
        if let Some(max_chars) = self.max_chars {
            flush.max_chars = max_chars;
        }
        if let Some(concurrency) = self.concurrency {
            flush.concurrency = concurrency;
        }
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Destination CSV file
    #[arg(short, long)]
    pub output: PathBuf,
}
