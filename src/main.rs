mod cli;

use std::error::Error as _;
use std::process::ExitCode;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use tokio::runtime::Handle;

use flush_transactions::api::RestClient;
use flush_transactions::config::{load_config, validate_config, FlushConfig};
use flush_transactions::flush::{flush_concurrently, FlushOptions, FlushSummary, Flusher};
use flush_transactions::records::export_csv;
use flush_transactions::report::{LogReporter, Reporter};
use flush_transactions::resolve::resolve_portfolios;
use flush_transactions::{AppError, Result};

use cli::{Cli, Commands, ExportArgs, FlushArgs};

/// Exit status when at least one cancellation batch failed.
const PARTIAL_FAILURE: u8 = 2;
const FATAL: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    // Argument errors exit with 1; 2 is reserved for partially failed flushes.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(FATAL)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    // The blocking HTTP client must not live on a runtime worker.
    let handle = Handle::current();
    let outcome = tokio::task::spawn_blocking(move || run(cli, handle))
        .await
        .map_err(AppError::from)
        .and_then(|result| result);

    if let Err(err) = &outcome {
        eprintln!("Error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  Caused by: {cause}");
            source = cause.source();
        }
    }
    ExitCode::from(exit_status(&outcome))
}

/// 0 when every batch succeeded, 2 when some failed, 1 on a fatal error.
fn exit_status(outcome: &Result<bool>) -> u8 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => PARTIAL_FAILURE,
        Err(_) => FATAL,
    }
}

/// Returns whether every batch succeeded.
fn run(cli: Cli, handle: Handle) -> Result<bool> {
    let mut config = load_config(cli.secrets.as_deref())?;
    let reporter: Arc<dyn Reporter> = Arc::new(LogReporter);

    match cli.command {
        Commands::Flush(args) => {
            args.apply_overrides(&mut config.flush);
            validate_config(&config)?;
            let client = Arc::new(RestClient::new(&config.api, config.flush.timeout())?);
            let summary = flush(&args, &config.flush, client.clone(), reporter, &handle)?;
            Ok(summary.is_clean())
        }
        Commands::Export(args) => {
            if let Some(page_size) = args.target.page_size {
                config.flush.page_size = page_size;
            }
            validate_config(&config)?;
            let client = RestClient::new(&config.api, config.flush.timeout())?;
            export(&args, config.flush.page_size, &client, reporter.as_ref())?;
            Ok(true)
        }
    }
}

fn flush(
    args: &FlushArgs,
    settings: &FlushConfig,
    client: Arc<RestClient>,
    reporter: Arc<dyn Reporter>,
    handle: &Handle,
) -> Result<FlushSummary> {
    let selector = args.target.selector()?;
    let window = args.target.window()?;
    let portfolios = resolve_portfolios(&*client, &selector, settings.page_size, reporter.as_ref())?;

    let options = FlushOptions {
        dry_run: args.dry_run,
        ..FlushOptions::from_config(settings)
    };
    reporter.info(&format!(
        "Flushing transactions between {} for {}{}",
        window,
        selector,
        if options.dry_run { " (dry run)" } else { "" }
    ));

    let flusher = Arc::new(Flusher::new(client, reporter, options));
    if settings.concurrency > 1 && portfolios.len() > 1 {
        let progress = Arc::new(AtomicUsize::new(0));
        handle.block_on(flush_concurrently(
            Arc::clone(&flusher),
            portfolios,
            window,
            settings.concurrency,
            progress,
        ))
    } else {
        flusher.flush_all(&portfolios, window)
    }
}

fn export(args: &ExportArgs, page_size: usize, client: &RestClient, reporter: &dyn Reporter) -> Result<()> {
    let selector = args.target.selector()?;
    let window = args.target.window()?;
    let portfolios = resolve_portfolios(client, &selector, page_size, reporter)?;

    export_csv(client, &portfolios, window, page_size, &args.output, reporter)?;
    Ok(())
}
