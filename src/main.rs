mod cli;
mod error;
mod progress;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vigil_config::Config;
use vigil_feed::{HttpFeed, RetryPolicy, ensure_database};
use vigil_scan::{ScanEvent, ScanOptions, ScanSummary, scan};
use vigil_store::{Database, HashStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match configure(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        },
    };
    init_tracing(config.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping");
                cancel.cancel();
            }
        }
    });

    match run(&cli, &config, &cancel).await {
        Ok(summary) => {
            tracing::info!(?summary, "Done");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

fn configure(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    cli.apply(&mut config);
    config.validate().or_raise(|| ErrorKind::Config)?;
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "error" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

async fn run(cli: &Cli, config: &Config, cancel: &CancellationToken) -> Result<ScanSummary> {
    let retry = RetryPolicy::from(&config.feed.retry).with_cancellation(cancel.clone());
    let feed = HttpFeed::new(&config.feed, retry).or_raise(|| ErrorKind::Feed)?;
    let bar = progress::download_bar(config.verbose);
    let prepared = ensure_database(config, &feed, |event| progress::observe(&bar, event)).await;
    bar.finish_and_clear();
    prepared.or_raise(|| ErrorKind::Feed)?;

    let db = Database::open_read_only(&config.store.path, config.scan.threads)
        .await
        .or_raise(|| ErrorKind::Store)?;
    let store = HashStore::from(&db);
    let options = ScanOptions::from(&config.scan);

    let mut events = Box::pin(scan(&store, cli.path.clone(), &options));
    let mut summary = ScanSummary::default();
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => exn::bail!(ErrorKind::Interrupted),
            event = events.next() => event,
        };
        match event {
            Some(Ok(ScanEvent::Matched(found))) => println!("{found}"),
            Some(Ok(ScanEvent::Complete(done))) => summary = done,
            Some(Ok(_)) => {},
            Some(Err(e)) => return Err(e.raise(ErrorKind::Scan)),
            None => break,
        }
    }
    // Scratch directories are removed as the stream's tasks are dropped.
    drop(events);
    db.close().await;
    Ok(summary)
}
