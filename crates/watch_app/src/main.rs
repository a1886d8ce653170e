mod config;
mod dispatcher;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_error, engine_info, engine_warn};
use watch_engine::{
    ensure_state_dir, system_clock, CatalogStore, Checker, CheckerStores, CycleError,
    NotificationLog, ReqwestFetcher, SeenPointerStore, SubscriptionStore,
};

use config::{Cli, Command};
use dispatcher::LoggingDispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    engine_logging::initialize(cli.log_destination(), cli.log_level());

    for dir in cli.state_dirs() {
        ensure_state_dir(dir).with_context(|| format!("preparing state directory {dir:?}"))?;
    }
    let subscriptions = SubscriptionStore::open(&cli.subscriptions_path);

    match cli.command() {
        Command::Subscribe { subscriber, title } => {
            if subscriptions.subscribe(subscriber, &title)? {
                println!("{subscriber} now follows {title}");
            } else {
                println!("{subscriber} already follows {title}");
            }
        }
        Command::Unsubscribe { subscriber, title } => {
            if subscriptions.unsubscribe(subscriber, &title)? {
                println!("{subscriber} no longer follows {title}");
            } else {
                println!("{subscriber} was not following {title}");
            }
        }
        Command::Titles { subscriber } => {
            for title in subscriptions.titles_for(subscriber) {
                println!("{title}");
            }
        }
        Command::Retries => {
            let log = NotificationLog::open(&cli.notification_log_path, system_clock());
            for entry in log.retry_needed() {
                println!("{}\t{}\t{}", entry.id, entry.title, entry.timestamp);
            }
        }
        Command::Once => {
            let checker = build_checker(&cli, subscriptions)?;
            let mut needs_backfill = cli.backfill || !checker.stores().seen.exists();
            tick(&checker, &mut needs_backfill).await;
        }
        Command::Watch => {
            let checker = build_checker(&cli, subscriptions)?;
            let needs_backfill = cli.backfill || !checker.stores().seen.exists();
            // Spawned so the handler is installed before the first cycle starts.
            let stop = tokio::spawn(ctrl_c());
            watch(&checker, cli.interval(), needs_backfill, stop).await;
        }
    }
    Ok(())
}

fn build_checker(cli: &Cli, subscriptions: SubscriptionStore) -> Result<Checker> {
    let fetcher = ReqwestFetcher::new(cli.fetch_settings()).context("building http client")?;
    let stores = CheckerStores {
        catalog: CatalogStore::open(&cli.catalog_path),
        seen: SeenPointerStore::open(&cli.seen_path),
        log: NotificationLog::open(&cli.notification_log_path, system_clock()),
    };
    Ok(Checker::new(
        cli.checker_config(),
        Arc::new(fetcher),
        stores,
        Arc::new(LoggingDispatcher::new(subscriptions)),
    ))
}

/// Resolves on Ctrl-C. If no handler can be installed it never resolves, so
/// the loop keeps running.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        engine_warn!("Ctrl-C handler unavailable: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Poll until `stop` resolves. A running cycle always finishes before the loop
/// stops.
async fn watch<F>(checker: &Checker, interval: Duration, mut needs_backfill: bool, stop: F)
where
    F: Future + Unpin,
{
    let mut stop = stop;
    engine_info!("Watching every {}s", interval.as_secs());
    loop {
        tick(checker, &mut needs_backfill).await;
        tokio::select! {
            _ = &mut stop => {
                engine_info!("Interrupted, stopping");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// One loop iteration. Until a backfill succeeds no regular cycle runs, so a
/// first start never reports the whole catalog as new.
async fn tick(checker: &Checker, needs_backfill: &mut bool) {
    if *needs_backfill {
        match checker.backfill().await {
            Ok(_) => *needs_backfill = false,
            Err(err) => engine_error!("Backfill failed, retrying next tick: {}", err),
        }
        return;
    }
    match checker.run_cycle().await {
        Ok(report) => {
            if !report.retry_flagged.is_empty() {
                engine_warn!(
                    "{} notification(s) need a retry",
                    report.retry_flagged.len()
                );
            }
        }
        Err(CycleError::NoListings) => {}
        Err(err) => engine_error!("Cycle failed: {}", err),
    }
}
