use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use newswire::config::Config;
use newswire::crawler::Crawler;
use newswire::export;
use newswire::extract::BodySelector;
use newswire::lifecycle::{self, CycleOutcome};
use newswire::net::{Requester, Transport, TransportConfig};
use newswire::storage::Store;

#[derive(Parser, Debug)]
#[command(
    name = "newswire",
    about = "News feed crawler that archives full article bodies"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "newswire.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl cycle (the default)
    Crawl,
    /// Export all records published on a date (DD-MM-YYYY) to CSV
    Export { publish_date: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("failed to load configuration")?;

    let store = Store::open(&config.database_path)
        .await
        .context("failed to open database")?;

    match args.command.unwrap_or(Command::Crawl) {
        Command::Crawl => crawl(config, store).await,
        Command::Export { publish_date } => {
            let date = NaiveDate::parse_from_str(&publish_date, export::EXPORT_DATE_FORMAT)
                .context("publish date must look like 01-01-2020")?;
            let (path, count) = export::export_for_date(&store, date, &config.output_dir).await?;
            println!("Total loaded news: {}", count);
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

async fn crawl(config: Config, store: Store) -> Result<()> {
    let transport = Arc::new(
        Transport::new(&TransportConfig {
            per_host_limit: config.per_host_limit,
            total_timeout: Duration::from_secs(config.total_timeout_secs),
            verify_tls: config.verify_tls,
            user_agent: config.user_agent.clone(),
        })
        .context("failed to build HTTP transport")?,
    );
    let requester = Requester::new(Arc::clone(&transport), config.max_retries);
    let body_selector =
        BodySelector::new(&config.body_selector).context("invalid body_selector in config")?;
    let crawler = Crawler::new(
        requester,
        store,
        config.feed_url,
        body_selector,
        config.detail_concurrency,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    match lifecycle::run_cycle(transport, &crawler, shutdown).await {
        CycleOutcome::Completed(report) => {
            println!(
                "Crawl finished: {} new, {} skipped, {} bodies saved, {} failed",
                report.inserted, report.skipped, report.bodies_saved, report.failed
            );
            Ok(())
        }
        // Operator-initiated; not a fault
        CycleOutcome::Cancelled => Ok(()),
        // Feed-level failure is surfaced to monitoring via the exit code
        CycleOutcome::Failed => std::process::exit(1),
    }
}
