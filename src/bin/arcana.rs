//! `arcana` command-line entry point: backfill/daemon ingestion, bar
//! construction from stored trades, and swarm planning/validation.

use std::process::ExitCode;
use std::sync::Arc;

use arcana::bars::{build_builder, parse_bar_spec};
use arcana::config::Settings;
use arcana::error::ArcanaError;
use arcana::ingest::{Cancel, Ingester};
use arcana::source::exchange::{min_timestamp_increment, ExchangeTradeSource};
use arcana::store::postgres::PostgresStore;
use arcana::store::Store;
use arcana::swarm;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arcana", version, about = "Resumable trade ingestion and information-driven bar construction")]
struct Cli {
    /// Path to a TOML config file layered under defaults and before env vars.
    #[arg(long, global = true, env = "ARCANA_CONFIG")]
    config: Option<String>,

    /// Exchange source tag, e.g. "coinbase".
    #[arg(long, global = true, env = "ARCANA_SOURCE", default_value = "coinbase")]
    source: String,

    /// Base URL of the exchange trades endpoint.
    #[arg(long, global = true, env = "ARCANA_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Backfill trades for `pair` over `[since, until)`, resuming from the
    /// stored watermark.
    Ingest {
        pair: String,
        #[arg(long)]
        since: DateTime<Utc>,
        #[arg(long)]
        until: DateTime<Utc>,
    },
    /// Poll for new trades forever, closing the gap since the last backfill.
    Daemon {
        pair: String,
    },
    /// Build bars of `spec` (e.g. `tick_500`, `tib_10`) for `pair` from
    /// stored trades since the family's last stored bar.
    Bars {
        spec: String,
        pair: String,
    },
    /// Partition `[since, until)` into `n` disjoint worker ranges.
    SwarmPlan {
        #[arg(long)]
        since: DateTime<Utc>,
        #[arg(long)]
        until: DateTime<Utc>,
        #[arg(long)]
        n: usize,
    },
    /// Report UTC days in `[since, until)` with no ingested trades.
    SwarmValidate {
        pair: String,
        #[arg(long)]
        since: DateTime<Utc>,
        #[arg(long)]
        until: DateTime<Utc>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log.level).unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<(), ArcanaError> {
    let store = Arc::new(PostgresStore::connect(&settings.db.connection_url()).await?);
    store.init_schema().await?;

    match cli.command {
        Command::Ingest { pair, since, until } => {
            let source = make_source(&cli.source, cli.base_url.as_deref(), &settings, &[pair.clone()]);
            let ingester = Ingester::new(
                source,
                store,
                cli.source.clone(),
                settings.ingest.window_seconds,
                settings.ingest.batch_size,
            );
            let cancel = Cancel::new();
            install_signal_handler(cancel.clone());
            ingester.ingest(&pair, since, until, &cancel).await
        }
        Command::Daemon { pair } => {
            let source = make_source(&cli.source, cli.base_url.as_deref(), &settings, &[pair.clone()]);
            let ingester = Ingester::new(
                source,
                store,
                cli.source.clone(),
                settings.ingest.window_seconds,
                settings.ingest.batch_size,
            );
            let cancel = Cancel::new();
            install_signal_handler(cancel.clone());
            ingester.run(&pair, settings.daemon.interval_seconds, &cancel).await
        }
        Command::Bars { spec, pair } => build_bars(store, &cli.source, &spec, &pair).await,
        Command::SwarmPlan { since, until, n } => {
            let ranges = swarm::partition(since, until, n)?;
            for range in ranges {
                println!("{} {}", range.since.to_rfc3339(), range.until.to_rfc3339());
            }
            Ok(())
        }
        Command::SwarmValidate { pair, since, until } => {
            let gaps = swarm::validate(store.as_ref(), &cli.source, &pair, since, until).await?;
            if gaps.is_empty() {
                info!(pair, "no gaps found");
            } else {
                for gap in &gaps {
                    println!("{}", gap.day);
                }
            }
            Ok(())
        }
    }
}

fn make_source(
    source_tag: &str,
    base_url: Option<&str>,
    settings: &Settings,
    pairs: &[String],
) -> Arc<ExchangeTradeSource> {
    let base_url = base_url.unwrap_or("https://api.exchange.coinbase.com/products/trades");
    Arc::new(
        ExchangeTradeSource::new(base_url, source_tag, pairs.to_vec())
            .with_min_delay(std::time::Duration::from_secs_f64(settings.rate.min_delay_seconds)),
    )
}

/// Build every bar the stored trade log supports for `spec`/`pair`, resuming
/// EWMA state from the family's last stored bar and persisting each
/// emission.
async fn build_bars(
    store: Arc<PostgresStore>,
    source_tag: &str,
    spec: &str,
    pair: &str,
) -> Result<(), ArcanaError> {
    let bar_spec = parse_bar_spec(spec)?;
    let bar_type = bar_spec.bar_type();

    let prior = store.last_bar(&bar_type, source_tag, pair).await?;
    let resume_from = prior
        .as_ref()
        .map(|b| min_timestamp_increment(b.time_end))
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).expect("epoch is a valid timestamp"));

    let trades = store.trades_since(source_tag, pair, resume_from).await?;
    let mut builder = build_builder(&bar_spec, source_tag, pair, prior.as_ref());
    let bars = builder.process_trades(&trades);

    if bars.is_empty() {
        info!(bar_type, pair, "no new bars emitted");
        return Ok(());
    }

    info!(bar_type, pair, emitted = bars.len(), "built bars");
    store.insert_bars(&bars).await?;
    Ok(())
}

fn install_signal_handler(cancel: Cancel) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            cancel.cancel();
        }
    });
}
