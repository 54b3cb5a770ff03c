//! Relay ranking: daily batch entrypoint.
//! Polls the configured relays once, stores today's counts, and writes the
//! HTML ranking page.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relay_ranking::analyze::tally::ranked;
use relay_ranking::config::ranking::RankingConfig;
use relay_ranking::history::{trend_dates, CountStore, JsonFileStore, PgCountStore};
use relay_ranking::ingest::{self, relay::WsRelay, types::RelaySource};
use relay_ranking::metrics::Metrics;
use relay_ranking::relay_info::RelayInfoClient;
use relay_ranking::report::{self, ReportPage};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("relay_ranking=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

async fn open_store(cfg: &RankingConfig) -> Result<Box<dyn CountStore>> {
    match cfg.database_url.as_deref() {
        Some(url) => Ok(Box::new(PgCountStore::connect(url).await?)),
        None => {
            info!(path = %cfg.history_path.display(), "no DATABASE_URL, using JSON history");
            Ok(Box::new(JsonFileStore::new(&cfg.history_path)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RankingConfig::load_default()?;
    let metrics = match cfg.metrics_path {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let sources: Vec<Arc<dyn RelaySource>> = cfg
        .relays
        .iter()
        .map(|url| Arc::new(WsRelay::new(url.clone())) as Arc<dyn RelaySource>)
        .collect();

    let (counts, summary) = ingest::run_once(&sources, &cfg.filter(), cfg.timeout()).await;
    if summary.collect.ok == 0 && !sources.is_empty() {
        warn!("no relay answered; today's counts will be empty");
    }

    let store = open_store(&cfg).await?;
    let today = Local::now().date_naive();
    store
        .replace_day(today, &counts)
        .await
        .with_context(|| format!("storing counts for {today}"))?;

    let mut ranks = ranked(&counts, cfg.min_count);
    RelayInfoClient::new()
        .with_timeout(cfg.info_timeout_secs)
        .fill_descriptions(&mut ranks)
        .await;

    let dates = trend_dates(today, cfg.history_days);
    let series = report::build_trends(store.as_ref(), &ranks, &dates, cfg.top_series).await?;

    let page = ReportPage {
        updated_at: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        min_count: cfg.min_count,
        dates,
        series,
        ranks,
    };
    tokio::fs::write(&cfg.output_path, report::render_html(&page))
        .await
        .with_context(|| format!("writing {}", cfg.output_path.display()))?;
    info!(path = %cfg.output_path.display(), ranked = page.ranks.len(), "report written");

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_path) {
        m.write_textfile(path).await?;
    }

    Ok(())
}
