// src/ingest/mod.rs
pub mod collector;
pub mod error;
pub mod relay;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::analyze::extract::extract;
use crate::analyze::tally::{aggregate, RelayCounts};
use crate::ingest::collector::{collect_with_stats, CollectStats};
use crate::ingest::types::{RelayFilter, RelaySource};

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_fetch_ok_total", "Relays that answered before the deadline.");
        describe_counter!(
            "relay_fetch_errors_total",
            "Relays that failed to connect or query."
        );
        describe_counter!(
            "relay_fetch_timeouts_total",
            "Relays abandoned at the deadline."
        );
        describe_counter!(
            "relay_events_received_total",
            "Relay list events received across all relays."
        );
        describe_counter!("ranking_runs_total", "Completed ranking pipeline runs.");
        describe_gauge!("ranking_authors", "Distinct authors after newest-wins merge.");
        describe_gauge!(
            "ranking_ineligible_authors",
            "Authors excluded by the activitypub proxy marker."
        );
        describe_gauge!("ranking_relays", "Distinct relays with at least one user.");
        describe_gauge!("ranking_last_run_ts", "Unix ts when the ranking last ran.");
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub collect: CollectStats,
    pub authors: usize,
    pub ineligible: usize,
    pub relays: usize,
}

/// Run the ranking once: collect from every relay, keep each author's newest
/// relay list, extract referenced relays, count distinct authors per relay.
/// Never fails; unreachable relays just contribute nothing.
pub async fn run_once(
    sources: &[Arc<dyn RelaySource>],
    filter: &RelayFilter,
    timeout: Duration,
) -> (RelayCounts, RunSummary) {
    ensure_metrics_described();

    let (view, collect) = collect_with_stats(sources, filter, timeout).await;
    let extracted = extract(&view);
    let counts = aggregate(&extracted);

    let summary = RunSummary {
        collect,
        authors: extracted.len(),
        ineligible: extracted.values().filter(|r| !r.eligible).count(),
        relays: counts.len(),
    };

    // Telemetry
    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("ranking_authors").set(summary.authors as f64);
    gauge!("ranking_ineligible_authors").set(summary.ineligible as f64);
    gauge!("ranking_relays").set(summary.relays as f64);
    gauge!("ranking_last_run_ts").set(now as f64);
    counter!("ranking_runs_total").increment(1);

    tracing::info!(
        target: "ingest",
        relays_polled = collect.sources,
        relays_ok = collect.ok,
        authors = summary.authors,
        ineligible = summary.ineligible,
        relays_counted = summary.relays,
        "ranking run finished"
    );

    (counts, summary)
}

/// [`run_once`] without the summary.
pub async fn count_relays(
    sources: &[Arc<dyn RelaySource>],
    filter: &RelayFilter,
    timeout: Duration,
) -> RelayCounts {
    run_once(sources, filter, timeout).await.0
}
