// src/ingest/collector.rs
//! Fan-out over all relays under one deadline, merged into a newest-per-author
//! view.
//!
//! Each relay gets its own task whose fetch is bounded by the shared deadline;
//! a fetch still running at the deadline is dropped, which closes its socket.
//! Results are merged by `collect` itself as tasks finish, so the view has a
//! single writer and no lock. Every task is joined (or aborted and joined)
//! before `collect` returns.

use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{info, warn};

use crate::ingest::error::FetchError;
use crate::ingest::types::{RelayEvent, RelayFilter, RelaySource};

/// Slack past the deadline for timed-out tasks to unwind before they are
/// aborted outright.
const JOIN_GRACE: Duration = Duration::from_millis(250);

/// Stand-in deadline for timeouts too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Newest event per author across all relays.
#[derive(Debug, Clone, Default)]
pub struct LatestByAuthor {
    by_author: HashMap<String, RelayEvent>,
}

impl LatestByAuthor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `ev` unless an event with an equal or newer `created_at` is
    /// already held for its author. Returns whether the view changed.
    pub fn offer(&mut self, ev: RelayEvent) -> bool {
        match self.by_author.entry(ev.pubkey.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(ev);
                true
            }
            Entry::Occupied(mut slot) => {
                if ev.created_at > slot.get().created_at {
                    slot.insert(ev);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn get(&self, author: &str) -> Option<&RelayEvent> {
        self.by_author.get(author)
    }

    pub fn len(&self) -> usize {
        self.by_author.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_author.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RelayEvent)> {
        self.by_author.iter()
    }
}

impl Extend<RelayEvent> for LatestByAuthor {
    fn extend<I: IntoIterator<Item = RelayEvent>>(&mut self, iter: I) {
        for ev in iter {
            self.offer(ev);
        }
    }
}

/// Per-run relay outcomes, for logs and the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub sources: usize,
    pub ok: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub events: usize,
}

pub async fn collect(
    sources: &[Arc<dyn RelaySource>],
    filter: &RelayFilter,
    timeout: Duration,
) -> LatestByAuthor {
    collect_with_stats(sources, filter, timeout).await.0
}

pub async fn collect_with_stats(
    sources: &[Arc<dyn RelaySource>],
    filter: &RelayFilter,
    timeout: Duration,
) -> (LatestByAuthor, CollectStats) {
    let deadline = deadline_after(Instant::now(), timeout);
    let hard_stop = deadline.checked_add(JOIN_GRACE).unwrap_or(deadline);

    let mut tasks = JoinSet::new();
    for source in sources {
        let source = Arc::clone(source);
        let filter = filter.clone();
        tasks.spawn(async move {
            let relay = source.url().to_string();
            let outcome = match time::timeout_at(deadline, source.fetch(&filter)).await {
                Ok(res) => res,
                Err(_) => Err(FetchError::Timeout {
                    relay: relay.clone(),
                }),
            };
            (relay, outcome)
        });
    }

    let mut view = LatestByAuthor::new();
    let mut stats = CollectStats {
        sources: sources.len(),
        ..CollectStats::default()
    };

    loop {
        let joined = match time::timeout_at(hard_stop, tasks.join_next()).await {
            Ok(Some(joined)) => joined,
            Ok(None) => break,
            Err(_) => {
                warn!(pending = tasks.len(), "abandoning relays past the deadline");
                stats.timed_out += tasks.len();
                counter!("relay_fetch_timeouts_total").increment(tasks.len() as u64);
                tasks.shutdown().await;
                break;
            }
        };

        match joined {
            Ok((relay, Ok(events))) => {
                info!(relay = %relay, events = events.len(), "relay fetched");
                counter!("relay_fetch_ok_total").increment(1);
                counter!("relay_events_received_total").increment(events.len() as u64);
                stats.ok += 1;
                stats.events += events.len();
                view.extend(events);
            }
            Ok((relay, Err(e))) if e.is_timeout() => {
                warn!(relay = %relay, "relay timed out");
                counter!("relay_fetch_timeouts_total").increment(1);
                stats.timed_out += 1;
            }
            Ok((relay, Err(e))) => {
                warn!(relay = %relay, error = %e, "relay fetch failed");
                counter!("relay_fetch_errors_total").increment(1);
                stats.failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "relay task did not complete");
                counter!("relay_fetch_errors_total").increment(1);
                stats.failed += 1;
            }
        }
    }

    (view, stats)
}
