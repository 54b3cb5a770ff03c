// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod history;
pub mod metrics;
pub mod relay_info;
pub mod report;

// Relay polling and the newest-per-author merge
pub mod ingest;

// Relay extraction and counting
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::tally::{RelayCounts, RelayRank};
pub use crate::ingest::collector::{collect, LatestByAuthor};
pub use crate::ingest::error::FetchError;
pub use crate::ingest::types::{RelayEvent, RelayFilter, RelaySource};
pub use crate::ingest::{count_relays, run_once, RunSummary};
