// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::ingest::error::FetchError;

/// NIP-65 relay list metadata.
pub const KIND_RELAY_LIST: u32 = 10002;
pub const DEFAULT_LIMIT: usize = 1000;

/// One event as delivered by a relay. Only the fields the ranking needs are
/// decoded; signatures are not verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayEvent {
    #[serde(default)]
    pub id: String,
    pub pubkey: String,    // author key, hex
    pub created_at: u64,   // unix seconds
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
}

/// Subset of a NIP-01 filter: event kinds plus a result cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    pub limit: usize,
}

impl RelayFilter {
    pub fn relay_lists(limit: usize) -> Self {
        Self {
            kinds: vec![KIND_RELAY_LIST],
            limit,
        }
    }

    /// Relays are untrusted; events of kinds we did not ask for are dropped.
    pub fn matches(&self, ev: &RelayEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&ev.kind)
    }
}

impl Default for RelayFilter {
    fn default() -> Self {
        Self::relay_lists(DEFAULT_LIMIT)
    }
}

/// One queryable relay. Implementations issue a single bounded query and
/// return the stored events as-is; the caller owns the overall deadline and
/// may drop the returned future at any point.
#[async_trait::async_trait]
pub trait RelaySource: Send + Sync {
    async fn fetch(&self, filter: &RelayFilter) -> Result<Vec<RelayEvent>, FetchError>;
    fn url(&self) -> &str;
}
