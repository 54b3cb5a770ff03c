// src/relay_info.rs
//! NIP-11 relay information documents, used for the report's description column.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::analyze::tally::RelayRank;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RelayInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pubkey: String,
    #[serde(default)]
    pub contact: String,
}

/// `wss://host/path` -> `https://host/path`, `ws://` -> `http://`.
pub fn info_url(relay: &str) -> String {
    if let Some(rest) = relay.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = relay.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        relay.to_string()
    }
}

#[derive(Clone)]
pub struct RelayInfoClient {
    client: Client,
    timeout: Duration,
}

impl Default for RelayInfoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayInfoClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub async fn fetch(&self, relay: &str) -> Result<RelayInfo> {
        let url = info_url(relay);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/nostr+json")
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        resp.json::<RelayInfo>()
            .await
            .with_context(|| format!("decode relay info from {url}"))
    }

    /// Description or empty string; failures are only logged.
    pub async fn describe(&self, relay: &str) -> String {
        match self.fetch(relay).await {
            Ok(info) => info.description,
            Err(e) => {
                tracing::debug!(relay, error = %format!("{e:#}"), "relay info unavailable");
                String::new()
            }
        }
    }

    /// Fill `description` for every rank concurrently.
    pub async fn fill_descriptions(&self, ranks: &mut [RelayRank]) {
        let mut tasks = JoinSet::new();
        for (idx, rank) in ranks.iter().enumerate() {
            let this = self.clone();
            let url = rank.url.clone();
            tasks.spawn(async move { (idx, this.describe(&url).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, description)) => ranks[idx].description = description,
                Err(e) => tracing::warn!(error = %e, "relay info task failed"),
            }
        }
    }
}
