// src/config/ranking.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::ingest::types::{RelayFilter, DEFAULT_LIMIT, KIND_RELAY_LIST};

pub const DEFAULT_CONFIG_PATH: &str = "config/ranking.toml";
pub const ENV_CONFIG_PATH: &str = "RANKING_CONFIG_PATH";

/// Relays polled when the config does not name any (mostly Japanese-speaking users).
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://yabu.me",
    "wss://relay-jp.nostr.wirednet.jp",
    "wss://nostr.compile-error.net",
    "wss://cagliostr.compile-error.net",
    "wss://r.kojira.io",
    "wss://nostream.ocha.one",
    "wss://nrelay.c-stellar.net",
    "wss://relay.nostr.wirednet.jp",
];

const DEFAULT_TIMEOUT_SECS: u64 = 20;
/// Upper bound for `timeout_secs`; a daily job has no use for longer.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

pub fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect()
}

/// Trim, drop empties and duplicates; first occurrence keeps its position.
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Relays to poll. Omitted means [`DEFAULT_RELAYS`]; `[]` polls nothing.
    pub relays: Vec<String>,
    pub kind: u32,
    /// Per-relay result cap.
    pub limit: usize,
    /// Overall deadline for all relays together.
    pub timeout_secs: u64,
    /// Minimum users for a relay to appear in the report.
    pub min_count: u32,
    /// How many top relays get a trend line.
    pub top_series: usize,
    pub history_days: u32,
    pub info_timeout_secs: u64,
    pub output_path: PathBuf,
    /// JSON history used when no database is configured.
    pub history_path: PathBuf,
    /// Postgres connection string; "ENV" means read DATABASE_URL.
    pub database_url: Option<String>,
    pub metrics_path: Option<PathBuf>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            kind: KIND_RELAY_LIST,
            limit: DEFAULT_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            min_count: 20,
            top_series: 30,
            history_days: 20,
            info_timeout_secs: 5,
            output_path: PathBuf::from("index.html"),
            history_path: PathBuf::from("state/relay_stats.json"),
            database_url: None,
            metrics_path: None,
        }
    }
}

impl RankingConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading ranking config from {}", path.display()))?;
        let cfg: RankingConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// $RANKING_CONFIG_PATH, then config/ranking.toml, then defaults; env
    /// overrides applied last.
    pub fn load_default() -> Result<Self> {
        let cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from_file(&pb)?
            }
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        Ok(cfg.with_env_overrides())
    }

    /// OUTPUT_PATH and METRICS_PATH win over the file. DATABASE_URL fills an
    /// unset or `"ENV"` database_url.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(p) = env::var("OUTPUT_PATH").ok().filter(|v| !v.trim().is_empty()) {
            self.output_path = PathBuf::from(p);
        }
        if let Some(p) = env::var("METRICS_PATH").ok().filter(|v| !v.trim().is_empty()) {
            self.metrics_path = Some(PathBuf::from(p));
        }
        let from_env = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        match self.database_url.as_deref() {
            Some(v) if v.trim().eq_ignore_ascii_case("env") => self.database_url = from_env,
            None => self.database_url = from_env,
            Some(_) => {}
        }
        self
    }

    fn sanitized(mut self) -> Self {
        let d = Self::default();
        if self.limit == 0 {
            self.limit = d.limit;
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = d.timeout_secs;
        }
        self.timeout_secs = self.timeout_secs.min(MAX_TIMEOUT_SECS);
        if self.history_days == 0 {
            self.history_days = d.history_days;
        }
        if self.info_timeout_secs == 0 {
            self.info_timeout_secs = d.info_timeout_secs;
        }
        self.relays = clean_list(self.relays);
        self
    }

    pub fn filter(&self) -> RelayFilter {
        RelayFilter {
            kinds: vec![self.kind],
            limit: self.limit,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.min(MAX_TIMEOUT_SECS))
    }
}
