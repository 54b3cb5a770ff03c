// src/analyze/tally.rs
use std::collections::HashMap;

use serde::Serialize;

use crate::analyze::extract::AuthorRelays;

/// Relay URL -> number of distinct eligible authors listing it.
pub type RelayCounts = HashMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayRank {
    pub url: String,
    pub count: u32,
    pub description: String,
}

/// Each eligible author adds one to every relay it lists, at most once per relay.
pub fn aggregate(extracted: &HashMap<String, AuthorRelays>) -> RelayCounts {
    let mut counts = RelayCounts::new();
    for refs in extracted.values().filter(|r| r.eligible) {
        for url in &refs.relays {
            *counts.entry(url.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Relays with at least `min_count` users, most used first (ties by URL).
pub fn ranked(counts: &RelayCounts, min_count: u32) -> Vec<RelayRank> {
    let mut ranks: Vec<RelayRank> = counts
        .iter()
        .filter(|&(_, &count)| count >= min_count)
        .map(|(url, &count)| RelayRank {
            url: url.clone(),
            count,
            description: String::new(),
        })
        .collect();
    ranks.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.url.cmp(&b.url)));
    ranks
}
