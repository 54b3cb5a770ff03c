// src/analyze/extract.rs
//! Relay references from relay-list events.
//!
//! `["r", <url>, <marker>?]` entries name relays; `["proxy", <id>, "activitypub"]`
//! marks a bridged account whose relay list is not counted. Every author is
//! eligible unless that marker is present.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::ingest::collector::LatestByAuthor;
use crate::ingest::types::RelayEvent;

pub const RELAY_TAG: &str = "r";
pub const PROXY_TAG: &str = "proxy";
pub const ACTIVITYPUB: &str = "activitypub";

/// Relays referenced by one author's newest event, plus whether they count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRelays {
    pub relays: BTreeSet<String>,
    pub eligible: bool,
}

impl Default for AuthorRelays {
    fn default() -> Self {
        Self {
            relays: BTreeSet::new(),
            eligible: true,
        }
    }
}

/// Trim whitespace and one trailing `/`; keep only `ws://` / `wss://` style URLs.
pub fn normalize_relay_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    let url = url.strip_suffix('/').unwrap_or(url);
    url.starts_with("ws").then(|| url.to_string())
}

pub fn extract_event(ev: &RelayEvent) -> AuthorRelays {
    let mut out = AuthorRelays::default();
    let mut empty_tags = 0usize;

    for tag in &ev.tags {
        match tag.as_slice() {
            [name, value, ..] if name == RELAY_TAG => {
                if let Some(url) = normalize_relay_url(value) {
                    out.relays.insert(url);
                }
            }
            [name, _, protocol, ..] if name == PROXY_TAG && protocol == ACTIVITYPUB => {
                out.eligible = false;
            }
            [] => empty_tags += 1,
            _ => {}
        }
    }

    if empty_tags > 0 {
        debug!(author = %ev.pubkey, empty_tags, "skipped empty tags");
    }
    out
}

pub fn extract(view: &LatestByAuthor) -> HashMap<String, AuthorRelays> {
    view.iter()
        .map(|(author, ev)| (author.clone(), extract_event(ev)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tags: &[&[&str]]) -> RelayEvent {
        RelayEvent {
            id: "e".into(),
            pubkey: "A".into(),
            created_at: 1,
            kind: 10002,
            tags: tags
                .iter()
                .map(|t| t.iter().map(|s| s.to_string()).collect())
                .collect(),
            content: String::new(),
        }
    }

    #[test]
    fn normalize_trims_space_and_one_slash() {
        assert_eq!(
            normalize_relay_url("  wss://relay.example/ "),
            Some("wss://relay.example".into())
        );
        assert_eq!(normalize_relay_url("ws://a//"), Some("ws://a/".into()));
        assert_eq!(normalize_relay_url("wss://a"), Some("wss://a".into()));
        assert_eq!(normalize_relay_url("https://a/"), None);
        assert_eq!(normalize_relay_url(""), None);
    }

    #[test]
    fn collects_r_tags_with_markers() {
        let out = extract_event(&event(&[
            &["r", "wss://one/"],
            &["r", "wss://two", "read"],
            &["r", "https://web"],
            &["r"],
            &["p", "wss://not-a-relay-tag"],
        ]));
        assert!(out.eligible);
        assert_eq!(
            out.relays.into_iter().collect::<Vec<_>>(),
            vec!["wss://one".to_string(), "wss://two".to_string()]
        );
    }

    #[test]
    fn duplicate_r_tags_collapse() {
        let out = extract_event(&event(&[&["r", "wss://one"], &["r", "wss://one/"]]));
        assert_eq!(out.relays.len(), 1);
    }

    #[test]
    fn activitypub_proxy_marks_ineligible() {
        let out = extract_event(&event(&[
            &["r", "wss://one"],
            &["proxy", "http://x", "activitypub"],
        ]));
        assert!(!out.eligible);
        assert_eq!(out.relays.len(), 1);
    }

    #[test]
    fn short_or_other_proxy_tags_are_ignored() {
        assert!(extract_event(&event(&[&["proxy", "http://x"]])).eligible);
        assert!(extract_event(&event(&[&["proxy"]])).eligible);
        assert!(extract_event(&event(&[&["proxy", "at://x", "atproto"]])).eligible);
    }

    #[test]
    fn empty_tag_does_not_stop_the_scan() {
        let out = extract_event(&event(&[&[], &["r", "wss://after"]]));
        assert!(out.relays.contains("wss://after"));
    }

    #[test]
    fn extract_covers_every_author() {
        let mut view = LatestByAuthor::new();
        let mut a = event(&[&["r", "wss://x"]]);
        a.pubkey = "A".into();
        let mut b = event(&[&["proxy", "http://b", "activitypub"]]);
        b.pubkey = "B".into();
        view.offer(a);
        view.offer(b);

        let out = extract(&view);
        assert_eq!(out.len(), 2);
        assert!(out["A"].eligible);
        assert!(!out["B"].eligible);
    }
}
