// src/ingest/relay.rs
//! NIP-01 client for one relay: `REQ` a filter, read `EVENT`s until `EOSE`,
//! then `CLOSE` and hang up. One connection per fetch, released on every exit
//! path (including the caller dropping the future at its deadline).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::ingest::error::FetchError;
use crate::ingest::types::{RelayEvent, RelayFilter, RelaySource};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_SUB: AtomicU64 = AtomicU64::new(1);

fn subscription_id() -> String {
    format!("ranking-{}", NEXT_SUB.fetch_add(1, Ordering::Relaxed))
}

fn log_malformed(relay: &str, malformed: usize) {
    if malformed > 0 {
        debug!(relay, malformed, "skipped undecodable frames");
    }
}

/// Relay-to-client frames we care about.
#[derive(Debug, PartialEq)]
pub(crate) enum RelayMessage {
    Event { sub: String, event: Box<RelayEvent> },
    Eose { sub: String },
    Closed { sub: String, reason: String },
    Notice(String),
    Other,
}

/// Returns `None` for frames that are not valid relay messages, including
/// `EVENT`s whose payload does not decode.
pub(crate) fn parse_relay_message(text: &str) -> Option<RelayMessage> {
    let v: Value = serde_json::from_str(text).ok()?;
    let arr = v.as_array()?;
    let label = arr.first()?.as_str()?;
    let str_at = |i: usize| arr.get(i).and_then(Value::as_str).map(str::to_string);

    let msg = match label {
        "EVENT" => {
            let sub = str_at(1)?;
            let event: RelayEvent = serde_json::from_value(arr.get(2)?.clone()).ok()?;
            RelayMessage::Event {
                sub,
                event: Box::new(event),
            }
        }
        "EOSE" => RelayMessage::Eose { sub: str_at(1)? },
        "CLOSED" => RelayMessage::Closed {
            sub: str_at(1)?,
            reason: str_at(2).unwrap_or_default(),
        },
        "NOTICE" => RelayMessage::Notice(str_at(1).unwrap_or_default()),
        _ => RelayMessage::Other,
    };
    Some(msg)
}

#[derive(Debug, Clone)]
pub struct WsRelay {
    url: String,
    connect_timeout: Duration,
}

impl WsRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout = Duration::from_secs(secs);
        self
    }

    fn query_err(&self, reason: impl ToString) -> FetchError {
        FetchError::Query {
            relay: self.url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl RelaySource for WsRelay {
    async fn fetch(&self, filter: &RelayFilter) -> Result<Vec<RelayEvent>, FetchError> {
        let connect = tokio_tungstenite::connect_async(self.url.as_str());
        let ws_stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                return Err(FetchError::Connect {
                    relay: self.url.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(FetchError::Connect {
                    relay: self.url.clone(),
                    reason: format!("no handshake within {:?}", self.connect_timeout),
                })
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let sub_id = subscription_id();
        let req = json!(["REQ", sub_id, filter]).to_string();
        write
            .send(Message::Text(req.into()))
            .await
            .map_err(|e| self.query_err(e))?;

        let mut events = Vec::new();
        let mut malformed = 0usize;

        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match parse_relay_message(text.as_str()) {
                    Some(RelayMessage::Event { sub, event }) if sub == sub_id => {
                        if filter.matches(&event) {
                            events.push(*event);
                        }
                    }
                    Some(RelayMessage::Eose { sub }) if sub == sub_id => break,
                    Some(RelayMessage::Closed { sub, reason }) if sub == sub_id => {
                        log_malformed(&self.url, malformed);
                        return Err(FetchError::Closed {
                            relay: self.url.clone(),
                            reason,
                        });
                    }
                    Some(RelayMessage::Notice(notice)) => {
                        debug!(relay = %self.url, %notice, "relay notice");
                    }
                    Some(_) => {}
                    None => malformed += 1,
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    log_malformed(&self.url, malformed);
                    debug!(relay = %self.url, events = events.len(), "relay hung up before EOSE");
                    return Ok(events);
                }
                Some(Ok(_)) => {} // Binary, Pong, Frame
                Some(Err(e)) => {
                    log_malformed(&self.url, malformed);
                    return Err(self.query_err(e));
                }
            }
        }

        log_malformed(&self.url, malformed);

        let close = json!(["CLOSE", sub_id]).to_string();
        let _ = write.send(Message::Text(close.into())).await;
        let _ = write.send(Message::Close(None)).await;

        Ok(events)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
