// tests/common/mod.rs
//
// In-process fake relay speaking just enough NIP-01 for the client:
// reads one REQ, answers according to `Behavior`, records what it received.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone)]
pub enum Behavior {
    /// Send these raw event JSON payloads, then EOSE.
    Serve(Vec<Value>),
    /// Send raw text frames verbatim (sub id placeholder `$SUB`), then `end`.
    Raw { frames: Vec<String>, end: End },
    /// Refuse the subscription with CLOSED.
    Closed(String),
    /// Send events, then drop the connection without EOSE.
    HangUpEarly(Vec<Value>),
    /// Accept the REQ and never answer.
    Hang,
}

/// How a `Behavior::Raw` script finishes.
#[derive(Clone)]
pub enum End {
    Eose,
    Closed(String),
    HangUp,
}

#[derive(Default)]
pub struct Observed {
    pub received: Mutex<Vec<String>>,
    pub disconnected: AtomicBool,
}

impl Observed {
    pub fn got_close_for_subscription(&self) -> bool {
        self.received
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.starts_with("[\"CLOSE\""))
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

pub fn relay_list_event(author: &str, created_at: u64, tags: &[&[&str]]) -> Value {
    json!({
        "id": format!("{author}-{created_at}"),
        "pubkey": author,
        "created_at": created_at,
        "kind": 10002,
        "tags": tags,
        "content": "",
        "sig": "00",
    })
}

/// Start a fake relay on an ephemeral port; returns its `ws://` URL.
pub async fn spawn_fake_relay(behavior: Behavior) -> (String, Arc<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let observed = Arc::new(Observed::default());

    let obs = Arc::clone(&observed);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let behavior = behavior.clone();
            let obs = Arc::clone(&obs);
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut write, mut read) = ws.split();

                // first text frame must be the REQ
                let sub = loop {
                    match read.next().await {
                        Some(Ok(Message::Text(t))) => {
                            obs.received.lock().unwrap().push(t.as_str().to_string());
                            let v: Value = serde_json::from_str(t.as_str()).expect("json REQ");
                            break v[1].as_str().expect("sub id").to_string();
                        }
                        Some(Ok(_)) => continue,
                        _ => return,
                    }
                };

                let send = |v: Value| Message::Text(v.to_string().into());
                match behavior {
                    Behavior::Serve(events) => {
                        for ev in events {
                            let _ = write.send(send(json!(["EVENT", sub, ev]))).await;
                        }
                        let _ = write.send(send(json!(["EOSE", sub]))).await;
                    }
                    Behavior::Raw { frames, end } => {
                        for f in frames {
                            let f = f.replace("$SUB", &sub);
                            let _ = write.send(Message::Text(f.into())).await;
                        }
                        match end {
                            End::Eose => {
                                let _ = write.send(send(json!(["EOSE", sub]))).await;
                            }
                            End::Closed(reason) => {
                                let _ = write.send(send(json!(["CLOSED", sub, reason]))).await;
                            }
                            End::HangUp => {
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }
                    }
                    Behavior::Closed(reason) => {
                        let _ = write.send(send(json!(["CLOSED", sub, reason]))).await;
                    }
                    Behavior::HangUpEarly(events) => {
                        for ev in events {
                            let _ = write.send(send(json!(["EVENT", sub, ev]))).await;
                        }
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                    Behavior::Hang => {}
                }

                // drain until the client goes away
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(t)) => {
                            obs.received.lock().unwrap().push(t.as_str().to_string())
                        }
                        Ok(Message::Close(_)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                obs.disconnected.store(true, Ordering::SeqCst);
            });
        }
    });

    (format!("ws://{addr}"), observed)
}
