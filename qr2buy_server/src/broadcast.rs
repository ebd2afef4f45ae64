//! The live state broadcaster.
//!
//! Maintains the process-local registries of connected observers across two transports: an SSE stream
//! (one-directional, clients reconnect on their own) and a WebSocket (bidirectional, actively health-checked). A
//! single [`Broadcaster::publish`] call fans an event out to both observer sets. Delivery is strictly best-effort:
//! a dead or slow observer is dropped from the registry and never affects other observers or the publishing request.
//!
//! The registries live in memory only and are rebuilt from zero on restart; reconnecting clients re-register.
use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    task::{Context, Poll},
    time::{Duration, Instant},
};

use actix_web::web::Bytes;
use actix_ws::{Message, MessageStream, Session};
use chrono::Utc;
use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
    Stream,
    StreamExt,
};
use log::*;
use qr2buy_engine::display::DisplayPayload;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const UPDATE_EVENT: &str = "update";
pub const VERSION_EVENT: &str = "version";

/// Reconnect interval suggested to SSE clients.
const SSE_RETRY_MS: u64 = 5000;
/// Unnumbered keep-alive cadence on the SSE stream.
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
/// Server-side ping cadence on WebSocket connections.
const WS_PING_INTERVAL: Duration = Duration::from_secs(20);
/// A connection whose last pong is older than this is forcibly terminated.
const WS_LIVENESS_WINDOW: Duration = Duration::from_secs(45);

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

struct Inner {
    /// One strictly increasing sequence shared by ALL stream observers, so any client can detect loss by gaps.
    next_event_id: AtomicU64,
    next_client_id: AtomicU64,
    sse_clients: Mutex<HashMap<u64, UnboundedSender<Bytes>>>,
    ws_sessions: Mutex<HashMap<u64, Session>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let inner = Inner {
            next_event_id: AtomicU64::new(1),
            next_client_id: AtomicU64::new(1),
            sse_clients: Mutex::new(HashMap::new()),
            ws_sessions: Mutex::new(HashMap::new()),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Number of currently registered (sse, ws) observers.
    pub fn observer_counts(&self) -> (usize, usize) {
        let sse = self.inner.sse_clients.lock().unwrap().len();
        let ws = self.inner.ws_sessions.lock().unwrap().len();
        (sse, ws)
    }

    /// Register a new SSE observer. The returned stream yields ready-framed bytes for
    /// `HttpResponse::streaming` and deregisters itself when dropped.
    pub fn register_sse(&self) -> SseStream {
        let (tx, rx) = unbounded::<Bytes>();
        let client_id = self.inner.next_client_id.fetch_add(1, Ordering::SeqCst);

        // The ready acknowledgment carries a sequence number of its own, so a reconnecting client immediately
        // learns where the stream currently stands.
        let ready_id = self.inner.next_event_id.fetch_add(1, Ordering::SeqCst);
        let ready = sse_frame(Some(ready_id), "ready", &json!({"ok": true, "ts": Utc::now().timestamp_millis()}).to_string());
        let _ = tx.unbounded_send(ready);

        self.inner.sse_clients.lock().unwrap().insert(client_id, tx.clone());
        debug!("📡️ SSE observer #{client_id} connected");

        // Unnumbered keep-alive to defeat idle-connection timeouts. A failed send means the client is gone; the
        // stream's Drop does the registry cleanup.
        let keep_alive = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + SSE_KEEP_ALIVE;
            let mut timer = tokio::time::interval_at(start, SSE_KEEP_ALIVE);
            loop {
                timer.tick().await;
                let ping = sse_frame(None, "ping", &Utc::now().timestamp_millis().to_string());
                if tx.unbounded_send(ping).is_err() {
                    break;
                }
            }
        });

        SseStream { client_id, receiver: rx, inner: Arc::clone(&self.inner), keep_alive }
    }

    /// Take ownership of a fresh WebSocket connection: register it, greet it, and drive its liveness loop on a
    /// background task.
    pub fn spawn_ws_session(&self, session: Session, mut msg_stream: MessageStream) {
        let inner = Arc::clone(&self.inner);
        let client_id = inner.next_client_id.fetch_add(1, Ordering::SeqCst);
        inner.ws_sessions.lock().unwrap().insert(client_id, session.clone());
        debug!("📡️ WebSocket observer #{client_id} connected");

        actix_web::rt::spawn(async move {
            let mut session = session;
            let hello = json!({"type": "ready", "ts": Utc::now().timestamp_millis()}).to_string();
            let _ = session.text(hello).await;

            let mut last_pong = Instant::now();
            let start = tokio::time::Instant::now() + WS_PING_INTERVAL;
            let mut ping_timer = tokio::time::interval_at(start, WS_PING_INTERVAL);
            loop {
                tokio::select! {
                    msg = msg_stream.recv() => match msg {
                        Some(Ok(Message::Pong(_))) => last_pong = Instant::now(),
                        Some(Ok(Message::Ping(payload))) => {
                            last_pong = Instant::now();
                            if session.pong(&payload).await.is_err() {
                                break;
                            }
                        },
                        // Display clients are receive-only; inbound application messages are ignored.
                        Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {},
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {},
                    },
                    _ = ping_timer.tick() => {
                        if last_pong.elapsed() > WS_LIVENESS_WINDOW {
                            info!("📡️ WebSocket observer #{client_id} failed its liveness check, terminating");
                            let _ = session.clone().close(None).await;
                            break;
                        }
                        if session.ping(b"").await.is_err() {
                            break;
                        }
                    },
                }
            }
            inner.ws_sessions.lock().unwrap().remove(&client_id);
            debug!("📡️ WebSocket observer #{client_id} disconnected");
        });
    }

    /// Fan one logical event out to every observer on both transports.
    ///
    /// Ordering is only guaranteed within the SSE sequence numbering; failures are swallowed per observer.
    pub async fn publish(&self, event: &str, payload: &Value) {
        let data = payload.to_string();

        let event_id = self.inner.next_event_id.fetch_add(1, Ordering::SeqCst);
        let frame = sse_frame(Some(event_id), event, &data);
        let mut dead = Vec::new();
        {
            let clients = self.inner.sse_clients.lock().unwrap();
            for (client_id, tx) in clients.iter() {
                if tx.unbounded_send(frame.clone()).is_err() {
                    dead.push(*client_id);
                }
            }
        }
        self.remove_sse_clients(&dead);

        let sessions: Vec<(u64, Session)> = {
            let sessions = self.inner.ws_sessions.lock().unwrap();
            sessions.iter().map(|(id, s)| (*id, s.clone())).collect()
        };
        let message = json!({"type": event, "payload": payload}).to_string();
        let mut dead = Vec::new();
        for (client_id, mut session) in sessions {
            if session.text(message.clone()).await.is_err() {
                dead.push(client_id);
            }
        }
        if !dead.is_empty() {
            let mut sessions = self.inner.ws_sessions.lock().unwrap();
            for client_id in dead {
                sessions.remove(&client_id);
            }
        }
        trace!("📡️ Published '{event}' as event #{event_id}");
    }

    /// Publish the `update`/`version` pair every state-affecting mutation must emit; some observers only listen
    /// for one of the two.
    pub async fn publish_display_payload(&self, payload: &DisplayPayload) {
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        self.publish(UPDATE_EVENT, &value).await;
        self.publish(VERSION_EVENT, &json!({"version": payload.version, "updatedAt": payload.updated_at})).await;
    }

    fn remove_sse_clients(&self, client_ids: &[u64]) {
        if client_ids.is_empty() {
            return;
        }
        let mut clients = self.inner.sse_clients.lock().unwrap();
        for client_id in client_ids {
            clients.remove(client_id);
            debug!("📡️ SSE observer #{client_id} dropped");
        }
    }
}

fn sse_frame(id: Option<u64>, event: &str, data: &str) -> Bytes {
    let mut out = String::with_capacity(data.len() + 64);
    if let Some(id) = id {
        out.push_str(&format!("id: {id}\n"));
    }
    out.push_str(&format!("retry: {SSE_RETRY_MS}\n"));
    out.push_str(&format!("event: {event}\n"));
    out.push_str(&format!("data: {data}\n\n"));
    Bytes::from(out)
}

/// The body stream handed to `HttpResponse::streaming`. Dropping it (client disconnect) cancels the keep-alive
/// task and removes the observer from the registry — cleanup is unconditional, the registry never accumulates
/// dead entries.
pub struct SseStream {
    client_id: u64,
    receiver: UnboundedReceiver<Bytes>,
    inner: Arc<Inner>,
    keep_alive: JoinHandle<()>,
}

impl Stream for SseStream {
    type Item = Result<Bytes, actix_web::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        self.keep_alive.abort();
        self.inner.sse_clients.lock().unwrap().remove(&self.client_id);
        debug!("📡️ SSE observer #{} disconnected", self.client_id);
    }
}
