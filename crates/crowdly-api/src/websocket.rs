//! Realtime event channel with auto-reconnect.
//!
//! Connects to the backend's push endpoint and streams parsed
//! [`LiveEvent`]s through a [`tokio::sync::broadcast`] channel. The token
//! is presented once at handshake time; a handle created after a token
//! change therefore carries the new token, while an existing connection
//! keeps the one it authenticated with. Reconnection uses exponential
//! backoff + jitter.
//!
//! Delivery is at-most-once from the client's perspective — no queuing,
//! no acknowledgement, and duplicates are possible across reconnects.
//!
//! # Example
//!
//! ```rust,ignore
//! use crowdly_api::websocket::{RealtimeHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("wss://analytics.example.com/live")?;
//!
//! let handle = RealtimeHandle::connect(ws_url, ReconnectConfig::default(), cancel.clone(), Some("token".into()))?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::types::{AlertEvent, LiveEvent, LiveOccupancyEvent};

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── RealtimeHandle ───────────────────────────────────────────────────

/// Handle to a running realtime event stream.
///
/// An explicitly owned connection object: create one per authenticated
/// session and call [`shutdown`](Self::shutdown) on logout. Multiple
/// consumers may [`subscribe`](Self::subscribe) concurrently.
pub struct RealtimeHandle {
    event_rx: broadcast::Receiver<Arc<LiveEvent>>,
    cancel: CancellationToken,
}

impl RealtimeHandle {
    /// Spawn the connection + reconnection loop.
    ///
    /// Fails when `ws_url` is not a `ws`/`wss` URL; otherwise returns
    /// immediately once the background task is spawned. The first
    /// connection attempt happens asynchronously — subscribe to the event
    /// receiver to start consuming events.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        token: Option<String>,
    ) -> Result<Self, Error> {
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme {:?}, expected ws or wss",
                ws_url.scheme()
            )));
        }

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, event_tx, reconnect, task_cancel, token).await;
        });

        Ok(Self { event_rx, cancel })
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LiveEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    event_tx: broadcast::Sender<Arc<LiveEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    token: Option<String>,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &event_tx, &cancel, token.as_deref()) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("realtime channel disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "realtime channel error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "realtime reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("realtime channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection, read messages until it drops.
///
/// The bearer token is injected as an `Authorization` header on the
/// upgrade request. It is not refreshed while the connection lives.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<LiveEvent>>,
    cancel: &CancellationToken,
    token: Option<&str>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to realtime channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = token {
        request = request.with_header("Authorization", format!("Bearer {token}"));
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("realtime channel connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, event_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("realtime ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "realtime close frame received"
                            );
                        } else {
                            tracing::info!("realtime close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("realtime stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Raw envelope the backend sends over the channel.
///
/// All messages have the shape `{ "event": "<kind>", "data": {...} }`.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    event: String,
    data: serde_json::Value,
}

/// Parse a text frame and broadcast the event if it is one of the two
/// supported kinds. Unknown kinds and malformed payloads are logged
/// and dropped.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<LiveEvent>>) {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse realtime envelope");
            return;
        }
    };

    let event = match envelope.event.as_str() {
        "alert" => match serde_json::from_value::<AlertEvent>(envelope.data) {
            Ok(alert) => LiveEvent::Alert(alert),
            Err(e) => {
                tracing::debug!(error = %e, "malformed alert payload, dropping");
                return;
            }
        },
        "live_occupancy" => match serde_json::from_value::<LiveOccupancyEvent>(envelope.data) {
            Ok(occ) => LiveEvent::LiveOccupancy(occ),
            Err(e) => {
                tracing::debug!(error = %e, "malformed live_occupancy payload, dropping");
                return;
            }
        },
        other => {
            tracing::debug!(event = other, "unknown realtime event kind, dropping");
            return;
        }
    };

    // Ignore send errors — just means no active subscribers right now
    let _ = event_tx.send(Arc::new(event));
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertDirection, AlertSeverity};

    #[tokio::test]
    async fn connect_rejects_non_websocket_scheme() {
        let url = Url::parse("https://analytics.example.com/live").expect("valid url");

        let result = RealtimeHandle::connect(
            url,
            ReconnectConfig::default(),
            CancellationToken::new(),
            None,
        );

        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        // Each step should roughly double (within jitter bounds)
        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn parse_and_broadcast_alert() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "event": "alert",
            "data": {
                "personName": "Jordan Vance",
                "direction": "enter",
                "zoneName": "Loading Dock",
                "severity": "high",
                "ts": 1_767_225_600_000_i64
            }
        });

        parse_and_broadcast(&raw.to_string(), &tx);

        let event = rx.try_recv().expect("alert should be broadcast");
        match event.as_ref() {
            LiveEvent::Alert(alert) => {
                assert_eq!(alert.person_name, "Jordan Vance");
                assert_eq!(alert.direction, AlertDirection::Enter);
                assert_eq!(alert.zone_name, "Loading Dock");
                assert_eq!(alert.severity, AlertSeverity::High);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn parse_and_broadcast_live_occupancy() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "event": "live_occupancy",
            "data": { "siteId": "site-7", "siteOccupancy": 42 }
        });

        parse_and_broadcast(&raw.to_string(), &tx);

        let event = rx.try_recv().expect("occupancy should be broadcast");
        match event.as_ref() {
            LiveEvent::LiveOccupancy(occ) => {
                assert_eq!(occ.site_id, "site-7");
                assert_eq!(occ.site_occupancy, 42);
            }
            other => panic!("expected live_occupancy, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_kind_is_dropped() {
        let (tx, mut rx) = broadcast::channel::<Arc<LiveEvent>>(16);

        let raw = serde_json::json!({
            "event": "heartbeat",
            "data": {}
        });

        parse_and_broadcast(&raw.to_string(), &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let (tx, mut rx) = broadcast::channel::<Arc<LiveEvent>>(16);

        // Alert missing required fields
        let raw = serde_json::json!({
            "event": "alert",
            "data": { "personName": "x" }
        });

        parse_and_broadcast(&raw.to_string(), &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_envelope_is_dropped() {
        let (tx, mut rx) = broadcast::channel::<Arc<LiveEvent>>(16);

        parse_and_broadcast("not json at all", &tx);
        assert!(rx.try_recv().is_err());
    }
}
