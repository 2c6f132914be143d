// =============================================================================
// Tick Feed — Deriv-style WebSocket price stream
// =============================================================================
//
// One connection carries every tracked symbol:
//
//   -> {"authorize": "<token>"}                 (only with a credential)
//   <- {"msg_type": "authorize", "authorize": {...}}
//   -> {"ticks": "R_100", "subscribe": 1}        (one per symbol)
//   <- {"msg_type": "tick", "tick": {"symbol": "R_100", "quote": 1234.56, "epoch": 1700000000}}
//
// Malformed messages are logged and skipped. An error on the authorize step
// ends the session; the caller reconnects according to its RetryPolicy.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use crate::market_data::connection::{ConnectionEvent, RetryPolicy};
use crate::runtime_config::FeedConfig;
use crate::types::Tick;

// ---------------------------------------------------------------------------
// Handler seam
// ---------------------------------------------------------------------------

/// Receives everything the feed observes. The runtime registers exactly one.
pub trait FeedHandler: Send + Sync {
    fn on_tick(&self, tick: Tick);

    fn on_lifecycle(&self, event: ConnectionEvent);

    /// A message could not be parsed and was dropped.
    fn on_malformed(&self) {}
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// A decoded upstream message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Tick(Tick),
    Authorized,
    Pong,
    Error {
        msg_type: Option<String>,
        code: String,
        message: String,
    },
    /// Any other well-formed message (subscription acks, etc).
    Other(String),
}

pub fn authorize_request(token: &str) -> String {
    serde_json::json!({ "authorize": token }).to_string()
}

pub fn subscribe_request(symbol: &str) -> String {
    serde_json::json!({ "ticks": symbol, "subscribe": 1 }).to_string()
}

pub fn ping_request() -> String {
    serde_json::json!({ "ping": 1 }).to_string()
}

/// Parse one text frame from the feed.
pub fn parse_feed_message(text: &str) -> Result<FeedMessage> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse feed JSON")?;

    let msg_type = root["msg_type"].as_str().map(str::to_string);

    if let Some(err) = root.get("error").filter(|e| e.is_object()) {
        return Ok(FeedMessage::Error {
            msg_type,
            code: err["code"].as_str().unwrap_or("Unknown").to_string(),
            message: err["message"].as_str().unwrap_or("").to_string(),
        });
    }

    match msg_type.as_deref() {
        Some("tick") => parse_tick(&root["tick"]).map(FeedMessage::Tick),
        Some("authorize") => Ok(FeedMessage::Authorized),
        Some("ping") => Ok(FeedMessage::Pong),
        Some(other) => Ok(FeedMessage::Other(other.to_string())),
        None => bail!("missing field msg_type"),
    }
}

fn parse_tick(tick: &serde_json::Value) -> Result<Tick> {
    let symbol = tick["symbol"]
        .as_str()
        .filter(|s| !s.is_empty())
        .context("missing field tick.symbol")?
        .to_string();

    let price = parse_number(&tick["quote"], "tick.quote")?;
    if !price.is_finite() {
        bail!("tick.quote is not finite");
    }

    let epoch = tick["epoch"]
        .as_i64()
        .or_else(|| tick["epoch"].as_f64().map(|e| e as i64))
        .context("missing field tick.epoch")?;

    Ok(Tick::new(symbol, price, epoch.saturating_mul(1_000)))
}

/// Quotes arrive as JSON numbers, but some gateways stringify them.
fn parse_number(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        _ => bail!("field {name} has unexpected JSON type"),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-session counters, used to decide whether the retry policy resets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub ticks: u64,
    pub malformed: u64,
}

async fn subscribe_all<S>(write: &mut S, symbols: &[String]) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    for symbol in symbols {
        write
            .send(Message::Text(subscribe_request(symbol)))
            .await
            .with_context(|| format!("failed to subscribe to {symbol}"))?;
        info!(symbol = %symbol, "tick subscription requested");
    }
    Ok(())
}

/// Run a single feed session: connect, optionally authorize, subscribe, then
/// forward ticks until the stream closes or fails.
///
/// Returns `Ok(())` on a clean close so the caller can reconnect.
pub async fn run_tick_feed<H: FeedHandler + ?Sized>(
    feed: &FeedConfig,
    symbols: &[String],
    handler: &H,
    stats: &mut SessionStats,
) -> Result<()> {
    let url = feed.endpoint();
    handler.on_lifecycle(ConnectionEvent::Connect);
    info!(url = %feed.url, symbols = ?symbols, "connecting to tick feed");

    let ws_stream = match connect_async(&url).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            handler.on_lifecycle(ConnectionEvent::Error);
            return Err(e).context("failed to connect to tick feed");
        }
    };

    let authorize = feed.api_token.is_some();
    handler.on_lifecycle(ConnectionEvent::Open { authorize });
    info!(authorize, "tick feed connected");

    let (mut write, mut read) = ws_stream.split();

    let opening = match &feed.api_token {
        Some(token) => write
            .send(Message::Text(authorize_request(token)))
            .await
            .context("failed to send authorize request"),
        None => subscribe_all(&mut write, symbols).await,
    };
    if let Err(e) = opening {
        handler.on_lifecycle(ConnectionEvent::Error);
        return Err(e);
    }

    let keepalive_enabled = feed.keepalive_secs > 0;
    let period = Duration::from_secs(feed.keepalive_secs.max(1));
    let mut keepalive = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = keepalive.tick(), if keepalive_enabled => {
                if let Err(e) = write.send(Message::Text(ping_request())).await {
                    error!(error = %e, "failed to send keepalive ping");
                    handler.on_lifecycle(ConnectionEvent::Error);
                    return Err(e.into());
                }
                debug!("keepalive ping sent");
            }

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_feed_message(&text) {
                    Ok(FeedMessage::Tick(tick)) => {
                        stats.ticks += 1;
                        debug!(symbol = %tick.symbol, price = tick.price, "tick received");
                        handler.on_lifecycle(ConnectionEvent::Tick);
                        handler.on_tick(tick);
                    }
                    Ok(FeedMessage::Authorized) => {
                        info!("tick feed authorized");
                        handler.on_lifecycle(ConnectionEvent::AuthorizeAck);
                        if let Err(e) = subscribe_all(&mut write, symbols).await {
                            handler.on_lifecycle(ConnectionEvent::Error);
                            return Err(e);
                        }
                    }
                    Ok(FeedMessage::Error { msg_type, code, message }) => {
                        if msg_type.as_deref() == Some("authorize") {
                            error!(code = %code, message = %message, "tick feed authorization failed");
                            handler.on_lifecycle(ConnectionEvent::Error);
                            bail!("authorization failed: {code}: {message}");
                        }
                        warn!(msg_type = ?msg_type, code = %code, message = %message, "tick feed error message");
                    }
                    Ok(FeedMessage::Pong) => debug!("keepalive pong"),
                    Ok(FeedMessage::Other(kind)) => debug!(msg_type = %kind, "ignored feed message"),
                    Err(e) => {
                        stats.malformed += 1;
                        handler.on_malformed();
                        warn!(error = %e, "failed to parse feed message");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "tick feed closed by server");
                    handler.on_lifecycle(ConnectionEvent::Close);
                    return Ok(());
                }
                // Ping / Pong / Binary -- tungstenite handles pong replies.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "tick feed read error");
                    handler.on_lifecycle(ConnectionEvent::Error);
                    return Err(e.into());
                }
                None => {
                    warn!("tick feed stream ended");
                    handler.on_lifecycle(ConnectionEvent::Close);
                    return Ok(());
                }
            }
        }
    }
}

/// Keep a feed session alive forever, pausing between attempts as `policy`
/// dictates. Ticks missed while disconnected are not recovered.
pub async fn run_feed_loop<H: FeedHandler + ?Sized>(
    feed: FeedConfig,
    symbols: Vec<String>,
    handler: Arc<H>,
    mut policy: Box<dyn RetryPolicy>,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let mut stats = SessionStats::default();

        match run_tick_feed(&feed, &symbols, handler.as_ref(), &mut stats).await {
            Ok(()) => info!(ticks = stats.ticks, "tick feed session ended"),
            Err(e) => error!(error = %e, ticks = stats.ticks, "tick feed session failed"),
        }

        if stats.ticks > 0 {
            policy.reset();
            attempt = 1;
        }

        let delay = policy.next_delay(attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting tick feed");
        tokio::time::sleep(delay).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
