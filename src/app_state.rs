// =============================================================================
// Central Application State — Tickscope
// =============================================================================
//
// Ties the engine to its adapters. The feed task calls into AppState as its
// FeedHandler; the API reads snapshots from it.
//
// Thread safety:
//   - parking_lot::Mutex around the engine, held only for one `ingest` call.
//     Events are published after the lock is released.
//   - parking_lot::RwLock for connection state and the recent-signal ring.
//   - Atomic counters for lock-free version and error tracking.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::emitter::EventEmitter;
use crate::engine::SignalEngine;
use crate::market_data::connection::{ConnectionEvent, ConnectionState};
use crate::market_data::feed::FeedHandler;
use crate::persistence::JsonlSink;
use crate::runtime_config::RuntimeConfig;
use crate::signals::Score;
use crate::types::{EngineEvent, Signal, Tick};

/// Maximum number of admitted signals kept for the REST API.
const MAX_RECENT_SIGNALS: usize = 100;

pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Bumped on every ingested tick and connection change.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Engine + fan-out ────────────────────────────────────────────────
    engine: Mutex<SignalEngine>,
    pub emitter: EventEmitter,
    recent_signals: RwLock<VecDeque<Signal>>,

    // ── Feed status ─────────────────────────────────────────────────────
    connection_state: RwLock<ConnectionState>,
    pub malformed_messages: AtomicU64,
    pub disconnects: AtomicU64,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the engine and emitter from `config`. Fails only when the
    /// configuration is invalid.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let engine = SignalEngine::new(&config)?;

        let mut emitter = EventEmitter::default().persist_ticks(config.persistence.persist_ticks);
        if let Some(path) = &config.persistence.path {
            info!(path = %path, persist_ticks = config.persistence.persist_ticks, "JSON-lines persistence enabled");
            emitter = emitter.with_sink(Arc::new(JsonlSink::new(path)));
        }

        Ok(Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            engine: Mutex::new(engine),
            emitter,
            recent_signals: RwLock::new(VecDeque::with_capacity(MAX_RECENT_SIGNALS)),
            connection_state: RwLock::new(ConnectionState::default()),
            malformed_messages: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        })
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Run one tick through the engine and publish what it produced.
    pub fn ingest_and_publish(&self, tick: Tick) {
        let events = self.engine.lock().ingest(tick);
        if events.is_empty() {
            self.malformed_messages.fetch_add(1, Ordering::Relaxed);
            return;
        }

        for event in events {
            if let EngineEvent::Signal(signal) = &event {
                self.push_signal(signal.clone());
            }
            self.emitter.broadcast(event);
        }
        self.increment_version();
    }

    fn push_signal(&self, signal: Signal) {
        let mut signals = self.recent_signals.write();
        signals.push_back(signal);
        while signals.len() > MAX_RECENT_SIGNALS {
            signals.pop_front();
        }
    }

    /// Admitted signals, oldest first.
    pub fn recent_signals(&self) -> Vec<Signal> {
        self.recent_signals.read().iter().cloned().collect()
    }

    // ── Connection ──────────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read()
    }

    /// Feed a lifecycle event through the connection state machine.
    pub fn apply_connection_event(&self, event: ConnectionEvent) -> ConnectionState {
        let (from, to) = {
            let mut state = self.connection_state.write();
            let from = *state;
            *state = from.on_event(event);
            (from, *state)
        };

        if from != to {
            info!(from = %from, to = %to, event = ?event, "feed connection state changed");
            if to == ConnectionState::Disconnected {
                self.disconnects.fetch_add(1, Ordering::Relaxed);
            }
            self.increment_version();
        }
        to
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    pub fn health(&self) -> HealthSnapshot {
        let (ticks_ingested, signals_emitted, last_emission) = {
            let engine = self.engine.lock();
            (
                engine.ticks_ingested(),
                engine.signals_emitted(),
                engine.last_emission(),
            )
        };

        HealthSnapshot {
            status: "ok",
            connection_state: self.connection_state(),
            ticks_ingested,
            signals_emitted,
            last_emission,
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            subscribers: self.emitter.subscriber_count(),
            state_version: self.current_state_version(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            server_time: Utc::now().timestamp_millis(),
        }
    }

    /// Per-symbol buffer depth, last price and last ensemble score.
    pub fn symbol_summaries(&self) -> Vec<SymbolSummary> {
        let engine = self.engine.lock();
        let buffers = engine.buffers();
        buffers
            .symbols()
            .into_iter()
            .map(|symbol| SymbolSummary {
                samples: buffers.len(&symbol),
                last_price: buffers.last(&symbol),
                score: engine.last_score(&symbol).cloned(),
                symbol,
            })
            .collect()
    }
}

impl FeedHandler for AppState {
    fn on_tick(&self, tick: Tick) {
        self.ingest_and_publish(tick);
    }

    fn on_lifecycle(&self, event: ConnectionEvent) {
        self.apply_connection_event(event);
    }

    fn on_malformed(&self) {
        let total = self.malformed_messages.fetch_add(1, Ordering::Relaxed) + 1;
        if total % 100 == 0 {
            warn!(total, "malformed feed messages keep arriving");
        }
    }
}

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub connection_state: ConnectionState,
    pub ticks_ingested: u64,
    pub signals_emitted: u64,
    pub last_emission: Option<i64>,
    pub malformed_messages: u64,
    pub disconnects: u64,
    pub subscribers: usize,
    pub state_version: u64,
    pub uptime_secs: u64,
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub samples: usize,
    pub last_price: Option<f64>,
    pub score: Option<Score>,
}
