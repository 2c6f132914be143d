// =============================================================================
// Signal Engine — The ingestion path
// =============================================================================
//
// Processes one tick to completion before returning:
//
//   1. Validate the tick
//   2. Push the price into the symbol's ring
//   3. Compute features for that symbol (needs 20 samples)
//   4. Ensemble score -> over_under candidate
//   5. Parity of the tick price -> even_odd candidate
//   6. Cross-symbol divergence -> matches candidate (first two symbols)
//   7. Gate: at most one candidate is admitted
//   8. Return [tick event, optional signal event]
//
// The engine is synchronous and owns all of its state. Scheduling, locking,
// and publishing belong to the caller.
// =============================================================================

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::features::{FeatureSet, MIN_FEATURE_HISTORY};
use crate::market_data::TickBuffer;
use crate::runtime_config::RuntimeConfig;
use crate::signal_gate::SignalGate;
use crate::signals::{EnsembleScorer, MatchesGenerator, ParityGenerator, Score};
use crate::types::{EngineEvent, SignalCandidate, SignalType, Tick};

pub struct SignalEngine {
    buffers: TickBuffer,
    scorer: EnsembleScorer,
    parity: ParityGenerator,
    matches: Option<MatchesGenerator>,
    gate: SignalGate,
    last_scores: HashMap<String, Score>,
    ticks_ingested: u64,
    signals_emitted: u64,
}

impl SignalEngine {
    /// Build an engine from validated configuration.
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let matches = MatchesGenerator::from_symbols(&config.symbols);
        if matches.is_none() {
            info!(symbols = ?config.symbols, "fewer than two symbols — matches signals disabled");
        }

        Ok(Self {
            buffers: TickBuffer::new(config.buffer_capacity),
            scorer: EnsembleScorer::new(config.weights)?,
            parity: ParityGenerator::new(config.parity_bonus),
            matches,
            gate: SignalGate::new(config.cooldown_ms, config.thresholds, config.expiry),
            last_scores: HashMap::new(),
            ticks_ingested: 0,
            signals_emitted: 0,
        })
    }

    /// Ingest one tick and return the events it produced: always the tick
    /// itself, plus at most one admitted signal.
    ///
    /// A tick with an empty symbol or non-finite price is rejected and
    /// produces nothing.
    pub fn ingest(&mut self, tick: Tick) -> Vec<EngineEvent> {
        if tick.symbol.is_empty() || !tick.price.is_finite() {
            warn!(symbol = %tick.symbol, price = tick.price, "rejected malformed tick");
            return Vec::new();
        }

        self.buffers.push(&tick.symbol, tick.price);
        self.ticks_ingested += 1;

        let score = self.score_symbol(&tick.symbol);
        let candidates = self.collect_candidates(&tick, &score);
        self.last_scores.insert(tick.symbol.clone(), score);

        let admitted = self.gate.admit(tick.timestamp, candidates);

        let mut events = Vec::with_capacity(2);
        events.push(EngineEvent::Tick(tick));

        if let Some(signal) = admitted {
            self.signals_emitted += 1;
            info!(
                id = %signal.id(),
                kind = %signal.kind(),
                direction = %signal.direction(),
                confidence = signal.confidence(),
                price = signal.price(),
                "signal admitted"
            );
            events.push(EngineEvent::Signal(signal));
        }

        events
    }

    /// Ensemble score for `symbol` over its current history.
    fn score_symbol(&self, symbol: &str) -> Score {
        let features = self
            .buffers
            .window(symbol, MIN_FEATURE_HISTORY)
            .and_then(|w| FeatureSet::compute(&w));
        self.scorer.score(features.as_ref())
    }

    fn collect_candidates(&self, tick: &Tick, score: &Score) -> Vec<SignalCandidate> {
        let mut candidates = Vec::with_capacity(3);

        if let Some(direction) = score.direction.clone() {
            candidates.push(SignalCandidate {
                kind: SignalType::OverUnder,
                direction,
                price: tick.price,
                confidence: score.value,
            });
        } else {
            debug!(
                symbol = %tick.symbol,
                history = self.buffers.len(&tick.symbol),
                "insufficient history for ensemble"
            );
        }

        if let Some(candidate) = self.parity.evaluate(tick.price) {
            candidates.push(candidate);
        }

        if let Some(candidate) = self.matches.as_ref().and_then(|m| m.evaluate(&self.buffers)) {
            candidates.push(candidate);
        }

        candidates
    }

    /// Most recent ensemble score computed for `symbol`.
    pub fn last_score(&self, symbol: &str) -> Option<&Score> {
        self.last_scores.get(symbol)
    }

    /// Read-only view of the price history.
    pub fn buffers(&self) -> &TickBuffer {
        &self.buffers
    }

    pub fn ticks_ingested(&self) -> u64 {
        self.ticks_ingested
    }

    pub fn signals_emitted(&self) -> u64 {
        self.signals_emitted
    }

    pub fn last_emission(&self) -> Option<i64> {
        self.gate.last_emission()
    }
}

// =============================================================================
// Tests
// =============================================================================
