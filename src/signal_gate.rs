// =============================================================================
// Signal Gate — Cooldown + threshold admission control
// =============================================================================
//
// At most one signal leaves the engine per evaluation cycle. Candidates are
// considered in fixed priority order:
//
//   1. over_under
//   2. even_odd
//   3. matches
//
// A candidate is admitted when
//   - no signal has been emitted yet, or `now - last_emission >= cooldown_ms`
//   - its confidence is at or above the threshold for its type
//
// The first admission stamps `last_emission`, which closes the gate for the
// rest of the cycle and for every later cycle until the cooldown elapses.
// The cooldown slot is shared across all signal types.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Signal, SignalCandidate, SignalType};

fn default_over_under_threshold() -> f64 {
    0.65
}

fn default_even_odd_threshold() -> f64 {
    0.52
}

fn default_matches_threshold() -> f64 {
    0.60
}

fn default_over_under_expiry() -> u64 {
    60
}

fn default_even_odd_expiry() -> u64 {
    30
}

fn default_matches_expiry() -> u64 {
    60
}

/// Minimum confidence per signal type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    #[serde(default = "default_over_under_threshold")]
    pub over_under: f64,
    #[serde(default = "default_even_odd_threshold")]
    pub even_odd: f64,
    #[serde(default = "default_matches_threshold")]
    pub matches: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            over_under: default_over_under_threshold(),
            even_odd: default_even_odd_threshold(),
            matches: default_matches_threshold(),
        }
    }
}

impl SignalThresholds {
    pub fn for_type(&self, kind: SignalType) -> f64 {
        match kind {
            SignalType::OverUnder => self.over_under,
            SignalType::EvenOdd => self.even_odd,
            SignalType::Matches => self.matches,
        }
    }
}

/// Contract horizon attached to each emitted signal, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalExpiry {
    #[serde(default = "default_over_under_expiry")]
    pub over_under: u64,
    #[serde(default = "default_even_odd_expiry")]
    pub even_odd: u64,
    #[serde(default = "default_matches_expiry")]
    pub matches: u64,
}

impl Default for SignalExpiry {
    fn default() -> Self {
        Self {
            over_under: default_over_under_expiry(),
            even_odd: default_even_odd_expiry(),
            matches: default_matches_expiry(),
        }
    }
}

impl SignalExpiry {
    pub fn for_type(&self, kind: SignalType) -> u64 {
        match kind {
            SignalType::OverUnder => self.over_under,
            SignalType::EvenOdd => self.even_odd,
            SignalType::Matches => self.matches,
        }
    }
}

/// Shared-slot cooldown gate.
#[derive(Debug, Clone)]
pub struct SignalGate {
    cooldown_ms: i64,
    thresholds: SignalThresholds,
    expiry: SignalExpiry,
    last_emission: Option<i64>,
}

impl SignalGate {
    pub fn new(cooldown_ms: u64, thresholds: SignalThresholds, expiry: SignalExpiry) -> Self {
        Self {
            cooldown_ms: i64::try_from(cooldown_ms).unwrap_or(i64::MAX),
            thresholds,
            expiry,
            last_emission: None,
        }
    }

    /// Timestamp of the most recent admission, if any.
    pub fn last_emission(&self) -> Option<i64> {
        self.last_emission
    }

    /// Whether the cooldown has elapsed at `now`.
    pub fn is_open(&self, now: i64) -> bool {
        match self.last_emission {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.cooldown_ms,
        }
    }

    /// Run one evaluation cycle. `candidates` may arrive in any order; they
    /// are ranked by [`SignalType::PRIORITY`]. Returns the admitted signal,
    /// stamped with `now`.
    pub fn admit(&mut self, now: i64, candidates: Vec<SignalCandidate>) -> Option<Signal> {
        for kind in SignalType::PRIORITY {
            for candidate in candidates.iter().filter(|c| c.kind == kind) {
                if !self.is_open(now) {
                    debug!(kind = %kind, now, last = ?self.last_emission, "gate in cooldown");
                    return None;
                }

                let threshold = self.thresholds.for_type(kind);
                if candidate.confidence < threshold {
                    debug!(
                        kind = %kind,
                        confidence = candidate.confidence,
                        threshold,
                        "candidate below threshold"
                    );
                    continue;
                }

                self.last_emission = Some(now);
                return Some(Signal::from_candidate(
                    candidate.clone(),
                    now,
                    self.expiry.for_type(kind),
                ));
            }
        }
        None
    }
}
