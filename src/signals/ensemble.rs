// =============================================================================
// Ensemble Scorer — Momentum / trend / volatility fusion
// =============================================================================
//
// Three features are squashed and blended into one confidence:
//
//   momentum_score = (tanh(momentum / 2) + 1) / 2
//   trend_score    = (tanh(trend / 2) + 1) / 2
//   vol_score      = 1 - tanh(vol5 / (vol20 + ε))
//
//   score = clamp(w_m·momentum_score + w_t·trend_score + w_v·vol_score, 0, 1)
//
// Only the composite is clamped. The direction is `over` when
// momentum + trend >= 0 (zero resolves to `over`), `under` otherwise.
// =============================================================================

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::features::FeatureSet;
use crate::types::Direction;

/// Guards the volatility ratio against a zero denominator.
const VOL_EPSILON: f64 = 1e-9;

/// Weight sums may drift this far from 1.0 (JSON round-trips, hand edits).
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn default_momentum_weight() -> f64 {
    0.45
}

fn default_trend_weight() -> f64 {
    0.35
}

fn default_volatility_weight() -> f64 {
    0.20
}

/// Blend weights for the three components. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    #[serde(default = "default_momentum_weight")]
    pub momentum: f64,
    #[serde(default = "default_trend_weight")]
    pub trend: f64,
    #[serde(default = "default_volatility_weight")]
    pub volatility: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            momentum: default_momentum_weight(),
            trend: default_trend_weight(),
            volatility: default_volatility_weight(),
        }
    }
}

impl EnsembleWeights {
    /// Reject negative, non-finite, or non-normalised weights.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("momentum", self.momentum),
            ("trend", self.trend),
            ("volatility", self.volatility),
        ] {
            if !w.is_finite() || w < 0.0 {
                bail!("ensemble weight {name} must be finite and non-negative, got {w}");
            }
        }
        let sum = self.momentum + self.trend + self.volatility;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("ensemble weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }
}

/// Per-component scores before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub momentum_score: f64,
    pub trend_score: f64,
    pub vol_score: f64,
}

/// Result of one ensemble evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Composite confidence in [0, 1].
    pub value: f64,
    /// `None` when there was not enough history to decide.
    pub direction: Option<Direction>,
    pub components: Option<ScoreComponents>,
}

impl Score {
    /// The "no decision" result for a symbol without enough history.
    pub fn insufficient() -> Self {
        Self {
            value: 0.0,
            direction: None,
            components: None,
        }
    }

    pub fn is_decision(&self) -> bool {
        self.direction.is_some()
    }
}

/// Map any real number into (0, 1) around 0.5.
fn squash(x: f64) -> f64 {
    ((x / 2.0).tanh() + 1.0) / 2.0
}

/// The ensemble scoring engine.
#[derive(Debug, Clone)]
pub struct EnsembleScorer {
    weights: EnsembleWeights,
}

impl EnsembleScorer {
    /// Build a scorer, validating the weights.
    pub fn new(weights: EnsembleWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    /// Score a feature snapshot. `None` yields [`Score::insufficient`].
    pub fn score(&self, features: Option<&FeatureSet>) -> Score {
        let Some(fs) = features else {
            return Score::insufficient();
        };

        let momentum = fs.momentum();
        let trend = fs.trend();
        let vol_ratio = fs.vol5 / (fs.vol20 + VOL_EPSILON);

        let components = ScoreComponents {
            momentum_score: squash(momentum),
            trend_score: squash(trend),
            vol_score: 1.0 - vol_ratio.tanh(),
        };

        let raw = self.weights.momentum * components.momentum_score
            + self.weights.trend * components.trend_score
            + self.weights.volatility * components.vol_score;

        // NaN only if a feature was NaN; treat that as no decision.
        if raw.is_nan() {
            return Score::insufficient();
        }

        let direction = if momentum + trend >= 0.0 {
            Direction::Over
        } else {
            Direction::Under
        };

        Score {
            value: raw.clamp(0.0, 1.0),
            direction: Some(direction),
            components: Some(components),
        }
    }
}

impl Default for EnsembleScorer {
    fn default() -> Self {
        Self {
            weights: EnsembleWeights::default(),
        }
    }
}
