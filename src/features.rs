// =============================================================================
// Feature Engine — Moving averages and volatility from a price window
// =============================================================================
//
// A FeatureSet is derived fresh on every evaluation and never stored. It needs
// at least `MIN_FEATURE_HISTORY` prices (the widest window, SMA-20 / σ-20);
// anything shorter yields `None`, which downstream treats as "do not emit".
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::{sma_last, stdev_last};

/// Samples required before any feature can be computed.
pub const MIN_FEATURE_HISTORY: usize = 20;

/// Snapshot of the features the ensemble scorer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub sma3: f64,
    pub sma9: f64,
    pub sma20: f64,
    pub vol5: f64,
    pub vol20: f64,
}

impl FeatureSet {
    /// Compute features from `samples` (oldest first). Only the most recent
    /// values of each window are used.
    ///
    /// Returns `None` when fewer than [`MIN_FEATURE_HISTORY`] samples exist.
    pub fn compute(samples: &[f64]) -> Option<Self> {
        if samples.len() < MIN_FEATURE_HISTORY {
            return None;
        }

        Some(Self {
            sma3: sma_last(samples, 3)?,
            sma9: sma_last(samples, 9)?,
            sma20: sma_last(samples, 20)?,
            vol5: stdev_last(samples, 5)?,
            vol20: stdev_last(samples, 20)?,
        })
    }

    /// Short-horizon momentum: SMA-3 minus SMA-9.
    pub fn momentum(&self) -> f64 {
        self.sma3 - self.sma9
    }

    /// Medium-horizon trend: SMA-9 minus SMA-20.
    pub fn trend(&self) -> f64 {
        self.sma9 - self.sma20
    }
}

/// Free-function form of [`FeatureSet::compute`].
pub fn compute_features(samples: &[f64]) -> Option<FeatureSet> {
    FeatureSet::compute(samples)
}
