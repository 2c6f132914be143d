// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of a fixed-size window. Callers slice the window they want
// (usually the most recent `n` prices) and pass it in whole.
// =============================================================================

/// Mean of `samples`.
///
/// Returns `None` for an empty slice or a non-finite result.
pub fn sma(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    mean.is_finite().then_some(mean)
}

/// Mean of the last `period` values of `closes`.
///
/// Returns `None` when fewer than `period` values are available.
pub fn sma_last(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    sma(&closes[closes.len() - period..])
}
