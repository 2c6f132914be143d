// =============================================================================
// Rolling Volatility
// =============================================================================
//
// Population standard deviation over a window:
//
//   σ = sqrt( Σ (x - mean)² / n )
//
// The divisor is the window size `n`, not `n - 1`, matching the σ used for
// Bollinger-style band width.

use super::sma::sma;

/// Population standard deviation of `samples`.
///
/// Returns `None` for an empty slice or a non-finite result.
pub fn stdev(samples: &[f64]) -> Option<f64> {
    let mean = sma(samples)?;
    let variance =
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    let sigma = variance.sqrt();
    sigma.is_finite().then_some(sigma)
}

/// Population standard deviation of the last `period` values of `closes`.
pub fn stdev_last(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    stdev(&closes[closes.len() - period..])
}
