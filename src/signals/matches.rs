// =============================================================================
// Matches Generator — Cross-symbol short-term divergence
// =============================================================================
//
// Compares the SMA-3 / SMA-9 spread of two symbols:
//
//   m_diff = sma(A, 3) - sma(A, 9)
//   a_diff = sma(B, 3) - sma(B, 9)
//   diff   = m_diff - a_diff
//
//   confidence = min(0.95, |diff| / 5 + 0.45)
//   direction  = A if diff > 0 else B
//
// Both buffers need at least 9 samples.
// =============================================================================

use tracing::debug;

use crate::indicators::sma_last;
use crate::market_data::TickBuffer;
use crate::types::{Direction, SignalCandidate, SignalType};

/// Longest window the generator reads.
pub const MATCHES_MIN_HISTORY: usize = 9;

const BASE_CONFIDENCE: f64 = 0.45;
const MAX_CONFIDENCE: f64 = 0.95;
const DIFF_SCALE: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct MatchesGenerator {
    symbol_a: String,
    symbol_b: String,
}

impl MatchesGenerator {
    pub fn new(symbol_a: impl Into<String>, symbol_b: impl Into<String>) -> Self {
        Self {
            symbol_a: symbol_a.into(),
            symbol_b: symbol_b.into(),
        }
    }

    /// Pair the first two tracked symbols. `None` with fewer than two.
    pub fn from_symbols(symbols: &[String]) -> Option<Self> {
        match symbols {
            [a, b, ..] if a != b => Some(Self::new(a.clone(), b.clone())),
            _ => None,
        }
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.symbol_a, &self.symbol_b)
    }

    /// Evaluate the pair against current history.
    ///
    /// The candidate's price is the latest sample of whichever symbol the
    /// direction names.
    pub fn evaluate(&self, buffers: &TickBuffer) -> Option<SignalCandidate> {
        let window_a = buffers.window(&self.symbol_a, MATCHES_MIN_HISTORY)?;
        let window_b = buffers.window(&self.symbol_b, MATCHES_MIN_HISTORY)?;

        let m_diff = sma_last(&window_a, 3)? - sma_last(&window_a, 9)?;
        let a_diff = sma_last(&window_b, 3)? - sma_last(&window_b, 9)?;
        let diff = m_diff - a_diff;
        if !diff.is_finite() {
            return None;
        }

        let (leader, window) = if diff > 0.0 {
            (&self.symbol_a, &window_a)
        } else {
            (&self.symbol_b, &window_b)
        };
        let price = *window.last()?;
        let confidence = (diff.abs() / DIFF_SCALE + BASE_CONFIDENCE).min(MAX_CONFIDENCE);

        debug!(
            symbol_a = %self.symbol_a,
            symbol_b = %self.symbol_b,
            diff,
            confidence,
            "matches divergence evaluated"
        );

        Some(SignalCandidate {
            kind: SignalType::Matches,
            direction: Direction::Symbol(leader.clone()),
            price,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(buf: &mut TickBuffer, symbol: &str, prices: impl IntoIterator<Item = f64>) {
        for p in prices {
            buf.push(symbol, p);
        }
    }

    #[test]
    fn needs_two_distinct_symbols() {
        assert!(MatchesGenerator::from_symbols(&["R_100".to_string()]).is_none());
        assert!(MatchesGenerator::from_symbols(&["R_100".to_string(), "R_100".to_string()]).is_none());
        let symbols = ["R_100".to_string(), "R_50".to_string(), "R_25".to_string()];
        let gen = MatchesGenerator::from_symbols(&symbols).unwrap();
        assert_eq!(gen.pair(), ("R_100", "R_50"));
    }

    #[test]
    fn needs_nine_samples_each() {
        let gen = MatchesGenerator::new("A", "B");
        let mut buf = TickBuffer::new(100);
        fill(&mut buf, "A", (0..9).map(|x| x as f64));
        fill(&mut buf, "B", (0..8).map(|x| x as f64));
        assert!(gen.evaluate(&buf).is_none());

        buf.push("B", 8.0);
        assert!(gen.evaluate(&buf).is_some());
    }

    #[test]
    fn rising_a_against_flat_b_picks_a() {
        let gen = MatchesGenerator::new("A", "B");
        let mut buf = TickBuffer::new(100);
        // A: 0.1..=0.9 -> sma3 = 0.8, sma9 = 0.5, m_diff = 0.3
        fill(&mut buf, "A", (1..=9).map(|x| x as f64 / 10.0));
        fill(&mut buf, "B", std::iter::repeat(50.0).take(9));

        let c = gen.evaluate(&buf).unwrap();
        assert_eq!(c.kind, SignalType::Matches);
        assert_eq!(c.direction, Direction::Symbol("A".into()));
        assert!((c.confidence - (0.3 / 5.0 + 0.45)).abs() < 1e-9);
        assert!((c.price - 0.9).abs() < 1e-12);
    }

    #[test]
    fn zero_divergence_picks_b() {
        let gen = MatchesGenerator::new("A", "B");
        let mut buf = TickBuffer::new(100);
        fill(&mut buf, "A", std::iter::repeat(10.0).take(9));
        fill(&mut buf, "B", std::iter::repeat(20.0).take(9));

        let c = gen.evaluate(&buf).unwrap();
        assert_eq!(c.direction, Direction::Symbol("B".into()));
        assert!((c.confidence - 0.45).abs() < 1e-12);
        assert!((c.price - 20.0).abs() < 1e-12);
    }

    #[test]
    fn confidence_is_capped() {
        let gen = MatchesGenerator::new("A", "B");
        let mut buf = TickBuffer::new(100);
        fill(&mut buf, "A", (1..=9).map(|x| x as f64 * 100.0));
        fill(&mut buf, "B", std::iter::repeat(1.0).take(9));
        let c = gen.evaluate(&buf).unwrap();
        assert!((c.confidence - 0.95).abs() < 1e-12);
    }
}
