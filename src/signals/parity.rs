// =============================================================================
// Parity Generator — Last-digit even/odd signal
// =============================================================================
//
//   digit      = floor(price) mod 10
//   direction  = even if digit ∈ {0, 2, 4, 6, 8}, odd otherwise
//   confidence = min(0.99, 0.5 + bonus)   bonus applies to even digits only
//
// The bonus set is exactly the even digits, so this is a flat "even gets a
// small boost" rule rather than a per-digit model.

use crate::types::{Direction, SignalCandidate, SignalType};

/// Digits that earn the confidence bonus.
const BONUS_DIGITS: [u8; 5] = [0, 2, 4, 6, 8];

const BASE_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 0.99;

/// Integer-part last digit of `price`. Negative prices wrap into 0..=9.
pub fn last_digit(price: f64) -> u8 {
    price.floor().rem_euclid(10.0) as u8
}

#[derive(Debug, Clone)]
pub struct ParityGenerator {
    bonus: f64,
}

impl ParityGenerator {
    pub fn new(bonus: f64) -> Self {
        Self { bonus }
    }

    /// Parity direction and confidence for a single price. `None` for a
    /// non-finite price.
    pub fn evaluate(&self, price: f64) -> Option<SignalCandidate> {
        if !price.is_finite() {
            return None;
        }

        let digit = last_digit(price);
        let (direction, bonus) = if BONUS_DIGITS.contains(&digit) {
            (Direction::Even, self.bonus)
        } else {
            (Direction::Odd, 0.0)
        };

        Some(SignalCandidate {
            kind: SignalType::EvenOdd,
            direction,
            price,
            confidence: (BASE_CONFIDENCE + bonus).min(MAX_CONFIDENCE),
        })
    }
}

impl Default for ParityGenerator {
    fn default() -> Self {
        Self::new(0.04)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_zero_is_even() {
        let c = ParityGenerator::default().evaluate(10000.7).unwrap();
        assert_eq!(last_digit(10000.7), 0);
        assert_eq!(c.direction, Direction::Even);
        assert!((c.confidence - 0.54).abs() < 1e-12);
        assert_eq!(c.kind, SignalType::EvenOdd);
    }

    #[test]
    fn digit_three_is_odd() {
        let c = ParityGenerator::default().evaluate(10003.2).unwrap();
        assert_eq!(last_digit(10003.2), 3);
        assert_eq!(c.direction, Direction::Odd);
        assert!((c.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn direction_depends_only_on_integer_digit() {
        let gen = ParityGenerator::default();
        for frac in [0.0, 0.01, 0.5, 0.99] {
            assert_eq!(gen.evaluate(1234.0 + frac).unwrap().direction, Direction::Even);
            assert_eq!(gen.evaluate(1235.0 + frac).unwrap().direction, Direction::Odd);
        }
    }

    #[test]
    fn confidence_is_capped() {
        let c = ParityGenerator::new(0.9).evaluate(2.0).unwrap();
        assert!((c.confidence - 0.99).abs() < 1e-12);
    }

    #[test]
    fn negative_prices_wrap() {
        // floor(-3.5) = -4 -> rem_euclid 10 = 6
        assert_eq!(last_digit(-3.5), 6);
    }

    #[test]
    fn non_finite_price_is_skipped() {
        assert!(ParityGenerator::default().evaluate(f64::NAN).is_none());
        assert!(ParityGenerator::default().evaluate(f64::INFINITY).is_none());
    }
}
