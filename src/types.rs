// =============================================================================
// Shared types used across the Tickscope engine
// =============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One price observation for a symbol, as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    /// Epoch milliseconds supplied by the feed. Not guaranteed monotonic.
    pub timestamp: i64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }
}

/// The three signal families, listed in gate priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    OverUnder,
    EvenOdd,
    Matches,
}

impl SignalType {
    /// Gate evaluation order: over_under, then even_odd, then matches.
    pub const PRIORITY: [SignalType; 3] = [Self::OverUnder, Self::EvenOdd, Self::Matches];
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverUnder => write!(f, "over_under"),
            Self::EvenOdd => write!(f, "even_odd"),
            Self::Matches => write!(f, "matches"),
        }
    }
}

/// Predicted outcome carried by a signal.
///
/// Matches signals name the symbol expected to outperform, so the direction
/// set is open-ended. On the wire every variant is a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Direction {
    Over,
    Under,
    Even,
    Odd,
    Symbol(String),
}

impl From<Direction> for String {
    fn from(direction: Direction) -> Self {
        direction.to_string()
    }
}

impl From<String> for Direction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "over" => Self::Over,
            "under" => Self::Under,
            "even" => Self::Even,
            "odd" => Self::Odd,
            _ => Self::Symbol(s),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Over => write!(f, "over"),
            Self::Under => write!(f, "under"),
            Self::Even => write!(f, "even"),
            Self::Odd => write!(f, "odd"),
            Self::Symbol(s) => write!(f, "{s}"),
        }
    }
}

/// A generator's proposal, before the gate has looked at it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCandidate {
    pub kind: SignalType,
    pub direction: Direction,
    pub price: f64,
    pub confidence: f64,
}

/// An emitted prediction. Fields are private so a signal cannot change after
/// the gate has admitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    id: String,
    timestamp: i64,
    #[serde(rename = "type")]
    kind: SignalType,
    direction: Direction,
    price: f64,
    confidence: f64,
    expiry_seconds: u64,
}

impl Signal {
    /// Build a signal from an admitted candidate. Confidence is clamped to
    /// [0, 1].
    pub fn from_candidate(candidate: SignalCandidate, timestamp: i64, expiry_seconds: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            kind: candidate.kind,
            direction: candidate.direction,
            price: candidate.price,
            confidence: candidate.confidence.clamp(0.0, 1.0),
            expiry_seconds,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn kind(&self) -> SignalType {
        self.kind
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }
}

/// Everything the engine publishes outward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum EngineEvent {
    Tick(Tick),
    Signal(Signal),
}

impl EngineEvent {
    /// Event name used by broadcast subscribers.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Tick(_) => "tick",
            Self::Signal(_) => "signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> SignalCandidate {
        SignalCandidate {
            kind: SignalType::EvenOdd,
            direction: Direction::Even,
            price: 10000.7,
            confidence: 0.54,
        }
    }

    #[test]
    fn signal_roundtrips_through_json() {
        let signal = Signal::from_candidate(candidate(), 1_700_000_000_000, 30);
        let json = serde_json::to_string(&signal).unwrap();
        let back: Signal = serde_json::from_str(&json).unwrap();

        assert_eq!(back.kind(), signal.kind());
        assert_eq!(back.direction(), signal.direction());
        assert!((back.confidence() - signal.confidence()).abs() < 1e-12);
        assert!((back.price() - signal.price()).abs() < 1e-9);
        assert_eq!(back.id(), signal.id());
    }

    #[test]
    fn signal_wire_shape_uses_plain_strings() {
        let signal = Signal::from_candidate(candidate(), 5, 30);
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["type"], "even_odd");
        assert_eq!(value["direction"], "even");
        assert_eq!(value["expiry_seconds"], 30);
    }

    #[test]
    fn symbol_direction_serialises_as_symbol_name() {
        let direction = Direction::Symbol("R_100".into());
        assert_eq!(serde_json::to_string(&direction).unwrap(), "\"R_100\"");
        let back: Direction = serde_json::from_str("\"R_100\"").unwrap();
        assert_eq!(back, direction);
    }

    #[test]
    fn confidence_is_clamped_on_construction() {
        let mut c = candidate();
        c.confidence = 1.7;
        assert_eq!(Signal::from_candidate(c, 0, 30).confidence(), 1.0);
    }

    #[test]
    fn signal_ids_are_unique() {
        let a = Signal::from_candidate(candidate(), 0, 30);
        let b = Signal::from_candidate(candidate(), 0, 30);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn engine_event_is_tagged() {
        let event = EngineEvent::Tick(Tick::new("R_100", 1234.5, 10));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tick");
        assert_eq!(value["data"]["symbol"], "R_100");
        assert_eq!(event.event_type(), "tick");
    }
}
