// =============================================================================
// Signals Module
// =============================================================================
//
// Candidate generators for the engine:
// - Ensemble scoring (momentum / trend / volatility) -> over_under
// - Last-digit parity -> even_odd
// - Cross-symbol divergence -> matches

pub mod ensemble;
pub mod matches;
pub mod parity;

pub use ensemble::{EnsembleScorer, EnsembleWeights, Score, ScoreComponents};
pub use matches::MatchesGenerator;
pub use parity::ParityGenerator;
