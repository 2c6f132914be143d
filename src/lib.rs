// =============================================================================
// Tickscope — Streaming tick analytics engine
// =============================================================================
//
// Ticks in, gated prediction signals out. The `engine` module is the whole
// synchronous core; everything under `market_data::feed`, `api`, `emitter`
// and `persistence` adapts it to the network.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod emitter;
pub mod engine;
pub mod features;
pub mod indicators;
pub mod market_data;
pub mod persistence;
pub mod runtime_config;
pub mod signal_gate;
pub mod signals;
pub mod types;

pub use engine::SignalEngine;
pub use runtime_config::RuntimeConfig;
pub use types::{Direction, EngineEvent, Signal, SignalType, Tick};
