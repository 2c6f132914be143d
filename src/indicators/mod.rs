// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free window statistics used by the feature engine. Every
// public function returns `Option<T>` so callers are forced to handle
// insufficient-data and numerical-edge-case scenarios.

pub mod sma;
pub mod volatility;

pub use sma::{sma, sma_last};
pub use volatility::{stdev, stdev_last};
