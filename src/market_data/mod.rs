pub mod connection;
pub mod feed;
pub mod tick_buffer;

// Re-exports for convenient access (e.g. `use crate::market_data::TickBuffer`).
pub use connection::{ConnectionEvent, ConnectionState, ExponentialBackoff, FixedDelay, RetryPolicy};
pub use feed::{run_feed_loop, run_tick_feed, FeedHandler, FeedMessage};
pub use tick_buffer::TickBuffer;
