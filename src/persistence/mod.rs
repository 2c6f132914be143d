// =============================================================================
// Persistence — Optional record sinks
// =============================================================================
//
// The emitter hands every admitted signal (and, when enabled, every tick) to
// each configured sink on its own task. Sinks report failure through the
// returned error; the emitter logs it and moves on. Nothing is retried.
// =============================================================================

pub mod jsonl;

use async_trait::async_trait;

use crate::types::EngineEvent;

pub use jsonl::JsonlSink;

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Short identifier used in log lines.
    fn name(&self) -> &str;

    /// Store one record.
    async fn append(&self, record: &EngineEvent) -> anyhow::Result<()>;
}
