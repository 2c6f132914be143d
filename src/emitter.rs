// =============================================================================
// Event Emitter — Broadcast + fire-and-forget persistence
// =============================================================================
//
// Every event goes to the broadcast channel first. Sending never blocks: with
// no subscribers the event is simply dropped, and a subscriber that falls
// more than `capacity` events behind skips ahead (it sees `Lagged`).
//
// Signals are then handed to each persistence sink on its own task. Ticks
// are persisted only when `persist_ticks` is set. A failing sink is logged
// and never retried; it cannot delay the broadcast or the other sinks.
// =============================================================================

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::persistence::PersistenceSink;
use crate::types::EngineEvent;

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub struct EventEmitter {
    sender: broadcast::Sender<EngineEvent>,
    sinks: Vec<Arc<dyn PersistenceSink>>,
    persist_ticks: bool,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sinks: Vec::new(),
            persist_ticks: false,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn persist_ticks(mut self, enabled: bool) -> Self {
        self.persist_ticks = enabled;
        self
    }

    /// Attach a new subscriber. It sees only events broadcast after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish one event to subscribers and, where applicable, to the sinks.
    ///
    /// Must be called from within a Tokio runtime when sinks are configured.
    pub fn broadcast(&self, event: EngineEvent) {
        let persist = match &event {
            EngineEvent::Signal(_) => !self.sinks.is_empty(),
            EngineEvent::Tick(_) => self.persist_ticks && !self.sinks.is_empty(),
        };
        let record = persist.then(|| Arc::new(event.clone()));

        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(event) {
            debug!(kind = dropped.event_type(), "no subscribers, event dropped");
        }

        if let Some(record) = record {
            self.persist(record);
        }
    }

    fn persist(&self, record: Arc<EngineEvent>) {
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let record = Arc::clone(&record);
            tokio::spawn(async move {
                if let Err(e) = sink.append(&record).await {
                    warn!(sink = sink.name(), kind = record.event_type(), error = %e, "persistence append failed");
                }
            });
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Signal, SignalCandidate, SignalType, Tick};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast::error::RecvError;

    #[derive(Default)]
    struct CountingSink {
        records: Mutex<Vec<EngineEvent>>,
    }

    #[async_trait]
    impl PersistenceSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn append(&self, record: &EngineEvent) -> anyhow::Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl PersistenceSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn append(&self, _record: &EngineEvent) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn signal() -> EngineEvent {
        EngineEvent::Signal(Signal::from_candidate(
            SignalCandidate {
                kind: SignalType::OverUnder,
                direction: Direction::Over,
                price: 101.0,
                confidence: 0.7,
            },
            5_000,
            60,
        ))
    }

    fn tick() -> EngineEvent {
        EngineEvent::Tick(Tick::new("R_100", 101.0, 5_000))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_silent() {
        let emitter = EventEmitter::default();
        assert_eq!(emitter.subscriber_count(), 0);
        emitter.broadcast(tick());
        emitter.broadcast(signal());
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let emitter = EventEmitter::default();
        let mut a = emitter.subscribe();
        let mut b = emitter.subscribe();

        emitter.broadcast(tick());
        emitter.broadcast(signal());

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().event_type(), "tick");
            assert_eq!(rx.recv().await.unwrap().event_type(), "signal");
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let emitter = EventEmitter::new(2);
        let mut rx = emitter.subscribe();
        for _ in 0..5 {
            emitter.broadcast(tick());
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn signals_are_persisted_ticks_are_not_by_default() {
        let sink = Arc::new(CountingSink::default());
        let emitter = EventEmitter::default().with_sink(sink.clone());

        emitter.broadcast(tick());
        emitter.broadcast(signal());
        settle().await;

        let records = sink.records.lock().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type(), "signal");
    }

    #[tokio::test]
    async fn persist_ticks_includes_ticks() {
        let sink = Arc::new(CountingSink::default());
        let emitter = EventEmitter::default()
            .with_sink(sink.clone())
            .persist_ticks(true);

        emitter.broadcast(tick());
        emitter.broadcast(signal());
        settle().await;

        assert_eq!(sink.records.lock().len(), 2);
    }

    #[tokio::test]
    async fn failing_sink_does_not_affect_others() {
        let good = Arc::new(CountingSink::default());
        let emitter = EventEmitter::default()
            .with_sink(Arc::new(FailingSink))
            .with_sink(good.clone());
        let mut rx = emitter.subscribe();

        emitter.broadcast(signal());
        settle().await;

        assert_eq!(rx.recv().await.unwrap().event_type(), "signal");
        assert_eq!(good.records.lock().len(), 1);
    }
}
