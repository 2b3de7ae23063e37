pub mod batch;
pub mod clock;

use serde::Serialize;
use tracing::{debug, warn};

use crate::common::events::TelemetryEvent;
use crate::common::interval::Interval;
use crate::storage::{LedgerEntry, PulseStore};

pub use batch::{BatchPolicy, BatchReport, EventSink};
pub use clock::Clock;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Result of [`EventQueue::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Queued,
    RateLimited,
}

/// 有界 FIFO 事件队列
///
/// 新事件写入新鲜端，超出容量时从陈旧端丢弃；投递从陈旧端弹出。
#[derive(Clone)]
pub struct EventQueue {
    store: PulseStore,
    capacity: usize,
    clock: Clock,
}

impl EventQueue {
    pub fn new(store: PulseStore, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            clock: clock::system_clock(),
        }
    }

    /// Replaces the monotonic clock used by the rate-limit ledger.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn store(&self) -> &PulseStore {
        &self.store
    }

    pub fn length(&self) -> anyhow::Result<usize> {
        self.store.queue_len()
    }

    pub fn add(
        &self,
        event: &TelemetryEvent,
        interval: Option<&Interval>,
    ) -> anyhow::Result<AddOutcome> {
        // 空间隔或零间隔等同于不限流
        let window = interval
            .filter(|interval| !interval.is_unset())
            .map(Interval::as_seconds)
            .transpose()?
            .filter(|secs| *secs > 0);
        let event_key = event.event_key();

        if let Some(window) = window {
            if self.is_ratelimited(&event_key, window)? {
                debug!("[Queue] Rate limited: {}", event_key);
                return Ok(AddOutcome::RateLimited);
            }
        }

        let payload = serde_json::to_string(event)?;
        self.store.push_fresh(&payload, self.capacity)?;

        if window.is_some() {
            self.store.ledger_set(&event_key, (self.clock)())?;
        }
        Ok(AddOutcome::Queued)
    }

    fn is_ratelimited(&self, event_key: &str, window_secs: u64) -> anyhow::Result<bool> {
        let Some(last_sent) = self.store.ledger_get(event_key)? else {
            return Ok(false);
        };
        let elapsed = (self.clock)() - last_sent;
        // 负值说明记录来自另一个时钟起点，视为过期
        Ok(elapsed >= 0.0 && elapsed < window_secs as f64)
    }

    /// Pops up to `batch_size` events, oldest first. Undecodable entries are
    /// dropped.
    ///
    /// A store failure after some events were popped ends the batch early
    /// instead of discarding them; with nothing popped yet it is returned.
    pub fn collect(&self, batch_size: usize) -> anyhow::Result<Vec<TelemetryEvent>> {
        let mut events = Vec::with_capacity(batch_size.min(self.capacity));
        for _ in 0..batch_size {
            let payload = match self.store.pop_stale() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) if events.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "[Queue] Pop failed after {} events, returning partial batch: {}",
                        events.len(),
                        e
                    );
                    break;
                }
            };
            if let Some(event) = decode_logged(&payload) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Puts a failed batch back at the stale end, keeping its order.
    pub fn requeue(&self, events: &[TelemetryEvent]) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let payloads = events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.push_stale_many(&payloads, self.capacity)
    }

    /// Freshest first; does not mutate the queue.
    pub fn get_events(&self, limit: usize) -> anyhow::Result<Vec<TelemetryEvent>> {
        Ok(self
            .store
            .peek_fresh(limit)?
            .iter()
            .filter_map(|payload| decode_logged(payload))
            .collect())
    }

    pub fn get_last_sent_events(&self, limit: usize) -> anyhow::Result<Vec<LedgerEntry>> {
        self.store.ledger_list(limit)
    }
}

fn decode_logged(payload: &str) -> Option<TelemetryEvent> {
    match TelemetryEvent::decode(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("[Queue] Dropping queued payload: {}", e);
            None
        }
    }
}
