use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::EventQueue;
use crate::common::events::TelemetryEvent;

/// Destination of collected batches.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, events: &[TelemetryEvent]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub max_batches: usize,
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `backoff * 2^(n-1)`.
    pub backoff: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_batches: 10,
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Events accepted by the sink.
    pub delivered: usize,
    /// Sink invocations, retries included.
    pub attempts: usize,
    /// Batches accepted by the sink.
    pub batches: usize,
    /// Events put back after retries ran out.
    pub requeued: usize,
}

impl EventQueue {
    /// 分批投递，失败按指数退避重试同一批次
    ///
    /// 重试耗尽后该批次回到队列陈旧端，并停止本轮处理。
    pub async fn batch_process(
        &self,
        sink: &dyn EventSink,
        policy: &BatchPolicy,
    ) -> anyhow::Result<BatchReport> {
        let mut report = BatchReport::default();
        let mut pending: Option<Vec<TelemetryEvent>> = None;
        let mut retry_attempts: u32 = 0;

        for iteration in 0..policy.max_batches {
            let events = match pending.take() {
                Some(events) => events,
                None => self.collect_blocking(policy.batch_size).await?,
            };
            if events.is_empty() {
                break;
            }

            report.attempts += 1;
            match sink.deliver(&events).await {
                Ok(()) => {
                    report.batches += 1;
                    report.delivered += events.len();
                    retry_attempts = 0;
                }
                Err(e) => {
                    retry_attempts += 1;
                    if retry_attempts > policy.max_retries {
                        error!("[Queue] Max retries reached: {}", e);
                        report.requeued += events.len();
                        self.requeue_blocking(events).await?;
                        return Ok(report);
                    }

                    if iteration + 1 == policy.max_batches {
                        pending = Some(events);
                        break;
                    }

                    let delay = policy
                        .backoff
                        .saturating_mul(2u32.saturating_pow(retry_attempts - 1));
                    warn!(
                        "[Queue] Retrying batch of {} in {:?} (attempt {}): {}",
                        events.len(),
                        delay,
                        retry_attempts,
                        e
                    );
                    sleep(delay).await;
                    pending = Some(events);
                }
            }
        }

        // 批次额度用完时仍在重试的事件不能丢
        if let Some(events) = pending {
            warn!(
                "[Queue] Batch limit reached mid-retry, requeueing {} events",
                events.len()
            );
            report.requeued += events.len();
            self.requeue_blocking(events).await?;
        }

        if report.delivered > 0 {
            info!(
                "[Queue] Delivered {} events in {} batches",
                report.delivered, report.batches
            );
        }
        Ok(report)
    }

    async fn collect_blocking(&self, batch_size: usize) -> anyhow::Result<Vec<TelemetryEvent>> {
        let queue = self.clone();
        tokio::task::spawn_blocking(move || queue.collect(batch_size)).await?
    }

    async fn requeue_blocking(&self, events: Vec<TelemetryEvent>) -> anyhow::Result<()> {
        let queue = self.clone();
        tokio::task::spawn_blocking(move || queue.requeue(&events)).await?
    }
}
