use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error};

use super::PulseClient;

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchTick {
    Disabled,
    Idle,
    Delivered(usize),
    /// A batch ran out of retries and went back to the queue.
    Requeued(usize),
    Failed,
}

/// 启动周期投递任务，每个进程只应启动一个
pub fn spawn_dispatcher(client: PulseClient) -> JoinHandle<()> {
    let interval = Duration::from_millis(client.dispatch_settings().interval_ms);
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let tick = run_once(&client).await;
            debug!("[Dispatch] Tick: {:?}", tick);
        }
    })
}

pub async fn run_once(client: &PulseClient) -> DispatchTick {
    match client.send_queued_events().await {
        Ok(None) => DispatchTick::Disabled,
        Ok(Some(report)) if report.requeued > 0 => DispatchTick::Requeued(report.requeued),
        Ok(Some(report)) if report.delivered > 0 => DispatchTick::Delivered(report.delivered),
        Ok(Some(_)) => DispatchTick::Idle,
        Err(e) => {
            error!("[Dispatch] Send failed: {}", e);
            DispatchTick::Failed
        }
    }
}
