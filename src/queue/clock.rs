use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Source of monotonic seconds used by the rate-limit ledger.
pub type Clock = Arc<dyn Fn() -> f64 + Send + Sync>;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Seconds since the first call in this process.
///
/// Values are only comparable within one process; ledger entries written by
/// another process may appear to lie in the future.
pub fn monotonic_secs() -> f64 {
    ANCHOR.get_or_init(Instant::now).elapsed().as_secs_f64()
}

pub fn system_clock() -> Clock {
    Arc::new(monotonic_secs)
}
