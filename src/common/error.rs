use thiserror::Error;

/// Domain failures of the telemetry pipeline.
///
/// Storage and wiring code returns `anyhow::Result`; these variants are the
/// ones callers are expected to match on.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Interval specifier is not `<int>` or `<int><s|m|h|d|w>`
    #[error("Invalid interval format: {0}")]
    InvalidIntervalFormat(String),

    /// Ingestion endpoint answered with a non-2xx status
    #[error("Delivery failed: {status} {body}")]
    Delivery { status: u16, body: String },

    /// Request never produced a response (connect error, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Queued payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}
