use serde::{Deserialize, Serialize};

use super::error::PulseError;

/// Rate-limit window as supplied by callers: either raw seconds or a
/// human specifier such as `"5s"`, `"1m"`, `"1h"`, `"1d"`, `"1w"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Interval {
    Seconds(u64),
    Spec(String),
}

impl Interval {
    /// `0` or a blank specifier: no rate limit applies.
    pub fn is_unset(&self) -> bool {
        match self {
            Interval::Seconds(secs) => *secs == 0,
            Interval::Spec(spec) => spec.trim().is_empty(),
        }
    }

    pub fn as_seconds(&self) -> Result<u64, PulseError> {
        match self {
            Interval::Seconds(secs) => Ok(*secs),
            Interval::Spec(spec) => parse_interval(spec),
        }
    }
}

impl From<u64> for Interval {
    fn from(secs: u64) -> Self {
        Interval::Seconds(secs)
    }
}

impl From<&str> for Interval {
    fn from(spec: &str) -> Self {
        Interval::Spec(spec.to_string())
    }
}

/// 将间隔描述解析为秒数
pub fn parse_interval(spec: &str) -> Result<u64, PulseError> {
    let invalid = || PulseError::InvalidIntervalFormat(spec.to_string());
    let trimmed = spec.trim();

    let (digits, multiplier) = match trimmed.char_indices().last() {
        None => return Err(invalid()),
        Some((_, c)) if c.is_ascii_digit() => (trimmed, 1),
        Some((idx, unit)) => {
            let multiplier = match unit {
                's' => 1,
                'm' => 60,
                'h' => 60 * 60,
                'd' => 24 * 60 * 60,
                'w' => 7 * 24 * 60 * 60,
                _ => return Err(invalid()),
            };
            (&trimmed[..idx], multiplier)
        }
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}
