//! Staleness policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::CacheError;
use crate::trigger::TriggerKind;

/// Rule governing when a cached file is refreshed relative to reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Policy {
    /// Keep the descriptor open but never map; callers read the descriptor.
    NoReserve,
    /// Serve the current mapping, then refresh for the next read.
    OldCopy,
    /// Refresh proactively on change notifications.
    ///
    /// Falls back to refresh-before-read when notifications are unavailable.
    Up2Date,
    /// Refresh synchronously before every read.
    #[default]
    LazyUp2Date,
    /// Refresh on a fixed timer, regardless of reads.
    Interval(Duration),
}

impl Policy {
    /// Build an interval policy, rejecting a zero period.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidPolicy`] if `period` is zero.
    pub fn interval(period: Duration) -> Result<Self, CacheError> {
        let policy = Policy::Interval(period);
        policy.validate()?;
        Ok(policy)
    }

    /// Check that the policy's parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidPolicy`] for a zero interval.
    pub fn validate(&self) -> Result<(), CacheError> {
        match self {
            Policy::Interval(period) if period.is_zero() => Err(CacheError::InvalidPolicy(
                "interval must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether entries under this policy hold a mapping.
    #[must_use]
    pub fn maps(&self) -> bool {
        !matches!(self, Policy::NoReserve)
    }

    /// The proactive trigger this policy asks for, if any.
    #[must_use]
    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        match self {
            Policy::Up2Date => Some(TriggerKind::Watch),
            Policy::Interval(period) => Some(TriggerKind::Timer(*period)),
            _ => None,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::NoReserve => write!(f, "no-reserve"),
            Policy::OldCopy => write!(f, "old-copy"),
            Policy::Up2Date => write!(f, "up2date"),
            Policy::LazyUp2Date => write!(f, "lazy-up2date"),
            Policy::Interval(period) => write!(f, "interval:{}ms", period.as_millis()),
        }
    }
}

impl FromStr for Policy {
    type Err = CacheError;

    /// Parse `no-reserve`, `old-copy`, `up2date`, `lazy-up2date` or
    /// `interval:<duration>`. Case-insensitive; `_` is accepted for `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");

        if let Some(period) = normalized.strip_prefix("interval:") {
            let period = parse_duration(period).map_err(CacheError::InvalidPolicy)?;
            return Policy::interval(period);
        }

        match normalized.as_str() {
            "no-reserve" | "noreserve" => Ok(Policy::NoReserve),
            "old-copy" | "oldcopy" => Ok(Policy::OldCopy),
            "up2date" | "up-to-date" => Ok(Policy::Up2Date),
            "lazy-up2date" | "lazy" | "lazyup2date" => Ok(Policy::LazyUp2Date),
            _ => Err(CacheError::InvalidPolicy(format!(
                "unknown policy '{}' (expected no-reserve, old-copy, up2date, lazy-up2date or interval:<duration>)",
                s.trim()
            ))),
        }
    }
}

impl TryFrom<String> for Policy {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.to_string()
    }
}

/// Parse a human-readable duration such as `250ms`, `2s`, `5m` or `1h`.
///
/// A bare number is read as milliseconds. Case-insensitive.
///
/// # Examples
///
/// ```
/// use mapcache::cache::policy::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
/// assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, the number is invalid or
/// negative, or the suffix is unknown.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_lowercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let nanos_per_unit: f64 = match suffix.as_str() {
        "" | "ms" => 1e6,
        "s" | "sec" | "secs" => 1e9,
        "m" | "min" | "mins" => 60e9,
        "h" | "hr" | "hrs" => 3_600e9,
        _ => return Err(format!("Unknown duration suffix: '{suffix}'")),
    };

    Ok(Duration::from_nanos((num * nanos_per_unit).round() as u64))
}
