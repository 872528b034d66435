//! Invocation configuration.
//!
//! The event payload arrives as loose JSON; this module turns it into a
//! validated structure with explicit defaults and rejects missing required
//! fields before any scanning starts.

use serde::Deserialize;

use crate::error::{Result, ScanError};

pub const DEFAULT_THRESHOLD_PERCENTAGE: f64 = 90.0;
pub const DEFAULT_POLICY_LIMIT: i64 = 100;
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

/// The `regions` event field: a single region name (or the literal `"all"`)
/// or an explicit list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RegionsInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    notification_topic_id: Option<String>,
    regions: Option<RegionsInput>,
    threshold_percentage: Option<f64>,
    /// Outer `None` = field absent (check disabled); inner `None` = field
    /// present but null (default ceiling applies).
    #[serde(default, deserialize_with = "deserialize_present")]
    policy_limit: Option<Option<i64>>,
    scan_deadline_seconds: Option<u64>,
}

/// Distinguishes a field that is present (even as `null`) from one that is
/// absent: the derive alone collapses an explicit `null` into the outer `None`.
fn deserialize_present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Validated scan parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub notification_topic_id: String,
    pub regions: Option<RegionsInput>,
    pub threshold_percentage: f64,
    /// Policy-count ceiling; `None` disables the policy check.
    pub policy_limit: Option<i64>,
    pub deadline_secs: u64,
}

impl ScanConfig {
    pub fn from_event(event: serde_json::Value) -> Result<Self> {
        let payload: EventPayload = serde_json::from_value(event)
            .map_err(|e| ScanError::Configuration(format!("malformed event payload: {e}")))?;

        let notification_topic_id = payload
            .notification_topic_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ScanError::Configuration("Notification topic ID not provided".into())
            })?;

        Ok(Self {
            notification_topic_id,
            regions: payload.regions,
            threshold_percentage: payload
                .threshold_percentage
                .unwrap_or(DEFAULT_THRESHOLD_PERCENTAGE),
            policy_limit: payload
                .policy_limit
                .map(|limit| limit.unwrap_or(DEFAULT_POLICY_LIMIT)),
            deadline_secs: payload
                .scan_deadline_seconds
                .unwrap_or(DEFAULT_DEADLINE_SECS),
        })
    }
}
