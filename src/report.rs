//! Report aggregation: threshold evaluation, duplicate suppression, and
//! rendering of the consolidated notification body.
//!
//! All scan tasks share one [`Reporter`] handle. The summary lines, error
//! lines, and dedup set live behind a single mutex so evaluate-and-append is
//! atomic and concurrent probes can never race a key past the suppression
//! check.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::types::{ScopeType, UsageReading};

/// Maximum notification payload accepted by the sink.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Room left for the truncation marker and sink framing when a body is cut.
const TRUNCATION_HEADROOM: usize = 1000;

const TRUNCATION_MARKER: &str = "\n\n[Report truncated: notification size limit exceeded]";

pub const EMPTY_SUMMARY_PLACEHOLDER: &str = "No resources are near their usage limits.";

/// Identifies a unique reportable unit; at most one summary line is ever
/// emitted per key for the lifetime of one `Reporter`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub service: String,
    pub scope: ScopeType,
    pub availability_domain: Option<String>,
    pub limit_name: String,
}

impl From<&UsageReading> for DedupKey {
    fn from(reading: &UsageReading) -> Self {
        Self {
            service: reading.service.clone(),
            scope: reading.scope,
            availability_domain: reading.availability_domain.clone(),
            limit_name: reading.limit_name.clone(),
        }
    }
}

#[derive(Default)]
struct ReportState {
    summary: Vec<String>,
    errors: Vec<String>,
    seen: HashSet<DedupKey>,
}

/// Clone-able handle to the scan-scoped report state.
#[derive(Clone, Default)]
pub struct Reporter {
    state: Arc<Mutex<ReportState>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a summary line that bypasses evaluation (the policy check).
    pub async fn log_line(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        self.state.lock().await.summary.push(line);
    }

    /// Record a recovered failure in the error channel.
    pub async fn log_error(&self, line: impl Into<String>) {
        let line = line.into();
        warn!("{line}");
        self.state.lock().await.errors.push(line);
    }

    /// Decide whether a reading is reportable and, if so, emit its line.
    ///
    /// A non-positive ceiling means "not applicable" and never reports. The
    /// threshold comparison is inclusive. A key is marked seen only when a
    /// line is actually emitted. Returns whether a line was emitted.
    pub async fn evaluate(&self, reading: &UsageReading, threshold_percentage: f64) -> bool {
        if reading.limit <= 0 {
            return false;
        }
        let usage_percent = reading.usage_percent();
        let key = DedupKey::from(reading);

        let mut state = self.state.lock().await;
        if state.seen.contains(&key) || usage_percent < threshold_percentage {
            return false;
        }

        let line = format!(
            "Service: {}, Scope: {}, AD: {}, Limit Name: {}, Limit: {}, Usage: {}, Available: {}, Usage %: {:.2}%",
            reading.service,
            reading.scope,
            reading.availability_domain.as_deref().unwrap_or("N/A"),
            reading.limit_name,
            reading.limit,
            reading.used,
            reading.available,
            usage_percent,
        );
        info!("{line}");
        state.summary.push(line);
        state.seen.insert(key);
        true
    }

    /// Render the notification body. Deterministic for fixed sequences and
    /// timestamp: header, an errors block when any were recorded, then the
    /// summary lines or the empty placeholder.
    pub async fn render(&self, now: DateTime<Utc>) -> String {
        let state = self.state.lock().await;
        let mut body = format!(
            "OCI Resource Usage Report - {}\n\n",
            now.format("%Y-%m-%d %H:%M:%S")
        );
        if !state.errors.is_empty() {
            body.push_str("Errors encountered:\n");
            body.push_str(&state.errors.join("\n"));
            body.push_str("\n\n");
        }
        if state.summary.is_empty() {
            body.push_str(EMPTY_SUMMARY_PLACEHOLDER);
        } else {
            body.push_str(&state.summary.join("\n"));
        }
        body
    }

    pub async fn summary_len(&self) -> usize {
        self.state.lock().await.summary.len()
    }

    pub async fn error_lines(&self) -> Vec<String> {
        self.state.lock().await.errors.clone()
    }
}

/// Cap a body at the sink's payload limit, preserving the head of the
/// report. Oversized bodies are cut on a char boundary and marked.
pub fn truncate_body(mut body: String) -> String {
    if body.len() <= MAX_MESSAGE_BYTES {
        return body;
    }
    let mut cut = MAX_MESSAGE_BYTES - TRUNCATION_HEADROOM;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str(TRUNCATION_MARKER);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(limit: i64, used: i64) -> UsageReading {
        UsageReading {
            service: "compute".into(),
            scope: ScopeType::Ad,
            availability_domain: Some("AD-1".into()),
            limit_name: "cpu-count".into(),
            limit,
            used,
            available: limit - used,
        }
    }

    #[tokio::test]
    async fn zero_or_negative_limit_emits_nothing() {
        let reporter = Reporter::new();
        assert!(!reporter.evaluate(&reading(0, 50), 90.0).await);
        assert!(!reporter.evaluate(&reading(-5, 50), 90.0).await);
        assert_eq!(reporter.summary_len().await, 0);
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        let reporter = Reporter::new();
        assert!(!reporter.evaluate(&reading(100, 89), 90.0).await);
        assert!(reporter.evaluate(&reading(100, 90), 90.0).await);
    }

    #[tokio::test]
    async fn scenario_cpu_count_at_95_percent() {
        let reporter = Reporter::new();
        assert!(reporter.evaluate(&reading(100, 95), 90.0).await);
        let body = reporter.render(Utc::now()).await;
        assert!(body.contains(
            "Service: compute, Scope: AD, AD: AD-1, Limit Name: cpu-count, \
             Limit: 100, Usage: 95, Available: 5, Usage %: 95.00%"
        ));

        let strict = Reporter::new();
        assert!(!strict.evaluate(&reading(100, 95), 96.0).await);
        assert_eq!(strict.summary_len().await, 0);
    }

    #[tokio::test]
    async fn dedup_key_suppresses_repeat_lines() {
        let reporter = Reporter::new();
        assert!(reporter.evaluate(&reading(100, 95), 90.0).await);
        // Same key with a different value: suppressed.
        assert!(!reporter.evaluate(&reading(100, 99), 90.0).await);
        assert_eq!(reporter.summary_len().await, 1);

        // Different AD is a different key.
        let mut other_ad = reading(100, 95);
        other_ad.availability_domain = Some("AD-2".into());
        assert!(reporter.evaluate(&other_ad, 90.0).await);
        assert_eq!(reporter.summary_len().await, 2);
    }

    #[tokio::test]
    async fn below_threshold_does_not_mark_the_key_seen() {
        let reporter = Reporter::new();
        assert!(!reporter.evaluate(&reading(100, 50), 90.0).await);
        assert!(reporter.evaluate(&reading(100, 95), 90.0).await);
    }

    #[tokio::test]
    async fn global_scope_renders_na_for_ad() {
        let reporter = Reporter::new();
        let r = UsageReading {
            service: "identity".into(),
            scope: ScopeType::Global,
            availability_domain: None,
            limit_name: "user-count".into(),
            limit: 10,
            used: 10,
            available: 0,
        };
        assert!(reporter.evaluate(&r, 90.0).await);
        let body = reporter.render(Utc::now()).await;
        assert!(body.contains("Scope: GLOBAL, AD: N/A"));
        assert!(body.contains("Usage %: 100.00%"));
    }

    #[tokio::test]
    async fn render_is_deterministic() {
        let reporter = Reporter::new();
        reporter.evaluate(&reading(100, 95), 90.0).await;
        reporter.log_error("Error fetching resource availability: 429").await;

        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let first = reporter.render(at).await;
        let second = reporter.render(at).await;
        assert_eq!(first, second);
        assert!(first.starts_with("OCI Resource Usage Report - 2025-06-01 12:00:00\n\n"));
        assert!(first.contains("Errors encountered:\n"));
    }

    #[tokio::test]
    async fn empty_summary_renders_placeholder() {
        let reporter = Reporter::new();
        let body = reporter.render(Utc::now()).await;
        assert!(body.ends_with(EMPTY_SUMMARY_PLACEHOLDER));
        assert!(!body.contains("Errors encountered"));
    }

    #[test]
    fn oversized_body_is_truncated_and_marked() {
        let body = "x".repeat(MAX_MESSAGE_BYTES + 1);
        let truncated = truncate_body(body);
        assert!(truncated.len() <= MAX_MESSAGE_BYTES);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        // Head of the report is preserved.
        assert!(truncated.starts_with("xxx"));
    }

    #[test]
    fn body_at_the_limit_is_unchanged() {
        let body = "x".repeat(MAX_MESSAGE_BYTES);
        assert_eq!(truncate_body(body.clone()), body);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(MAX_MESSAGE_BYTES); // 2 bytes per char
        let truncated = truncate_body(body);
        assert!(truncated.len() <= MAX_MESSAGE_BYTES);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }
}
