//! Error taxonomy for the scan engine.
//!
//! Three boundaries matter here: configuration problems are fatal before any
//! scanning starts, probe failures are recovered at the leaf and recorded in
//! the report's error channel, and notification transport failures never fail
//! the invocation. Everything else (topology listing, deadline expiry) aborts
//! the remainder of the scan.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing topic id, unresolvable region. Fatal: short-circuits the
    /// invocation before any scanning.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A list/get call against the cloud API failed. Escalates when it
    /// happens at topology level; converted to `Probe` at the leaf.
    #[error("API request failed ({context}): {message}")]
    Api { context: String, message: String },

    /// A single availability probe failed. Recovered locally, recorded,
    /// scan continues.
    #[error("probe failed: {0}")]
    Probe(String),

    /// Notification delivery failed. Recovered locally, recorded.
    #[error("notification delivery failed: {0}")]
    Transport(String),

    /// The overall scan deadline elapsed with work outstanding.
    #[error("scan deadline of {0}s elapsed")]
    Deadline(u64),
}

impl ScanError {
    pub fn api(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Api {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        let context = e
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "http".to_string());
        ScanError::Api {
            context,
            message: e.to_string(),
        }
    }
}
