//! limitwatch — OCI service-limit auditor.
//!
//! One invocation scans a tenancy's (region × service × limit × scope)
//! space, flags resources at or above a usage threshold, and publishes a
//! single consolidated report to a notification topic. Partial API failures
//! are tolerated: a failed probe becomes an error line, never an aborted
//! scan.

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod probe;
pub mod report;
pub mod scan;
pub mod types;

pub use config::ScanConfig;
pub use error::{Result, ScanError};
pub use scan::{InvocationResult, ScanOutcome, Scanner};
