//! Wire and data model for the limits APIs.

use serde::{Deserialize, Serialize};

/// Whether a limit applies per availability domain, per region, or
/// tenancy-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeType {
    Ad,
    Region,
    Global,
}

impl std::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeType::Ad => write!(f, "AD"),
            ScopeType::Region => write!(f, "REGION"),
            ScopeType::Global => write!(f, "GLOBAL"),
        }
    }
}

/// A service enumerated within the tenancy's root compartment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named quota dimension with a scope type and deprecation flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitDefinition {
    pub name: String,
    #[serde(rename = "serviceName", default)]
    pub service_name: String,
    #[serde(rename = "scopeType")]
    pub scope_type: ScopeType,
    #[serde(rename = "isDeprecated", default)]
    pub is_deprecated: bool,
}

/// The numeric ceiling provisioned for a limit definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitValue {
    pub name: String,
    pub value: i64,
}

/// Current consumption for one (service, limit) at one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAvailability {
    pub used: i64,
    pub available: i64,
}

/// A region the tenancy is subscribed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSubscription {
    #[serde(rename = "regionName")]
    pub region_name: String,
    #[serde(rename = "isHomeRegion", default)]
    pub is_home_region: bool,
}

/// An availability domain within the tenancy's root compartment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityDomain {
    pub name: String,
}

/// An IAM policy. Only the count matters to the policy ceiling check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
}

/// One page of a paginated list response. `next_page` carries the
/// `opc-next-page` cursor; absent on the final page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<String>,
}

/// A usage reading produced by one probe, consumed by the evaluator.
#[derive(Debug, Clone)]
pub struct UsageReading {
    pub service: String,
    pub scope: ScopeType,
    pub availability_domain: Option<String>,
    pub limit_name: String,
    pub limit: i64,
    pub used: i64,
    pub available: i64,
}

impl UsageReading {
    /// Meaningless for `limit <= 0`; callers skip those readings.
    pub fn usage_percent(&self) -> f64 {
        self.used as f64 / self.limit as f64 * 100.0
    }
}
