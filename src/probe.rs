//! Single-limit usage probe.

use crate::api::LimitsApi;
use crate::error::{Result, ScanError};
use crate::types::{ResourceAvailability, ScopeType};

/// Fetch current usage for one (service, limit) unit.
///
/// The availability domain is forwarded only for AD-scoped limits; REGION
/// and GLOBAL probes must omit it. Any failure from the external call comes
/// back as [`ScanError::Probe`] with a human-readable cause; the caller
/// records it and moves on, it never aborts the scan.
pub async fn probe(
    limits: &dyn LimitsApi,
    compartment_id: &str,
    service_name: &str,
    limit_name: &str,
    scope: ScopeType,
    availability_domain: Option<&str>,
) -> Result<ResourceAvailability> {
    let ad = match scope {
        ScopeType::Ad => Some(availability_domain.ok_or_else(|| {
            ScanError::Probe(format!(
                "{service_name}/{limit_name}: AD-scoped limit probed without an availability domain"
            ))
        })?),
        ScopeType::Region | ScopeType::Global => None,
    };

    limits
        .get_resource_availability(compartment_id, service_name, limit_name, ad)
        .await
        .map_err(|e| {
            ScanError::Probe(format!(
                "Error fetching resource availability for {service_name}/{limit_name}: {e}"
            ))
        })
}
