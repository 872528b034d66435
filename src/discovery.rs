//! Topology discovery: which regions, services, availability domains, and
//! limit definitions a scan covers.

use std::collections::HashMap;

use crate::api::{fetch_all_pages, IdentityApi, LimitsApi};
use crate::config::RegionsInput;
use crate::error::{Result, ScanError};
use crate::types::{LimitDefinition, Service};

/// Resolve the regions a scan targets.
///
/// `"all"` expands to every subscribed region, an explicit non-empty list is
/// taken verbatim (no validation against subscriptions), and an absent,
/// empty-list, or empty-string input defaults to the tenancy's home region.
pub async fn resolve_regions(
    input: Option<&RegionsInput>,
    identity: &dyn IdentityApi,
    tenancy_id: &str,
) -> Result<Vec<String>> {
    match input {
        Some(RegionsInput::One(s)) if s == "all" => {
            let subscriptions = identity.list_region_subscriptions(tenancy_id).await?;
            Ok(subscriptions
                .into_iter()
                .map(|r| r.region_name)
                .collect())
        }
        Some(RegionsInput::One(region)) if !region.is_empty() => Ok(vec![region.clone()]),
        Some(RegionsInput::Many(list)) if !list.is_empty() => Ok(list.clone()),
        _ => {
            let subscriptions = identity.list_region_subscriptions(tenancy_id).await?;
            subscriptions
                .into_iter()
                .find(|r| r.is_home_region)
                .map(|r| vec![r.region_name])
                .ok_or_else(|| {
                    ScanError::Configuration(
                        "no regions supplied and no home region subscription found".into(),
                    )
                })
        }
    }
}

pub async fn list_services(
    limits: &dyn LimitsApi,
    compartment_id: &str,
) -> Result<Vec<Service>> {
    fetch_all_pages(|page| async move {
        limits
            .list_services(compartment_id, page.as_deref())
            .await
    })
    .await
}

/// AD names for the tenancy's root compartment. Logically tenancy-wide, but
/// re-queried per region because the identity client is region-bound.
pub async fn list_availability_domains(
    identity: &dyn IdentityApi,
    compartment_id: &str,
) -> Result<Vec<String>> {
    let ads = identity.list_availability_domains(compartment_id).await?;
    Ok(ads.into_iter().map(|ad| ad.name).collect())
}

pub async fn list_limit_definitions(
    limits: &dyn LimitsApi,
    compartment_id: &str,
    service_name: &str,
) -> Result<Vec<LimitDefinition>> {
    fetch_all_pages(|page| async move {
        limits
            .list_limit_definitions(compartment_id, service_name, page.as_deref())
            .await
    })
    .await
}

/// Provisioned ceilings for one service, indexed by limit name. Definitions
/// without an entry here have no known ceiling and are skipped.
pub async fn limit_values_by_name(
    limits: &dyn LimitsApi,
    compartment_id: &str,
    service_name: &str,
) -> Result<HashMap<String, i64>> {
    let values = fetch_all_pages(|page| async move {
        limits
            .list_limit_values(compartment_id, service_name, page.as_deref())
            .await
    })
    .await?;
    Ok(values.into_iter().map(|v| (v.name, v.value)).collect())
}
