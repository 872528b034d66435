//! External API seams.
//!
//! Every cloud call the engine makes goes through one of these object-safe
//! traits, so the scan logic never touches HTTP directly and tests can swap
//! in doubles. The REST implementations live in [`rest`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AvailabilityDomain, LimitDefinition, LimitValue, Page, Policy, RegionSubscription,
    ResourceAvailability, Service,
};

pub mod rest;

/// Region-bound limits service operations.
#[async_trait]
pub trait LimitsApi: Send + Sync {
    async fn list_services(&self, compartment_id: &str, page: Option<&str>)
        -> Result<Page<Service>>;

    async fn list_limit_definitions(
        &self,
        compartment_id: &str,
        service_name: &str,
        page: Option<&str>,
    ) -> Result<Page<LimitDefinition>>;

    async fn list_limit_values(
        &self,
        compartment_id: &str,
        service_name: &str,
        page: Option<&str>,
    ) -> Result<Page<LimitValue>>;

    /// `availability_domain` must be present iff the limit is AD-scoped.
    async fn get_resource_availability(
        &self,
        compartment_id: &str,
        service_name: &str,
        limit_name: &str,
        availability_domain: Option<&str>,
    ) -> Result<ResourceAvailability>;
}

/// Region-bound identity service operations.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn list_region_subscriptions(&self, tenancy_id: &str) -> Result<Vec<RegionSubscription>>;

    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> Result<Vec<AvailabilityDomain>>;

    async fn list_policies(&self, compartment_id: &str, page: Option<&str>)
        -> Result<Page<Policy>>;
}

/// Outbound alert sink.
#[async_trait]
pub trait NotificationsApi: Send + Sync {
    async fn publish_message(&self, topic_id: &str, title: &str, body: &str) -> Result<()>;
}

/// Hands out region-bound clients. Clients are cheap handles; a new one is
/// requested per region because the underlying endpoints are region-scoped.
pub trait ClientProvider: Send + Sync {
    fn tenancy_id(&self) -> &str;
    /// Region used for bootstrap identity calls (region resolution, policy
    /// listing) before any scan region is known, and for the notification
    /// data plane.
    fn default_region(&self) -> &str;
    fn limits(&self, region: &str) -> Arc<dyn LimitsApi>;
    fn identity(&self, region: &str) -> Arc<dyn IdentityApi>;
    fn notifications(&self) -> Arc<dyn NotificationsApi>;
}

/// Follow a paginated list to exhaustion.
///
/// `fetch_page` retrieves a single page for a cursor; the concatenation of
/// all pages is returned in order. Terminates on the first page without a
/// continuation cursor. A failed page propagates; retries belong to the
/// transport, not here.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch_page(cursor.take()).await?;
        items.extend(page.items);
        match page.next_page {
            Some(next) => cursor = Some(next),
            None => return Ok(items),
        }
    }
}
