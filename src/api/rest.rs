//! Thin OCI REST implementations of the API traits.
//!
//! Each client is a small wrapper over one region-scoped endpoint. Requests
//! are authorized by an opaque [`RequestSigner`] capability, so the engine
//! never handles credentials itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{ClientProvider, IdentityApi, LimitsApi, NotificationsApi};
use crate::error::{Result, ScanError};
use crate::types::{
    AvailabilityDomain, LimitDefinition, LimitValue, Page, Policy, RegionSubscription,
    ResourceAvailability, Service,
};

const LIMITS_API_VERSION: &str = "20190729";
const IDENTITY_API_VERSION: &str = "20160918";
const ONS_API_VERSION: &str = "20181201";
const SECOND_LEVEL_DOMAIN: &str = "oraclecloud.com";

/// Page size requested from list endpoints.
const PAGE_SIZE: &str = "1000";

/// Per-call HTTP timeout.
const CALL_TIMEOUT_SECS: u64 = 30;

/// Cursor header returned by paginated list endpoints.
const NEXT_PAGE_HEADER: &str = "opc-next-page";

/// Opaque capability that can authorize outbound requests and names the
/// tenancy they act on.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    fn tenancy_id(&self) -> &str;
    async fn sign(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder>;
}

/// Signer backed by a pre-issued bearer token.
pub struct BearerTokenSigner {
    tenancy_id: String,
    token: String,
}

impl BearerTokenSigner {
    pub fn new(tenancy_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            tenancy_id: tenancy_id.into(),
            token: token.into(),
        }
    }

    /// Read `OCI_TENANCY_ID` and `OCI_AUTH_TOKEN` from the environment.
    pub fn from_env() -> Result<Self> {
        let tenancy_id = std::env::var("OCI_TENANCY_ID")
            .map_err(|_| ScanError::Configuration("OCI_TENANCY_ID not set".into()))?;
        let token = std::env::var("OCI_AUTH_TOKEN")
            .map_err(|_| ScanError::Configuration("OCI_AUTH_TOKEN not set".into()))?;
        Ok(Self::new(tenancy_id, token))
    }
}

#[async_trait]
impl RequestSigner for BearerTokenSigner {
    fn tenancy_id(&self) -> &str {
        &self.tenancy_id
    }

    async fn sign(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(req.bearer_auth(&self.token))
    }
}

/// Shared plumbing for one region-scoped service endpoint.
struct Endpoint {
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    base: String,
}

impl Endpoint {
    async fn get_page<T: DeserializeOwned>(
        &self,
        context: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Page<T>> {
        let req = self
            .http
            .get(format!("{}/{}", self.base, path))
            .query(query);
        let req = self.signer.sign(req).await?;
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScanError::api(
                context,
                format!("status {}: {}", status.as_u16(), snippet(&body, 500)),
            ));
        }

        let next_page = resp
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let items = resp.json().await?;
        Ok(Page { items, next_page })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        context: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let req = self
            .http
            .get(format!("{}/{}", self.base, path))
            .query(query);
        let req = self.signer.sign(req).await?;
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScanError::api(
                context,
                format!("status {}: {}", status.as_u16(), snippet(&body, 500)),
            ));
        }
        Ok(resp.json().await?)
    }
}

/// Truncate an error body for logging without splitting a UTF-8 char.
fn snippet(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}

pub struct RestLimitsClient {
    endpoint: Endpoint,
}

#[async_trait]
impl LimitsApi for RestLimitsClient {
    async fn list_services(
        &self,
        compartment_id: &str,
        page: Option<&str>,
    ) -> Result<Page<Service>> {
        let mut query = vec![("compartmentId", compartment_id), ("limit", PAGE_SIZE)];
        if let Some(p) = page {
            query.push(("page", p));
        }
        self.endpoint
            .get_page("list_services", "services", &query)
            .await
    }

    async fn list_limit_definitions(
        &self,
        compartment_id: &str,
        service_name: &str,
        page: Option<&str>,
    ) -> Result<Page<LimitDefinition>> {
        let mut query = vec![
            ("compartmentId", compartment_id),
            ("serviceName", service_name),
            ("limit", PAGE_SIZE),
        ];
        if let Some(p) = page {
            query.push(("page", p));
        }
        self.endpoint
            .get_page("list_limit_definitions", "limitDefinitions", &query)
            .await
    }

    async fn list_limit_values(
        &self,
        compartment_id: &str,
        service_name: &str,
        page: Option<&str>,
    ) -> Result<Page<LimitValue>> {
        let mut query = vec![
            ("compartmentId", compartment_id),
            ("serviceName", service_name),
            ("limit", PAGE_SIZE),
        ];
        if let Some(p) = page {
            query.push(("page", p));
        }
        self.endpoint
            .get_page("list_limit_values", "limitValues", &query)
            .await
    }

    async fn get_resource_availability(
        &self,
        compartment_id: &str,
        service_name: &str,
        limit_name: &str,
        availability_domain: Option<&str>,
    ) -> Result<ResourceAvailability> {
        let mut query = vec![("compartmentId", compartment_id)];
        if let Some(ad) = availability_domain {
            query.push(("availabilityDomain", ad));
        }
        let path = format!("services/{service_name}/limits/{limit_name}/resourceAvailability");
        self.endpoint
            .get_json("get_resource_availability", &path, &query)
            .await
    }
}

pub struct RestIdentityClient {
    endpoint: Endpoint,
}

#[async_trait]
impl IdentityApi for RestIdentityClient {
    async fn list_region_subscriptions(&self, tenancy_id: &str) -> Result<Vec<RegionSubscription>> {
        let path = format!("tenancies/{tenancy_id}/regionSubscriptions");
        self.endpoint
            .get_json("list_region_subscriptions", &path, &[])
            .await
    }

    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> Result<Vec<AvailabilityDomain>> {
        self.endpoint
            .get_json(
                "list_availability_domains",
                "availabilityDomains",
                &[("compartmentId", compartment_id)],
            )
            .await
    }

    async fn list_policies(
        &self,
        compartment_id: &str,
        page: Option<&str>,
    ) -> Result<Page<Policy>> {
        let mut query = vec![("compartmentId", compartment_id), ("limit", PAGE_SIZE)];
        if let Some(p) = page {
            query.push(("page", p));
        }
        self.endpoint
            .get_page("list_policies", "policies", &query)
            .await
    }
}

pub struct RestNotificationsClient {
    endpoint: Endpoint,
}

#[async_trait]
impl NotificationsApi for RestNotificationsClient {
    async fn publish_message(&self, topic_id: &str, title: &str, body: &str) -> Result<()> {
        let req = self
            .endpoint
            .http
            .post(format!(
                "{}/topics/{topic_id}/messages",
                self.endpoint.base
            ))
            .json(&serde_json::json!({ "title": title, "body": body }));
        let req = self.endpoint.signer.sign(req).await?;
        let resp = req
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScanError::Transport(format!(
                "status {}: {}",
                status.as_u16(),
                snippet(&body, 500)
            )));
        }
        Ok(())
    }
}

/// Builds region-bound REST clients on demand.
pub struct RestClientProvider {
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    /// Region used for bootstrap identity calls and the notification
    /// data plane.
    default_region: String,
}

impl RestClientProvider {
    pub fn new(signer: Arc<dyn RequestSigner>, default_region: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            signer,
            default_region: default_region.into(),
        })
    }

    fn endpoint(&self, service: &str, region: &str, version: &str) -> Endpoint {
        Endpoint {
            http: self.http.clone(),
            signer: Arc::clone(&self.signer),
            base: format!("https://{service}.{region}.{SECOND_LEVEL_DOMAIN}/{version}"),
        }
    }
}

impl ClientProvider for RestClientProvider {
    fn tenancy_id(&self) -> &str {
        self.signer.tenancy_id()
    }

    fn default_region(&self) -> &str {
        &self.default_region
    }

    fn limits(&self, region: &str) -> Arc<dyn LimitsApi> {
        Arc::new(RestLimitsClient {
            endpoint: self.endpoint("limits", region, LIMITS_API_VERSION),
        })
    }

    fn identity(&self, region: &str) -> Arc<dyn IdentityApi> {
        Arc::new(RestIdentityClient {
            endpoint: self.endpoint("identity", region, IDENTITY_API_VERSION),
        })
    }

    fn notifications(&self) -> Arc<dyn NotificationsApi> {
        Arc::new(RestNotificationsClient {
            endpoint: self.endpoint("notification", &self.default_region, ONS_API_VERSION),
        })
    }
}
