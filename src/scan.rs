//! Scan coordinator.
//!
//! Drives one scan to completion: resolves regions, runs the optional
//! tenant-wide policy check, fans probes out per region under a bounded
//! worker budget, and always attempts the final notification, even after
//! the scan itself collapsed, so operators see the partial report.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

use crate::api::{fetch_all_pages, ClientProvider, IdentityApi, LimitsApi};
use crate::config::ScanConfig;
use crate::discovery;
use crate::error::{Result, ScanError};
use crate::probe;
use crate::report::{truncate_body, Reporter};
use crate::types::{ScopeType, Service, UsageReading};

/// Probes in flight at once within a region's fan-out. Kept small to stay
/// under the limits API's own rate limits.
pub const PROBE_CONCURRENCY: usize = 3;

const NOTIFICATION_TITLE: &str = "OCI Resource Usage Alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Discovering,
    Probing,
    Aggregating,
    Notifying,
    Done,
    Failed,
}

/// The invocation's externally observed result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InvocationResult {
    Success { message: String },
    Failure { error: String },
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub result: InvocationResult,
    /// False when the scan "succeeded" but the final notification could not
    /// be delivered; a partial success the result message does not show.
    pub notification_delivered: bool,
}

pub struct Scanner {
    clients: Arc<dyn ClientProvider>,
    config: ScanConfig,
    reporter: Reporter,
    phase: ScanPhase,
}

impl Scanner {
    pub fn new(clients: Arc<dyn ClientProvider>, config: ScanConfig) -> Self {
        Self {
            clients,
            config,
            reporter: Reporter::new(),
            phase: ScanPhase::Idle,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    fn set_phase(&mut self, phase: ScanPhase) {
        debug!(from = ?self.phase, to = ?phase, "scan phase transition");
        self.phase = phase;
    }

    /// Run the scan to completion and always attempt the notification.
    pub async fn run(mut self) -> ScanOutcome {
        let deadline = Duration::from_secs(self.config.deadline_secs);
        let scan_result = match timeout(deadline, self.scan()).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Deadline(self.config.deadline_secs)),
        };

        if let Err(e) = &scan_result {
            let message = format!("Function execution failed: {e}");
            error!("{message}");
            self.reporter.log_error(message).await;
        }

        self.set_phase(ScanPhase::Notifying);
        let notification_delivered = match self.notify().await {
            Ok(()) => {
                info!("Notification published");
                true
            }
            Err(e) => {
                let message = format!("Failed to send notification: {e}");
                self.reporter.log_error(message).await;
                false
            }
        };

        match scan_result {
            Ok(()) => {
                self.set_phase(ScanPhase::Done);
                ScanOutcome {
                    result: InvocationResult::Success {
                        message: "Function executed successfully.".into(),
                    },
                    notification_delivered,
                }
            }
            Err(e) => {
                self.set_phase(ScanPhase::Failed);
                ScanOutcome {
                    result: InvocationResult::Failure {
                        error: format!("Function execution failed: {e}"),
                    },
                    notification_delivered,
                }
            }
        }
    }

    async fn scan(&mut self) -> Result<()> {
        self.set_phase(ScanPhase::Discovering);

        let tenancy_id = self.clients.tenancy_id().to_string();
        // The root compartment is the tenancy itself.
        let compartment_id = tenancy_id.clone();

        let bootstrap_identity = self.clients.identity(self.clients.default_region());
        let regions = discovery::resolve_regions(
            self.config.regions.as_ref(),
            bootstrap_identity.as_ref(),
            &tenancy_id,
        )
        .await?;
        info!(regions = ?regions, "Resolved scan regions");

        if let Some(policy_limit) = self.config.policy_limit {
            self.check_policy_ceiling(bootstrap_identity.as_ref(), &compartment_id, policy_limit)
                .await;
        }

        self.set_phase(ScanPhase::Probing);
        for region in &regions {
            self.scan_region(region, &compartment_id).await?;
        }

        self.set_phase(ScanPhase::Aggregating);
        Ok(())
    }

    /// Count tenant policies against the configured ceiling. Shares the
    /// inclusive-threshold rule with limit evaluation but has no scope/AD
    /// dimension and is never deduplicated.
    async fn check_policy_ceiling(
        &self,
        identity: &dyn IdentityApi,
        compartment_id: &str,
        policy_limit: i64,
    ) {
        if policy_limit <= 0 {
            return;
        }

        let policies = fetch_all_pages(|page| async move {
            identity
                .list_policies(compartment_id, page.as_deref())
                .await
        })
        .await;

        match policies {
            Ok(policies) => {
                let count = policies.len() as i64;
                let usage_percent = count as f64 / policy_limit as f64 * 100.0;
                debug!(count, policy_limit, usage_percent, "policy ceiling checked");
                if usage_percent >= self.config.threshold_percentage {
                    self.reporter
                        .log_line(format!(
                            "Policy count: {count}, Limit: {policy_limit}, Usage %: {usage_percent:.2}%"
                        ))
                        .await;
                }
            }
            Err(e) => {
                self.reporter
                    .log_error(format!("Error counting policies: {e}"))
                    .await;
            }
        }
    }

    /// Discover one region's topology and probe its full fan-out. All probe
    /// tasks are joined before this returns, even when topology listing
    /// fails midway, so no region's lines can go missing from the report.
    async fn scan_region(&self, region: &str, compartment_id: &str) -> Result<()> {
        info!("Processing region: {region}");

        let limits = self.clients.limits(region);
        let identity = self.clients.identity(region);

        let services = discovery::list_services(limits.as_ref(), compartment_id).await?;
        let ads = discovery::list_availability_domains(identity.as_ref(), compartment_id).await?;
        info!(
            region,
            services = services.len(),
            availability_domains = ads.len(),
            "Region topology discovered"
        );

        let semaphore = Arc::new(Semaphore::new(PROBE_CONCURRENCY));
        let mut tasks: JoinSet<()> = JoinSet::new();

        let mut topology_failure: Option<ScanError> = None;
        for service in &services {
            if let Err(e) = self
                .dispatch_service_probes(
                    &limits,
                    compartment_id,
                    service,
                    &ads,
                    &semaphore,
                    &mut tasks,
                )
                .await
            {
                topology_failure = Some(e);
                break;
            }
        }

        // Completion barrier: every dispatched probe lands in the report
        // before the next region starts (or the failure propagates).
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                self.reporter
                    .log_error(format!("Probe task failed: {e}"))
                    .await;
            }
        }

        match topology_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn dispatch_service_probes(
        &self,
        limits: &Arc<dyn LimitsApi>,
        compartment_id: &str,
        service: &Service,
        ads: &[String],
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) -> Result<()> {
        let definitions =
            discovery::list_limit_definitions(limits.as_ref(), compartment_id, &service.name)
                .await?;
        let values =
            discovery::limit_values_by_name(limits.as_ref(), compartment_id, &service.name)
                .await?;

        for definition in definitions {
            if definition.is_deprecated {
                continue;
            }
            // No provisioned ceiling: nothing to compare against.
            let Some(&limit) = values.get(&definition.name) else {
                continue;
            };

            let fan_out: Vec<Option<String>> = match definition.scope_type {
                ScopeType::Ad => ads.iter().cloned().map(Some).collect(),
                ScopeType::Region | ScopeType::Global => vec![None],
            };

            for ad in fan_out {
                let limits = Arc::clone(limits);
                let semaphore = Arc::clone(semaphore);
                let reporter = self.reporter.clone();
                let compartment_id = compartment_id.to_string();
                let service_name = service.name.clone();
                let limit_name = definition.name.clone();
                let scope = definition.scope_type;
                let threshold = self.config.threshold_percentage;

                tasks.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };

                    match probe::probe(
                        limits.as_ref(),
                        &compartment_id,
                        &service_name,
                        &limit_name,
                        scope,
                        ad.as_deref(),
                    )
                    .await
                    {
                        Ok(availability) => {
                            let reading = UsageReading {
                                service: service_name,
                                scope,
                                availability_domain: ad,
                                limit_name,
                                limit,
                                used: availability.used,
                                available: availability.available,
                            };
                            reporter.evaluate(&reading, threshold).await;
                        }
                        Err(e) => reporter.log_error(e.to_string()).await,
                    }
                });
            }
        }
        Ok(())
    }

    async fn notify(&self) -> Result<()> {
        let body = truncate_body(self.reporter.render(Utc::now()).await);
        self.clients
            .notifications()
            .publish_message(&self.config.notification_topic_id, NOTIFICATION_TITLE, &body)
            .await
    }
}
