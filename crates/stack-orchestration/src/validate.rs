//! Post-deployment drift validation
//!
//! Re-renders every service with the stack's current variables and checks
//! that each rendered line is present in the live device configuration.
//! Validation is advisory: it writes the cached report onto the stack but
//! never changes lifecycle state or deployment results.

use crate::client::TemplateExecutionClient;
use crate::vars::{merge_variables, resolve_credentials};
use crate::{DeployOptions, Error, Result};
use chrono::Utc;
use stack_store::{
    Credentials, DeviceValidation, ServiceDefinition, ServiceValidation, StackStore,
    StackValidation, VarMap,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default wall-clock budget for one validation pass
const DEFAULT_VALIDATE_BUDGET: Duration = Duration::from_secs(180);

/// Rendered lines absent from the device configuration
///
/// Lines compare trimmed; blank rendered lines are ignored. Containment
/// is all this checks: extra configuration on the device is not drift.
pub(crate) fn missing_lines(rendered: &str, device_config: &str) -> Vec<String> {
    let present: HashSet<&str> = device_config.lines().map(str::trim).collect();
    rendered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !present.contains(line))
        .map(str::to_string)
        .collect()
}

/// Validation engine over a store and an execution client
pub struct ValidationEngine {
    store: Arc<dyn StackStore>,
    client: TemplateExecutionClient,
    default_credentials: Credentials,
    validate_budget: Duration,
}

impl ValidationEngine {
    /// Create an engine with the default validation budget
    pub fn new(
        store: Arc<dyn StackStore>,
        client: TemplateExecutionClient,
        default_credentials: Credentials,
    ) -> Self {
        Self {
            store,
            client,
            default_credentials,
            validate_budget: DEFAULT_VALIDATE_BUDGET,
        }
    }

    /// Override the wall-clock budget for a validation pass
    pub fn with_validate_budget(mut self, budget: Duration) -> Self {
        self.validate_budget = budget;
        self
    }

    /// Validate every service of a stack against live device state
    ///
    /// Runs for all services regardless of the stored deployment result,
    /// so a Failed stack can still be inspected for partial drift. The
    /// report is cached on the stack as `last_validation`.
    pub async fn validate(
        &self,
        stack_id: Uuid,
        options: DeployOptions,
    ) -> Result<StackValidation> {
        let stack = self
            .store
            .get_stack(stack_id)
            .await?
            .ok_or(Error::StackNotFound(stack_id))?;

        info!(
            "Validating stack '{}' ({}) with {} services",
            stack.name,
            stack_id,
            stack.services.len()
        );

        let credentials = resolve_credentials(
            options.credentials.as_ref(),
            stack.credentials.as_ref(),
            &self.default_credentials,
        );

        let pass = async {
            let mut services = Vec::with_capacity(stack.services.len());
            for service in &stack.services {
                services
                    .push(self.validate_service(service, &stack.shared_variables, &credentials).await);
            }
            services
        };

        let services = match tokio::time::timeout(self.validate_budget, pass).await {
            Ok(services) => services,
            Err(_) => {
                warn!(
                    "Validation of stack {} exceeded the {}s budget",
                    stack_id,
                    self.validate_budget.as_secs()
                );
                return Err(Error::BudgetExceeded {
                    operation: "validation",
                    stack_id,
                    budget_secs: self.validate_budget.as_secs(),
                });
            }
        };

        let validation = StackValidation {
            all_valid: services.iter().all(|s| s.valid),
            checked_at: Utc::now(),
            services,
        };

        // Re-read before caching: a deploy may have advanced the record
        // while the devices were being queried, and validation must not
        // clobber lifecycle fields.
        if let Some(mut current) = self.store.get_stack(stack_id).await? {
            current.last_validation = Some(validation.clone());
            current.touch();
            self.store.put_stack(&current).await?;
        }

        Ok(validation)
    }

    async fn validate_service(
        &self,
        service: &ServiceDefinition,
        shared: &VarMap,
        credentials: &Credentials,
    ) -> ServiceValidation {
        let variables = merge_variables(shared, &service.variables);
        let rendered = match self.client.render(&service.template, &variables).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Rendering '{}' for validation failed: {}", service.template, e);
                let devices = service
                    .devices
                    .iter()
                    .map(|device| DeviceValidation {
                        device: device.clone(),
                        valid: false,
                        missing_lines: Vec::new(),
                        error: Some(e.to_string()),
                    })
                    .collect();
                return ServiceValidation {
                    service: service.name.clone(),
                    valid: false,
                    devices,
                };
            }
        };

        let fetched = self.client.fetch_all(service.devices.iter(), credentials).await;

        let mut devices: Vec<DeviceValidation> = fetched
            .into_iter()
            .map(|(device, result)| match result {
                Ok(config) => {
                    let missing = missing_lines(&rendered, &config);
                    debug!(
                        "Device '{}' for service '{}': {} missing lines",
                        device,
                        service.name,
                        missing.len()
                    );
                    DeviceValidation {
                        device,
                        valid: missing.is_empty(),
                        missing_lines: missing,
                        error: None,
                    }
                }
                Err(e) => DeviceValidation {
                    device,
                    valid: false,
                    missing_lines: Vec::new(),
                    error: Some(e.to_string()),
                },
            })
            .collect();
        devices.sort_by(|a, b| a.device.cmp(&b.device));

        ServiceValidation {
            service: service.name.clone(),
            valid: devices.iter().all(|d| d.valid),
            devices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, ScriptedRenderer, StaticDirectory};
    use crate::DeploymentEngine;
    use stack_store::{MemoryBackend, ServiceStack, StackState};
    use std::collections::BTreeSet;

    fn service(name: &str, devices: &[&str]) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            template: format!("{name}.j2"),
            devices: devices.iter().map(|d| d.to_string()).collect(),
            order: 0,
            variables: VarMap::new(),
            depends_on: BTreeSet::new(),
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "netops".to_string(),
            password: "pw".to_string(),
        }
    }

    struct Fixture {
        store: Arc<MemoryBackend>,
        renderer: ScriptedRenderer,
        transport: RecordingTransport,
        client: TemplateExecutionClient,
    }

    fn fixture(devices: &[&str]) -> Fixture {
        let store = Arc::new(MemoryBackend::new());
        let renderer = ScriptedRenderer::new();
        let transport = RecordingTransport::new();
        let mut directory = StaticDirectory::new();
        for device in devices {
            directory.add_device(device, "cisco_ios");
        }
        let client = TemplateExecutionClient::new(
            Arc::new(renderer.clone()),
            Arc::new(directory),
            Arc::new(transport.clone()),
        );
        Fixture {
            store,
            renderer,
            transport,
            client,
        }
    }

    async fn store_stack(store: &MemoryBackend, services: Vec<ServiceDefinition>) -> Uuid {
        let mut stack = ServiceStack::new("campus".to_string());
        stack.services = services;
        store.put_stack(&stack).await.unwrap();
        stack.stack_id
    }

    #[test]
    fn test_missing_lines_trims_and_ignores_blanks() {
        let rendered = "vlan 100\n  name users\n\nntp server 10.0.0.1\n";
        let device = "hostname sw1\nvlan 100\nname users\n";

        let missing = missing_lines(rendered, device);
        assert_eq!(missing, vec!["ntp server 10.0.0.1"]);
    }

    #[test]
    fn test_extra_device_lines_are_not_drift() {
        let rendered = "vlan 100";
        let device = "vlan 100\nvlan 200\nsnmp-server community public";

        assert!(missing_lines(rendered, device).is_empty());
    }

    #[tokio::test]
    async fn test_deploy_then_validate_round_trip() {
        let f = fixture(&["sw1"]);
        f.renderer.script("vlans.j2", "vlan 100\n name users");
        let stack_id = store_stack(&f.store, vec![service("vlans", &["sw1"])]).await;

        let deploy = DeploymentEngine::new(f.store.clone(), f.client.clone(), credentials());
        deploy
            .deploy(stack_id, DeployOptions::default())
            .await
            .unwrap();

        let engine = ValidationEngine::new(f.store.clone(), f.client.clone(), credentials());
        let validation = engine.validate(stack_id, DeployOptions::default()).await.unwrap();

        assert!(validation.all_valid);
        assert_eq!(validation.services.len(), 1);
        assert!(validation.services[0].devices[0].missing_lines.is_empty());
    }

    #[tokio::test]
    async fn test_drift_reports_missing_lines() {
        let f = fixture(&["sw1"]);
        f.renderer.script("vlans.j2", "vlan 100\nvlan 200");
        f.transport.set_running_config("sw1", "vlan 100");
        let stack_id = store_stack(&f.store, vec![service("vlans", &["sw1"])]).await;

        let engine = ValidationEngine::new(f.store.clone(), f.client, credentials());
        let validation = engine.validate(stack_id, DeployOptions::default()).await.unwrap();

        assert!(!validation.all_valid);
        let device = &validation.services[0].devices[0];
        assert!(!device.valid);
        assert_eq!(device.missing_lines, vec!["vlan 200"]);
        assert_eq!(device.error, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_device_invalid() {
        let f = fixture(&["sw1", "sw2"]);
        f.renderer.script("vlans.j2", "vlan 100");
        f.transport.set_running_config("sw2", "vlan 100");
        f.transport.fail_fetch("sw1", "connection timed out");
        let stack_id = store_stack(&f.store, vec![service("vlans", &["sw1", "sw2"])]).await;

        let engine = ValidationEngine::new(f.store.clone(), f.client, credentials());
        let validation = engine.validate(stack_id, DeployOptions::default()).await.unwrap();

        assert!(!validation.all_valid);
        let devices = &validation.services[0].devices;
        assert_eq!(devices[0].device, "sw1");
        assert!(!devices[0].valid);
        assert!(devices[0].error.as_deref().unwrap().contains("timed out"));
        assert!(devices[1].valid);
    }

    #[tokio::test]
    async fn test_validation_never_touches_lifecycle_state() {
        let f = fixture(&["sw1"]);
        f.renderer.script_failure("vlans.j2", "syntax error");
        let stack_id = store_stack(&f.store, vec![service("vlans", &["sw1"])]).await;

        let engine = ValidationEngine::new(f.store.clone(), f.client, credentials());
        let validation = engine.validate(stack_id, DeployOptions::default()).await.unwrap();

        assert!(!validation.all_valid);
        let stored = f.store.get_stack(stack_id).await.unwrap().unwrap();
        assert_eq!(stored.state, StackState::Pending);
        assert!(stored.deployment_errors.is_empty());
        // The report itself is cached
        assert!(stored.last_validation.is_some());
        assert!(!stored.last_validation.unwrap().all_valid);
    }

    #[tokio::test]
    async fn test_budget_expiry_is_an_error() {
        let f = fixture(&["sw1"]);
        f.renderer.script("vlans.j2", "vlan 100");
        f.renderer.set_render_delay(Duration::from_millis(200));
        let stack_id = store_stack(&f.store, vec![service("vlans", &["sw1"])]).await;

        let engine = ValidationEngine::new(f.store.clone(), f.client, credentials())
            .with_validate_budget(Duration::from_millis(10));
        let err = engine
            .validate(stack_id, DeployOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BudgetExceeded { operation: "validation", .. }));
    }
}
