//! Stack deployment engine
//!
//! Drives the Pending → Deploying → Deployed/Failed lifecycle: resolves
//! the dependency order, executes services sequentially in that order
//! (devices within a service run concurrently), propagates blocked
//! failures to dependents, and persists the outcome.
//!
//! Deployments of the same stack are serialized through a per-stack
//! lock; different stacks deploy independently.

use crate::client::{execute_with_merged_vars, TemplateExecutionClient};
use crate::resolver::resolve_order;
use crate::vars::resolve_credentials;
use crate::{Error, Result};
use stack_store::{
    Credentials, ServiceDefinition, ServiceError, ServiceStack, StackState, StackStore,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default wall-clock budget for one deployment pass
const DEFAULT_DEPLOY_BUDGET: Duration = Duration::from_secs(300);

/// Per-call options for a deployment or validation pass
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Credentials override for this call only
    ///
    /// Takes precedence over stack-stored credentials, which in turn
    /// take precedence over the engine defaults.
    pub credentials: Option<Credentials>,
}

/// One device-level failure, attributed to its service
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceErrorReport {
    /// Service whose push failed
    pub service: String,
    /// Device the push targeted
    pub device: String,
    /// Error text from the transport or directory
    pub error: String,
}

/// Outcome of one deployment pass
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    /// Stack the pass targeted
    pub stack_id: Uuid,
    /// Final lifecycle state
    pub state: StackState,
    /// Services whose every device succeeded, in execution order
    pub deployed_services: Vec<String>,
    /// One entry per failed or blocked service
    pub service_errors: Vec<ServiceError>,
    /// Device-level detail behind the service errors
    pub device_errors: Vec<DeviceErrorReport>,
}

impl DeploymentSummary {
    /// Number of fully-deployed services
    pub fn deployed_count(&self) -> usize {
        self.deployed_services.len()
    }

    /// Number of failed or blocked services
    pub fn failed_count(&self) -> usize {
        self.service_errors.len()
    }

    /// True when the pass left the stack Deployed
    pub fn succeeded(&self) -> bool {
        self.state == StackState::Deployed
    }
}

/// Mutable progress of one deployment walk
///
/// Shared between the walk and the budget watchdog so partial progress
/// survives when the budget expires mid-walk.
#[derive(Default)]
struct WalkProgress {
    deployed: Vec<String>,
    errors: Vec<ServiceError>,
    device_errors: Vec<DeviceErrorReport>,
    failed: HashSet<String>,
    completed: HashSet<String>,
}

/// Deployment engine over a store and an execution client
pub struct DeploymentEngine {
    store: Arc<dyn StackStore>,
    client: TemplateExecutionClient,
    default_credentials: Credentials,
    /// Per-stack deploy locks; entries live for the engine's lifetime
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    deploy_budget: Duration,
}

impl DeploymentEngine {
    /// Create an engine with the default deployment budget
    pub fn new(
        store: Arc<dyn StackStore>,
        client: TemplateExecutionClient,
        default_credentials: Credentials,
    ) -> Self {
        Self {
            store,
            client,
            default_credentials,
            locks: Mutex::new(HashMap::new()),
            deploy_budget: DEFAULT_DEPLOY_BUDGET,
        }
    }

    /// Override the wall-clock budget for a deployment pass
    pub fn with_deploy_budget(mut self, budget: Duration) -> Self {
        self.deploy_budget = budget;
        self
    }

    fn stack_lock(&self, stack_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(stack_id)
            .or_default()
            .clone()
    }

    /// Drop the lock entry for a stack nobody is deploying anymore
    fn prune_stack_lock(&self, stack_id: Uuid) {
        let mut locks = self.locks.lock().unwrap();
        if let Some(entry) = locks.get(&stack_id) {
            // A strong count above one means another deploy holds or
            // awaits this lock
            if Arc::strong_count(entry) == 1 {
                locks.remove(&stack_id);
            }
        }
    }

    /// Deploy a stack: full run of every service in dependency order
    ///
    /// Execution failures never surface as `Err`; they are recorded in
    /// the summary and the persisted stack. `Err` is reserved for the
    /// stack being absent or the store failing. Deploys of the same
    /// stack are serialized; a caller arriving mid-deploy waits and then
    /// runs against the finished record.
    pub async fn deploy(&self, stack_id: Uuid, options: DeployOptions) -> Result<DeploymentSummary> {
        let lock = self.stack_lock(stack_id);
        let result = {
            let _guard = lock.lock().await;
            self.deploy_locked(stack_id, options).await
        };
        drop(lock);
        self.prune_stack_lock(stack_id);
        result
    }

    async fn deploy_locked(
        &self,
        stack_id: Uuid,
        options: DeployOptions,
    ) -> Result<DeploymentSummary> {
        let mut stack = self
            .store
            .get_stack(stack_id)
            .await?
            .ok_or(Error::StackNotFound(stack_id))?;

        info!(
            "Deploying stack '{}' ({}) with {} services",
            stack.name,
            stack_id,
            stack.services.len()
        );

        let credentials = resolve_credentials(
            options.credentials.as_ref(),
            stack.credentials.as_ref(),
            &self.default_credentials,
        );

        // Concurrent readers observe the transition before any device
        // is touched; the previous attempt's results are cleared with it.
        stack.state = StackState::Deploying;
        stack.deployed_services.clear();
        stack.deployment_errors.clear();
        stack.touch();
        self.store.put_stack(&stack).await?;

        let order = match resolve_order(&stack.services) {
            Ok(order) => order,
            Err(e) => return self.finish_resolver_failure(stack, e).await,
        };

        let progress = Arc::new(Mutex::new(WalkProgress::default()));
        let walk = self.walk(&stack, &order, &credentials, Arc::clone(&progress));

        if tokio::time::timeout(self.deploy_budget, walk).await.is_err() {
            warn!(
                "Deployment of stack {} exceeded the {}s budget",
                stack_id,
                self.deploy_budget.as_secs()
            );
            let mut progress = progress.lock().unwrap();
            for name in &order {
                if !progress.completed.contains(name) {
                    progress.errors.push(ServiceError {
                        service: name.clone(),
                        error: format!(
                            "deployment budget of {}s exceeded",
                            self.deploy_budget.as_secs()
                        ),
                    });
                }
            }
        }

        let progress = match Arc::try_unwrap(progress) {
            Ok(progress) => progress.into_inner().unwrap(),
            Err(shared) => std::mem::take(&mut *shared.lock().unwrap()),
        };
        self.finish_walk(stack, progress).await
    }

    /// Execute the services sequentially in resolved order
    async fn walk(
        &self,
        stack: &ServiceStack,
        order: &[String],
        credentials: &Credentials,
        progress: Arc<Mutex<WalkProgress>>,
    ) {
        let by_name: HashMap<&str, &ServiceDefinition> = stack
            .services
            .iter()
            .map(|s| (s.name.as_str(), s))
            .collect();

        for name in order {
            let service = by_name[name.as_str()];

            // The walk runs in topological order, so checking direct
            // dependencies against the failed set covers transitive
            // blocking as well.
            let blocking_dep = {
                let progress = progress.lock().unwrap();
                service
                    .depends_on
                    .iter()
                    .find(|dep| progress.failed.contains(dep.as_str()))
                    .cloned()
            };
            if let Some(dep) = blocking_dep {
                warn!("Service '{}' blocked by failed dependency '{}'", name, dep);
                let mut progress = progress.lock().unwrap();
                progress.errors.push(ServiceError {
                    service: name.clone(),
                    error: format!("blocked by failed dependency: {dep}"),
                });
                progress.failed.insert(name.clone());
                progress.completed.insert(name.clone());
                continue;
            }

            let execution =
                execute_with_merged_vars(&self.client, &stack.shared_variables, service, credentials)
                    .await;

            let mut progress = progress.lock().unwrap();
            if execution.succeeded() {
                info!("Service '{}' deployed to {} devices", name, service.devices.len());
                progress.deployed.push(name.clone());
            } else {
                error!("Service '{}' failed: {}", name, execution.error_summary());
                progress.errors.push(ServiceError {
                    service: name.clone(),
                    error: execution.error_summary(),
                });
                for (device, device_error) in execution.failures() {
                    progress.device_errors.push(DeviceErrorReport {
                        service: name.clone(),
                        device: device.to_string(),
                        error: device_error.to_string(),
                    });
                }
                progress.failed.insert(name.clone());
            }
            progress.completed.insert(name.clone());
        }
    }

    /// Persist a resolver failure: no device was touched
    async fn finish_resolver_failure(
        &self,
        mut stack: ServiceStack,
        cause: Error,
    ) -> Result<DeploymentSummary> {
        let service = match &cause {
            Error::UnknownDependency { service, .. } => service.clone(),
            Error::DependencyCycle { services } => services.join(", "),
            _ => String::new(),
        };
        error!("Dependency resolution for stack {} failed: {}", stack.stack_id, cause);

        stack.state = StackState::Failed;
        stack.deployment_errors = vec![ServiceError {
            service,
            error: cause.to_string(),
        }];
        stack.touch();
        self.store.put_stack(&stack).await?;

        Ok(DeploymentSummary {
            stack_id: stack.stack_id,
            state: stack.state,
            deployed_services: Vec::new(),
            service_errors: stack.deployment_errors.clone(),
            device_errors: Vec::new(),
        })
    }

    /// Persist the walk outcome and build the summary
    async fn finish_walk(
        &self,
        mut stack: ServiceStack,
        progress: WalkProgress,
    ) -> Result<DeploymentSummary> {
        stack.state = if progress.errors.is_empty() {
            StackState::Deployed
        } else {
            StackState::Failed
        };
        stack.deployed_services = progress.deployed.iter().cloned().collect::<BTreeSet<_>>();
        stack.deployment_errors = progress.errors.clone();
        stack.touch();
        self.store.put_stack(&stack).await?;

        info!(
            "Stack {} finished {}: {} deployed, {} failed",
            stack.stack_id,
            stack.state,
            progress.deployed.len(),
            progress.errors.len()
        );

        Ok(DeploymentSummary {
            stack_id: stack.stack_id,
            state: stack.state,
            deployed_services: progress.deployed,
            service_errors: progress.errors,
            device_errors: progress.device_errors,
        })
    }
}
