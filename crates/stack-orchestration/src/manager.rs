//! Stack lifecycle management
//!
//! The [`StackManager`] is the single entry point callers use: CRUD over
//! persisted stacks plus deploy, validate, and redeploy, delegating the
//! heavy lifting to the deployment and validation engines. All writes to
//! the persisted record flow through here or the engines, never from
//! callers directly.

use crate::client::TemplateExecutionClient;
use crate::deploy::{DeployOptions, DeploymentEngine, DeploymentSummary};
use crate::validate::ValidationEngine;
use crate::{Error, Result};
use serde::Deserialize;
use stack_store::{
    Credentials, ServiceDefinition, ServiceStack, StackState, StackStore, StackValidation, VarMap,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Definition of a stack to create
///
/// Deserializes directly from the YAML/JSON stack file format.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStack {
    /// Stack name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Variables shared by every service
    #[serde(default)]
    pub shared_variables: VarMap,
    /// Service definitions
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    /// Stack-stored credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

/// Partial update of a Pending stack
///
/// `None` fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StackUpdate {
    /// Replace the stack name
    #[serde(default)]
    pub name: Option<String>,
    /// Replace the description
    #[serde(default)]
    pub description: Option<String>,
    /// Replace the shared variables
    #[serde(default)]
    pub shared_variables: Option<VarMap>,
    /// Replace the service definitions
    #[serde(default)]
    pub services: Option<Vec<ServiceDefinition>>,
    /// Replace the stack-stored credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

/// Entry point for all stack operations
pub struct StackManager {
    store: Arc<dyn StackStore>,
    deployment: DeploymentEngine,
    validation: ValidationEngine,
}

impl StackManager {
    /// Create a manager over a store and an execution client
    pub fn new(
        store: Arc<dyn StackStore>,
        client: TemplateExecutionClient,
        default_credentials: Credentials,
    ) -> Self {
        Self {
            deployment: DeploymentEngine::new(
                store.clone(),
                client.clone(),
                default_credentials.clone(),
            ),
            validation: ValidationEngine::new(store.clone(), client, default_credentials),
            store,
        }
    }

    /// Override the wall-clock budget for deployment passes
    pub fn with_deploy_budget(mut self, budget: Duration) -> Self {
        self.deployment = self.deployment.with_deploy_budget(budget);
        self
    }

    /// Override the wall-clock budget for validation passes
    pub fn with_validate_budget(mut self, budget: Duration) -> Self {
        self.validation = self.validation.with_validate_budget(budget);
        self
    }

    /// Create a stack from a definition
    ///
    /// The definition is checked before anything is persisted; dependency
    /// references are deliberately not checked here, only at deploy time,
    /// so a Pending stack can be assembled service by service.
    pub async fn create(&self, definition: NewStack) -> Result<ServiceStack> {
        validate_definition(&definition.name, &definition.services)?;

        let mut stack = ServiceStack::new(definition.name);
        stack.description = definition.description;
        stack.shared_variables = definition.shared_variables;
        stack.services = definition.services;
        stack.credentials = definition.credentials;

        self.store.put_stack(&stack).await?;
        info!("Created stack '{}' ({})", stack.name, stack.stack_id);
        Ok(stack)
    }

    /// Fetch a stack by id
    pub async fn get(&self, stack_id: Uuid) -> Result<ServiceStack> {
        self.store
            .get_stack(stack_id)
            .await?
            .ok_or(Error::StackNotFound(stack_id))
    }

    /// List every persisted stack
    pub async fn list(&self) -> Result<Vec<ServiceStack>> {
        Ok(self.store.list_stacks().await?)
    }

    /// Update a Pending stack in place
    pub async fn update(&self, stack_id: Uuid, update: StackUpdate) -> Result<ServiceStack> {
        let mut stack = self.get(stack_id).await?;
        if stack.state != StackState::Pending {
            return Err(Error::InvalidState {
                stack_id,
                state: stack.state,
                operation: "update",
            });
        }

        if let Some(name) = update.name {
            stack.name = name;
        }
        if let Some(description) = update.description {
            stack.description = Some(description);
        }
        if let Some(shared_variables) = update.shared_variables {
            stack.shared_variables = shared_variables;
        }
        if let Some(services) = update.services {
            stack.services = services;
        }
        if let Some(credentials) = update.credentials {
            stack.credentials = Some(credentials);
        }
        validate_definition(&stack.name, &stack.services)?;

        stack.touch();
        self.store.put_stack(&stack).await?;
        Ok(stack)
    }

    /// Delete a stack's persisted record
    ///
    /// Pushed device configuration is left in place; there is no
    /// stack-level rollback mechanism.
    pub async fn delete(&self, stack_id: Uuid) -> Result<ServiceStack> {
        let removed = self
            .store
            .remove_stack(stack_id)
            .await?
            .ok_or(Error::StackNotFound(stack_id))?;
        info!("Deleted stack '{}' ({})", removed.name, stack_id);
        Ok(removed)
    }

    /// Reset a stack to Pending without touching any device
    pub async fn reset(&self, stack_id: Uuid) -> Result<ServiceStack> {
        let mut stack = self.get(stack_id).await?;
        stack.state = StackState::Pending;
        stack.touch();
        self.store.put_stack(&stack).await?;
        Ok(stack)
    }

    /// Deploy a stack
    pub async fn deploy(&self, stack_id: Uuid, options: DeployOptions) -> Result<DeploymentSummary> {
        self.deployment.deploy(stack_id, options).await
    }

    /// Validate a stack against live device configuration
    pub async fn validate(
        &self,
        stack_id: Uuid,
        options: DeployOptions,
    ) -> Result<StackValidation> {
        self.validation.validate(stack_id, options).await
    }

    /// Reset to Pending, then deploy from scratch
    pub async fn redeploy(
        &self,
        stack_id: Uuid,
        options: DeployOptions,
    ) -> Result<DeploymentSummary> {
        self.reset(stack_id).await?;
        self.deployment.deploy(stack_id, options).await
    }
}

/// Check a stack definition before it is persisted
fn validate_definition(name: &str, services: &[ServiceDefinition]) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidDefinition("stack name must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for service in services {
        if service.name.trim().is_empty() {
            return Err(Error::InvalidDefinition("service name must not be empty".to_string()));
        }
        if !seen.insert(service.name.as_str()) {
            return Err(Error::InvalidDefinition(format!(
                "duplicate service name '{}'",
                service.name
            )));
        }
        if service.template.trim().is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "service '{}' has no template",
                service.name
            )));
        }
        if service.devices.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "service '{}' targets no devices",
                service.name
            )));
        }
    }
    Ok(())
}
