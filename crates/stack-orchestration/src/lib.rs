//! # Stack Orchestration
//!
//! The service stack orchestrator: resolves execution order from declared
//! dependencies, renders configuration templates with merged variables,
//! fans pushes out to target devices, tracks the stack lifecycle, and
//! validates deployed configuration against live device state.
//!
//! External systems (template renderer, device directory, configuration
//! transport) are consumed through trait seams in [`client`]; the
//! persisted record lives behind [`stack_store::StackStore`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stack_orchestration::{DeployOptions, StackManager, TemplateExecutionClient};
//! use stack_store::{Credentials, MemoryBackend};
//!
//! # async fn example(
//! #     client: TemplateExecutionClient,
//! #     stack_id: uuid::Uuid,
//! # ) -> Result<(), stack_orchestration::Error> {
//! let store = Arc::new(MemoryBackend::new());
//! let defaults = Credentials {
//!     username: "netops".to_string(),
//!     password: "secret".to_string(),
//! };
//! let manager = StackManager::new(store, client, defaults);
//!
//! let summary = manager.deploy(stack_id, DeployOptions::default()).await?;
//! println!("{} deployed, {} failed", summary.deployed_count(), summary.failed_count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod client;
mod deploy;
mod manager;
mod resolver;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
mod validate;
mod vars;

pub use client::{
    ClientError, ConfigTransport, ConnectionParams, DeviceFilter, DeviceInfo, DeviceOutcome,
    DeviceDirectory, PushReceipt, ServiceExecution, TemplateExecutionClient, TemplateRenderer,
};
pub use deploy::{DeployOptions, DeploymentEngine, DeploymentSummary, DeviceErrorReport};
pub use manager::{NewStack, StackManager, StackUpdate};
pub use resolver::resolve_order;
pub use validate::ValidationEngine;
pub use vars::{merge_variables, resolve_credentials};

use stack_store::StackState;
use uuid::Uuid;

/// Error types for orchestration operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Stack store errors
    #[error("Stack store error: {0}")]
    Store(#[from] stack_store::Error),

    /// Stack not found
    #[error("Stack not found: {0}")]
    StackNotFound(Uuid),

    /// Stack definition rejected before any device interaction
    #[error("Invalid stack definition: {0}")]
    InvalidDefinition(String),

    /// A `depends_on` entry names a service absent from the stack
    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency {
        /// Service declaring the dependency
        service: String,
        /// The name that could not be resolved
        dependency: String,
    },

    /// The dependency graph contains a cycle
    #[error("Dependency cycle among services: {}", services.join(", "))]
    DependencyCycle {
        /// Services participating in the cycle
        services: Vec<String>,
    },

    /// Operation requires a different lifecycle state
    #[error("Stack {stack_id} is {state}; {operation} requires a pending stack")]
    InvalidState {
        /// Stack the operation targeted
        stack_id: Uuid,
        /// State the stack was in
        state: StackState,
        /// Operation that was rejected
        operation: &'static str,
    },

    /// The overall wall-clock budget for a pass expired
    #[error("{operation} of stack {stack_id} exceeded the {budget_secs}s budget")]
    BudgetExceeded {
        /// Operation that was abandoned
        operation: &'static str,
        /// Stack the operation targeted
        stack_id: Uuid,
        /// Budget that expired
        budget_secs: u64,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
