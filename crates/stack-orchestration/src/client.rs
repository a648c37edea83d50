//! Template execution client and external collaborator seams
//!
//! The orchestration core never talks to devices or template engines
//! directly. It consumes three capabilities through trait seams (the
//! template renderer, the device directory, and the configuration
//! transport), and the [`TemplateExecutionClient`] composes them:
//! render once per service, then fan the push out to every target device
//! with bounded concurrency.

use crate::vars;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use stack_store::{Credentials, ServiceDefinition, VarMap};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Default bound on concurrent device operations within one service
const DEFAULT_FANOUT_LIMIT: usize = 8;

/// Error from an external collaborator call
///
/// These never abort an orchestration pass; they are captured into
/// per-device outcomes and surfaced in deployment/validation results.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// Template rendering failed
    #[error("rendering failed: {0}")]
    Render(String),

    /// Device directory lookup failed
    #[error("device directory lookup failed: {0}")]
    Directory(String),

    /// Configuration transport failed
    #[error("transport error: {0}")]
    Transport(String),
}

/// Connection metadata for one known device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    /// Device name as known by the directory
    pub name: String,
    /// Management address (hostname or IP)
    pub host: String,
    /// Platform / driver identifier (e.g. "cisco_ios")
    pub platform: String,
    /// Management port, when non-default
    pub port: Option<u16>,
}

/// Filter predicates for a directory lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// Restrict to these device names
    pub names: Option<Vec<String>>,
    /// Restrict to one platform
    pub platform: Option<String>,
    /// Restrict to one site
    pub site: Option<String>,
}

impl DeviceFilter {
    /// Filter matching a single device name
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            names: Some(vec![name.into()]),
            ..Default::default()
        }
    }
}

/// Parameters for one transport connection
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Management address
    pub host: String,
    /// Platform / driver identifier
    pub platform: String,
    /// Management port, when non-default
    pub port: Option<u16>,
    /// Login credentials
    pub credentials: Credentials,
}

impl ConnectionParams {
    /// Build connection parameters from directory metadata and credentials
    pub fn new(device: &DeviceInfo, credentials: Credentials) -> Self {
        Self {
            host: device.host.clone(),
            platform: device.platform.clone(),
            port: device.port,
            credentials,
        }
    }
}

/// Handle returned by the transport for a submitted push
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PushReceipt {
    /// Transport-side job identifier, when the transport is queue-based
    pub job_id: Option<String>,
}

/// External template renderer seam
///
/// Rendering is deterministic given `(template, variables)` and
/// side-effect-free, so callers may render once and reuse the text.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    /// Render a template with the given variables
    async fn render(&self, template: &str, variables: &VarMap) -> Result<String, ClientError>;
}

/// External device directory seam
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Look up known devices matching the filter
    async fn lookup(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>, ClientError>;
}

/// External configuration transport seam
///
/// The transport may be synchronous or job-queue based; queue-based
/// implementations submit and poll internally and carry their own
/// per-operation timeout.
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Push configuration lines to a device
    async fn push(
        &self,
        connection: &ConnectionParams,
        lines: &[String],
    ) -> Result<PushReceipt, ClientError>;

    /// Fetch the live configuration from a device
    async fn fetch(&self, connection: &ConnectionParams) -> Result<String, ClientError>;
}

/// Outcome of one device operation
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOutcome {
    /// Push accepted by the transport
    Success(PushReceipt),
    /// Push failed; the error text is preserved for the operator
    Failed(String),
}

impl DeviceOutcome {
    /// True for a successful outcome
    pub fn is_success(&self) -> bool {
        matches!(self, DeviceOutcome::Success(_))
    }
}

/// Result of executing one service across its target devices
#[derive(Debug, Clone)]
pub struct ServiceExecution {
    /// Service name
    pub service: String,
    /// Rendered configuration, when rendering succeeded
    pub rendered: Option<String>,
    /// Per-device outcomes, keyed by device name
    pub devices: BTreeMap<String, DeviceOutcome>,
}

impl ServiceExecution {
    /// A service succeeds only when every device outcome is a success
    pub fn succeeded(&self) -> bool {
        self.devices.values().all(DeviceOutcome::is_success)
    }

    /// Per-device failures as `(device, error)` pairs
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.devices.iter().filter_map(|(device, outcome)| match outcome {
            DeviceOutcome::Failed(error) => Some((device.as_str(), error.as_str())),
            DeviceOutcome::Success(_) => None,
        })
    }

    /// One-line summary of the failed devices, for the error record
    pub fn error_summary(&self) -> String {
        let parts: Vec<String> = self
            .failures()
            .map(|(device, error)| format!("{device}: {error}"))
            .collect();
        parts.join("; ")
    }
}

/// Adapter composing the renderer, directory, and transport seams
///
/// Encapsulates the per-device fan-out: devices of one service run
/// concurrently up to the configured bound, and one device's failure
/// never cancels its siblings.
#[derive(Clone)]
pub struct TemplateExecutionClient {
    renderer: Arc<dyn TemplateRenderer>,
    directory: Arc<dyn DeviceDirectory>,
    transport: Arc<dyn ConfigTransport>,
    fanout_limit: usize,
}

impl TemplateExecutionClient {
    /// Create a client over the three collaborator seams
    pub fn new(
        renderer: Arc<dyn TemplateRenderer>,
        directory: Arc<dyn DeviceDirectory>,
        transport: Arc<dyn ConfigTransport>,
    ) -> Self {
        Self {
            renderer,
            directory,
            transport,
            fanout_limit: DEFAULT_FANOUT_LIMIT,
        }
    }

    /// Override the bound on concurrent device operations
    pub fn with_fanout_limit(mut self, limit: usize) -> Self {
        self.fanout_limit = limit.max(1);
        self
    }

    /// Render a template once with already-merged variables
    pub async fn render(&self, template: &str, variables: &VarMap) -> Result<String, ClientError> {
        self.renderer.render(template, variables).await
    }

    /// Execute one service: render once, push to every target device
    ///
    /// Rendering failure aborts the service immediately; every targeted
    /// device is marked failed with the render error and no push is
    /// attempted.
    pub async fn execute(
        &self,
        service: &ServiceDefinition,
        variables: &VarMap,
        credentials: &Credentials,
    ) -> ServiceExecution {
        debug!(
            "Executing service '{}' against {} devices",
            service.name,
            service.devices.len()
        );

        let rendered = match self.renderer.render(&service.template, variables).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Rendering '{}' failed: {}", service.template, e);
                let devices = service
                    .devices
                    .iter()
                    .map(|d| (d.clone(), DeviceOutcome::Failed(e.to_string())))
                    .collect();
                return ServiceExecution {
                    service: service.name.clone(),
                    rendered: None,
                    devices,
                };
            }
        };

        let lines: Vec<String> = rendered.lines().map(str::to_string).collect();

        let outcomes: BTreeMap<String, DeviceOutcome> = stream::iter(service.devices.iter())
            .map(|device| {
                let lines = &lines;
                let credentials = credentials.clone();
                async move {
                    let outcome = match self.push_to_device(device, lines, credentials).await {
                        Ok(receipt) => DeviceOutcome::Success(receipt),
                        Err(e) => DeviceOutcome::Failed(e.to_string()),
                    };
                    (device.clone(), outcome)
                }
            })
            .buffer_unordered(self.fanout_limit)
            .collect()
            .await;

        ServiceExecution {
            service: service.name.clone(),
            rendered: Some(rendered),
            devices: outcomes,
        }
    }

    /// Fetch the live configuration from every target device concurrently
    pub async fn fetch_all(
        &self,
        devices: impl Iterator<Item = &String>,
        credentials: &Credentials,
    ) -> BTreeMap<String, Result<String, ClientError>> {
        stream::iter(devices)
            .map(|device| {
                let credentials = credentials.clone();
                async move {
                    let result = self.fetch_from_device(device, credentials).await;
                    (device.clone(), result)
                }
            })
            .buffer_unordered(self.fanout_limit)
            .collect()
            .await
    }

    async fn resolve_device(&self, device: &str) -> Result<DeviceInfo, ClientError> {
        let matches = self.directory.lookup(&DeviceFilter::name(device)).await?;
        matches
            .into_iter()
            .find(|d| d.name == device)
            .ok_or_else(|| {
                ClientError::Directory(format!("device '{device}' not found in directory"))
            })
    }

    async fn push_to_device(
        &self,
        device: &str,
        lines: &[String],
        credentials: Credentials,
    ) -> Result<PushReceipt, ClientError> {
        let info = self.resolve_device(device).await?;
        let connection = ConnectionParams::new(&info, credentials);
        self.transport.push(&connection, lines).await
    }

    async fn fetch_from_device(
        &self,
        device: &str,
        credentials: Credentials,
    ) -> Result<String, ClientError> {
        let info = self.resolve_device(device).await?;
        let connection = ConnectionParams::new(&info, credentials);
        self.transport.fetch(&connection).await
    }
}

/// Merge variables and execute, as one step
///
/// Convenience used by the engines: merges shared and service variables
/// before handing off to [`TemplateExecutionClient::execute`].
pub(crate) async fn execute_with_merged_vars(
    client: &TemplateExecutionClient,
    shared: &VarMap,
    service: &ServiceDefinition,
    credentials: &Credentials,
) -> ServiceExecution {
    let variables = vars::merge_variables(shared, &service.variables);
    client.execute(service, &variables, credentials).await
}
