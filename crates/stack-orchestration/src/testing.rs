//! Scripted collaborator doubles for tests
//!
//! These stand in for the renderer, directory, and transport seams so the
//! orchestration logic can be exercised without any external system. Each
//! double is scripted up front and records the calls it receives.

use crate::client::{
    ClientError, ConfigTransport, ConnectionParams, DeviceDirectory, DeviceFilter, DeviceInfo,
    PushReceipt, TemplateRenderer,
};
use async_trait::async_trait;
use stack_store::VarMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Renderer double returning scripted text per template
///
/// Unscripted templates fail the render, which mirrors a real engine
/// rejecting an unknown template name.
#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    inner: Arc<Mutex<RendererState>>,
}

#[derive(Default)]
struct RendererState {
    outputs: HashMap<String, Result<String, String>>,
    calls: Vec<String>,
    delay: Option<std::time::Duration>,
}

impl ScriptedRenderer {
    /// Create an empty renderer; every render fails until scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful render for a template
    pub fn script(&self, template: &str, output: &str) {
        self.inner
            .lock()
            .unwrap()
            .outputs
            .insert(template.to_string(), Ok(output.to_string()));
    }

    /// Script a render failure for a template
    pub fn script_failure(&self, template: &str, error: &str) {
        self.inner
            .lock()
            .unwrap()
            .outputs
            .insert(template.to_string(), Err(error.to_string()));
    }

    /// Delay every render, for exercising wall-clock budgets
    pub fn set_render_delay(&self, delay: std::time::Duration) {
        self.inner.lock().unwrap().delay = Some(delay);
    }

    /// Number of render calls received for a template
    pub fn render_count(&self, template: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|t| t.as_str() == template)
            .count()
    }
}

#[async_trait]
impl TemplateRenderer for ScriptedRenderer {
    async fn render(&self, template: &str, _variables: &VarMap) -> Result<String, ClientError> {
        let (delay, response) = {
            let mut state = self.inner.lock().unwrap();
            state.calls.push(template.to_string());
            let response = match state.outputs.get(template) {
                Some(Ok(output)) => Ok(output.clone()),
                Some(Err(error)) => Err(ClientError::Render(error.clone())),
                None => Err(ClientError::Render(format!("unknown template '{template}'"))),
            };
            (state.delay, response)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

/// Directory double serving a fixed device inventory
///
/// Hosts equal device names, so transport doubles can key recordings by
/// the same name the stack definition uses.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    devices: Vec<DeviceInfo>,
}

impl StaticDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device under the given platform
    pub fn add_device(&mut self, name: &str, platform: &str) {
        self.devices.push(DeviceInfo {
            name: name.to_string(),
            host: name.to_string(),
            platform: platform.to_string(),
            port: None,
        });
    }
}

#[async_trait]
impl DeviceDirectory for StaticDirectory {
    async fn lookup(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>, ClientError> {
        let matches = self
            .devices
            .iter()
            .filter(|d| match &filter.names {
                Some(names) => names.iter().any(|n| n == &d.name),
                None => true,
            })
            .filter(|d| match &filter.platform {
                Some(platform) => platform == &d.platform,
                None => true,
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

/// Transport double recording pushes and serving them back as fetches
///
/// `fetch` returns everything pushed to the host so far, one line per
/// pushed line, which makes deployed-then-validated round trips pass by
/// construction unless a failure is scripted.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<TransportState>>,
}

#[derive(Default)]
struct TransportState {
    pushed: HashMap<String, Vec<String>>,
    push_failures: HashMap<String, String>,
    fetch_failures: HashMap<String, String>,
    fetch_overrides: HashMap<String, String>,
    push_count: usize,
}

impl RecordingTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Script every push and fetch against a host to fail
    pub fn fail_device(&self, host: &str, error: &str) {
        let mut state = self.inner.lock().unwrap();
        state.push_failures.insert(host.to_string(), error.to_string());
        state.fetch_failures.insert(host.to_string(), error.to_string());
    }

    /// Script only fetches against a host to fail
    pub fn fail_fetch(&self, host: &str, error: &str) {
        self.inner
            .lock()
            .unwrap()
            .fetch_failures
            .insert(host.to_string(), error.to_string());
    }

    /// Override the configuration text a host serves on fetch
    pub fn set_running_config(&self, host: &str, config: &str) {
        self.inner
            .lock()
            .unwrap()
            .fetch_overrides
            .insert(host.to_string(), config.to_string());
    }

    /// Lines pushed to a host, in push order
    pub fn pushed_lines(&self, host: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .pushed
            .get(host)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of push calls that reached the transport
    pub fn push_count(&self) -> usize {
        self.inner.lock().unwrap().push_count
    }
}

#[async_trait]
impl ConfigTransport for RecordingTransport {
    async fn push(
        &self,
        connection: &ConnectionParams,
        lines: &[String],
    ) -> Result<PushReceipt, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.push_count += 1;
        if let Some(error) = state.push_failures.get(&connection.host) {
            return Err(ClientError::Transport(error.clone()));
        }
        state
            .pushed
            .entry(connection.host.clone())
            .or_default()
            .extend(lines.iter().cloned());
        Ok(PushReceipt {
            job_id: Some(format!("job-{}", state.push_count)),
        })
    }

    async fn fetch(&self, connection: &ConnectionParams) -> Result<String, ClientError> {
        let state = self.inner.lock().unwrap();
        if let Some(error) = state.fetch_failures.get(&connection.host) {
            return Err(ClientError::Transport(error.clone()));
        }
        if let Some(config) = state.fetch_overrides.get(&connection.host) {
            return Ok(config.clone());
        }
        Ok(state
            .pushed
            .get(&connection.host)
            .map(|lines| lines.join("\n"))
            .unwrap_or_default())
    }
}
