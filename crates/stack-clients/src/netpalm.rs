//! Renderer and transport over a netpalm-style automation API
//!
//! Pushes and fetches are asynchronous on the remote side: the API
//! accepts the request into a task queue and returns a task id, which
//! is polled until the task finishes or fails. Template rendering uses
//! the same envelope but typically completes inline.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stack_orchestration::{ClientError, ConfigTransport, ConnectionParams, PushReceipt, TemplateRenderer};
use stack_store::VarMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);
const FETCH_COMMAND: &str = "show running-config";

/// Response envelope wrapping every API answer
#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    data: TaskData,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    task_id: String,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    task_result: Option<serde_json::Value>,
    #[serde(default)]
    task_errors: Vec<serde_json::Value>,
}

impl TaskData {
    fn error_text(&self) -> String {
        if self.task_errors.is_empty() {
            return "task failed without error detail".to_string();
        }
        self.task_errors
            .iter()
            .map(|e| match e {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Client for a netpalm-style automation API
///
/// Implements both the template renderer and the configuration
/// transport; the remote service fronts both concerns.
#[derive(Debug, Clone)]
pub struct NetpalmClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl NetpalmClient {
    /// Create a client for the API at `base_url`
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        })
    }

    /// Override how long a queued task is polled before giving up
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<TaskData> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let envelope: TaskEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskData> {
        let url = self.endpoint(&format!("task/{task_id}"))?;
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let envelope: TaskEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Poll a queued task until it finishes, fails, or exhausts the budget
    async fn wait_for_task(&self, task: TaskData) -> Result<TaskData> {
        let task_id = task.task_id.clone();
        let started = Instant::now();
        let mut current = task;

        loop {
            match current.task_status.as_deref() {
                Some("finished") => return Ok(current),
                Some("failed") => {
                    warn!("Task {} failed: {}", task_id, current.error_text());
                    return Err(Error::JobFailed(current.error_text()));
                }
                _ => {}
            }
            if started.elapsed() >= self.job_timeout {
                return Err(Error::JobTimeout {
                    task_id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            current = self.get_task(&task_id).await?;
        }
    }

    fn connection_args(connection: &ConnectionParams) -> serde_json::Value {
        let mut args = json!({
            "device_type": connection.platform,
            "host": connection.host,
            "username": connection.credentials.username,
            "password": connection.credentials.password,
        });
        if let Some(port) = connection.port {
            args["port"] = json!(port);
        }
        args
    }

    async fn submit_push(
        &self,
        connection: &ConnectionParams,
        lines: &[String],
    ) -> Result<PushReceipt> {
        let body = json!({
            "library": "netmiko",
            "connection_args": Self::connection_args(connection),
            "config": lines,
            "queue_strategy": "fifo",
        });
        let task = self.post("setconfig", &body).await?;
        let finished = self.wait_for_task(task).await?;
        Ok(PushReceipt {
            job_id: Some(finished.task_id),
        })
    }

    async fn submit_fetch(&self, connection: &ConnectionParams) -> Result<String> {
        let body = json!({
            "library": "netmiko",
            "connection_args": Self::connection_args(connection),
            "command": FETCH_COMMAND,
            "queue_strategy": "fifo",
        });
        let task = self.post("getconfig", &body).await?;
        let finished = self.wait_for_task(task).await?;
        extract_config_text(finished.task_result.as_ref())
    }

    async fn submit_render(&self, template: &str, variables: &VarMap) -> Result<String> {
        let body = json!({ "args": variables });
        let task = self.post(&format!("j2template/render/{template}"), &body).await?;
        // Render tasks usually complete inline; fall back to polling
        let finished = if task.task_result.is_some() {
            task
        } else {
            self.wait_for_task(task).await?
        };
        match finished.task_result {
            Some(serde_json::Value::String(text)) => Ok(text),
            Some(other) => Err(Error::UnexpectedResponse(format!(
                "render result was not text: {other}"
            ))),
            None => Err(Error::UnexpectedResponse("render produced no result".to_string())),
        }
    }
}

/// Pull the configuration text out of a fetch result
///
/// The API returns either the text directly or a map keyed by the
/// command that produced it; command output may itself be a list of
/// lines.
fn extract_config_text(result: Option<&serde_json::Value>) -> Result<String> {
    let value = result
        .ok_or_else(|| Error::UnexpectedResponse("fetch produced no result".to_string()))?;
    let value = match value {
        serde_json::Value::Object(map) => map
            .get(FETCH_COMMAND)
            .or_else(|| map.values().next())
            .ok_or_else(|| Error::UnexpectedResponse("fetch result was empty".to_string()))?,
        other => other,
    };
    match value {
        serde_json::Value::String(text) => Ok(text.clone()),
        serde_json::Value::Array(lines) => Ok(lines
            .iter()
            .map(|line| match line {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")),
        other => Err(Error::UnexpectedResponse(format!(
            "fetch result was not text: {other}"
        ))),
    }
}

#[async_trait]
impl TemplateRenderer for NetpalmClient {
    async fn render(&self, template: &str, variables: &VarMap) -> std::result::Result<String, ClientError> {
        self.submit_render(template, variables)
            .await
            .map_err(|e| ClientError::Render(e.to_string()))
    }
}

#[async_trait]
impl ConfigTransport for NetpalmClient {
    async fn push(
        &self,
        connection: &ConnectionParams,
        lines: &[String],
    ) -> std::result::Result<PushReceipt, ClientError> {
        self.submit_push(connection, lines)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn fetch(&self, connection: &ConnectionParams) -> std::result::Result<String, ClientError> {
        self.submit_fetch(connection)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
