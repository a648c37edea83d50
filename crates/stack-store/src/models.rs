//! Data models for configuration stacks

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A template variable value
///
/// Variables are a closed set of shapes so the template renderer boundary
/// stays well-typed. Values pass through to the renderer opaquely; no
/// coercion (numeric-looking strings stay strings) happens here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VarValue {
    /// Boolean value
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Free-text value
    String(String),
    /// List of strings
    List(Vec<String>),
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::String(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::String(value)
    }
}

impl From<f64> for VarValue {
    fn from(value: f64) -> Self {
        VarValue::Number(value)
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        VarValue::Bool(value)
    }
}

/// Ordered variable map handed to the template renderer
pub type VarMap = IndexMap<String, VarValue>;

/// Device login credentials
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    /// Login username
    pub username: String,
    /// Login password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Lifecycle state of a stack
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StackState {
    /// Created, never deployed (or explicitly reset); editable
    Pending,
    /// A deployment attempt is in flight
    Deploying,
    /// Every service of the most recent attempt succeeded
    Deployed,
    /// The most recent attempt failed (resolver error or service failure)
    Failed,
}

impl std::fmt::Display for StackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StackState::Pending => "pending",
            StackState::Deploying => "deploying",
            StackState::Deployed => "deployed",
            StackState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One templated configuration unit within a stack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDefinition {
    /// Unique name within the stack; the identity `depends_on` refers to
    pub name: String,

    /// Template identifier resolved by the template renderer
    pub template: String,

    /// Target device names; must be non-empty
    pub devices: BTreeSet<String>,

    /// Ordering hint among services with no dependency constraint
    #[serde(default)]
    pub order: i64,

    /// Service-level variables; override shared variables on collision
    #[serde(default)]
    pub variables: VarMap,

    /// Names of services in the same stack that must succeed first
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

/// A per-service error recorded on a failed deployment attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceError {
    /// Service the error belongs to
    pub service: String,
    /// Error text
    pub error: String,
}

/// Drift validation result for one device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceValidation {
    /// Device name
    pub device: String,
    /// True when the live configuration contains every rendered line
    pub valid: bool,
    /// Rendered lines absent from the live configuration
    pub missing_lines: Vec<String>,
    /// Fetch or render error, if the device could not be checked
    pub error: Option<String>,
}

/// Drift validation result for one service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceValidation {
    /// Service name
    pub service: String,
    /// True only if every device is valid
    pub valid: bool,
    /// Per-device results
    pub devices: Vec<DeviceValidation>,
}

/// Drift validation result for a whole stack
///
/// Advisory only: cached on the stack record for display but never allowed
/// to influence [`StackState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackValidation {
    /// True only if every service is valid
    pub all_valid: bool,
    /// When the validation pass ran
    pub checked_at: DateTime<Utc>,
    /// Per-service results
    pub services: Vec<ServiceValidation>,
}

/// A multi-service configuration stack, the unit of deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceStack {
    /// Opaque unique identifier, assigned at creation, immutable
    pub stack_id: Uuid,

    /// Display name
    pub name: String,

    /// Free-text description
    pub description: Option<String>,

    /// Variables visible to every service unless overridden
    #[serde(default)]
    pub shared_variables: VarMap,

    /// Service definitions; declaration order is a hint, not authoritative
    pub services: Vec<ServiceDefinition>,

    /// Stack-level stored credential override
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Lifecycle state; written only by the deployment engine or an
    /// explicit reset
    pub state: StackState,

    /// Services that fully succeeded in the most recent attempt
    #[serde(default)]
    pub deployed_services: BTreeSet<String>,

    /// Errors of the most recent failed attempt; replaced, never appended
    #[serde(default)]
    pub deployment_errors: Vec<ServiceError>,

    /// Most recent drift validation, if one was run
    #[serde(default)]
    pub last_validation: Option<StackValidation>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Bumped on every state or content mutation
    pub updated_at: DateTime<Utc>,
}

impl ServiceStack {
    /// Create a new stack in the `Pending` state
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            stack_id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            shared_variables: VarMap::new(),
            services: Vec::new(),
            credentials: None,
            state: StackState::Pending,
            deployed_services: BTreeSet::new(),
            deployment_errors: Vec::new(),
            last_validation: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a service definition by name
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Record a mutation time
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_round_trips_through_json() {
        let mut stack = ServiceStack::new("edge-vlans");
        stack.description = Some("access layer".to_string());
        stack
            .shared_variables
            .insert("domain".to_string(), VarValue::from("lab.example.net"));
        stack.services.push(ServiceDefinition {
            name: "vlan-100".to_string(),
            template: "vlan.j2".to_string(),
            devices: BTreeSet::from(["sw1".to_string(), "sw2".to_string()]),
            order: 10,
            variables: VarMap::from_iter([("vlan_id".to_string(), VarValue::Number(100.0))]),
            depends_on: BTreeSet::new(),
        });

        let json = serde_json::to_string(&stack).unwrap();
        let parsed: ServiceStack = serde_json::from_str(&json).unwrap();
        assert_eq!(stack, parsed);
    }

    #[test]
    fn test_var_value_untagged_forms() {
        let vars: VarMap = serde_json::from_str(
            r#"{"vlan_id": 100, "name": "users", "shutdown": false, "trunks": ["gi0/1", "gi0/2"]}"#,
        )
        .unwrap();

        assert_eq!(vars["vlan_id"], VarValue::Number(100.0));
        assert_eq!(vars["name"], VarValue::String("users".to_string()));
        assert_eq!(vars["shutdown"], VarValue::Bool(false));
        assert_eq!(
            vars["trunks"],
            VarValue::List(vec!["gi0/1".to_string(), "gi0/2".to_string()])
        );
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "netops".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("netops"));
        assert!(!debug.contains("hunter2"));
    }
}
