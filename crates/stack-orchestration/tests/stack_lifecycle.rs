//! End-to-end stack lifecycle tests over scripted collaborators
//!
//! These exercise the full manager surface against a sled in-memory
//! store: create, deploy with dependency blocking, redeploy, and the
//! deploy-then-validate round trip.

use stack_orchestration::testing::{RecordingTransport, ScriptedRenderer, StaticDirectory};
use stack_orchestration::{DeployOptions, StackManager, TemplateExecutionClient};
use stack_store::{
    Credentials, ServiceDefinition, SledBackend, StackState, VarMap, VarValue,
};
use std::collections::BTreeSet;
use std::sync::Arc;

struct Harness {
    renderer: ScriptedRenderer,
    transport: RecordingTransport,
    manager: StackManager,
}

async fn harness(devices: &[&str]) -> Harness {
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
    let store = Arc::new(SledBackend::in_memory().await.unwrap());
    let manager = StackManager::new(
        store,
        client,
        Credentials {
            username: "netops".to_string(),
            password: "secret".to_string(),
        },
    );
    Harness {
        renderer,
        transport,
        manager,
    }
}

fn service(name: &str, devices: &[&str], deps: &[&str]) -> ServiceDefinition {
    ServiceDefinition {
        name: name.to_string(),
        template: format!("{name}.j2"),
        devices: devices.iter().map(|d| d.to_string()).collect(),
        order: 0,
        variables: VarMap::new(),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
    }
}

fn new_stack(name: &str, services: Vec<ServiceDefinition>) -> stack_orchestration::NewStack {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "services": serde_json::to_value(&services).unwrap(),
    }))
    .unwrap()
}

#[tokio::test]
async fn failed_service_blocks_dependents_only() {
    // A(d1) fails, B depends on A, C(d2) is independent: expected
    // outcome is deployed=[c] with errors for a (actual) and b (blocked).
    let h = harness(&["d1", "d2"]).await;
    h.renderer.script("a.j2", "conf a");
    h.renderer.script("b.j2", "conf b");
    h.renderer.script("c.j2", "conf c");
    h.transport.fail_device("d1", "connection refused");

    let stack = h
        .manager
        .create(new_stack(
            "campus",
            vec![
                service("a", &["d1"], &[]),
                service("b", &["d1"], &["a"]),
                service("c", &["d2"], &[]),
            ],
        ))
        .await
        .unwrap();

    let summary = h
        .manager
        .deploy(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.state, StackState::Failed);
    assert_eq!(summary.deployed_services, vec!["c"]);
    assert_eq!(summary.failed_count(), 2);

    let by_service: std::collections::HashMap<&str, &str> = summary
        .service_errors
        .iter()
        .map(|e| (e.service.as_str(), e.error.as_str()))
        .collect();
    assert!(by_service["a"].contains("connection refused"));
    assert_eq!(by_service["b"], "blocked by failed dependency: a");

    // Blocked services never render
    assert_eq!(h.renderer.render_count("b.j2"), 0);
    // C still reached its device
    assert_eq!(h.transport.pushed_lines("d2"), vec!["conf c"]);
}

#[tokio::test]
async fn cycle_fails_before_any_device_is_touched() {
    let h = harness(&["d1"]).await;
    h.renderer.script("a.j2", "conf a");
    h.renderer.script("b.j2", "conf b");

    let stack = h
        .manager
        .create(new_stack(
            "tangled",
            vec![service("a", &["d1"], &["b"]), service("b", &["d1"], &["a"])],
        ))
        .await
        .unwrap();

    let summary = h
        .manager
        .deploy(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.state, StackState::Failed);
    assert!(summary.deployed_services.is_empty());
    assert_eq!(h.transport.push_count(), 0);

    let stored = h.manager.get(stack.stack_id).await.unwrap();
    assert_eq!(stored.state, StackState::Failed);
    assert!(stored.deployed_services.is_empty());
    assert_eq!(stored.deployment_errors.len(), 1);
}

#[tokio::test]
async fn all_green_redeploy_is_idempotent() {
    let h = harness(&["sw1", "sw2"]).await;
    h.renderer.script("vlans.j2", "vlan 100");
    h.renderer.script("ntp.j2", "ntp server 10.0.0.1");

    let stack = h
        .manager
        .create(new_stack(
            "campus",
            vec![
                service("vlans", &["sw1", "sw2"], &[]),
                service("ntp", &["sw1"], &["vlans"]),
            ],
        ))
        .await
        .unwrap();

    let first = h
        .manager
        .deploy(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();
    let second = h
        .manager
        .redeploy(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();

    for summary in [&first, &second] {
        assert!(summary.succeeded());
        assert_eq!(summary.deployed_services, vec!["vlans", "ntp"]);
    }
    let stored = h.manager.get(stack.stack_id).await.unwrap();
    let deployed: BTreeSet<&str> = stored.deployed_services.iter().map(String::as_str).collect();
    assert_eq!(deployed, BTreeSet::from(["vlans", "ntp"]));
}

#[tokio::test]
async fn deploy_then_validate_round_trip_is_clean() {
    let h = harness(&["sw1"]).await;
    h.renderer.script("vlans.j2", "vlan 100\n name users");

    let mut services = vec![service("vlans", &["sw1"], &[])];
    services[0]
        .variables
        .insert("vlan_id".to_string(), VarValue::from("100"));
    let stack = h.manager.create(new_stack("campus", services)).await.unwrap();

    h.manager
        .deploy(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();
    let validation = h
        .manager
        .validate(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();

    assert!(validation.all_valid);
    assert_eq!(validation.services.len(), 1);
    assert!(validation.services[0].valid);
    for device in &validation.services[0].devices {
        assert!(device.missing_lines.is_empty());
        assert_eq!(device.error, None);
    }

    // The report is cached on the stack without touching its state
    let stored = h.manager.get(stack.stack_id).await.unwrap();
    assert_eq!(stored.state, StackState::Deployed);
    assert!(stored.last_validation.unwrap().all_valid);
}

#[tokio::test]
async fn validation_reports_drift_after_device_change() {
    let h = harness(&["sw1"]).await;
    h.renderer.script("vlans.j2", "vlan 100\nvlan 200");

    let stack = h
        .manager
        .create(new_stack("campus", vec![service("vlans", &["sw1"], &[])]))
        .await
        .unwrap();
    h.manager
        .deploy(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();

    // Someone removed a vlan out of band
    h.transport.set_running_config("sw1", "vlan 100");

    let validation = h
        .manager
        .validate(stack.stack_id, DeployOptions::default())
        .await
        .unwrap();

    assert!(!validation.all_valid);
    let device = &validation.services[0].devices[0];
    assert_eq!(device.missing_lines, vec!["vlan 200"]);
    // Lifecycle state stays Deployed; validation is advisory
    let stored = h.manager.get(stack.stack_id).await.unwrap();
    assert_eq!(stored.state, StackState::Deployed);
}
