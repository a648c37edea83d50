use anyhow::Result;
use stack_orchestration::{DeployOptions, StackManager};
use stack_store::Credentials;
use uuid::Uuid;

/// Build per-run options from optional credential override flags
///
/// The override is all or nothing; a lone username or password is
/// rejected rather than silently falling back to the defaults.
pub fn options(username: Option<String>, password: Option<String>) -> Result<DeployOptions> {
    let credentials = match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        (None, None) => None,
        _ => anyhow::bail!("--override-username and --override-password must be given together"),
    };
    Ok(DeployOptions { credentials })
}

pub async fn run(
    manager: &StackManager,
    stack_id: Uuid,
    options: DeployOptions,
    redeploy: bool,
) -> Result<()> {
    let summary = if redeploy {
        manager.redeploy(stack_id, options).await?
    } else {
        manager.deploy(stack_id, options).await?
    };

    println!(
        "Stack {} is {}: {} deployed, {} failed",
        summary.stack_id,
        summary.state,
        summary.deployed_count(),
        summary.failed_count()
    );
    for name in &summary.deployed_services {
        println!("  ok      {name}");
    }
    for error in &summary.service_errors {
        println!("  failed  {}: {}", error.service, error.error);
    }
    for report in &summary.device_errors {
        println!("          {} / {}: {}", report.service, report.device, report.error);
    }

    if !summary.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_override_builds_credentials() {
        let opts = options(Some("netops".to_string()), Some("pw".to_string())).unwrap();
        let credentials = opts.credentials.unwrap();
        assert_eq!(credentials.username, "netops");
        assert_eq!(credentials.password, "pw");
    }

    #[test]
    fn test_no_override_means_defaults() {
        let opts = options(None, None).unwrap();
        assert!(opts.credentials.is_none());
    }

    #[test]
    fn test_half_specified_override_is_rejected() {
        assert!(options(Some("netops".to_string()), None).is_err());
        assert!(options(None, Some("pw".to_string())).is_err());
    }
}
