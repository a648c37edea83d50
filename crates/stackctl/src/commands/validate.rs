use anyhow::Result;
use stack_orchestration::{DeployOptions, StackManager};
use uuid::Uuid;

pub async fn run(manager: &StackManager, stack_id: Uuid, options: DeployOptions) -> Result<()> {
    let validation = manager.validate(stack_id, options).await?;

    println!(
        "Stack {}: {}",
        stack_id,
        if validation.all_valid { "valid" } else { "DRIFT DETECTED" }
    );
    for service in &validation.services {
        println!(
            "  {}  {}",
            if service.valid { "ok   " } else { "drift" },
            service.service
        );
        for device in &service.devices {
            if device.valid {
                continue;
            }
            match &device.error {
                Some(error) => println!("        {}: {}", device.device, error),
                None => {
                    println!("        {}: {} missing lines", device.device, device.missing_lines.len());
                    for line in &device.missing_lines {
                        println!("          - {line}");
                    }
                }
            }
        }
    }

    if !validation.all_valid {
        std::process::exit(1);
    }
    Ok(())
}
