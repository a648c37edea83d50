use anyhow::Result;
use stack_orchestration::StackManager;
use uuid::Uuid;

pub async fn run(manager: &StackManager, stack_id: Uuid, format: &str) -> Result<()> {
    let stack = manager.get(stack_id).await?;
    match format {
        "yaml" => print!("{}", serde_yaml::to_string(&stack)?),
        "json" => println!("{}", serde_json::to_string_pretty(&stack)?),
        other => anyhow::bail!("Invalid format: {}. Must be 'yaml' or 'json'", other),
    }
    Ok(())
}
