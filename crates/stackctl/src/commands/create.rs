use anyhow::{Context, Result};
use stack_orchestration::{NewStack, StackManager};
use std::path::Path;

pub async fn run(manager: &StackManager, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // JSON is valid YAML, so one parser covers both formats
    let definition: NewStack = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse stack definition {}", file.display()))?;

    let stack = manager.create(definition).await?;
    println!("Created stack '{}'", stack.name);
    println!("  id: {}", stack.stack_id);
    println!("  services: {}", stack.services.len());
    Ok(())
}
