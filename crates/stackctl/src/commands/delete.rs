use anyhow::Result;
use stack_orchestration::StackManager;
use uuid::Uuid;

pub async fn run(manager: &StackManager, stack_id: Uuid) -> Result<()> {
    let removed = manager.delete(stack_id).await?;
    println!("Deleted stack '{}' ({})", removed.name, stack_id);
    println!("Note: configuration already pushed to devices is left in place");
    Ok(())
}
