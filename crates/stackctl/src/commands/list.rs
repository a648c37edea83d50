use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use stack_orchestration::StackManager;
use stack_store::{ServiceStack, StackState};

pub async fn run(manager: &StackManager, format: &str) -> Result<()> {
    if format != "table" && format != "json" {
        anyhow::bail!("Invalid format: {}. Must be 'table' or 'json'", format);
    }

    let mut stacks = manager.list().await?;
    stacks.sort_by(|a, b| a.name.cmp(&b.name));

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stacks)?);
        return Ok(());
    }

    if stacks.is_empty() {
        println!("No stacks");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "ID", "State", "Services", "Deployed", "Updated"]);
    for stack in &stacks {
        table.add_row(vec![
            Cell::new(&stack.name),
            Cell::new(stack.stack_id),
            state_cell(stack),
            Cell::new(stack.services.len()),
            Cell::new(stack.deployed_services.len()),
            Cell::new(stack.updated_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn state_cell(stack: &ServiceStack) -> Cell {
    let color = match stack.state {
        StackState::Deployed => Color::Green,
        StackState::Failed => Color::Red,
        StackState::Deploying => Color::Yellow,
        StackState::Pending => Color::Grey,
    };
    Cell::new(stack.state).fg(color)
}
