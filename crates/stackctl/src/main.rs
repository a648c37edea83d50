//! stackctl - manage and deploy network configuration stacks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stack_clients::{NetboxDirectory, NetpalmClient};
use stack_orchestration::{StackManager, TemplateExecutionClient};
use stack_store::{Credentials, SledBackend, StackStore};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "stackctl")]
#[command(about = "Confstack - network configuration stack orchestrator")]
#[command(version)]
struct Cli {
    /// Stack database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Automation API base URL
    #[arg(long, global = true, env = "NETPALM_API_URL", default_value = "http://localhost:9000/")]
    api_url: String,

    /// Automation API key
    #[arg(long, global = true, env = "NETPALM_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Device inventory base URL
    #[arg(long, global = true, env = "NETBOX_URL", default_value = "http://localhost:8000/")]
    netbox_url: String,

    /// Device inventory token
    #[arg(long, global = true, env = "NETBOX_TOKEN", default_value = "", hide_env_values = true)]
    netbox_token: String,

    /// Default device username
    #[arg(long, global = true, env = "CONFSTACK_USERNAME", default_value = "admin")]
    username: String,

    /// Default device password
    #[arg(long, global = true, env = "CONFSTACK_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a stack from a definition file
    Create {
        /// Stack definition (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List all stacks
    List {
        /// Output format: table or json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show one stack in full
    Show {
        /// Stack id
        stack_id: Uuid,

        /// Output format: yaml or json
        #[arg(long, default_value = "yaml")]
        format: String,
    },

    /// Delete a stack's record (pushed configuration stays on devices)
    Delete {
        /// Stack id
        stack_id: Uuid,
    },

    /// Deploy a stack in dependency order
    Deploy {
        /// Stack id
        stack_id: Uuid,

        /// Device username override for this run
        #[arg(long)]
        override_username: Option<String>,

        /// Device password override for this run
        #[arg(long)]
        override_password: Option<String>,
    },

    /// Validate deployed configuration against live devices
    Validate {
        /// Stack id
        stack_id: Uuid,

        /// Device username override for this run
        #[arg(long)]
        override_username: Option<String>,

        /// Device password override for this run
        #[arg(long)]
        override_password: Option<String>,
    },

    /// Reset a stack and deploy it again from scratch
    Redeploy {
        /// Stack id
        stack_id: Uuid,

        /// Device username override for this run
        #[arg(long)]
        override_username: Option<String>,

        /// Device password override for this run
        #[arg(long)]
        override_password: Option<String>,
    },
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("confstack")
        .join("stacks.db")
}

async fn build_manager(cli: &Cli) -> Result<StackManager> {
    let store_path = cli.store.clone().unwrap_or_else(default_store_path);
    let store = Arc::new(
        SledBackend::new(&store_path)
            .await
            .with_context(|| format!("Failed to open stack store at {}", store_path.display()))?,
    );
    store.init().await.context("Failed to initialize stack store")?;

    let netpalm = NetpalmClient::new(&cli.api_url, cli.api_key.clone())
        .context("Invalid automation API URL")?;
    let netbox = NetboxDirectory::new(&cli.netbox_url, cli.netbox_token.clone())
        .context("Invalid device inventory URL")?;
    let client = TemplateExecutionClient::new(
        Arc::new(netpalm.clone()),
        Arc::new(netbox),
        Arc::new(netpalm),
    );

    let defaults = Credentials {
        username: cli.username.clone(),
        password: cli.password.clone(),
    };
    Ok(StackManager::new(store, client, defaults))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let manager = build_manager(&cli).await?;

    match cli.command {
        Commands::Create { ref file } => commands::create::run(&manager, file).await,
        Commands::List { ref format } => commands::list::run(&manager, format).await,
        Commands::Show { stack_id, ref format } => commands::show::run(&manager, stack_id, format).await,
        Commands::Delete { stack_id } => commands::delete::run(&manager, stack_id).await,
        Commands::Deploy {
            stack_id,
            override_username,
            override_password,
        } => {
            let options = commands::deploy::options(override_username, override_password)?;
            commands::deploy::run(&manager, stack_id, options, false).await
        }
        Commands::Validate {
            stack_id,
            override_username,
            override_password,
        } => {
            let options = commands::deploy::options(override_username, override_password)?;
            commands::validate::run(&manager, stack_id, options).await
        }
        Commands::Redeploy {
            stack_id,
            override_username,
            override_password,
        } => {
            let options = commands::deploy::options(override_username, override_password)?;
            commands::deploy::run(&manager, stack_id, options, true).await
        }
    }
}
