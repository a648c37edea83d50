//! Sled database backend for the stack store

use super::StackStore;
use crate::{error::Result, models::ServiceStack};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Sled-based stack store
pub struct SledBackend {
    /// Database instance
    db: sled::Db,
    /// Stacks tree
    stacks: sled::Tree,
}

impl SledBackend {
    /// Create a new sled backend
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening sled database at {:?}", path);

        let db = sled::open(path)?;
        let stacks = db.open_tree("stacks")?;

        Ok(Self { db, stacks })
    }

    /// Create an in-memory sled backend (for testing)
    pub async fn in_memory() -> Result<Self> {
        info!("Creating in-memory sled database");

        let db = sled::Config::new().temporary(true).open()?;
        let stacks = db.open_tree("stacks")?;

        Ok(Self { db, stacks })
    }
}

#[async_trait]
impl StackStore for SledBackend {
    async fn init(&self) -> Result<()> {
        // Flush to ensure database is ready
        self.db.flush_async().await?;
        Ok(())
    }

    async fn put_stack(&self, stack: &ServiceStack) -> Result<()> {
        debug!("Storing stack: {}", stack.stack_id);

        let value = serde_json::to_vec(stack)?;
        self.stacks.insert(stack.stack_id.as_bytes(), value)?;
        self.stacks.flush_async().await?;

        Ok(())
    }

    async fn get_stack(&self, stack_id: Uuid) -> Result<Option<ServiceStack>> {
        debug!("Getting stack: {}", stack_id);

        match self.stacks.get(stack_id.as_bytes())? {
            Some(bytes) => {
                let stack: ServiceStack = serde_json::from_slice(&bytes)?;
                Ok(Some(stack))
            }
            None => Ok(None),
        }
    }

    async fn list_stacks(&self) -> Result<Vec<ServiceStack>> {
        debug!("Listing all stacks");

        let mut stacks = Vec::new();

        for result in self.stacks.iter() {
            let (_, value) = result?;
            let stack: ServiceStack = serde_json::from_slice(&value)?;
            stacks.push(stack);
        }

        Ok(stacks)
    }

    async fn remove_stack(&self, stack_id: Uuid) -> Result<Option<ServiceStack>> {
        debug!("Removing stack: {}", stack_id);

        let existing = self.get_stack(stack_id).await?;

        if existing.is_some() {
            self.stacks.remove(stack_id.as_bytes())?;
            self.stacks.flush_async().await?;
        }

        Ok(existing)
    }
}

impl Drop for SledBackend {
    fn drop(&mut self) {
        // Attempt to flush on drop
        if let Err(e) = self.db.flush() {
            error!("Failed to flush database on drop: {}", e);
        }
    }
}
