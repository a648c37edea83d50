//! In-memory backend, primarily for tests and ephemeral runs

use super::StackStore;
use crate::{error::Result, models::ServiceStack};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// In-memory stack store backed by a hash map
#[derive(Default)]
pub struct MemoryBackend {
    stacks: RwLock<HashMap<Uuid, ServiceStack>>,
}

impl MemoryBackend {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StackStore for MemoryBackend {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn put_stack(&self, stack: &ServiceStack) -> Result<()> {
        debug!("Storing stack: {}", stack.stack_id);
        self.stacks
            .write()
            .unwrap()
            .insert(stack.stack_id, stack.clone());
        Ok(())
    }

    async fn get_stack(&self, stack_id: Uuid) -> Result<Option<ServiceStack>> {
        Ok(self
            .stacks
            .read()
            .unwrap()
            .get(&stack_id)
            .cloned())
    }

    async fn list_stacks(&self) -> Result<Vec<ServiceStack>> {
        Ok(self
            .stacks
            .read()
            .unwrap()
            .values()
            .cloned()
            .collect())
    }

    async fn remove_stack(&self, stack_id: Uuid) -> Result<Option<ServiceStack>> {
        debug!("Removing stack: {}", stack_id);
        Ok(self
            .stacks
            .write()
            .unwrap()
            .remove(&stack_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_crud() {
        let backend = MemoryBackend::new();
        backend.init().await.unwrap();

        let stack = ServiceStack::new("mem-stack");
        let stack_id = stack.stack_id;

        backend.put_stack(&stack).await.unwrap();
        assert!(backend.get_stack(stack_id).await.unwrap().is_some());
        assert_eq!(backend.list_stacks().await.unwrap().len(), 1);

        let removed = backend.remove_stack(stack_id).await.unwrap();
        assert_eq!(removed.unwrap().name, "mem-stack");
        assert!(backend.get_stack(stack_id).await.unwrap().is_none());
    }
}
