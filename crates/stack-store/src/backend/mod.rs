//! Storage backend implementations

mod memory;
mod sled;

pub use memory::MemoryBackend;
pub use sled::SledBackend;

use crate::{error::Result, models::ServiceStack};
use async_trait::async_trait;
use uuid::Uuid;

/// Trait for stack storage backends
///
/// The store is a plain key-value mapping from stack id to record, durable
/// across restarts (backend permitting), with no multi-key transactional
/// guarantees. All writes go through the orchestration engines.
#[async_trait]
pub trait StackStore: Send + Sync {
    /// Initialize the backend
    async fn init(&self) -> Result<()>;

    /// Store or replace a stack record
    async fn put_stack(&self, stack: &ServiceStack) -> Result<()>;

    /// Get a stack by id
    async fn get_stack(&self, stack_id: Uuid) -> Result<Option<ServiceStack>>;

    /// List all stacks
    async fn list_stacks(&self) -> Result<Vec<ServiceStack>>;

    /// Remove a stack, returning the record that was stored
    async fn remove_stack(&self, stack_id: Uuid) -> Result<Option<ServiceStack>>;
}
