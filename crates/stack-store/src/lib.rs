//! # Stack Store
//!
//! Persisted data model and storage backends for configuration stacks.
//!
//! A [`ServiceStack`] is the unit of deployment: an ordered collection of
//! templated configuration services with shared variables and declared
//! dependencies. This crate owns the persisted representation and the
//! [`StackStore`] backend trait with sled and in-memory implementations.

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod backend;
mod error;
mod models;

pub use backend::{MemoryBackend, SledBackend, StackStore};
pub use error::{Error, Result};
pub use models::{
    Credentials, DeviceValidation, ServiceDefinition, ServiceError, ServiceStack,
    ServiceValidation, StackState, StackValidation, VarMap, VarValue,
};
