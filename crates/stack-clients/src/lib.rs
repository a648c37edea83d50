//! # Stack Clients
//!
//! HTTP implementations of the orchestrator's collaborator seams:
//!
//! - [`NetpalmClient`]: template rendering and configuration transport
//!   over a netpalm-style automation API (`x-api-key` auth; pushes and
//!   fetches are submitted to a task queue and polled to completion)
//! - [`NetboxDirectory`]: device directory over a NetBox-style
//!   inventory API (token auth, `dcim/devices` lookups)
//!
//! Each adapter converts its failures into the orchestrator's
//! [`ClientError`](stack_orchestration::ClientError), so a broken
//! collaborator degrades into per-device failures rather than aborting
//! a pass.

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod error;
mod netbox;
mod netpalm;

pub use error::{Error, Result};
pub use netbox::NetboxDirectory;
pub use netpalm::NetpalmClient;
