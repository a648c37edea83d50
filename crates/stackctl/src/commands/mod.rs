//! Subcommand implementations

pub mod create;
pub mod delete;
pub mod deploy;
pub mod list;
pub mod show;
pub mod validate;
