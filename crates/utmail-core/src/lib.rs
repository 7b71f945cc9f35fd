//! utmail core — shared types, configuration, the credential store,
//! and the course topic table.
//!
//! This crate provides:
//! - **config**: environment-derived settings (`Config::from_env`)
//! - **store**: the in-memory chat-id → credential mapping
//! - **topics**: the static course-code → hashtag table
//! - **types**: data passed between the fetcher and the notifier

pub mod config;
pub mod store;
pub mod topics;
pub mod types;

pub use config::{Config, ConfigError};
pub use store::{Credential, CredentialStore};
pub use types::FetchedMessage;
