//! Shared library for Copilot Demo API Lambda functions.
//!
//! This crate provides the directory (Microsoft Graph) client, configuration,
//! error taxonomy, and the host utilities used by all Lambda functions.

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod http;
pub mod logs;
pub mod manifest;
pub mod models;
pub mod secrets;
pub mod system;
pub mod token;

pub use config::Config;
pub use directory::{DirectoryClient, DirectoryPayload, DirectoryRecord, QueryParams};
pub use error::{Error, Result};
pub use events::{EventLevel, EventSource, EventsResponse};
pub use logs::LogRoot;
pub use manifest::PluginManifest;
pub use models::{MessageResponse, UserSummary, UsersResponse};
pub use system::{HealthReport, HealthStatus, HostSnapshot};
pub use token::{AccessToken, TokenCache};
