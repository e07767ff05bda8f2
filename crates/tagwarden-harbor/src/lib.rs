//! Harbor v2 gateway for tagwarden
//!
//! Implements [`tagwarden_core::RegistryGateway`] over Harbor's REST API
//! (`/api/v2.0`) with basic authentication.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagwarden_harbor::{HarborClient, HarborConfig};
//!
//! let config = HarborConfig::new("harbor.example.com", "admin", "secret")?;
//! let gateway = Arc::new(HarborClient::new(config)?);
//! ```

#![warn(unreachable_pub)]

pub mod client;
pub mod config;
mod wire;

pub use client::HarborClient;
pub use config::HarborConfig;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
