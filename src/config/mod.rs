//! Configuration module for Listing-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the transport credential from the environment.
//!
//! # Example
//!
//! ```no_run
//! use listing_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} pages", config.harvest.total_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HarvestConfig, OutputConfig, RetryConfig, ThrottleConfig, TransportConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_api_key};
pub use validation::validate;
