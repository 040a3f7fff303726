//! Configuration management for dhis2sync.
//!
//! # Overview
//!
//! dhis2sync uses a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `DHIS2SYNC_*` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`HttpConfig`] - Timeouts, user agent and transport retry
//! - [`ImportConfig`] - Chunk size, polling cadence and retry budgets
//! - [`StoreConfig`] - Progress store backend
//! - [`ProfileConfig`] - Source/destination instance pairs
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [import]
//! chunk_size = 1000
//! max_concurrent_polls = 10
//!
//! [store]
//! backend = "file"
//! path = "./progress"
//!
//! [[profiles]]
//! id = "national"
//!
//! [profiles.source]
//! base_url = "https://hmis.example.org"
//! username = "sync_user"
//! password = "${SOURCE_PASSWORD}"
//!
//! [profiles.destination]
//! base_url = "https://dhis2.example.org"
//! username = "sync_user"
//! password = "${DEST_PASSWORD}"
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dhis2sync::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("dhis2sync.toml")?;
//! println!("Chunk size: {}", config.import.chunk_size);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, HttpConfig, ImportConfig, InstanceConfig, LoggingConfig,
    PostgreSQLConfig, ProfileConfig, RetryConfig, StoreBackend, StoreConfig, SyncConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
