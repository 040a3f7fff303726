//! External system integrations for dhis2sync.
//!
//! - [`dhis2`] - DHIS2 Web API client behind the [`dhis2::PlatformApi`] trait
//! - [`store`] - Progress store backends behind the [`store::ProgressStore`] trait
//!
//! # Design Pattern
//!
//! Adapters isolate external systems so the engine can be tested with
//! in-memory implementations of the same traits.
//!
//! ```rust,no_run
//! use dhis2sync::adapters::dhis2::{PlatformConnector, ProfileConnector};
//! use dhis2sync::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("dhis2sync.toml")?;
//! let connector = ProfileConnector::new(config.profiles.clone(), config.http.clone());
//! let pair = connector.connect("national").await?;
//! let info = pair.destination.system_info().await?;
//! println!("destination runs DHIS2 {}", info.version);
//! # Ok(())
//! # }
//! ```

pub mod dhis2;
pub mod store;
