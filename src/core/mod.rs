//! Core business logic for dhis2sync.
//!
//! # Modules
//!
//! - [`discovery`] - Finding the organisation units that reported data
//! - [`resolve`] - Element mapping, user resolutions and unit matching
//! - [`import`] - Chunked async import with bounded job polling
//! - [`progress`] - Live progress records, durable snapshots and events
//! - [`transfer`] - The orchestrator state machine and the service facade
//! - [`retry`] - Backoff policies shared by the importer
//!
//! # Transfer Workflow
//!
//! 1. **Connect**: Build source and destination clients from a profile
//! 2. **Roots**: Resolve the units to search under
//! 3. **Periods**: Discover units, match them in the destination, fetch and resolve values
//! 4. **Import**: Submit every resolved value in chunks and await the jobs
//! 5. **Completeness** (optional): Register imported unit/period pairs
//! 6. **Decide**: Complete, or pause for the user when values were unmapped
//!
//! # Example
//!
//! ```rust,no_run
//! use dhis2sync::config::load_config;
//! use dhis2sync::core::transfer::TransferService;
//! use dhis2sync::domain::TransferRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("dhis2sync.toml")?;
//! let service = TransferService::from_config(&config).await?;
//!
//! let request = TransferRequest::new("national", "BfMAe6Itzgt", vec!["202401".to_string()]);
//! let handle = service.start_transfer(request).await?;
//! let status = handle.join.await??;
//!
//! println!("Finished with status {status}");
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod import;
pub mod progress;
pub mod resolve;
pub mod retry;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;
