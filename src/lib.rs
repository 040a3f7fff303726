// DHIS2 Sync - Aggregate data transfer engine for DHIS2 instances
// Copyright (c) 2025 DHIS2 Sync Contributors
// Licensed under the MIT License

//! # dhis2sync - Aggregate data transfer between DHIS2 instances
//!
//! dhis2sync copies aggregate data values for one data set and a list of
//! periods from a source DHIS2 instance to a destination instance.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Discovering** the organisation units assigned to a data set
//! - **Fetching** data values per unit and period, tolerating per-unit failures
//! - **Resolving** source element and unit ids to their destination counterparts
//! - **Importing** in chunks through asynchronous import jobs polled concurrently
//! - **Tracking** progress per task with a bounded log, persisted and pushed to subscribers
//!
//! Values whose data element has no destination mapping are held back and
//! the task pauses for a decision: retry with new mappings, skip them, or
//! cancel.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Discovery, resolution, import, progress and transfer orchestration
//! - [`adapters`] - DHIS2 Web API client and progress store backends
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dhis2sync::config::load_config;
//! use dhis2sync::core::transfer::TransferService;
//! use dhis2sync::domain::TransferRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("dhis2sync.toml")?;
//!     let service = TransferService::from_config(&config).await?;
//!
//!     let request = TransferRequest::new("default", "BfMAe6Itzgt", vec!["202401".to_string()]);
//!     let handle = service.start_transfer(request).await?;
//!     let status = handle.join.await??;
//!
//!     println!("Transfer {} finished as {status}", handle.task_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`], backed by
//! [`domain::SyncError`].
//!
//! ## Logging
//!
//! dhis2sync uses structured logging with the `tracing` crate; see
//! [`logging::init_logging`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
