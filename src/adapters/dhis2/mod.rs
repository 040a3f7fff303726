//! DHIS2 adapter implementation
//!
//! This module provides the integration with DHIS2 instances: the
//! [`PlatformApi`] seam used by the engine, its HTTP implementation,
//! wire models and the profile connector.

pub mod api;
pub mod client;
pub mod connector;
pub mod models;

pub use api::{DataValueQuery, OrgUnitFilter, PlatformApi, PlatformResult, DATA_VALUE_IMPORT_JOB};
pub use client::Dhis2Client;
pub use connector::{PlatformConnector, PlatformPair, ProfileConnector};
pub use models::{
    AsyncImportResponse, CompletenessRegistration, JobNotification, OrgUnit, SystemInfo,
};
