//! DHIS2 platform trait
//!
//! The engine talks to both instances through [`PlatformApi`]; the HTTP
//! implementation lives in [`super::client`] and tests substitute an
//! in-memory fake.

use super::models::{CompletenessRegistration, JobNotification, OrgUnit, SystemInfo};
use crate::domain::errors::PlatformError;
use crate::domain::value::ReportedValue;
use async_trait::async_trait;
use std::time::Duration;

/// Result alias for platform calls
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Job type polled for data value imports
pub const DATA_VALUE_IMPORT_JOB: &str = "DATAVALUE_IMPORT";

/// Parameters of a `dataValueSets` fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValueQuery {
    pub data_set: String,
    pub period: String,
    pub org_unit: String,

    /// Include every descendant of `org_unit` (discovery)
    pub include_descendants: bool,

    pub attribute_option_combo: Option<String>,

    /// Overrides the client's default timeout for this call
    pub timeout: Option<Duration>,
}

impl DataValueQuery {
    /// Values of exactly one unit
    pub fn for_unit(
        data_set: impl Into<String>,
        period: impl Into<String>,
        org_unit: impl Into<String>,
    ) -> Self {
        Self {
            data_set: data_set.into(),
            period: period.into(),
            org_unit: org_unit.into(),
            include_descendants: false,
            attribute_option_combo: None,
            timeout: None,
        }
    }

    /// Values of a root and all its descendants
    pub fn with_descendants(
        data_set: impl Into<String>,
        period: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            include_descendants: true,
            ..Self::for_unit(data_set, period, root)
        }
    }

    pub fn attribute_option_combo(mut self, aoc: Option<String>) -> Self {
        self.attribute_option_combo = aoc;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Organisation unit search filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgUnitFilter {
    /// `id:eq:<id>`
    IdEquals(String),
    /// `name:ilike:<name>` (substring, case-insensitive)
    NameLike(String),
}

impl OrgUnitFilter {
    /// Value of the DHIS2 `filter` query parameter
    pub fn to_query(&self) -> String {
        match self {
            OrgUnitFilter::IdEquals(id) => format!("id:eq:{id}"),
            OrgUnitFilter::NameLike(name) => format!("name:ilike:{name}"),
        }
    }
}

/// Operations the transfer engine needs from a DHIS2 instance
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Base URL of the instance, for logging
    fn base_url(&self) -> &str;

    /// Connectivity and credential check
    async fn system_info(&self) -> PlatformResult<SystemInfo>;

    /// Organisation units assigned to the authenticated user
    async fn user_org_units(&self) -> PlatformResult<Vec<OrgUnit>>;

    /// Looks up a single organisation unit by id
    async fn org_unit(&self, id: &str) -> PlatformResult<OrgUnit>;

    /// Searches organisation units, in the order the server returns them
    async fn search_org_units(&self, filter: &OrgUnitFilter) -> PlatformResult<Vec<OrgUnit>>;

    /// Fetches reported values
    async fn data_values(&self, query: &DataValueQuery) -> PlatformResult<Vec<ReportedValue>>;

    /// Submits values as an asynchronous import job and returns its id
    ///
    /// The id is empty when the destination did not assign one.
    async fn submit_data_values(&self, values: &[ReportedValue]) -> PlatformResult<String>;

    /// Status notifications of an async job, newest first
    async fn job_status(&self, job_type: &str, job_id: &str)
        -> PlatformResult<Vec<JobNotification>>;

    /// Registers completeness for a batch of (dataset, period, unit)
    async fn register_completeness(
        &self,
        registrations: &[CompletenessRegistration],
    ) -> PlatformResult<()>;
}
