//! DHIS2 wire models
//!
//! Request and response bodies exchanged with the DHIS2 Web API.
//! Only the fields the engine reads are modelled; unknown fields are ignored.

use crate::domain::summary::ImportSummary;
use crate::domain::value::ReportedValue;
use serde::{Deserialize, Serialize};

/// `dataValueSets` payload, used for both fetch responses and import bodies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValueSet {
    #[serde(default)]
    pub data_values: Vec<ReportedValue>,
}

/// Organisation unit as returned by `organisationUnits` and `me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Hierarchy depth, 1 = national root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl OrgUnit {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            display_name: None,
            level: None,
        }
    }

    /// Display name, falling back to the name and then the id
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(self.name.as_str()).filter(|n| !n.is_empty()))
            .unwrap_or(&self.id)
    }
}

/// Paged `organisationUnits` response (fetched with paging=false)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitList {
    #[serde(default)]
    pub organisation_units: Vec<OrgUnit>,
}

/// `api/me` response restricted to assigned units
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(default)]
    pub organisation_units: Vec<OrgUnit>,
}

/// Response to an `async=true` import submission
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncImportResponse {
    #[serde(default)]
    pub http_status: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub response: Option<JobReference>,
}

impl AsyncImportResponse {
    /// Job id, empty when the destination did not assign one
    pub fn job_id(&self) -> String {
        self.response
            .as_ref()
            .map(|r| r.id.trim().to_string())
            .unwrap_or_default()
    }
}

/// Job handle inside an async import response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub job_type: Option<String>,

    #[serde(default)]
    pub relative_notifier_endpoint: Option<String>,
}

/// One entry of `api/system/tasks/{type}/{id}`, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobNotification {
    #[serde(default)]
    pub completed: bool,

    /// INFO, WARNING or ERROR
    #[serde(default)]
    pub level: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,
}

impl JobNotification {
    pub fn is_error(&self) -> bool {
        self.level.eq_ignore_ascii_case("error")
    }
}

/// Completeness registration for one (dataset, period, unit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessRegistration {
    pub data_set: String,
    pub period: String,
    pub organisation_unit: String,
    pub completed: bool,
    /// YYYY-MM-DD
    pub complete_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
}

/// `completeDataSetRegistrations` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessBatch<'a> {
    pub complete_data_set_registrations: &'a [CompletenessRegistration],
}

/// `api/system/info` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub revision: Option<String>,

    #[serde(default)]
    pub system_name: Option<String>,
}
