//! In-memory platform used by the engine's unit tests

use crate::adapters::dhis2::api::{DataValueQuery, OrgUnitFilter, PlatformApi, PlatformResult};
use crate::adapters::dhis2::models::{
    CompletenessRegistration, JobNotification, OrgUnit, SystemInfo,
};
use crate::adapters::dhis2::{PlatformConnector, PlatformPair};
use crate::core::import::{ImportSettings, PollSettings};
use crate::core::retry::RetryPolicy;
use crate::domain::{ImportCount, ImportSummary, PlatformError, ReportedValue, SyncError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Importer settings with millisecond waits
pub fn fast_import_settings(chunk_size: usize) -> ImportSettings {
    ImportSettings {
        chunk_size,
        max_concurrent_polls: 2,
        poll: PollSettings {
            interval: Duration::from_millis(1),
            max_attempts: 3,
        },
        poll_retry: RetryPolicy::exponential(2, Duration::from_millis(1), Duration::from_millis(2)),
        submit_retry: RetryPolicy::quadratic(2, Duration::from_millis(1)),
    }
}

/// Connector that hands out the same pair for profile "default"
pub struct FixedConnector {
    source: Arc<FakePlatform>,
    destination: Arc<FakePlatform>,
}

impl FixedConnector {
    pub fn new(source: Arc<FakePlatform>, destination: Arc<FakePlatform>) -> Self {
        Self {
            source,
            destination,
        }
    }
}

#[async_trait]
impl PlatformConnector for FixedConnector {
    async fn connect(&self, profile_id: &str) -> crate::domain::Result<PlatformPair> {
        if profile_id != "default" {
            return Err(SyncError::Configuration(format!(
                "Unknown connection profile '{profile_id}'"
            )));
        }
        Ok(PlatformPair {
            source: self.source.clone(),
            destination: self.destination.clone(),
        })
    }
}

/// How the fake answers job status queries
#[derive(Debug, Clone)]
pub enum JobBehaviour {
    /// Completed with a structured summary counting every value as imported
    Summary,
    /// Completed with only a text message
    Message(String),
    /// Completed with level ERROR and this message
    Fail(String),
    /// Never completes
    Pending,
}

pub struct FakePlatform {
    pub units: Vec<OrgUnit>,
    pub roots: Vec<OrgUnit>,
    pub values: Vec<ReportedValue>,
    pub fail_value_queries: bool,
    pub fail_lookups: HashSet<String>,
    pub fail_submissions: usize,
    pub job_behaviour: JobBehaviour,
    pub job_id_empty: bool,
    /// Time each job status call takes
    pub status_delay: Option<Duration>,

    pub submitted: Mutex<Vec<Vec<ReportedValue>>>,
    pub completeness: Mutex<Vec<CompletenessRegistration>>,
    pub status_calls: Mutex<usize>,
    /// Highest number of job status calls seen in flight at once
    pub peak_status_calls: AtomicUsize,
    in_flight_status_calls: AtomicUsize,
    jobs: Mutex<HashMap<String, usize>>,
    submission_failures: Mutex<usize>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            roots: Vec::new(),
            values: Vec::new(),
            fail_value_queries: false,
            fail_lookups: HashSet::new(),
            fail_submissions: 0,
            job_behaviour: JobBehaviour::Summary,
            job_id_empty: false,
            status_delay: None,
            submitted: Mutex::new(Vec::new()),
            completeness: Mutex::new(Vec::new()),
            status_calls: Mutex::new(0),
            peak_status_calls: AtomicUsize::new(0),
            in_flight_status_calls: AtomicUsize::new(0),
            jobs: Mutex::new(HashMap::new()),
            submission_failures: Mutex::new(0),
        }
    }

    pub fn with_unit(mut self, id: &str, name: &str) -> Self {
        self.units.push(OrgUnit::new(id, name));
        self
    }

    pub fn with_root(mut self, id: &str, name: &str, level: u32) -> Self {
        let mut unit = OrgUnit::new(id, name);
        unit.level = Some(level);
        self.roots.push(unit.clone());
        self.units.push(unit);
        self
    }

    pub fn with_value(mut self, value: ReportedValue) -> Self {
        self.values.push(value);
        self
    }

    pub fn submitted_values(&self) -> Vec<ReportedValue> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    fn base_url(&self) -> &str {
        "memory://fake"
    }

    async fn system_info(&self) -> PlatformResult<SystemInfo> {
        Ok(SystemInfo {
            version: "2.40.0".to_string(),
            ..SystemInfo::default()
        })
    }

    async fn user_org_units(&self) -> PlatformResult<Vec<OrgUnit>> {
        Ok(self.roots.clone())
    }

    async fn org_unit(&self, id: &str) -> PlatformResult<OrgUnit> {
        if self.fail_lookups.contains(id) {
            return Err(PlatformError::ServerError {
                status: 500,
                message: "lookup failed".to_string(),
            });
        }
        self.units
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| PlatformError::ClientError {
                status: 404,
                message: format!("Object not found: {id}"),
            })
    }

    async fn search_org_units(&self, filter: &OrgUnitFilter) -> PlatformResult<Vec<OrgUnit>> {
        Ok(match filter {
            OrgUnitFilter::IdEquals(id) => {
                self.units.iter().filter(|u| &u.id == id).cloned().collect()
            }
            OrgUnitFilter::NameLike(name) => {
                let needle = name.to_lowercase();
                self.units
                    .iter()
                    .filter(|u| u.name.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            }
        })
    }

    async fn data_values(&self, query: &DataValueQuery) -> PlatformResult<Vec<ReportedValue>> {
        if self.fail_value_queries {
            return Err(PlatformError::ServerError {
                status: 500,
                message: "query failed".to_string(),
            });
        }
        Ok(self
            .values
            .iter()
            .filter(|v| v.period == query.period)
            .filter(|v| query.include_descendants || v.org_unit == query.org_unit)
            .filter(|v| {
                query.attribute_option_combo.is_none()
                    || v.attribute_option_combo == query.attribute_option_combo
            })
            .cloned()
            .collect())
    }

    async fn submit_data_values(&self, values: &[ReportedValue]) -> PlatformResult<String> {
        {
            let mut failures = self.submission_failures.lock().unwrap();
            if *failures < self.fail_submissions {
                *failures += 1;
                return Err(PlatformError::ServerError {
                    status: 502,
                    message: "bad gateway".to_string(),
                });
            }
        }

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(values.to_vec());
        if self.job_id_empty {
            return Ok(String::new());
        }
        let job_id = format!("job{}", submitted.len());
        self.jobs.lock().unwrap().insert(job_id.clone(), values.len());
        Ok(job_id)
    }

    async fn job_status(
        &self,
        _job_type: &str,
        job_id: &str,
    ) -> PlatformResult<Vec<JobNotification>> {
        *self.status_calls.lock().unwrap() += 1;
        if let Some(delay) = self.status_delay {
            let in_flight = self.in_flight_status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_status_calls.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight_status_calls.fetch_sub(1, Ordering::SeqCst);
        }
        let count = self.jobs.lock().unwrap().get(job_id).copied().unwrap_or(0) as u64;

        let notification = match &self.job_behaviour {
            JobBehaviour::Pending => return Ok(Vec::new()),
            JobBehaviour::Summary => JobNotification {
                completed: true,
                level: "INFO".to_string(),
                message: "Import done".to_string(),
                summary: Some(ImportSummary::from_counts(ImportCount::new(count, 0, 0, 0))),
            },
            JobBehaviour::Message(message) => JobNotification {
                completed: true,
                level: "INFO".to_string(),
                message: message.clone(),
                summary: None,
            },
            JobBehaviour::Fail(message) => JobNotification {
                completed: true,
                level: "ERROR".to_string(),
                message: message.clone(),
                summary: None,
            },
        };
        Ok(vec![notification])
    }

    async fn register_completeness(
        &self,
        registrations: &[CompletenessRegistration],
    ) -> PlatformResult<()> {
        self.completeness
            .lock()
            .unwrap()
            .extend_from_slice(registrations);
        Ok(())
    }
}
