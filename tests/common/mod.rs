//! Shared fixtures for the integration tests: an in-memory DHIS2 instance
//! and a service wired to it.

#![allow(dead_code)]

use async_trait::async_trait;
use dhis2sync::adapters::dhis2::models::{
    CompletenessRegistration, JobNotification, OrgUnit, SystemInfo,
};
use dhis2sync::adapters::dhis2::{
    DataValueQuery, OrgUnitFilter, PlatformApi, PlatformConnector, PlatformPair, PlatformResult,
};
use dhis2sync::adapters::store::{MemoryProgressStore, ProgressStore};
use dhis2sync::core::import::{ImportSettings, PollSettings};
use dhis2sync::core::progress::{EventBus, ProgressRepository};
use dhis2sync::core::retry::RetryPolicy;
use dhis2sync::core::transfer::TransferService;
use dhis2sync::domain::{
    ImportCount, ImportSummary, PlatformError, ReportedValue, SyncError, TransferRequest,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DATA_SET: &str = "BfMAe6Itzgt";
pub const PROFILE: &str = "national";

pub const ROOT: (&str, &str) = ("ImspTQPwCqd", "Sierra Leone");
pub const NGELEHUN: (&str, &str) = ("DiszpKrYNg8", "Ngelehun CHC");
pub const NJANDAMA: (&str, &str) = ("g8upMTyEZGZ", "Njandama MCHP");
pub const BUMBAN: (&str, &str) = ("jNb63DIHuwU", "Bumban MCHP");

pub const ANC_VISITS: &str = "fbfJHSPpUQD";
pub const MEASLES: &str = "cYeuwXTCPkU";

/// A DHIS2 instance held in memory
pub struct MemoryInstance {
    units: Vec<OrgUnit>,
    roots: Vec<OrgUnit>,
    values: Vec<ReportedValue>,
    pub failing_job: Option<String>,

    pub imported: Mutex<Vec<ReportedValue>>,
    pub completeness: Mutex<Vec<CompletenessRegistration>>,
    jobs: Mutex<HashMap<String, u64>>,
}

impl MemoryInstance {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            roots: Vec::new(),
            values: Vec::new(),
            failing_job: None,
            imported: Mutex::new(Vec::new()),
            completeness: Mutex::new(Vec::new()),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn unit(mut self, (id, name): (&str, &str)) -> Self {
        self.units.push(OrgUnit::new(id, name));
        self
    }

    pub fn root(mut self, (id, name): (&str, &str)) -> Self {
        let mut unit = OrgUnit::new(id, name);
        unit.level = Some(1);
        self.roots.push(unit.clone());
        self.units.push(unit);
        self
    }

    pub fn value(mut self, element: &str, period: &str, unit: &str, value: &str) -> Self {
        self.values
            .push(ReportedValue::new(element, period, unit, value).with_category_option_combo("HllvX50cXC0"));
        self
    }

    pub fn imported(&self) -> Vec<ReportedValue> {
        self.imported.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformApi for MemoryInstance {
    fn base_url(&self) -> &str {
        "memory://instance"
    }

    async fn system_info(&self) -> PlatformResult<SystemInfo> {
        Ok(SystemInfo {
            version: "2.40.4".to_string(),
            ..SystemInfo::default()
        })
    }

    async fn user_org_units(&self) -> PlatformResult<Vec<OrgUnit>> {
        Ok(self.roots.clone())
    }

    async fn org_unit(&self, id: &str) -> PlatformResult<OrgUnit> {
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
        Ok(self
            .values
            .iter()
            .filter(|v| v.period == query.period)
            .filter(|v| query.include_descendants || v.org_unit == query.org_unit)
            .cloned()
            .collect())
    }

    async fn submit_data_values(&self, values: &[ReportedValue]) -> PlatformResult<String> {
        self.imported.lock().unwrap().extend_from_slice(values);
        let mut jobs = self.jobs.lock().unwrap();
        let job_id = format!("imp{:04}", jobs.len() + 1);
        jobs.insert(job_id.clone(), values.len() as u64);
        Ok(job_id)
    }

    async fn job_status(
        &self,
        _job_type: &str,
        job_id: &str,
    ) -> PlatformResult<Vec<JobNotification>> {
        if let Some(message) = &self.failing_job {
            return Ok(vec![JobNotification {
                completed: true,
                level: "ERROR".to_string(),
                message: message.clone(),
                summary: None,
            }]);
        }

        let count = self.jobs.lock().unwrap().get(job_id).copied().unwrap_or(0);
        Ok(vec![JobNotification {
            completed: true,
            level: "INFO".to_string(),
            message: format!(
                "Import complete with status SUCCESS, {count} created, 0 updated, 0 deleted, 0 ignored"
            ),
            summary: Some(ImportSummary::from_counts(ImportCount::new(count, 0, 0, 0))),
        }])
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

/// Serves one profile backed by two memory instances
pub struct MemoryConnector {
    source: Arc<MemoryInstance>,
    destination: Arc<MemoryInstance>,
}

#[async_trait]
impl PlatformConnector for MemoryConnector {
    async fn connect(&self, profile_id: &str) -> dhis2sync::domain::Result<PlatformPair> {
        if profile_id != PROFILE {
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

/// Import settings with millisecond waits
pub fn fast_settings() -> ImportSettings {
    ImportSettings {
        chunk_size: 2,
        max_concurrent_polls: 2,
        poll: PollSettings {
            interval: Duration::from_millis(1),
            max_attempts: 3,
        },
        poll_retry: RetryPolicy::exponential(2, Duration::from_millis(1), Duration::from_millis(2)),
        submit_retry: RetryPolicy::quadratic(2, Duration::from_millis(1)),
    }
}

/// A service plus handles on its collaborators
pub struct Harness {
    pub service: TransferService,
    pub source: Arc<MemoryInstance>,
    pub destination: Arc<MemoryInstance>,
    pub store: Arc<dyn ProgressStore>,
}

impl Harness {
    pub fn new(source: MemoryInstance, destination: MemoryInstance) -> Self {
        Self::with_store(source, destination, Arc::new(MemoryProgressStore::new()))
    }

    pub fn with_store(
        source: MemoryInstance,
        destination: MemoryInstance,
        store: Arc<dyn ProgressStore>,
    ) -> Self {
        let source = Arc::new(source);
        let destination = Arc::new(destination);
        let connector = Arc::new(MemoryConnector {
            source: source.clone(),
            destination: destination.clone(),
        });
        let repository = Arc::new(ProgressRepository::new(
            store.clone(),
            Arc::new(EventBus::default()),
        ));
        let service = TransferService::new(
            connector,
            repository,
            fast_settings(),
            Duration::from_secs(5),
        );

        Self {
            service,
            source,
            destination,
            store,
        }
    }
}

/// Three units reporting two elements over January and February
pub fn three_unit_source() -> MemoryInstance {
    let mut source = MemoryInstance::new()
        .root(ROOT)
        .unit(NGELEHUN)
        .unit(NJANDAMA)
        .unit(BUMBAN);
    for period in ["202401", "202402"] {
        for (unit, _) in [NGELEHUN, NJANDAMA, BUMBAN] {
            source = source
                .value(ANC_VISITS, period, unit, "12")
                .value(MEASLES, period, unit, "4");
        }
    }
    source
}

/// Destination missing Bumban MCHP
pub fn destination_without_bumban() -> MemoryInstance {
    MemoryInstance::new().unit(NGELEHUN).unit(NJANDAMA)
}

pub fn two_period_request() -> TransferRequest {
    TransferRequest::new(
        PROFILE,
        DATA_SET,
        vec!["202401".to_string(), "202402".to_string()],
    )
}
