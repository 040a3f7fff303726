//! Transfer orchestrator
//!
//! Drives one task through its lifecycle: connect, resolve the root units,
//! walk every period (discover, match, fetch, resolve), import everything
//! in one pass, register completeness, then either complete or stop at the
//! awaiting-decision checkpoint when values were diverted.
//!
//! Progress milestones: 10 clients ready, 15 roots resolved, 20-80 periods,
//! 80-90 import, 90 completeness, 95 awaiting decision, 100 completed.

use super::completeness::{self, CompletedPairs};
use super::report;
use crate::adapters::dhis2::{DataValueQuery, PlatformApi, PlatformConnector, PlatformPair};
use crate::core::discovery::{self, DiscoveryQuery};
use crate::core::import::{AsyncJob, BulkImporter, ImportObserver};
use crate::core::progress::TaskReporter;
use crate::core::resolve::{self, ResolutionIndex, UnitPlan};
use crate::domain::{
    ImportSummary, OrgUnitSelection, ReportedValue, Result, TransferRequest, TransferStatus,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_CONNECTED: u8 = 10;
const PROGRESS_ROOTS: u8 = 15;
const PROGRESS_PERIODS_START: u8 = 20;
const PROGRESS_PERIODS_END: u8 = 80;
const PROGRESS_IMPORT_END: u8 = 90;
const PROGRESS_AWAITING: u8 = 95;
const PROGRESS_DONE: u8 = 100;

/// Units between intermediate progress lines inside a period
const UNIT_PROGRESS_EVERY: usize = 5;

/// Where the orchestrator looks for units in a period
#[derive(Debug, Clone)]
enum UnitSource {
    /// Discovery under each of these roots, merged
    Roots(Vec<String>),
    /// Fixed id -> name list, no discovery
    Fixed(BTreeMap<String, String>),
}

/// Values and counters gathered across all periods
#[derive(Debug, Default)]
struct Harvest {
    resolved: Vec<ReportedValue>,
    diverted: BTreeMap<String, Vec<ReportedValue>>,
    fetched: u64,
    skipped: u64,
    not_found_values: u64,
    not_found_units: Vec<String>,
    units_processed: u64,
}

impl Harvest {
    fn mark_not_found(&mut self, name: &str, values: u64) {
        self.not_found_values += values;
        if !self.not_found_units.iter().any(|n| n == name) {
            self.not_found_units.push(name.to_string());
        }
    }
}

/// Maps importer milestones onto the 80-90 % band
struct ReporterObserver<'a> {
    reporter: &'a TaskReporter,
}

#[async_trait]
impl ImportObserver for ReporterObserver<'_> {
    async fn chunk_submitted(&self, job: &AsyncJob, total_chunks: usize) {
        self.reporter
            .log(format!(
                "Submitted chunk {}/{} ({} values), job {}",
                job.chunk, total_chunks, job.value_count, job.job_id
            ))
            .await;
    }

    async fn job_finished(&self, _job: &AsyncJob, finished: usize, total_jobs: usize) {
        self.reporter
            .tick(band(PROGRESS_PERIODS_END, PROGRESS_IMPORT_END, finished, total_jobs));
    }
}

/// Linear position of `done / total` inside `[start, end]`
fn band(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = usize::from(end.saturating_sub(start));
    let offset = span * done.min(total) / total;
    start.saturating_add(u8::try_from(offset).unwrap_or(end - start))
}

/// Runs transfers against platforms built by a connector
pub struct TransferOrchestrator {
    connector: Arc<dyn PlatformConnector>,
    importer: Arc<BulkImporter>,
    discovery_timeout: Duration,
}

impl TransferOrchestrator {
    pub fn new(
        connector: Arc<dyn PlatformConnector>,
        importer: Arc<BulkImporter>,
        discovery_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            importer,
            discovery_timeout,
        }
    }

    /// Runs a task to completion, awaiting decision, or error
    ///
    /// Failures are recorded on the task (status `error`, message verbatim)
    /// and returned.
    pub async fn run(&self, request: &TransferRequest, reporter: &TaskReporter) -> Result<TransferStatus> {
        let start = std::time::Instant::now();
        crate::log_transfer_start!(reporter.task_id(), request.profile_id, request.source_dataset);

        let outcome = self.execute(request, reporter).await;
        finish(reporter, outcome, start).await
    }

    /// Re-resolves the diverted bucket with `mapping` and imports the result
    ///
    /// The task must already be back in `running`.
    pub async fn rerun_unmapped(
        &self,
        request: &TransferRequest,
        mapping: &BTreeMap<String, String>,
        reporter: &TaskReporter,
    ) -> Result<TransferStatus> {
        let start = std::time::Instant::now();
        let outcome = self.execute_retry(request, mapping, reporter).await;
        finish(reporter, outcome, start).await
    }

    async fn execute(&self, request: &TransferRequest, reporter: &TaskReporter) -> Result<TransferStatus> {
        let platforms = self.connector.connect(&request.profile_id).await?;
        reporter
            .transition(
                TransferStatus::Running,
                Some(PROGRESS_CONNECTED),
                Some(format!(
                    "Connected to source {} and destination {}",
                    platforms.source.base_url(),
                    platforms.destination.base_url()
                )),
            )
            .await?;

        let units = self.unit_source(request, platforms.source.as_ref()).await?;
        reporter
            .advance(PROGRESS_ROOTS, describe_unit_source(request.org_unit_selection, &units))
            .await;

        let harvest = self.harvest(request, &platforms, &units, reporter).await?;

        reporter
            .update(|p| {
                p.total_fetched = harvest.fetched;
                p.total_mapped = harvest.resolved.len() as u64;
                p.total_skipped = harvest.skipped;
                p.not_found_values = harvest.not_found_values;
                p.not_found_units = harvest.not_found_units.clone();
                p.units_processed = harvest.units_processed;
                p.progress = PROGRESS_PERIODS_END;
                p.push_message(format!(
                    "Fetched {} values; {} ready to import, {} unmapped, {} skipped",
                    harvest.fetched,
                    harvest.resolved.len(),
                    harvest.diverted.values().map(Vec::len).sum::<usize>(),
                    harvest.skipped
                ));
                Ok(())
            })
            .await?;

        let chunks = self
            .import(platforms.destination.as_ref(), &harvest.resolved, reporter)
            .await?;

        if request.mark_complete {
            self.register_completeness(request, platforms.destination.as_ref(), &harvest.resolved, reporter)
                .await;
        }

        conclude(reporter, &chunks, None, harvest.diverted).await
    }

    async fn execute_retry(
        &self,
        request: &TransferRequest,
        mapping: &BTreeMap<String, String>,
        reporter: &TaskReporter,
    ) -> Result<TransferStatus> {
        let snapshot = reporter.snapshot().await?;
        let platforms = self.connector.connect(&request.profile_id).await?;
        let index = ResolutionIndex::new(&request.resolutions);

        let mut resolved = Vec::new();
        let mut still_diverted = BTreeMap::new();
        let mut skipped = 0u64;

        for (key, values) in snapshot.unmapped_values {
            let outcome = resolve::resolve_with_index(values, mapping, &index);
            resolved.extend(outcome.resolved);
            skipped += outcome.skipped as u64;
            if !outcome.diverted.is_empty() {
                still_diverted.insert(key, outcome.diverted);
            }
        }

        let newly_mapped = resolved.len() as u64;
        reporter
            .update(|p| {
                p.total_mapped += newly_mapped;
                p.total_skipped += skipped;
                p.push_message(format!(
                    "{newly_mapped} previously unmapped values resolved, {} still unmapped",
                    still_diverted.values().map(Vec::len).sum::<usize>()
                ));
                Ok(())
            })
            .await?;

        let chunks = self
            .import(platforms.destination.as_ref(), &resolved, reporter)
            .await?;

        if request.mark_complete {
            self.register_completeness(request, platforms.destination.as_ref(), &resolved, reporter)
                .await;
        }

        conclude(reporter, &chunks, snapshot.import_summary, still_diverted).await
    }

    async fn unit_source(&self, request: &TransferRequest, source: &dyn PlatformApi) -> Result<UnitSource> {
        match request.org_unit_selection {
            OrgUnitSelection::Discovered => {
                let root = discovery::resolve_root(source).await?;
                Ok(UnitSource::Roots(vec![root.id]))
            }
            OrgUnitSelection::All => {
                let roots = discovery::user_roots(source).await?;
                Ok(UnitSource::Roots(roots.into_iter().map(|u| u.id).collect()))
            }
            OrgUnitSelection::ExplicitList => {
                let names = discovery::lookup_names(source, &request.org_unit_ids).await;
                Ok(UnitSource::Fixed(names))
            }
        }
    }

    async fn units_for_period(
        &self,
        request: &TransferRequest,
        source: &dyn PlatformApi,
        units: &UnitSource,
        period: &str,
    ) -> BTreeMap<String, String> {
        match units {
            UnitSource::Fixed(names) => names.clone(),
            UnitSource::Roots(roots) => {
                let mut merged = BTreeMap::new();
                for root in roots {
                    let query = DiscoveryQuery {
                        data_set: &request.source_dataset,
                        period,
                        root,
                        timeout: self.discovery_timeout,
                        attribute_option_combo: request.attribute_option_combo.as_deref(),
                    };
                    merged.extend(discovery::discover_org_units(source, &query).await);
                }
                merged
            }
        }
    }

    async fn harvest(
        &self,
        request: &TransferRequest,
        platforms: &PlatformPair,
        units: &UnitSource,
        reporter: &TaskReporter,
    ) -> Result<Harvest> {
        let periods = request.normalized_periods();
        let index = ResolutionIndex::new(&request.resolutions);
        let mut harvest = Harvest::default();

        for (period_no, period) in periods.iter().enumerate() {
            let period_start = band(PROGRESS_PERIODS_START, PROGRESS_PERIODS_END, period_no, periods.len());
            let period_end = band(PROGRESS_PERIODS_START, PROGRESS_PERIODS_END, period_no + 1, periods.len());

            reporter
                .advance(
                    period_start,
                    format!("Processing period {period} ({}/{})", period_no + 1, periods.len()),
                )
                .await;

            let discovered = self
                .units_for_period(request, platforms.source.as_ref(), units, period)
                .await;
            if discovered.is_empty() {
                reporter.advance(period_end, format!("No data found for period {period}")).await;
                continue;
            }
            reporter
                .log(format!(
                    "Found {} org units with data for period {period}",
                    discovered.len()
                ))
                .await;

            for (unit_no, (unit_id, unit_name)) in discovered.iter().enumerate() {
                harvest.units_processed += 1;

                if (unit_no + 1) % UNIT_PROGRESS_EVERY == 0 {
                    let percent = period_start
                        + band(0, period_end - period_start, unit_no + 1, discovered.len());
                    reporter
                        .advance(
                            percent,
                            format!("Processing {unit_name} ({}/{})...", unit_no + 1, discovered.len()),
                        )
                        .await;
                }

                self.harvest_unit(
                    request,
                    platforms,
                    &index,
                    period,
                    unit_id,
                    unit_name,
                    &mut harvest,
                )
                .await;
            }

            let totals = (harvest.fetched, harvest.resolved.len() as u64, harvest.skipped);
            let not_found = (harvest.not_found_values, harvest.not_found_units.clone());
            let diverted: usize = harvest.diverted.values().map(Vec::len).sum();
            reporter
                .update(|p| {
                    p.total_fetched = totals.0;
                    p.total_mapped = totals.1;
                    p.total_skipped = totals.2;
                    p.not_found_values = not_found.0;
                    p.not_found_units = not_found.1;
                    p.progress = period_end;
                    p.push_message(format!(
                        "Period {period} done: {} values fetched so far, {} unmapped",
                        totals.0, diverted
                    ));
                    Ok(())
                })
                .await?;
        }

        Ok(harvest)
    }

    /// Matches, fetches and resolves one source unit for one period
    ///
    /// Match and fetch failures are logged and leave the unit out.
    #[allow(clippy::too_many_arguments)]
    async fn harvest_unit(
        &self,
        request: &TransferRequest,
        platforms: &PlatformPair,
        index: &ResolutionIndex,
        period: &str,
        unit_id: &str,
        unit_name: &str,
        harvest: &mut Harvest,
    ) {
        let destination_unit = match index.unit_plan(unit_id) {
            UnitPlan::Skip => {
                tracing::debug!(org_unit = unit_id, period = period, "Unit skipped by resolution");
                return;
            }
            UnitPlan::MapTo(target) => Some(target),
            UnitPlan::Match => {
                match resolve::match_org_unit(platforms.destination.as_ref(), unit_id, unit_name).await {
                    Ok(found) => found.map(|u| u.id),
                    Err(e) => {
                        tracing::warn!(
                            org_unit = unit_id,
                            name = unit_name,
                            error = %e,
                            "Destination unit lookup failed"
                        );
                        None
                    }
                }
            }
        };

        let query = DataValueQuery::for_unit(&request.source_dataset, period, unit_id)
            .attribute_option_combo(request.attribute_option_combo.clone());
        let mut values = match platforms.source.data_values(&query).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    org_unit = unit_id,
                    period = period,
                    error = %e,
                    "Failed to fetch values for unit"
                );
                return;
            }
        };
        harvest.fetched += values.len() as u64;

        let Some(destination_unit) = destination_unit else {
            tracing::warn!(
                org_unit = unit_id,
                name = unit_name,
                values = values.len(),
                "No matching destination unit"
            );
            harvest.mark_not_found(unit_name, values.len() as u64);
            return;
        };

        resolve::localize(&mut values, period, &destination_unit);
        let outcome = resolve::resolve_with_index(values, &request.element_mapping, index);

        harvest.skipped += outcome.skipped as u64;
        harvest.resolved.extend(outcome.resolved);
        if !outcome.diverted.is_empty() {
            harvest
                .diverted
                .entry(format!("{unit_id}:{period}"))
                .or_default()
                .extend(outcome.diverted);
        }
    }

    async fn import(
        &self,
        destination: &dyn PlatformApi,
        values: &[ReportedValue],
        reporter: &TaskReporter,
    ) -> Result<Vec<ImportSummary>> {
        if values.is_empty() {
            reporter.log("No values to import").await;
            return Ok(Vec::new());
        }

        let chunk_size = self.importer.settings().chunk_size;
        reporter
            .log(format!(
                "Importing {} values in {} chunks",
                values.len(),
                values.len().div_ceil(chunk_size)
            ))
            .await;

        let observer = ReporterObserver { reporter };
        let chunks = self.importer.import_bulk(destination, values, &observer).await?;

        for line in ImportSummary::aggregate(&chunks).conflict_lines() {
            reporter.log(line).await;
        }
        Ok(chunks)
    }

    async fn register_completeness(
        &self,
        request: &TransferRequest,
        destination: &dyn PlatformApi,
        imported: &[ReportedValue],
        reporter: &TaskReporter,
    ) {
        let pairs: CompletedPairs = imported
            .iter()
            .map(|v| (v.org_unit.clone(), v.period.clone()))
            .collect();
        if pairs.is_empty() {
            return;
        }

        let data_set = request.destination_dataset_id();
        match completeness::mark_complete(destination, data_set, &pairs).await {
            Some(count) => {
                reporter
                    .advance(
                        PROGRESS_IMPORT_END,
                        format!("Marked {count} org unit/period combinations complete"),
                    )
                    .await
            }
            None => {
                reporter
                    .advance(
                        PROGRESS_IMPORT_END,
                        "Warning: could not mark data set complete in destination",
                    )
                    .await
            }
        }
    }
}

fn describe_unit_source(selection: OrgUnitSelection, units: &UnitSource) -> String {
    match units {
        UnitSource::Roots(roots) => format!(
            "Discovering org units under {} ({selection})",
            roots.join(", ")
        ),
        UnitSource::Fixed(names) => format!("Using {} selected org units", names.len()),
    }
}

/// Records the import result and moves the task to its resting status
async fn conclude(
    reporter: &TaskReporter,
    chunks: &[ImportSummary],
    previous: Option<ImportSummary>,
    diverted: BTreeMap<String, Vec<ReportedValue>>,
) -> Result<TransferStatus> {
    let mut all_chunks: Vec<ImportSummary> = previous.into_iter().collect();
    all_chunks.extend_from_slice(chunks);

    let snapshot = reporter.snapshot().await?;
    let summary = report::transfer_summary(&all_chunks, snapshot.not_found_units.len());
    let accepted = summary.import_count.accepted();

    if diverted.is_empty() {
        let completion = report::completion_message(
            snapshot.units_processed,
            &summary.import_count,
            snapshot.not_found_units.len(),
        );
        let note = report::not_found_note(&snapshot.not_found_units);

        reporter
            .update(|p| {
                p.status.check_transition(TransferStatus::Completed)?;
                p.status = TransferStatus::Completed;
                p.progress = PROGRESS_DONE;
                p.total_imported = accepted;
                p.import_summary = Some(summary);
                p.unmapped_values.clear();
                p.push_message(completion);
                if let Some(note) = note {
                    p.push_message(note);
                }
                Ok(())
            })
            .await?;
        Ok(TransferStatus::Completed)
    } else {
        reporter
            .update(|p| {
                p.status.check_transition(TransferStatus::AwaitingUserDecision)?;
                p.status = TransferStatus::AwaitingUserDecision;
                p.progress = PROGRESS_AWAITING;
                p.total_imported = accepted;
                p.import_summary = Some(summary);
                p.unmapped_values = diverted;
                for line in report::awaiting_decision_lines(p) {
                    p.push_message(line);
                }
                Ok(())
            })
            .await?;
        Ok(TransferStatus::AwaitingUserDecision)
    }
}

/// Logs the outcome and records failures on the task
async fn finish(
    reporter: &TaskReporter,
    outcome: Result<TransferStatus>,
    start: std::time::Instant,
) -> Result<TransferStatus> {
    match outcome {
        Ok(status) => {
            crate::log_transfer_complete!(reporter.task_id(), status, start.elapsed().as_millis() as u64);
            Ok(status)
        }
        Err(e) => {
            let message = e.to_string();
            crate::log_error_with_context!(e, "Transfer failed", reporter.task_id());

            let recorded = reporter
                .update(|p| {
                    p.status.check_transition(TransferStatus::Error)?;
                    p.status = TransferStatus::Error;
                    p.error = Some(message.clone());
                    p.push_message(format!("Transfer failed: {message}"));
                    Ok(())
                })
                .await;
            if let Err(record_err) = recorded {
                tracing::warn!(
                    task_id = %reporter.task_id(),
                    error = %record_err,
                    "Could not record transfer failure"
                );
            }
            Err(e)
        }
    }
}
