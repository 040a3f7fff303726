//! End-to-end transfers against in-memory DHIS2 instances

mod common;

use common::*;
use dhis2sync::core::import::parse_import_message;
use dhis2sync::domain::{
    ImportCount, ImportError, OrgUnitSelection, SyncError, TransferStatus,
};
use std::collections::BTreeMap;

const ANC_DEST: &str = "hfdmMSPBgLG";
const MEASLES_DEST: &str = "s46m5MS0hxu";

#[tokio::test]
async fn test_unmatched_unit_is_reported_and_transfer_completes() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());

    let handle = harness
        .service
        .start_transfer(two_period_request())
        .await
        .unwrap();
    let status = handle.join.await.unwrap().unwrap();
    assert_eq!(status, TransferStatus::Completed);

    let progress = harness.service.get_progress(&handle.task_id).await.unwrap();
    assert_eq!(progress.progress, 100);
    assert_eq!(progress.total_fetched, 12);
    assert_eq!(progress.total_mapped, 8);
    assert_eq!(progress.total_imported, 8);
    assert_eq!(progress.units_processed, 6);
    assert_eq!(progress.not_found_units, vec!["Bumban MCHP"]);
    assert_eq!(progress.not_found_values, 4);
    assert!(progress.unmapped_values.is_empty());

    let imported = harness.destination.imported();
    assert_eq!(imported.len(), 8);
    assert!(imported.iter().all(|v| v.org_unit != BUMBAN.0));

    let summary = progress.import_summary.unwrap();
    assert_eq!(summary.status, "WARNING");
    assert_eq!(summary.import_count, ImportCount::new(8, 0, 0, 0));
}

#[tokio::test]
async fn test_partial_mapping_diverts_the_unmapped_half() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());
    let mut request = two_period_request();
    request
        .element_mapping
        .insert(ANC_VISITS.to_string(), ANC_DEST.to_string());

    let handle = harness.service.start_transfer(request).await.unwrap();
    let status = handle.join.await.unwrap().unwrap();
    assert_eq!(status, TransferStatus::AwaitingUserDecision);

    let progress = harness.service.get_progress(&handle.task_id).await.unwrap();
    assert_eq!(progress.progress, 95);
    assert_eq!(progress.unmapped_count(), 4);
    assert_eq!(progress.unmapped_elements(), vec![MEASLES.to_string()]);
    for key in [
        "DiszpKrYNg8:202401",
        "DiszpKrYNg8:202402",
        "g8upMTyEZGZ:202401",
        "g8upMTyEZGZ:202402",
    ] {
        assert_eq!(progress.unmapped_values[key].len(), 1, "bucket {key}");
    }

    let imported = harness.destination.imported();
    assert_eq!(imported.len(), 4);
    assert!(imported.iter().all(|v| v.data_element == ANC_DEST));
}

#[tokio::test]
async fn test_skip_unmapped_completes_with_two_log_lines() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());
    let mut request = two_period_request();
    request
        .element_mapping
        .insert(ANC_VISITS.to_string(), ANC_DEST.to_string());

    let handle = harness.service.start_transfer(request).await.unwrap();
    handle.join.await.unwrap().unwrap();

    let before = harness.service.get_progress(&handle.task_id).await.unwrap();
    let after = harness
        .service
        .skip_unmapped_and_complete(&handle.task_id)
        .await
        .unwrap();

    assert_eq!(after.status, TransferStatus::Completed);
    assert_eq!(after.progress, 100);
    assert!(after.unmapped_values.is_empty());
    assert_eq!(after.messages.len(), before.messages.len() + 2);
    let tail: Vec<&str> = after.messages.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["User chose to skip unmapped values", "Transfer complete!"]);

    let again = harness.service.skip_unmapped_and_complete(&handle.task_id).await;
    assert!(matches!(again, Err(SyncError::StateMismatch { .. })));
}

#[tokio::test]
async fn test_skip_on_completed_task_is_a_state_mismatch() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());

    let handle = harness
        .service
        .start_transfer(two_period_request())
        .await
        .unwrap();
    handle.join.await.unwrap().unwrap();

    let result = harness.service.skip_unmapped_and_complete(&handle.task_id).await;
    assert!(matches!(result, Err(SyncError::StateMismatch { .. })));
    let result = harness.service.cancel_transfer(&handle.task_id).await;
    assert!(matches!(result, Err(SyncError::StateMismatch { .. })));
}

#[tokio::test]
async fn test_retry_with_new_mappings_imports_the_bucket() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());
    let mut request = two_period_request();
    request
        .element_mapping
        .insert(ANC_VISITS.to_string(), ANC_DEST.to_string());

    let handle = harness.service.start_transfer(request).await.unwrap();
    handle.join.await.unwrap().unwrap();

    let mapping = BTreeMap::from([(MEASLES.to_string(), MEASLES_DEST.to_string())]);
    let retry = harness
        .service
        .retry_with_new_mappings(&handle.task_id, mapping)
        .await
        .unwrap();
    let status = retry.join.await.unwrap().unwrap();
    assert_eq!(status, TransferStatus::Completed);

    let progress = harness.service.get_progress(&handle.task_id).await.unwrap();
    assert_eq!(progress.progress, 100);
    assert_eq!(progress.total_imported, 8);
    assert!(progress.unmapped_values.is_empty());

    let imported = harness.destination.imported();
    assert_eq!(imported.len(), 8);
    assert_eq!(
        imported.iter().filter(|v| v.data_element == MEASLES_DEST).count(),
        4
    );
}

#[tokio::test]
async fn test_cancel_awaiting_transfer() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());
    let mut request = two_period_request();
    request
        .element_mapping
        .insert(ANC_VISITS.to_string(), ANC_DEST.to_string());

    let handle = harness.service.start_transfer(request).await.unwrap();
    handle.join.await.unwrap().unwrap();

    let progress = harness.service.cancel_transfer(&handle.task_id).await.unwrap();
    assert_eq!(progress.status, TransferStatus::Cancelled);
    assert_eq!(progress.error.as_deref(), Some("Transfer cancelled by user"));

    let mapping = BTreeMap::from([(MEASLES.to_string(), MEASLES_DEST.to_string())]);
    let retry = harness
        .service
        .retry_with_new_mappings(&handle.task_id, mapping)
        .await;
    assert!(matches!(retry, Err(SyncError::TaskNotFound(_))));
}

#[tokio::test]
async fn test_explicit_list_and_completeness() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());
    let mut request = two_period_request();
    request.org_unit_selection = OrgUnitSelection::ExplicitList;
    request.org_unit_ids = vec![NGELEHUN.0.to_string()];
    request.mark_complete = true;

    let handle = harness.service.start_transfer(request).await.unwrap();
    let status = handle.join.await.unwrap().unwrap();
    assert_eq!(status, TransferStatus::Completed);

    let imported = harness.destination.imported();
    assert_eq!(imported.len(), 4);
    assert!(imported.iter().all(|v| v.org_unit == NGELEHUN.0));

    let registrations = harness.destination.completeness.lock().unwrap().clone();
    assert_eq!(registrations.len(), 2);
    assert!(registrations
        .iter()
        .all(|r| r.organisation_unit == NGELEHUN.0 && r.data_set == DATA_SET && r.completed));
}

#[tokio::test]
async fn test_failed_job_ends_in_error_with_message() {
    let mut destination = destination_without_bumban();
    destination.failing_job = Some("Period 202401 is locked for data set".to_string());
    let harness = Harness::new(three_unit_source(), destination);

    let handle = harness
        .service
        .start_transfer(two_period_request())
        .await
        .unwrap();
    assert!(handle.join.await.unwrap().is_err());

    let progress = harness.service.get_progress(&handle.task_id).await.unwrap();
    assert_eq!(progress.status, TransferStatus::Error);
    assert_eq!(
        progress.error.as_deref(),
        Some("Period 202401 is locked for data set")
    );
}

#[tokio::test]
async fn test_invalid_request_creates_no_task() {
    let harness = Harness::new(three_unit_source(), destination_without_bumban());
    let mut request = two_period_request();
    request.periods.clear();

    let result = harness.service.start_transfer(request).await;
    assert!(matches!(result, Err(SyncError::Validation(_))));
    assert!(harness.service.list_transfers(10).await.unwrap().is_empty());
}

#[test]
fn test_job_message_parsing() {
    let counts = parse_import_message(
        "Import complete with status SUCCESS, 0 created, 0 updated, 0 deleted, 328 ignored",
    )
    .unwrap();
    assert_eq!(counts, ImportCount::new(0, 0, 328, 0));
    assert_eq!(counts.ignored, 328);

    let err = parse_import_message("Import in progress").unwrap_err();
    assert!(matches!(err, ImportError::Parse(_)));
}
