//! Human-readable transfer summaries for the message log

use crate::domain::{ImportCount, ImportSummary, TransferProgress};

/// Final log line of a completed transfer
pub fn completion_message(units_processed: u64, counts: &ImportCount, not_found: usize) -> String {
    if counts.ignored > 0 && counts.accepted() == 0 {
        format!(
            "Transfer complete! All {} values already exist in destination (no changes needed)",
            counts.ignored
        )
    } else if counts.ignored > 0 {
        format!(
            "Transfer complete! Processed: {units_processed} org units, {} new, {} updated, {} already exist, {not_found} not found",
            counts.imported, counts.updated, counts.ignored
        )
    } else {
        format!(
            "Transfer complete! Processed: {units_processed} org units, {} new, {} updated, {not_found} not found",
            counts.imported, counts.updated
        )
    }
}

/// Note listing units without a destination match, if any
pub fn not_found_note(not_found_units: &[String]) -> Option<String> {
    if not_found_units.is_empty() {
        None
    } else {
        Some(format!(
            "Note: {} org units not found in destination: {}",
            not_found_units.len(),
            not_found_units.join(", ")
        ))
    }
}

/// Aggregate summary stored on the progress record
///
/// Status is WARNING when any unit went unmatched or any value was ignored.
pub fn transfer_summary(chunks: &[ImportSummary], not_found: usize) -> ImportSummary {
    let mut summary = ImportSummary::aggregate(chunks);
    let counts = summary.import_count;

    if summary.status != "ERROR" && (not_found > 0 || counts.ignored > 0) {
        summary.status = "WARNING".to_string();
    }

    summary.description = if counts.ignored > 0 && not_found > 0 {
        format!(
            "Imported={}, Updated={}, Already exist={}, Org units without matches={not_found}",
            counts.imported, counts.updated, counts.ignored
        )
    } else if counts.ignored > 0 {
        format!(
            "Imported={}, Updated={}, Already exist={} (no changes needed)",
            counts.imported, counts.updated, counts.ignored
        )
    } else {
        format!(
            "Imported={}, Updated={} (org units without matches in dest: {not_found})",
            counts.imported, counts.updated
        )
    };

    summary
}

/// Log lines written when a transfer pauses for a decision
pub fn awaiting_decision_lines(progress: &TransferProgress) -> Vec<String> {
    vec![
        format!(
            "{} unmapped values found across {} org unit/period combinations. Unmapped data element IDs: {}",
            progress.unmapped_count(),
            progress.unmapped_values.len(),
            progress.unmapped_elements().join(", ")
        ),
        "User action required: these values were filtered out during mapping".to_string(),
        "Options: 1) Create new mappings for unmapped elements, 2) Skip and complete transfer, 3) Cancel entire transfer".to_string(),
    ]
}
