//! Completeness registration for imported (unit, period) pairs

use crate::adapters::dhis2::{CompletenessRegistration, PlatformApi};
use chrono::Utc;
use std::collections::BTreeSet;

/// (destination unit, period) pairs with at least one imported value
pub type CompletedPairs = BTreeSet<(String, String)>;

/// Builds one registration per pair, dated today
pub fn registrations(data_set: &str, pairs: &CompletedPairs) -> Vec<CompletenessRegistration> {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    pairs
        .iter()
        .map(|(org_unit, period)| CompletenessRegistration {
            data_set: data_set.to_string(),
            period: period.clone(),
            organisation_unit: org_unit.clone(),
            completed: true,
            complete_date: today.clone(),
            stored_by: None,
        })
        .collect()
}

/// Registers completeness in a single batch
///
/// Returns the number of registrations sent. Failures are logged and
/// reported as `None`; they never change the transfer outcome.
pub async fn mark_complete(
    destination: &dyn PlatformApi,
    data_set: &str,
    pairs: &CompletedPairs,
) -> Option<usize> {
    if pairs.is_empty() {
        return Some(0);
    }

    let batch = registrations(data_set, pairs);
    match destination.register_completeness(&batch).await {
        Ok(()) => Some(batch.len()),
        Err(e) => {
            tracing::warn!(
                data_set = data_set,
                registrations = batch.len(),
                error = %e,
                "Completeness registration failed"
            );
            None
        }
    }
}
