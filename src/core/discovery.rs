//! Organisation unit discovery
//!
//! Finds the units under a root that reported data for a dataset and
//! period. Discovery never fails: a failed value query means "no data" and
//! a failed name lookup drops that unit from the result.

use crate::adapters::dhis2::{DataValueQuery, OrgUnit, PlatformApi};
use crate::domain::{Result, SyncError};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Parameters of one discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryQuery<'a> {
    pub data_set: &'a str,
    pub period: &'a str,
    pub root: &'a str,

    /// Timeout for the descendant-inclusive value query
    pub timeout: Duration,

    pub attribute_option_combo: Option<&'a str>,
}

/// Returns unit id -> display name for every unit with data under `root`
pub async fn discover_org_units(
    api: &dyn PlatformApi,
    query: &DiscoveryQuery<'_>,
) -> BTreeMap<String, String> {
    let value_query = DataValueQuery::with_descendants(query.data_set, query.period, query.root)
        .attribute_option_combo(query.attribute_option_combo.map(str::to_string))
        .timeout(query.timeout);

    let values = match api.data_values(&value_query).await {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(
                data_set = query.data_set,
                period = query.period,
                root = query.root,
                error = %e,
                "Discovery query failed, treating period as empty"
            );
            return BTreeMap::new();
        }
    };

    let unit_ids: BTreeSet<String> = values.into_iter().map(|v| v.org_unit).collect();
    tracing::debug!(
        period = query.period,
        root = query.root,
        units = unit_ids.len(),
        "Discovered units with data"
    );

    // TODO: batch these into one `id:in:[...]` query for large hierarchies
    let mut discovered = BTreeMap::new();
    for id in unit_ids {
        match api.org_unit(&id).await {
            Ok(unit) => {
                discovered.insert(id, unit.label().to_string());
            }
            Err(e) => {
                tracing::warn!(org_unit = %id, error = %e, "Unit name lookup failed, omitting unit");
            }
        }
    }

    discovered
}

/// Units assigned to the user, shallowest first
///
/// # Errors
///
/// Returns a validation error if the user has no assigned units.
pub async fn user_roots(api: &dyn PlatformApi) -> Result<Vec<OrgUnit>> {
    let mut roots = api.user_org_units().await?;
    if roots.is_empty() {
        return Err(SyncError::Validation(
            "The source user has no assigned organisation units".to_string(),
        ));
    }
    roots.sort_by_key(|u| u.level.unwrap_or(u32::MAX));
    Ok(roots)
}

/// The user's top-level unit: the assigned unit with the lowest level
pub async fn resolve_root(api: &dyn PlatformApi) -> Result<OrgUnit> {
    let mut roots = user_roots(api).await?;
    Ok(roots.remove(0))
}

/// Looks up display names for an explicit unit list
///
/// Units whose lookup fails keep their id as name.
pub async fn lookup_names(api: &dyn PlatformApi, ids: &[String]) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    for id in ids {
        let name = match api.org_unit(id).await {
            Ok(unit) => unit.label().to_string(),
            Err(e) => {
                tracing::debug!(org_unit = %id, error = %e, "Unit name lookup failed, using id");
                id.clone()
            }
        };
        names.insert(id.clone(), name);
    }
    names
}
