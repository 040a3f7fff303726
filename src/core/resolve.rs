//! Identifier resolution
//!
//! Rewrites source identifiers into destination identifiers. Element ids go
//! through the mapping table (empty table = identity), then user resolutions
//! are applied to the unit and category fields. Unit matching against the
//! destination is a separate async step, [`match_org_unit`].

use crate::adapters::dhis2::{OrgUnit, OrgUnitFilter, PlatformApi, PlatformResult};
use crate::domain::{ReportedValue, Resolution, ResolutionAction, ResolutionKind};
use std::collections::{BTreeMap, HashMap};

/// Result of [`resolve`]
///
/// Every input value lands in exactly one of `resolved`, `diverted` or the
/// `skipped` count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOutcome {
    /// Values ready for import
    pub resolved: Vec<ReportedValue>,

    /// Values whose element has no mapping entry, untouched
    pub diverted: Vec<ReportedValue>,

    /// Values dropped by skip resolutions
    pub skipped: usize,
}

/// Resolutions indexed by (kind, source id); a later rule for the same
/// target replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct ResolutionIndex {
    rules: HashMap<(ResolutionKind, String), ResolutionAction>,
}

impl ResolutionIndex {
    pub fn new(resolutions: &[Resolution]) -> Self {
        let rules = resolutions
            .iter()
            .map(|r| ((r.kind, r.source_id.clone()), r.action.clone()))
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn action(&self, kind: ResolutionKind, source_id: &str) -> Option<&ResolutionAction> {
        self.rules.get(&(kind, source_id.to_string()))
    }

    /// Applies the rules to one value; `false` means the value is skipped
    fn apply(&self, value: &mut ReportedValue) -> bool {
        if self.is_empty() {
            return true;
        }

        let unit_action = self.action(ResolutionKind::OrgUnit, &value.org_unit).cloned();
        let coc_action = value
            .category_option_combo
            .as_deref()
            .and_then(|id| self.action(ResolutionKind::CategoryOptionCombo, id))
            .cloned();
        let aoc_action = value
            .attribute_option_combo
            .as_deref()
            .and_then(|id| self.action(ResolutionKind::CategoryOptionCombo, id))
            .cloned();

        let actions = [&unit_action, &coc_action, &aoc_action];
        if actions
            .iter()
            .any(|a| matches!(a, Some(ResolutionAction::Skip)))
        {
            return false;
        }

        if let Some(ResolutionAction::MapTo(target)) = unit_action {
            value.org_unit = target;
        }
        if let Some(ResolutionAction::MapTo(target)) = coc_action {
            value.category_option_combo = Some(target);
        }
        if let Some(ResolutionAction::MapTo(target)) = aoc_action {
            value.attribute_option_combo = Some(target);
        }
        true
    }
}

/// Applies the element mapping, then the resolutions
///
/// With an empty mapping every element passes through unchanged. With a
/// non-empty mapping, values whose element has no entry are diverted as-is
/// and never appear in `resolved`.
///
/// # Example
///
/// ```
/// use dhis2sync::core::resolve::resolve;
/// use dhis2sync::domain::ReportedValue;
/// use std::collections::BTreeMap;
///
/// let values = vec![ReportedValue::new("fbfJHSPpUQD", "202401", "DiszpKrYNg8", "12")];
/// let outcome = resolve(values.clone(), &BTreeMap::new(), &[]);
/// assert_eq!(outcome.resolved, values);
/// assert!(outcome.diverted.is_empty());
/// ```
pub fn resolve(
    values: Vec<ReportedValue>,
    element_mapping: &BTreeMap<String, String>,
    resolutions: &[Resolution],
) -> ResolveOutcome {
    resolve_with_index(values, element_mapping, &ResolutionIndex::new(resolutions))
}

pub fn resolve_with_index(
    values: Vec<ReportedValue>,
    element_mapping: &BTreeMap<String, String>,
    index: &ResolutionIndex,
) -> ResolveOutcome {
    let mut outcome = ResolveOutcome::default();

    for mut value in values {
        if !element_mapping.is_empty() {
            match element_mapping.get(&value.data_element) {
                Some(target) => value.data_element = target.clone(),
                None => {
                    outcome.diverted.push(value);
                    continue;
                }
            }
        }

        if index.apply(&mut value) {
            outcome.resolved.push(value);
        } else {
            outcome.skipped += 1;
        }
    }

    outcome
}

/// Rewrites fetched values onto the requested period and destination unit
pub fn localize(values: &mut [ReportedValue], period: &str, destination_unit: &str) {
    for value in values {
        value.period = period.to_string();
        value.org_unit = destination_unit.to_string();
    }
}

/// How the orchestrator treats a source unit before fetching its values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitPlan {
    /// A skip resolution targets the unit
    Skip,
    /// A map-to resolution names the destination unit
    MapTo(String),
    /// Match against the destination by id, then name
    Match,
}

impl ResolutionIndex {
    pub fn unit_plan(&self, source_unit: &str) -> UnitPlan {
        match self.action(ResolutionKind::OrgUnit, source_unit) {
            Some(ResolutionAction::Skip) => UnitPlan::Skip,
            Some(ResolutionAction::MapTo(target)) => UnitPlan::MapTo(target.clone()),
            None => UnitPlan::Match,
        }
    }
}

/// Finds the destination counterpart of a source unit
///
/// Tries an exact id match first, then a case-insensitive exact name match,
/// taking the first match in the order the destination returns them.
pub async fn match_org_unit(
    destination: &dyn PlatformApi,
    id: &str,
    name: &str,
) -> PlatformResult<Option<OrgUnit>> {
    let by_id = destination
        .search_org_units(&OrgUnitFilter::IdEquals(id.to_string()))
        .await?;
    if let Some(unit) = by_id.into_iter().find(|u| u.id == id) {
        return Ok(Some(unit));
    }

    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    let wanted = name.to_lowercase();

    let candidates = destination
        .search_org_units(&OrgUnitFilter::NameLike(name.to_string()))
        .await?;
    Ok(candidates
        .into_iter()
        .find(|u| u.name.trim().to_lowercase() == wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakePlatform;

    const ELEMENTS: [&str; 4] = ["fbfJHSPpUQD", "cYeuwXTCPkU", "Jtf34kNZhzP", "hfdmMSPBgLG"];
    const UNITS: [&str; 3] = ["DiszpKrYNg8", "g8upMTyEZGZ", "jNb63DIHuwU"];
    const COMBOS: [&str; 2] = ["Prlt0C1RF0s", "psbwp3CQEhs"];

    /// Every element x unit x combo over two periods
    fn sample_values() -> Vec<ReportedValue> {
        let mut values = Vec::new();
        let mut n = 0;
        for period in ["202401", "202402"] {
            for de in ELEMENTS {
                for ou in UNITS {
                    for coc in COMBOS {
                        n += 1;
                        values.push(
                            ReportedValue::new(de, period, ou, n.to_string())
                                .with_category_option_combo(coc)
                                .with_attribute_option_combo("HllvX50cXC0"),
                        );
                    }
                }
            }
        }
        values
    }

    #[test]
    fn test_empty_mapping_is_identity() {
        let values = sample_values();
        let outcome = resolve(values.clone(), &BTreeMap::new(), &[]);
        assert_eq!(outcome.resolved, values);
        assert!(outcome.diverted.is_empty());
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_unmapped_elements_are_diverted_only() {
        let values = sample_values();
        let mapping: BTreeMap<String, String> = [
            ("fbfJHSPpUQD".to_string(), "destElemnt1".to_string()),
            ("cYeuwXTCPkU".to_string(), "destElemnt2".to_string()),
        ]
        .into_iter()
        .collect();

        let outcome = resolve(values.clone(), &mapping, &[]);

        assert!(outcome
            .diverted
            .iter()
            .all(|v| !mapping.contains_key(&v.data_element)));
        assert!(outcome
            .resolved
            .iter()
            .all(|v| v.data_element.starts_with("destElemnt")));
        assert_eq!(outcome.resolved.len(), values.len() / 2);
        assert_eq!(outcome.diverted.len(), values.len() / 2);

        // Diverted values are the untouched originals
        for diverted in &outcome.diverted {
            assert!(values.contains(diverted));
        }
    }

    #[test]
    fn test_values_are_conserved_under_every_rule_mix() {
        let values = sample_values();
        let mappings: Vec<BTreeMap<String, String>> = vec![
            BTreeMap::new(),
            [("fbfJHSPpUQD".to_string(), "destElemnt1".to_string())]
                .into_iter()
                .collect(),
        ];
        let rule_sets = vec![
            vec![],
            vec![Resolution::skip(ResolutionKind::OrgUnit, UNITS[0])],
            vec![
                Resolution::skip(ResolutionKind::CategoryOptionCombo, COMBOS[1]),
                Resolution::map_to(ResolutionKind::OrgUnit, UNITS[2], "destUnit001"),
            ],
            vec![Resolution::skip(
                ResolutionKind::CategoryOptionCombo,
                "HllvX50cXC0",
            )],
        ];

        for mapping in &mappings {
            for rules in &rule_sets {
                let outcome = resolve(values.clone(), mapping, rules);
                assert_eq!(
                    outcome.resolved.len() + outcome.diverted.len() + outcome.skipped,
                    values.len()
                );
            }
        }
    }

    #[test]
    fn test_skip_rules_drop_and_count() {
        let values = sample_values();
        let rules = vec![Resolution::skip(ResolutionKind::OrgUnit, UNITS[0])];
        let outcome = resolve(values.clone(), &BTreeMap::new(), &rules);

        let expected_skipped = values.iter().filter(|v| v.org_unit == UNITS[0]).count();
        assert_eq!(outcome.skipped, expected_skipped);
        assert!(outcome.resolved.iter().all(|v| v.org_unit != UNITS[0]));
    }

    #[test]
    fn test_combo_rules_match_attribute_field() {
        let values = vec![ReportedValue::new("fbfJHSPpUQD", "202401", "DiszpKrYNg8", "5")
            .with_category_option_combo("Prlt0C1RF0s")
            .with_attribute_option_combo("oldAttrCmb1")];

        let rules = vec![Resolution::map_to(
            ResolutionKind::CategoryOptionCombo,
            "oldAttrCmb1",
            "newAttrCmb1",
        )];
        let outcome = resolve(values.clone(), &BTreeMap::new(), &rules);
        assert_eq!(
            outcome.resolved[0].attribute_option_combo.as_deref(),
            Some("newAttrCmb1")
        );
        assert_eq!(
            outcome.resolved[0].category_option_combo.as_deref(),
            Some("Prlt0C1RF0s")
        );

        let rules = vec![Resolution::skip(
            ResolutionKind::CategoryOptionCombo,
            "oldAttrCmb1",
        )];
        assert_eq!(resolve(values, &BTreeMap::new(), &rules).skipped, 1);
    }

    #[test]
    fn test_map_to_overwrites_matched_unit() {
        let values = vec![ReportedValue::new("fbfJHSPpUQD", "202401", "DiszpKrYNg8", "5")];
        let rules = vec![Resolution::map_to(
            ResolutionKind::OrgUnit,
            "DiszpKrYNg8",
            "destUnit001",
        )];
        let outcome = resolve(values, &BTreeMap::new(), &rules);
        assert_eq!(outcome.resolved[0].org_unit, "destUnit001");
        assert_eq!(outcome.resolved[0].value, "5");
    }

    #[test]
    fn test_unit_plan() {
        let index = ResolutionIndex::new(&[
            Resolution::skip(ResolutionKind::OrgUnit, "DiszpKrYNg8"),
            Resolution::map_to(ResolutionKind::OrgUnit, "g8upMTyEZGZ", "destUnit001"),
        ]);
        assert_eq!(index.unit_plan("DiszpKrYNg8"), UnitPlan::Skip);
        assert_eq!(
            index.unit_plan("g8upMTyEZGZ"),
            UnitPlan::MapTo("destUnit001".to_string())
        );
        assert_eq!(index.unit_plan("jNb63DIHuwU"), UnitPlan::Match);
    }

    #[test]
    fn test_localize_keeps_payload() {
        let mut values = vec![ReportedValue::new("fbfJHSPpUQD", "2024-01", "srcUnit0001", "7")];
        localize(&mut values, "202401", "destUnit001");
        assert_eq!(values[0].period, "202401");
        assert_eq!(values[0].org_unit, "destUnit001");
        assert_eq!(values[0].value, "7");
    }

    #[tokio::test]
    async fn test_match_by_id_then_name() {
        let destination = FakePlatform::new()
            .with_unit("DiszpKrYNg8", "Ngelehun CHC")
            .with_unit("destUnit002", "Njandama MCHP")
            .with_unit("destUnit003", "Njandama MCHP Annex");

        let by_id = match_org_unit(&destination, "DiszpKrYNg8", "Other name")
            .await
            .unwrap();
        assert_eq!(by_id.unwrap().id, "DiszpKrYNg8");

        let by_name = match_org_unit(&destination, "g8upMTyEZGZ", "njandama mchp")
            .await
            .unwrap();
        assert_eq!(by_name.unwrap().id, "destUnit002");

        let missing = match_org_unit(&destination, "jNb63DIHuwU", "Bumpe CHC")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_match_by_name_folds_non_ascii_case() {
        let destination = FakePlatform::new()
            .with_unit("destUnit004", "CLÍNICA SAN JOSÉ")
            .with_unit("destUnit005", "Centre de Santé Ségou");

        let clinic = match_org_unit(&destination, "srcUnit0001", "Clínica San José")
            .await
            .unwrap();
        assert_eq!(clinic.unwrap().id, "destUnit004");

        let centre = match_org_unit(&destination, "srcUnit0002", "  CENTRE DE SANTÉ SÉGOU ")
            .await
            .unwrap();
        assert_eq!(centre.unwrap().id, "destUnit005");
    }
}
