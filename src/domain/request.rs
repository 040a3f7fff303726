//! Transfer requests and user-declared resolutions

use crate::domain::ids::{Period, Uid};
use crate::domain::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Upper bound on requested periods
pub const MAX_PERIODS: usize = 100;

/// Upper bound on an explicit unit list
pub const MAX_EXPLICIT_ORG_UNITS: usize = 1000;

/// Upper bound on element mapping entries
pub const MAX_ELEMENT_MAPPINGS: usize = 10_000;

/// How the transfer picks the organisation units to copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgUnitSelection {
    /// Every unit with data under any root assigned to the user
    All,
    /// Only the ids listed in the request
    #[serde(alias = "selected")]
    ExplicitList,
    /// Units with data under the user's top-level root
    #[default]
    Discovered,
}

impl fmt::Display for OrgUnitSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrgUnitSelection::All => "all",
            OrgUnitSelection::ExplicitList => "explicit_list",
            OrgUnitSelection::Discovered => "discovered",
        };
        write!(f, "{name}")
    }
}

/// Which identifier field a resolution targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    OrgUnit,
    /// Matches both the category and the attribute option combo fields
    CategoryOptionCombo,
}

/// What to do with values matching a resolution
///
/// Serialized as `"skip"` or `"map:<destination id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResolutionAction {
    Skip,
    MapTo(String),
}

impl FromStr for ResolutionAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("skip") {
            return Ok(ResolutionAction::Skip);
        }
        match s.strip_prefix("map:") {
            Some(target) if !target.trim().is_empty() => {
                Ok(ResolutionAction::MapTo(target.trim().to_string()))
            }
            Some(_) => Err("map action requires a destination id".to_string()),
            None => Err(format!(
                "Invalid resolution action '{s}'. Must be 'skip' or 'map:<id>'"
            )),
        }
    }
}

impl TryFrom<String> for ResolutionAction {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResolutionAction> for String {
    fn from(action: ResolutionAction) -> Self {
        action.to_string()
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionAction::Skip => write!(f, "skip"),
            ResolutionAction::MapTo(target) => write!(f, "map:{target}"),
        }
    }
}

/// User-supplied override for an identifier the engine cannot resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub kind: ResolutionKind,

    /// Source id the rule applies to
    pub source_id: String,

    pub action: ResolutionAction,
}

impl Resolution {
    pub fn skip(kind: ResolutionKind, source_id: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
            action: ResolutionAction::Skip,
        }
    }

    pub fn map_to(
        kind: ResolutionKind,
        source_id: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
            action: ResolutionAction::MapTo(target.into()),
        }
    }
}

/// A bulk transfer of one dataset over a set of periods
///
/// Requests are immutable once submitted; the service keeps them behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Connection profile holding the source and destination instances
    pub profile_id: String,

    pub source_dataset: String,

    /// Defaults to the source dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_dataset: Option<String>,

    pub periods: Vec<String>,

    #[serde(default)]
    pub org_unit_selection: OrgUnitSelection,

    /// Required when `org_unit_selection` is `explicit_list`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub org_unit_ids: Vec<String>,

    /// Source element id -> destination element id; empty means identity
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub element_mapping: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolutions: Vec<Resolution>,

    /// Register completeness for every imported (unit, period) pair
    #[serde(default)]
    pub mark_complete: bool,

    /// Restricts the source fetch to one attribute option combo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_option_combo: Option<String>,
}

impl TransferRequest {
    /// Creates a request with discovery selection and no mapping
    pub fn new(
        profile_id: impl Into<String>,
        source_dataset: impl Into<String>,
        periods: Vec<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            source_dataset: source_dataset.into(),
            destination_dataset: None,
            periods,
            org_unit_selection: OrgUnitSelection::default(),
            org_unit_ids: Vec::new(),
            element_mapping: BTreeMap::new(),
            resolutions: Vec::new(),
            mark_complete: false,
            attribute_option_combo: None,
        }
    }

    /// Destination dataset id, falling back to the source dataset
    pub fn destination_dataset_id(&self) -> &str {
        self.destination_dataset
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(&self.source_dataset)
    }

    /// Distinct periods with surrounding whitespace removed, in request order
    pub fn normalized_periods(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.periods
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// Validates the request before a task is created
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.profile_id.trim().is_empty() {
            return Err(invalid("profile_id is required"));
        }

        Uid::new(&self.source_dataset).map_err(|e| invalid(format!("source_dataset: {e}")))?;
        if let Some(dest) = self.destination_dataset.as_deref() {
            if !dest.trim().is_empty() {
                Uid::new(dest).map_err(|e| invalid(format!("destination_dataset: {e}")))?;
            }
        }

        if self.periods.is_empty() {
            return Err(invalid("at least one period is required"));
        }
        if self.periods.len() > MAX_PERIODS {
            return Err(invalid(format!(
                "too many periods: {} (maximum {MAX_PERIODS})",
                self.periods.len()
            )));
        }
        for period in &self.periods {
            Period::new(period.as_str()).map_err(invalid)?;
        }

        if self.org_unit_selection == OrgUnitSelection::ExplicitList {
            if self.org_unit_ids.is_empty() {
                return Err(invalid(
                    "org_unit_ids is required when org_unit_selection is explicit_list",
                ));
            }
            if self.org_unit_ids.len() > MAX_EXPLICIT_ORG_UNITS {
                return Err(invalid(format!(
                    "too many org units: {} (maximum {MAX_EXPLICIT_ORG_UNITS})",
                    self.org_unit_ids.len()
                )));
            }
            for id in &self.org_unit_ids {
                Uid::new(id).map_err(|e| invalid(format!("org_unit_ids: {e}")))?;
            }
        }

        if self.element_mapping.len() > MAX_ELEMENT_MAPPINGS {
            return Err(invalid(format!(
                "too many element mappings: {} (maximum {MAX_ELEMENT_MAPPINGS})",
                self.element_mapping.len()
            )));
        }
        if let Some((source, _)) = self
            .element_mapping
            .iter()
            .find(|(source, target)| source.trim().is_empty() || target.trim().is_empty())
        {
            return Err(invalid(format!(
                "element mapping entry '{source}' has an empty id"
            )));
        }

        for resolution in &self.resolutions {
            if resolution.source_id.trim().is_empty() {
                return Err(invalid("resolution source_id cannot be empty"));
            }
            if let ResolutionAction::MapTo(target) = &resolution.action {
                if target.trim().is_empty() {
                    return Err(invalid(format!(
                        "resolution for '{}' maps to an empty id",
                        resolution.source_id
                    )));
                }
            }
        }

        if let Some(aoc) = self.attribute_option_combo.as_deref() {
            Uid::new(aoc).map_err(|e| invalid(format!("attribute_option_combo: {e}")))?;
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SyncError {
    SyncError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransferRequest {
        TransferRequest::new("default", "BfMAe6Itzgt", vec!["202401".to_string()])
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_destination_dataset_defaults_to_source() {
        let mut req = request();
        assert_eq!(req.destination_dataset_id(), "BfMAe6Itzgt");
        req.destination_dataset = Some("QX4ZTUbOt3a".to_string());
        assert_eq!(req.destination_dataset_id(), "QX4ZTUbOt3a");
    }

    #[test]
    fn test_rejects_bad_dataset() {
        let mut req = request();
        req.source_dataset = "bad".to_string();
        assert!(matches!(req.validate(), Err(SyncError::Validation(_))));
    }

    #[test]
    fn test_rejects_period_count() {
        let mut req = request();
        req.periods.clear();
        assert!(req.validate().is_err());

        req.periods = (0..101).map(|_| "2024".to_string()).collect();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_normalized_periods_drop_duplicates_in_order() {
        let mut req = request();
        req.periods = vec![
            "202402".to_string(),
            " 202401".to_string(),
            "202402 ".to_string(),
            "202401".to_string(),
        ];
        assert!(req.validate().is_ok());
        assert_eq!(req.normalized_periods(), vec!["202402", "202401"]);
    }

    #[test]
    fn test_rejects_bad_period() {
        let mut req = request();
        req.periods.push("January".to_string());
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("January"));
    }

    #[test]
    fn test_explicit_list_requires_ids() {
        let mut req = request();
        req.org_unit_selection = OrgUnitSelection::ExplicitList;
        assert!(req.validate().is_err());

        req.org_unit_ids = vec!["DiszpKrYNg8".to_string()];
        assert!(req.validate().is_ok());

        req.org_unit_ids.push("nope".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_mapping_target() {
        let mut req = request();
        req.element_mapping
            .insert("fbfJHSPpUQD".to_string(), " ".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_resolution_action_parsing() {
        assert_eq!(
            "skip".parse::<ResolutionAction>().unwrap(),
            ResolutionAction::Skip
        );
        assert_eq!(
            "map:DiszpKrYNg8".parse::<ResolutionAction>().unwrap(),
            ResolutionAction::MapTo("DiszpKrYNg8".to_string())
        );
        assert!("map:".parse::<ResolutionAction>().is_err());
        assert!("delete".parse::<ResolutionAction>().is_err());
    }

    #[test]
    fn test_request_from_toml() {
        let toml_content = r#"
profile_id = "national"
source_dataset = "BfMAe6Itzgt"
periods = ["202401", "202402"]
org_unit_selection = "selected"
org_unit_ids = ["DiszpKrYNg8"]
mark_complete = true

[element_mapping]
fbfJHSPpUQD = "cYeuwXTCPkU"

[[resolutions]]
kind = "category_option_combo"
source_id = "Prlt0C1RF0s"
action = "map:HllvX50cXC0"

[[resolutions]]
kind = "org_unit"
source_id = "Jtf34kNZhzP"
action = "skip"
"#;
        let req: TransferRequest = toml::from_str(toml_content).unwrap();
        assert_eq!(req.org_unit_selection, OrgUnitSelection::ExplicitList);
        assert_eq!(req.resolutions.len(), 2);
        assert_eq!(
            req.resolutions[0].action,
            ResolutionAction::MapTo("HllvX50cXC0".to_string())
        );
        assert_eq!(req.resolutions[1].kind, ResolutionKind::OrgUnit);
        assert!(req.validate().is_ok());
    }
}
