//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for task ids, DHIS2 UIDs and
//! reporting periods. Each type validates its format on construction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Transfer task identifier
///
/// A random UUID assigned when a transfer is submitted.
///
/// # Examples
///
/// ```
/// use dhis2sync::domain::ids::TaskId;
/// use std::str::FromStr;
///
/// let id = TaskId::from_str("7d44b88c-4199-4bad-97dc-d78268e01398").unwrap();
/// assert_eq!(id.as_str(), "7d44b88c-4199-4bad-97dc-d78268e01398");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh task id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a TaskId from an existing string
    ///
    /// # Returns
    ///
    /// Returns `Ok(TaskId)` if the id is non-empty, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Task ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the task id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// DHIS2 object identifier
///
/// DHIS2 UIDs are exactly 11 alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(String);

impl Uid {
    /// Creates a Uid, validating its format
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if !Self::is_valid(&id) {
            return Err(format!(
                "Invalid UID '{id}': expected 11 alphanumeric characters"
            ));
        }
        Ok(Self(id))
    }

    /// Checks the UID format without allocating
    pub fn is_valid(id: &str) -> bool {
        id.len() == 11 && id.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Returns the UID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reporting period granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

fn period_patterns() -> &'static [(PeriodType, Regex)] {
    static PATTERNS: OnceLock<Vec<(PeriodType, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (PeriodType::Daily, r"^\d{4}(0[1-9]|1[0-2])(0[1-9]|[12]\d|3[01])$"),
            (PeriodType::Weekly, r"^\d{4}W([1-9]|[1-4]\d|5[0-3])$"),
            (PeriodType::Monthly, r"^\d{4}(0[1-9]|1[0-2])$"),
            (PeriodType::Quarterly, r"^\d{4}Q[1-4]$"),
            (PeriodType::Yearly, r"^\d{4}$"),
        ]
        .into_iter()
        .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
        .collect()
    })
}

/// Reporting period in DHIS2 ISO notation
///
/// # Examples
///
/// ```
/// use dhis2sync::domain::ids::{Period, PeriodType};
///
/// let period = Period::new("2024Q1").unwrap();
/// assert_eq!(period.period_type(), PeriodType::Quarterly);
/// assert!(Period::new("2024-01").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period(String);

impl Period {
    /// Creates a Period, trimming whitespace and validating the notation
    pub fn new(period: impl Into<String>) -> Result<Self, String> {
        let period = period.into().trim().to_string();
        if Self::classify(&period).is_none() {
            return Err(format!(
                "Invalid period '{period}': expected YYYYMMDD, YYYYWn, YYYYMM, YYYYQn or YYYY"
            ));
        }
        Ok(Self(period))
    }

    fn classify(period: &str) -> Option<PeriodType> {
        period_patterns()
            .iter()
            .find(|(_, re)| re.is_match(period))
            .map(|(kind, _)| *kind)
    }

    /// Returns the granularity of this period
    pub fn period_type(&self) -> PeriodType {
        Self::classify(&self.0).unwrap_or(PeriodType::Yearly)
    }

    /// Returns the period as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_task_id_generate_is_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_task_id_empty() {
        assert!(TaskId::new("").is_err());
        assert!(TaskId::new("   ").is_err());
    }

    #[test_case("ImspTQPwCqd", true ; "valid uid")]
    #[test_case("ImspTQPwCq", false ; "too short")]
    #[test_case("ImspTQPwCqdX", false ; "too long")]
    #[test_case("Imsp-QPwCqd", false ; "punctuation")]
    #[test_case("", false ; "empty")]
    fn test_uid_validation(input: &str, expected: bool) {
        assert_eq!(Uid::is_valid(input), expected);
        assert_eq!(Uid::new(input).is_ok(), expected);
    }

    #[test_case("20240131", PeriodType::Daily)]
    #[test_case("2024W7", PeriodType::Weekly)]
    #[test_case("2024W52", PeriodType::Weekly)]
    #[test_case("202401", PeriodType::Monthly)]
    #[test_case("2024Q3", PeriodType::Quarterly)]
    #[test_case("2024", PeriodType::Yearly)]
    fn test_period_types(input: &str, expected: PeriodType) {
        assert_eq!(Period::new(input).unwrap().period_type(), expected);
    }

    #[test_case("2024-01" ; "dashed month")]
    #[test_case("202413" ; "month out of range")]
    #[test_case("2024Q5" ; "quarter out of range")]
    #[test_case("24" ; "short year")]
    #[test_case("" ; "empty")]
    fn test_period_rejects(input: &str) {
        assert!(Period::new(input).is_err());
    }

    #[test]
    fn test_period_trims_whitespace() {
        assert_eq!(Period::new(" 202401 ").unwrap().as_str(), "202401");
    }
}
