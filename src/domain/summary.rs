//! Import summaries
//!
//! Per-job summaries come back from the destination; the transfer keeps one
//! aggregate across every chunk with a bounded conflict list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conflicts kept verbatim on an aggregate summary
pub const MAX_REPORTED_CONFLICTS: usize = 10;

/// Import counters as reported by DHIS2
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCount {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default)]
    pub deleted: u64,
}

impl ImportCount {
    pub fn new(imported: u64, updated: u64, ignored: u64, deleted: u64) -> Self {
        Self {
            imported,
            updated,
            ignored,
            deleted,
        }
    }

    /// Values the destination accepted (new or changed)
    pub fn accepted(&self) -> u64 {
        self.imported + self.updated
    }

    pub fn total(&self) -> u64 {
        self.imported + self.updated + self.ignored + self.deleted
    }

    /// Adds another count into this one
    pub fn add(&mut self, other: &ImportCount) {
        self.imported += other.imported;
        self.updated += other.updated;
        self.ignored += other.ignored;
        self.deleted += other.deleted;
    }
}

/// A single rejected object reported by the destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(default)]
    pub object: String,

    /// Human-readable message
    #[serde(default, alias = "message")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} ({code}): {}", self.object, self.value),
            None => write!(f, "{}: {}", self.object, self.value),
        }
    }
}

/// Outcome of one import job, or the aggregate of many
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// SUCCESS, WARNING or ERROR
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub import_count: ImportCount,

    #[serde(default)]
    pub conflicts: Vec<Conflict>,

    /// Conflicts beyond the reported list
    #[serde(default, skip_serializing_if = "is_zero")]
    pub more_conflicts: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl ImportSummary {
    /// Creates a successful summary from counts alone
    pub fn from_counts(import_count: ImportCount) -> Self {
        Self {
            status: "SUCCESS".to_string(),
            description: String::new(),
            import_count,
            conflicts: Vec::new(),
            more_conflicts: 0,
        }
    }

    /// Sums chunk summaries, keeping the first ten conflicts
    ///
    /// # Example
    ///
    /// ```
    /// use dhis2sync::domain::summary::{ImportCount, ImportSummary};
    ///
    /// let chunks = vec![
    ///     ImportSummary::from_counts(ImportCount::new(5, 1, 0, 0)),
    ///     ImportSummary::from_counts(ImportCount::new(2, 0, 3, 0)),
    /// ];
    /// let total = ImportSummary::aggregate(&chunks);
    /// assert_eq!(total.import_count, ImportCount::new(7, 1, 3, 0));
    /// ```
    pub fn aggregate(summaries: &[ImportSummary]) -> Self {
        let mut total = ImportSummary::from_counts(ImportCount::default());
        let mut conflict_count = 0usize;

        for summary in summaries {
            total.import_count.add(&summary.import_count);
            conflict_count += summary.conflicts.len() + summary.more_conflicts;
            for conflict in &summary.conflicts {
                if total.conflicts.len() < MAX_REPORTED_CONFLICTS {
                    total.conflicts.push(conflict.clone());
                }
            }
            if summary.status == "ERROR" {
                total.status = "ERROR".to_string();
            } else if summary.status == "WARNING" && total.status != "ERROR" {
                total.status = "WARNING".to_string();
            }
        }

        total.more_conflicts = conflict_count.saturating_sub(total.conflicts.len());
        total
    }

    /// Conflict lines for the message log, with an "N more" marker
    pub fn conflict_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.conflicts.iter().map(|c| c.to_string()).collect();
        if self.more_conflicts > 0 {
            lines.push(format!("... and {} more conflicts", self.more_conflicts));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(n: usize) -> Conflict {
        Conflict {
            object: format!("obj{n}"),
            value: "Value is not numeric".to_string(),
            error_code: Some("E7619".to_string()),
        }
    }

    #[test]
    fn test_aggregate_sums_counts() {
        let a = ImportSummary::from_counts(ImportCount::new(1, 2, 3, 4));
        let b = ImportSummary::from_counts(ImportCount::new(10, 20, 30, 40));
        let total = ImportSummary::aggregate(&[a, b]);
        assert_eq!(total.import_count, ImportCount::new(11, 22, 33, 44));
        assert_eq!(total.status, "SUCCESS");
        assert_eq!(total.import_count.total(), 110);
    }

    #[test]
    fn test_aggregate_caps_conflicts() {
        let mut a = ImportSummary::from_counts(ImportCount::default());
        a.status = "WARNING".to_string();
        a.conflicts = (0..8).map(conflict).collect();
        let mut b = ImportSummary::from_counts(ImportCount::default());
        b.conflicts = (8..15).map(conflict).collect();

        let total = ImportSummary::aggregate(&[a, b]);
        assert_eq!(total.conflicts.len(), MAX_REPORTED_CONFLICTS);
        assert_eq!(total.more_conflicts, 5);
        assert_eq!(total.status, "WARNING");

        let lines = total.conflict_lines();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[10], "... and 5 more conflicts");
    }

    #[test]
    fn test_conflict_accepts_message_alias() {
        let json = r#"{"object": "fbfJHSPpUQD", "message": "Data element not found"}"#;
        let conflict: Conflict = serde_json::from_str(json).unwrap();
        assert_eq!(conflict.value, "Data element not found");
        assert_eq!(conflict.error_code, None);
    }
}
