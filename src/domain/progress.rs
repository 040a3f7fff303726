//! Transfer progress and its state machine
//!
//! [`TransferStatus`] is a closed set with an explicit transition table;
//! the progress repository checks every status change against it.

use crate::domain::ids::TaskId;
use crate::domain::summary::ImportSummary;
use crate::domain::value::ReportedValue;
use crate::domain::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Message log entries kept per task; older lines are discarded
pub const MAX_LOG_MESSAGES: usize = 500;

/// Lifecycle status of a transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Starting,
    Running,
    AwaitingUserDecision,
    Completed,
    Error,
    Cancelled,
}

impl TransferStatus {
    /// Whether the status can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Error | TransferStatus::Cancelled
        )
    }

    /// Transition table
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Error)
                | (Running, Running)
                | (Running, AwaitingUserDecision)
                | (Running, Completed)
                | (Running, Error)
                | (AwaitingUserDecision, Completed)
                | (AwaitingUserDecision, Cancelled)
                | (AwaitingUserDecision, Running)
        )
    }

    /// Validates a transition, returning the error the repository raises
    pub fn check_transition(&self, next: TransferStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SyncError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Starting => "starting",
            TransferStatus::Running => "running",
            TransferStatus::AwaitingUserDecision => "awaiting_user_decision",
            TransferStatus::Completed => "completed",
            TransferStatus::Error => "error",
            TransferStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "starting" => Ok(TransferStatus::Starting),
            "running" => Ok(TransferStatus::Running),
            "awaiting_user_decision" => Ok(TransferStatus::AwaitingUserDecision),
            "completed" => Ok(TransferStatus::Completed),
            "error" => Ok(TransferStatus::Error),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(format!("Unknown transfer status: {other}")),
        }
    }
}

/// Live record of one transfer task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub task_id: TaskId,

    pub status: TransferStatus,

    /// Percent complete, 0..=100
    pub progress: u8,

    /// Most recent log lines, oldest first
    pub messages: VecDeque<String>,

    /// Log lines appended over the task's lifetime, including discarded ones
    #[serde(default)]
    pub messages_logged: u64,

    #[serde(default)]
    pub total_fetched: u64,

    /// Values that survived mapping and resolutions
    #[serde(default)]
    pub total_mapped: u64,

    /// Values the destination accepted (new plus updated)
    #[serde(default)]
    pub total_imported: u64,

    /// Values dropped by skip resolutions
    #[serde(default)]
    pub total_skipped: u64,

    /// Values excluded because their unit has no destination match
    #[serde(default)]
    pub not_found_values: u64,

    /// Source units handled across all periods
    #[serde(default)]
    pub units_processed: u64,

    /// Display names of units with no destination match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_found_units: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_summary: Option<ImportSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Diverted values keyed by "source unit id:period"
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unmapped_values: BTreeMap<String, Vec<ReportedValue>>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransferProgress {
    /// Creates the initial record for a freshly submitted task
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: TransferStatus::Starting,
            progress: 0,
            messages: VecDeque::new(),
            messages_logged: 0,
            total_fetched: 0,
            total_mapped: 0,
            total_imported: 0,
            total_skipped: 0,
            not_found_values: 0,
            units_processed: 0,
            not_found_units: Vec::new(),
            import_summary: None,
            error: None,
            unmapped_values: BTreeMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Appends a log line, discarding the oldest beyond the bound
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push_back(message.into());
        self.messages_logged += 1;
        while self.messages.len() > MAX_LOG_MESSAGES {
            self.messages.pop_front();
        }
    }

    /// Retained log lines appended after the first `seen` of the lifetime
    pub fn messages_since(&self, seen: u64) -> impl Iterator<Item = &String> {
        let unseen = self.messages_logged.saturating_sub(seen);
        let unseen = usize::try_from(unseen).unwrap_or(usize::MAX).min(self.messages.len());
        self.messages.iter().skip(self.messages.len() - unseen)
    }

    pub fn last_message(&self) -> Option<&str> {
        self.messages.back().map(String::as_str)
    }

    /// Total number of diverted values across all keys
    pub fn unmapped_count(&self) -> usize {
        self.unmapped_values.values().map(Vec::len).sum()
    }

    /// Distinct source element ids among the diverted values
    pub fn unmapped_elements(&self) -> Vec<String> {
        let mut elements: Vec<String> = self
            .unmapped_values
            .values()
            .flatten()
            .map(|v| v.data_element.clone())
            .collect();
        elements.sort();
        elements.dedup();
        elements
    }
}
