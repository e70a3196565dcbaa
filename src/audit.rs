//! Append-only record of every task graph mutation.
//!
//! Entries exist for observability only; nothing replays them. The log is
//! never truncated except by a full reset of the owning `TaskProgress`.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{Status, Timestamp};

/// Task id used for entries that concern the main task.
pub const MAIN_TASK_ID: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    StatusChange,
    Updated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::StatusChange => "status_change",
            AuditAction::Updated => "updated",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub task_id: String,
    pub action: AuditAction,
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<Status>,
    #[serde(rename = "to", default, skip_serializing_if = "Option::is_none")]
    pub to_status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog(Vec<AuditEntry>);

impl AuditLog {
    pub fn new() -> Self {
        AuditLog(Vec::new())
    }

    /// Append an entry stamped with the current time.
    pub fn record(
        &mut self,
        task_id: &str,
        action: AuditAction,
        from_status: Option<Status>,
        to_status: Option<Status>,
        details: Option<String>,
    ) {
        self.0.push(AuditEntry {
            timestamp: Utc::now(),
            task_id: task_id.to_string(),
            action,
            from_status,
            to_status,
            details,
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuditEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a AuditLog {
    type Item = &'a AuditEntry;
    type IntoIter = std::slice::Iter<'a, AuditEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
