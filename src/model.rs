use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Complete,
    Blocked,
    Skipped,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::InProgress,
        Status::Complete,
        Status::Blocked,
        Status::Skipped,
    ];

    pub fn parse(s: &str) -> Result<Self, TaskError> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TaskError::InvalidStatus(s.to_string()))
    }

    /// Lenient parse for untrusted input: anything unrecognized becomes `Pending`.
    pub fn parse_or_pending(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Complete => "complete",
            Status::Blocked => "blocked",
            Status::Skipped => "skipped",
        }
    }

    /// Complete and skipped subtasks no longer count as outstanding work.
    pub fn is_finished(self) -> bool {
        matches!(self, Status::Complete | Status::Skipped)
    }

    /// Returns display icon: x=complete, *=in progress, !=blocked, -=skipped, .=pending
    pub fn icon(self) -> &'static str {
        match self {
            Status::Complete => "x",
            Status::InProgress => "*",
            Status::Blocked => "!",
            Status::Skipped => "-",
            Status::Pending => ".",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn parse(s: &str) -> Result<Self, TaskError> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(TaskError::InvalidPriority(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainTask {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub estimated_subtasks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl Subtask {
    pub fn new(id: &str, name: &str, description: &str, dependencies: Vec<String>) -> Self {
        Subtask {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            status: Status::Pending,
            dependencies,
            started_at: None,
            completed_at: None,
            files_modified: Vec::new(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub timestamp: Timestamp,
    pub decision: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub timestamp: Timestamp,
    pub blocker: String,
    #[serde(default)]
    pub resolved: bool,
}

/// Free-form session notes kept alongside the task graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub key_decisions: Vec<Decision>,
    #[serde(default)]
    pub blockers_encountered: Vec<Blocker>,
}
