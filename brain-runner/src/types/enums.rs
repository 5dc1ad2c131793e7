use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted lifecycle status of an entry in the notebook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    #[default]
    Pending,
    Active,
    InProgress,
    Blocked,
    Cancelled,
    Completed,
    Validated,
    Superseded,
    Archived,
}

impl EntryStatus {
    /// Terminal statuses count as satisfied dependencies.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed
                | EntryStatus::Validated
                | EntryStatus::Cancelled
                | EntryStatus::Superseded
                | EntryStatus::Archived
        )
    }

    /// Live statuses are unsatisfied but still expected to make progress.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            EntryStatus::Pending | EntryStatus::Active | EntryStatus::InProgress | EntryStatus::Blocked
        )
    }

    /// Sort key used when ordering a resolved graph: running work first,
    /// dispatchable next, terminal last.
    pub fn order(&self) -> u8 {
        match self {
            EntryStatus::InProgress => 0,
            EntryStatus::Active => 1,
            EntryStatus::Pending => 2,
            EntryStatus::Blocked => 3,
            EntryStatus::Draft => 4,
            EntryStatus::Completed => 5,
            EntryStatus::Validated => 6,
            EntryStatus::Cancelled => 7,
            EntryStatus::Superseded => 8,
            EntryStatus::Archived => 9,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Pending => "pending",
            EntryStatus::Active => "active",
            EntryStatus::InProgress => "in_progress",
            EntryStatus::Blocked => "blocked",
            EntryStatus::Cancelled => "cancelled",
            EntryStatus::Completed => "completed",
            EntryStatus::Validated => "validated",
            EntryStatus::Superseded => "superseded",
            EntryStatus::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(EntryStatus::Draft),
            "pending" => Ok(EntryStatus::Pending),
            "active" => Ok(EntryStatus::Active),
            "in_progress" | "in-progress" => Ok(EntryStatus::InProgress),
            "blocked" => Ok(EntryStatus::Blocked),
            "cancelled" => Ok(EntryStatus::Cancelled),
            "completed" => Ok(EntryStatus::Completed),
            "validated" => Ok(EntryStatus::Validated),
            "superseded" => Ok(EntryStatus::Superseded),
            "archived" => Ok(EntryStatus::Archived),
            _ => Err(format!(
                "Unknown status: '{s}'. Expected one of: draft, pending, active, in_progress, \
                 blocked, cancelled, completed, validated, superseded, archived"
            )),
        }
    }
}

/// Dispatch priority of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: '{s}'. Expected: high, medium, low")),
        }
    }
}

/// Scheduling classification derived by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// All dependencies satisfied, eligible for dispatch.
    Ready,
    /// Waiting for a live dependency to finish.
    Waiting,
    /// Needs external intervention (cycle, blocked dep, missing workdir, user-set).
    Blocked,
    /// Terminal status, not a scheduling candidate.
    Completed,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ready => write!(f, "ready"),
            Classification::Waiting => write!(f, "waiting"),
            Classification::Blocked => write!(f, "blocked"),
            Classification::Completed => write!(f, "completed"),
        }
    }
}

/// Final outcome of a supervised child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Blocked { reason: String },
    Cancelled,
}

impl Outcome {
    /// The entry status this outcome persists.
    pub fn status(&self) -> EntryStatus {
        match self {
            Outcome::Completed => EntryStatus::Completed,
            Outcome::Blocked { .. } => EntryStatus::Blocked,
            Outcome::Cancelled => EntryStatus::Cancelled,
        }
    }
}

/// Severity attached to streamed log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}
