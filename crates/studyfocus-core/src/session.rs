//! Snapshots of the planner's sessions, tasks and subjects, plus the partial
//! updates this crate sends back.
//!
//! Records are owned by remote collaborators. The timer reads them when a
//! session starts and only ever writes back through [`SessionPatch`] and
//! [`TaskPatch`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    InProgress,
    Completed,
    Partial,
    Skipped,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Planned => "planned",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Partial => "partial",
            SessionStatus::Skipped => "skipped",
        }
    }
}

/// Whether a session exists remotely.
///
/// Scheduled sessions carry a positive persisted id; anything else was
/// started on the spot and has no remote session row to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    AdHoc,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub subject_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub focus: String,
}

impl SessionRecord {
    /// Build the local record for a quick-start session of `minutes` length.
    pub fn ad_hoc(task_id: Option<i64>, focus: &str, minutes: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            task_id,
            subject_id: None,
            start_time: now,
            end_time: now + Duration::minutes(i64::from(minutes)),
            status: SessionStatus::InProgress,
            focus: focus.to_string(),
        }
    }

    pub fn kind(&self) -> SessionKind {
        if self.id > 0 {
            SessionKind::Scheduled
        } else {
            SessionKind::AdHoc
        }
    }

    /// Planned span in milliseconds (`end_time - start_time`).
    pub fn planned_ms(&self) -> u64 {
        (self.end_time - self.start_time).num_milliseconds().max(0) as u64
    }

    /// # Errors
    /// Returns [`ValidationError::InvalidTimeRange`] unless `start_time < end_time`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_time >= self.end_time {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub timer_minutes_spent: u32,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// Read-only snapshots bound to a session while it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub task: Option<Task>,
    #[serde(default)]
    pub subject: Option<Subject>,
}

impl SessionContext {
    pub fn with_task(task: Task) -> Self {
        Self {
            task: Some(task),
            subject: None,
        }
    }

    pub fn task_title(&self) -> &str {
        self.task.as_ref().map(|t| t.title.as_str()).unwrap_or("")
    }
}

/// Partial update for a remote session. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Partial update for a remote task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_minutes_spent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
}
