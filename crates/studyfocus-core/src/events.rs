use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionKind;
use crate::timer::{PomodoroPhase, TerminalAction};

/// Every state change in the focus timer produces an Event.
/// Hosts render from them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: i64,
        kind: SessionKind,
        total_secs: u64,
        at: DateTime<Utc>,
    },
    SessionPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionExtended {
        minutes: u32,
        planned_end: DateTime<Utc>,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero. Emitted once per session.
    SessionCompleted {
        session_id: i64,
        at: DateTime<Utc>,
    },
    /// The session left the live states and is waiting for resolution.
    SessionTerminated {
        session_id: i64,
        action: TerminalAction,
        elapsed_minutes: u64,
        at: DateTime<Utc>,
    },
    /// Remote writes were issued and the local timer was discarded.
    SessionResolved {
        session_id: i64,
        kind: SessionKind,
        action: TerminalAction,
        elapsed_minutes: u64,
        started_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    StopArmed {
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    StopDisarmed {
        at: DateTime<Utc>,
    },
    PomodoroEnabled {
        work_secs: u64,
        at: DateTime<Utc>,
    },
    PomodoroDisabled {
        at: DateTime<Utc>,
    },
    PomodoroPhaseChanged {
        from: PomodoroPhase,
        to: PomodoroPhase,
        count: u8,
        at: DateTime<Utc>,
    },
    /// The fourth break ended; the cycle holds until re-toggled.
    PomodoroCycleFinished {
        count: u8,
        at: DateTime<Utc>,
    },
    NavigationPending {
        target: String,
        at: DateTime<Utc>,
    },
    NavigationCommitted {
        target: String,
        at: DateTime<Utc>,
    },
    NavigationCancelled {
        target: String,
        at: DateTime<Utc>,
    },
    UnloadIntercepted {
        at: DateTime<Utc>,
    },
    UnloadSurvived {
        at: DateTime<Utc>,
    },
    EncouragementRequested {
        milestone: u8,
        at: DateTime<Utc>,
    },
    EncouragementShown {
        milestone: u8,
        message: String,
        until: DateTime<Utc>,
    },
    EncouragementCleared {
        at: DateTime<Utc>,
    },
    SubtaskToggled {
        task_id: i64,
        subtask_id: i64,
        done: bool,
        at: DateTime<Utc>,
    },
    RemoteWriteFailed {
        notification_id: Uuid,
        message: String,
        at: DateTime<Utc>,
    },
}
