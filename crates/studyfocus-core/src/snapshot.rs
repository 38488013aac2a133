//! Render-ready view of the controller at one instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notify::{Notification, NotificationCenter};
use crate::session::{SessionContext, SessionKind};
use crate::timer::{PomodoroPhase, SessionState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSnapshot {
    pub phase: PomodoroPhase,
    pub count: u8,
    pub remaining_seconds: u64,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: String,
    pub session_id: Option<i64>,
    pub kind: Option<SessionKind>,
    pub focus: Option<String>,
    pub task_title: Option<String>,
    pub subject: Option<String>,
    pub remaining_seconds: u64,
    pub display: String,
    pub total_seconds: u64,
    pub progress_percent: f64,
    pub elapsed_active_minutes: u64,
    pub pause_count: u32,
    pub paused_seconds: u64,
    pub pomodoro: Option<PomodoroSnapshot>,
    pub stop_armed: bool,
    pub pending_navigation: Option<String>,
    pub encouragement: Option<String>,
    pub notifications: Vec<Notification>,
    pub at: DateTime<Utc>,
}

impl Snapshot {
    pub(crate) fn capture(
        state: &SessionState,
        context: &SessionContext,
        stop_armed: bool,
        pending_navigation: Option<&str>,
        encouragement: Option<&str>,
        notifications: &NotificationCenter,
        now: DateTime<Utc>,
    ) -> Self {
        let active = state.active();
        let remaining_seconds = active.map(|a| a.remaining_seconds()).unwrap_or(0);
        Self {
            state: state.name().to_string(),
            session_id: active.map(|a| a.session_id()),
            kind: active.map(|a| a.kind()),
            focus: active.map(|a| a.record().focus.clone()),
            task_title: context.task.as_ref().map(|t| t.title.clone()),
            subject: context.subject.as_ref().map(|s| s.name.clone()),
            remaining_seconds,
            display: format_clock(remaining_seconds),
            total_seconds: active.map(|a| a.total_seconds()).unwrap_or(0),
            progress_percent: active.map(|a| a.progress_percent()).unwrap_or(0.0),
            elapsed_active_minutes: state.elapsed_active_minutes(now).unwrap_or(0),
            pause_count: active.map(|a| a.pause_count()).unwrap_or(0),
            paused_seconds: active.map(|a| a.paused_ms() / 1000).unwrap_or(0),
            pomodoro: active.and_then(|a| a.pomodoro()).map(|c| PomodoroSnapshot {
                phase: c.phase(),
                count: c.count(),
                remaining_seconds: c.remaining_seconds(),
                display: format_clock(c.remaining_seconds()),
            }),
            stop_armed,
            pending_navigation: pending_navigation.map(str::to_string),
            encouragement: encouragement.map(str::to_string),
            notifications: notifications.items().to_vec(),
            at: now,
        }
    }
}

/// `mm:ss`, or `h:mm:ss` from one hour up.
pub fn format_clock(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(40 * 60), "40:00");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(3600 + 65), "1:01:05");
    }

    #[test]
    fn idle_snapshot_is_empty() {
        let snap = Snapshot::capture(
            &SessionState::Idle,
            &SessionContext::default(),
            false,
            None,
            None,
            &NotificationCenter::new(),
            Utc::now(),
        );
        assert_eq!(snap.state, "idle");
        assert_eq!(snap.session_id, None);
        assert_eq!(snap.display, "00:00");
        assert!(snap.pomodoro.is_none());
    }
}
