//! Completion resolver: turns a terminal session into the remote writes it
//! owes, and the two-step confirmation that guards manual stops.
//!
//! | kind      | auto-complete       | stop                                  | skip            |
//! |-----------|---------------------|---------------------------------------|-----------------|
//! | scheduled | status=completed    | status=partial, start/end = worked    | status=skipped  |
//! | ad-hoc    | task minutes += n   | task minutes += n                     | nothing         |
//!
//! Planning is pure; the controller executes the result and always discards
//! the timer afterwards, whatever the remote side says.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::{SessionKind, SessionPatch, SessionStatus, Task, TaskPatch};
use crate::timer::{TerminalAction, TerminalSession};

/// Remote writes owed by one terminal session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub session_id: i64,
    pub kind: SessionKind,
    pub action: TerminalAction,
    pub elapsed_minutes: u64,
    pub session_update: Option<SessionPatch>,
    pub task_update: Option<(i64, TaskPatch)>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.session_update.is_none() && self.task_update.is_none()
    }
}

/// Work out what the remote side should learn about a finished session.
///
/// `task` is the snapshot bound when the session started; ad-hoc accrual
/// needs its current `timer_minutes_spent` to write the new total.
pub fn plan(terminal: &TerminalSession, task: Option<&Task>) -> Resolution {
    let active = terminal.active();
    let record = active.record();
    let kind = record.kind();
    let action = terminal.action();
    let elapsed_minutes = terminal.elapsed_minutes();

    let mut resolution = Resolution {
        session_id: record.id,
        kind,
        action,
        elapsed_minutes,
        session_update: None,
        task_update: None,
    };

    match (kind, action) {
        (SessionKind::Scheduled, TerminalAction::AutoComplete) => {
            resolution.session_update = Some(SessionPatch::status(SessionStatus::Completed));
        }
        (SessionKind::Scheduled, TerminalAction::Skip) => {
            resolution.session_update = Some(SessionPatch::status(SessionStatus::Skipped));
        }
        (SessionKind::Scheduled, TerminalAction::Stop) => {
            let ended_at = terminal.ended_at();
            let mut patch = SessionPatch {
                status: Some(SessionStatus::Partial),
                start_time: None,
                end_time: Some(ended_at),
            };
            let start = worked_start(record.start_time, active.started_at(), ended_at);
            if start != record.start_time {
                patch.start_time = Some(start);
            }
            resolution.session_update = Some(patch);
        }
        (SessionKind::AdHoc, TerminalAction::Skip) => {}
        (SessionKind::AdHoc, TerminalAction::AutoComplete | TerminalAction::Stop) => {
            resolution.task_update = accrue(record.task_id, task, elapsed_minutes);
        }
    }

    resolution
}

/// Start of the worked interval for a partial session.
///
/// A late start moves the start forward so the stored duration is not
/// inflated. If that would leave an empty or inverted range (the user began
/// early and stopped before the scheduled start), the actual start is used.
fn worked_start(
    scheduled: DateTime<Utc>,
    actual: DateTime<Utc>,
    ended_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let start = scheduled.max(actual);
    if start < ended_at {
        return start;
    }
    let fallback = scheduled.min(actual);
    if fallback < ended_at {
        fallback
    } else {
        ended_at - Duration::seconds(1)
    }
}

fn accrue(task_id: Option<i64>, task: Option<&Task>, elapsed_minutes: u64) -> Option<(i64, TaskPatch)> {
    let task_id = task_id.or_else(|| task.map(|t| t.id))?;
    let Some(task) = task.filter(|t| t.id == task_id) else {
        warn!(task_id, "no task snapshot bound; skipping ad-hoc time accrual");
        return None;
    };
    let added = u32::try_from(elapsed_minutes).unwrap_or(u32::MAX);
    Some((
        task_id,
        TaskPatch {
            timer_minutes_spent: Some(task.timer_minutes_spent.saturating_add(added)),
            subtasks: None,
        },
    ))
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// First press: the confirm window is open until `expires_at`.
    Armed { expires_at: DateTime<Utc> },
    /// Second press inside the window: stop for real.
    Confirmed,
}

/// Two-step confirmation for manual stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopConfirmation {
    window_ms: u64,
    #[serde(default)]
    armed_at: Option<DateTime<Utc>>,
}

impl StopConfirmation {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            armed_at: None,
        }
    }

    fn window(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.window_ms).unwrap_or(i64::MAX))
    }

    /// Whether a stop press at `now` would confirm.
    pub fn is_armed(&self, now: DateTime<Utc>) -> bool {
        self.armed_at
            .is_some_and(|armed| now >= armed && now - armed <= self.window())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.armed_at.map(|armed| armed + self.window())
    }

    pub fn request(&mut self, now: DateTime<Utc>) -> StopDecision {
        if self.is_armed(now) {
            self.armed_at = None;
            return StopDecision::Confirmed;
        }
        self.armed_at = Some(now);
        StopDecision::Armed {
            expires_at: now + self.window(),
        }
    }

    /// Drop an expired arm. Returns true when the window just closed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.armed_at.is_some() && !self.is_armed(now) {
            self.armed_at = None;
            return true;
        }
        false
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRecord;
    use crate::timer::{ActiveSession, RunningSession, SessionState};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn terminal(
        record: SessionRecord,
        started: DateTime<Utc>,
        action: TerminalAction,
        ended: DateTime<Utc>,
    ) -> TerminalSession {
        let active = ActiveSession::new(record, started).unwrap();
        let state = SessionState::Running(RunningSession::start(active, started));
        let (mut state, _) = state.terminate(action, ended);
        state.take_terminal().unwrap()
    }

    fn scheduled() -> SessionRecord {
        SessionRecord {
            id: 31,
            task_id: Some(8),
            subject_id: None,
            start_time: at(14, 0),
            end_time: at(15, 0),
            status: SessionStatus::Planned,
            focus: "Calculus".into(),
        }
    }

    fn task(spent: u32) -> Task {
        Task {
            id: 8,
            title: "Problem set".into(),
            description: String::new(),
            estimated_minutes: 25,
            timer_minutes_spent: spent,
            subtasks: Vec::new(),
        }
    }

    #[test]
    fn late_start_stop_writes_worked_interval() {
        let t = terminal(scheduled(), at(14, 10), TerminalAction::Stop, at(14, 40));
        let res = plan(&t, None);
        assert_eq!(
            res.session_update,
            Some(SessionPatch {
                status: Some(SessionStatus::Partial),
                start_time: Some(at(14, 10)),
                end_time: Some(at(14, 40)),
            })
        );
        assert_eq!(res.elapsed_minutes, 30);
        assert!(res.task_update.is_none());
    }

    #[test]
    fn on_time_stop_leaves_start_alone() {
        let t = terminal(scheduled(), at(14, 0), TerminalAction::Stop, at(14, 20));
        let patch = plan(&t, None).session_update.unwrap();
        assert_eq!(patch.start_time, None);
        assert_eq!(patch.end_time, Some(at(14, 20)));
    }

    #[test]
    fn early_start_stopped_before_schedule_keeps_valid_range() {
        let t = terminal(scheduled(), at(13, 50), TerminalAction::Stop, at(13, 55));
        let patch = plan(&t, None).session_update.unwrap();
        assert_eq!(patch.start_time, Some(at(13, 50)));
        assert_eq!(patch.end_time, Some(at(13, 55)));
    }

    #[test]
    fn scheduled_complete_and_skip_only_set_status() {
        let done = terminal(scheduled(), at(14, 0), TerminalAction::AutoComplete, at(15, 0));
        assert_eq!(
            plan(&done, Some(&task(0))).session_update,
            Some(SessionPatch::status(SessionStatus::Completed))
        );
        let skipped = terminal(scheduled(), at(14, 0), TerminalAction::Skip, at(14, 59));
        let res = plan(&skipped, Some(&task(0)));
        assert_eq!(res.session_update, Some(SessionPatch::status(SessionStatus::Skipped)));
        assert!(res.task_update.is_none());
    }

    #[test]
    fn ad_hoc_accrues_task_minutes() {
        let record = SessionRecord::ad_hoc(Some(8), "", 25, at(9, 0));
        let t = terminal(record, at(9, 0), TerminalAction::AutoComplete, at(9, 25));
        let res = plan(&t, Some(&task(40)));
        assert!(res.session_update.is_none());
        assert_eq!(
            res.task_update,
            Some((
                8,
                TaskPatch {
                    timer_minutes_spent: Some(65),
                    subtasks: None,
                }
            ))
        );
    }

    #[test]
    fn ad_hoc_skip_and_unbound_task_write_nothing() {
        let record = SessionRecord::ad_hoc(Some(8), "", 25, at(9, 0));
        let skipped = terminal(record.clone(), at(9, 0), TerminalAction::Skip, at(9, 10));
        assert!(plan(&skipped, Some(&task(0))).is_empty());

        let stopped = terminal(record, at(9, 0), TerminalAction::Stop, at(9, 10));
        assert!(plan(&stopped, None).is_empty());
    }

    #[test]
    fn stop_needs_two_presses_inside_window() {
        let mut stop = StopConfirmation::new(3_000);
        let t = at(10, 0);
        assert!(matches!(stop.request(t), StopDecision::Armed { .. }));
        assert_eq!(stop.request(t + Duration::seconds(2)), StopDecision::Confirmed);
        assert!(!stop.is_armed(t + Duration::seconds(2)));
    }

    #[test]
    fn stale_arm_rearms_instead_of_confirming() {
        let mut stop = StopConfirmation::new(3_000);
        let t = at(10, 0);
        stop.request(t);
        let later = t + Duration::seconds(4);
        assert_eq!(
            stop.request(later),
            StopDecision::Armed {
                expires_at: later + Duration::seconds(3)
            }
        );
        assert_eq!(stop.request(later + Duration::seconds(1)), StopDecision::Confirmed);
    }

    #[test]
    fn expire_reports_window_close_once() {
        let mut stop = StopConfirmation::new(3_000);
        let t = at(10, 0);
        stop.request(t);
        assert!(!stop.expire(t + Duration::seconds(1)));
        assert!(stop.expire(t + Duration::seconds(5)));
        assert!(!stop.expire(t + Duration::seconds(6)));
    }
}
