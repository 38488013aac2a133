//! Focus session controller.
//!
//! Owns the one live [`SessionState`] together with everything that reacts
//! to it: stop confirmation, navigation guard, encouragement trigger,
//! notifications and the task/subject snapshots bound at start. Hosts call
//! the command methods with the current time and get back an [`Outcome`]:
//! events to render and remote commands to execute. Nothing here blocks or
//! talks to the network.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = FocusController::new(settings);
//! let outcome = controller.start_session(record, context, now)?;
//! // Once per second:
//! let outcome = controller.tick(now);
//! driver.dispatch(outcome.commands);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::encouragement::{EncouragementRequest, EncouragementSettings, EncouragementTrigger};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::guard::{GuardOutcome, Interrupt, NavigationGuard};
use crate::notify::{NotificationCenter, NotificationLevel};
use crate::resolver::{self, StopConfirmation, StopDecision};
use crate::session::{
    SessionContext, SessionKind, SessionPatch, SessionRecord, SessionStatus, TaskPatch,
};
use crate::snapshot::Snapshot;
use crate::timer::{
    ActiveSession, PomodoroDurations, PomodoroPhase, RunningSession, SessionState, TerminalAction,
    MAX_POMODOROS,
};

const DEFAULT_FOCUS_LABEL: &str = "Quick focus";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    pub pomodoro: PomodoroDurations,
    pub stop_confirm_ms: u64,
    pub encouragement: EncouragementSettings,
    pub default_ad_hoc_minutes: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            pomodoro: PomodoroDurations::default(),
            stop_confirm_ms: 3_000,
            encouragement: EncouragementSettings::default(),
            default_ad_hoc_minutes: 25,
        }
    }
}

/// A call the host must make against a remote collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemoteCommand {
    UpdateSession {
        session_id: i64,
        patch: SessionPatch,
    },
    UpdateTask {
        task_id: i64,
        patch: TaskPatch,
    },
    FetchEncouragement {
        milestone: u8,
        request: EncouragementRequest,
    },
}

impl RemoteCommand {
    /// Short human-readable label used in failure notifications.
    pub fn describe(&self) -> String {
        match self {
            RemoteCommand::UpdateSession { session_id, patch } => match patch.status {
                Some(status) => format!("mark session {session_id} as {}", status.as_str()),
                None => format!("update session {session_id}"),
            },
            RemoteCommand::UpdateTask { task_id, patch } => {
                if patch.timer_minutes_spent.is_some() {
                    format!("save tracked time for task {task_id}")
                } else {
                    format!("update task {task_id}")
                }
            }
            RemoteCommand::FetchEncouragement { milestone, .. } => {
                format!("fetch encouragement at {milestone}%")
            }
        }
    }
}

/// Result of a controller command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub events: Vec<Event>,
    pub commands: Vec<RemoteCommand>,
}

impl Outcome {
    fn from_events(events: Vec<Event>) -> Self {
        Self {
            events,
            commands: Vec::new(),
        }
    }

    pub fn merge(&mut self, other: Outcome) {
        self.events.extend(other.events);
        self.commands.extend(other.commands);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusController {
    settings: ControllerSettings,
    #[serde(default)]
    state: SessionState,
    #[serde(default)]
    context: SessionContext,
    stop: StopConfirmation,
    #[serde(default)]
    guard: NavigationGuard,
    encouragement: EncouragementTrigger,
    #[serde(default)]
    notifications: NotificationCenter,
}

impl Default for FocusController {
    fn default() -> Self {
        Self::new(ControllerSettings::default())
    }
}

impl FocusController {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            stop: StopConfirmation::new(settings.stop_confirm_ms),
            encouragement: EncouragementTrigger::new(settings.encouragement.clone()),
            settings,
            state: SessionState::Idle,
            context: SessionContext::default(),
            guard: NavigationGuard::new(),
            notifications: NotificationCenter::new(),
        }
    }

    /// Swap in new settings between sessions. Ignored while a session is
    /// live; returns whether the settings were applied.
    pub fn reconfigure(&mut self, settings: ControllerSettings) -> bool {
        if self.state.is_active() {
            return false;
        }
        self.stop = StopConfirmation::new(settings.stop_confirm_ms);
        self.encouragement = EncouragementTrigger::new(settings.encouragement.clone());
        self.settings = settings;
        true
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn stop_armed(&self, now: DateTime<Utc>) -> bool {
        self.stop.is_armed(now)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot::capture(
            &self.state,
            &self.context,
            self.stop.is_armed(now),
            self.guard.pending_target(),
            self.encouragement.message().map(|m| m.message.as_str()),
            &self.notifications,
            now,
        )
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a session bound to `record`. Positive ids are treated as
    /// scheduled and marked in progress remotely.
    ///
    /// # Errors
    /// [`CoreError::SessionActive`] if a session is live, or a validation
    /// error for an empty/inverted time range.
    pub fn start_session(
        &mut self,
        record: SessionRecord,
        context: SessionContext,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        self.begin(record, context, now)
    }

    /// Quick-start an ad-hoc session. Length falls back to the task's
    /// estimate, then to the configured default.
    ///
    /// # Errors
    /// [`CoreError::SessionActive`] if a session is live.
    pub fn start_ad_hoc(
        &mut self,
        minutes: Option<u32>,
        context: SessionContext,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let task = context.task.as_ref();
        let minutes = minutes
            .filter(|m| *m > 0)
            .or_else(|| task.map(|t| t.estimated_minutes).filter(|m| *m > 0))
            .unwrap_or(self.settings.default_ad_hoc_minutes);
        let focus = task.map(|t| t.title.as_str()).unwrap_or(DEFAULT_FOCUS_LABEL);
        let record = SessionRecord::ad_hoc(task.map(|t| t.id), focus, minutes, now);
        self.begin(record, context, now)
    }

    fn begin(
        &mut self,
        record: SessionRecord,
        context: SessionContext,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        if let Some(active) = self.state.active().filter(|_| self.state.is_active()) {
            return Err(CoreError::SessionActive {
                session_id: active.session_id(),
            });
        }
        // A terminal session left behind (restored from disk) is settled first.
        let mut outcome = self.resolve(now);

        let active = ActiveSession::new(record, now)?;
        let session_id = active.session_id();
        let kind = active.kind();
        let already_in_progress = active.record().status == SessionStatus::InProgress;

        outcome.events.push(Event::SessionStarted {
            session_id,
            kind,
            total_secs: active.total_seconds(),
            at: now,
        });
        if kind == SessionKind::Scheduled && !already_in_progress {
            outcome.commands.push(RemoteCommand::UpdateSession {
                session_id,
                patch: SessionPatch::status(SessionStatus::InProgress),
            });
        }

        self.state = SessionState::Running(RunningSession::start(active, now));
        self.context = context;
        self.stop.disarm();
        self.guard.clear();
        self.encouragement.reset();
        info!(session_id, ?kind, "focus session started");
        Ok(outcome)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Outcome {
        self.transition(now, |state| state.pause(now))
    }

    /// Resuming outside the guard dialog counts as choosing to stay.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Outcome {
        let mut outcome = self.transition(now, |state| state.resume(now));
        if self.state.is_running() && self.guard.pending().is_some() {
            if let Some(target) = self.guard.pending_target() {
                outcome.events.push(Event::NavigationCancelled {
                    target: target.to_string(),
                    at: now,
                });
            }
            self.guard.clear();
        }
        outcome
    }

    /// Push the planned end forward by `minutes`.
    pub fn extend(&mut self, minutes: u32, now: DateTime<Utc>) -> Outcome {
        let mut outcome = self.tick_clock(now);
        let Some(planned_end) = self.state.extend(minutes) else {
            debug!(minutes, "extend ignored: no live session");
            return outcome;
        };
        let Some(active) = self.state.active() else {
            return outcome;
        };
        outcome.events.push(Event::SessionExtended {
            minutes,
            planned_end,
            remaining_secs: active.remaining_seconds(),
            at: now,
        });
        if active.kind() == SessionKind::Scheduled {
            outcome.commands.push(RemoteCommand::UpdateSession {
                session_id: active.session_id(),
                patch: SessionPatch {
                    end_time: Some(planned_end),
                    ..SessionPatch::default()
                },
            });
        }
        outcome
    }

    pub fn toggle_pomodoro(&mut self, now: DateTime<Utc>) -> Outcome {
        let mut outcome = self.tick_clock(now);
        match self.state.toggle_pomodoro(self.settings.pomodoro) {
            Some(true) => outcome.events.push(Event::PomodoroEnabled {
                work_secs: self.settings.pomodoro.work_ms / 1000,
                at: now,
            }),
            Some(false) => outcome.events.push(Event::PomodoroDisabled { at: now }),
            None => debug!("pomodoro toggle ignored: no live session"),
        }
        outcome
    }

    /// First call arms the confirm window, a second call inside it stops.
    pub fn request_stop(&mut self, now: DateTime<Utc>) -> Outcome {
        if !self.state.is_active() {
            return Outcome::default();
        }
        match self.stop.request(now) {
            StopDecision::Armed { expires_at } => {
                Outcome::from_events(vec![Event::StopArmed { expires_at, at: now }])
            }
            StopDecision::Confirmed => self.finish(TerminalAction::Stop, now),
        }
    }

    pub fn skip(&mut self, now: DateTime<Utc>) -> Outcome {
        self.finish(TerminalAction::Skip, now)
    }

    /// Periodic tick (about once per second).
    pub fn tick(&mut self, now: DateTime<Utc>) -> Outcome {
        let mut outcome = Outcome::default();
        if self.stop.expire(now) {
            outcome.events.push(Event::StopDisarmed { at: now });
        }
        if let Some(event) = self.encouragement.expire(now) {
            outcome.events.push(event);
        }
        outcome.merge(self.tick_clock(now));

        if let SessionState::Running(running) = &self.state {
            let elapsed = running.active().elapsed_minutes_until(now);
            if let Some((milestone, request)) =
                self.encouragement
                    .observe(running.active(), elapsed, self.context.task_title())
            {
                outcome.events.push(Event::EncouragementRequested { milestone, at: now });
                outcome
                    .commands
                    .push(RemoteCommand::FetchEncouragement { milestone, request });
            }
        }
        outcome
    }

    /// Resolve a terminal session: plan remote writes, then discard the
    /// timer. A no-op unless a session is waiting for resolution.
    pub fn resolve(&mut self, now: DateTime<Utc>) -> Outcome {
        let Some(terminal) = self.state.take_terminal() else {
            return Outcome::default();
        };
        let resolution = resolver::plan(&terminal, self.context.task.as_ref());
        let mut outcome = Outcome::default();

        if let Some(patch) = resolution.session_update.clone() {
            outcome.commands.push(RemoteCommand::UpdateSession {
                session_id: resolution.session_id,
                patch,
            });
        }
        if let Some((task_id, patch)) = resolution.task_update.clone() {
            outcome.commands.push(RemoteCommand::UpdateTask { task_id, patch });
        }
        outcome.events.push(Event::SessionResolved {
            session_id: resolution.session_id,
            kind: resolution.kind,
            action: resolution.action,
            elapsed_minutes: resolution.elapsed_minutes,
            started_at: terminal.active().started_at(),
            at: now,
        });

        self.stop.disarm();
        self.guard.clear();
        self.encouragement.reset();
        self.context = SessionContext::default();
        info!(
            session_id = resolution.session_id,
            action = ?resolution.action,
            elapsed_minutes = resolution.elapsed_minutes,
            "focus session resolved"
        );
        outcome
    }

    // ── Navigation guard ─────────────────────────────────────────────

    pub fn interrupt(&mut self, interrupt: Interrupt, now: DateTime<Utc>) -> (GuardOutcome, Outcome) {
        let state = std::mem::take(&mut self.state);
        let (next, guard_outcome, events) = self.guard.intercept(state, interrupt, now);
        self.state = next;
        let mut outcome = Outcome::from_events(events);
        self.after_transition(now, &mut outcome);
        (guard_outcome, outcome)
    }

    /// Leave: returns the target to navigate to and stops the session.
    pub fn confirm_navigation(&mut self, now: DateTime<Utc>) -> (Option<String>, Outcome) {
        let Some(target) = self.guard.confirm() else {
            return (None, Outcome::default());
        };
        let mut outcome = Outcome::from_events(vec![Event::NavigationCommitted {
            target: target.clone(),
            at: now,
        }]);
        self.stop.disarm();
        outcome.merge(self.finish(TerminalAction::Stop, now));
        (Some(target), outcome)
    }

    /// Stay: resume and forget the target.
    pub fn cancel_navigation(&mut self, now: DateTime<Utc>) -> Outcome {
        let state = std::mem::take(&mut self.state);
        let (next, events) = self.guard.cancel(state, now);
        self.state = next;
        Outcome::from_events(events)
    }

    pub fn unload_survived(&mut self, now: DateTime<Utc>) -> Outcome {
        Outcome::from_events(self.guard.unload_survived(now).into_iter().collect())
    }

    // ── Task plumbing ────────────────────────────────────────────────

    /// Flip a subtask of the bound task and push the new list remotely.
    pub fn toggle_subtask(&mut self, subtask_id: i64, now: DateTime<Utc>) -> Outcome {
        if !self.state.is_active() {
            return Outcome::default();
        }
        let Some(task) = self.context.task.as_mut() else {
            return Outcome::default();
        };
        let Some(subtask) = task.subtasks.iter_mut().find(|s| s.id == subtask_id) else {
            debug!(subtask_id, "unknown subtask");
            return Outcome::default();
        };
        subtask.done = !subtask.done;
        let done = subtask.done;
        Outcome {
            events: vec![Event::SubtaskToggled {
                task_id: task.id,
                subtask_id,
                done,
                at: now,
            }],
            commands: vec![RemoteCommand::UpdateTask {
                task_id: task.id,
                patch: TaskPatch {
                    timer_minutes_spent: None,
                    subtasks: Some(task.subtasks.clone()),
                },
            }],
        }
    }

    // ── Remote results ───────────────────────────────────────────────

    pub fn encouragement_arrived(&mut self, milestone: u8, message: String, now: DateTime<Utc>) -> Outcome {
        Outcome::from_events(
            self.encouragement
                .arrived(milestone, message, now)
                .into_iter()
                .collect(),
        )
    }

    pub fn encouragement_failed(&mut self, milestone: u8, error: &str) {
        debug!(milestone, error, "encouragement fetch failed");
        self.encouragement.failed(milestone);
    }

    /// Surface a failed write. The local timer is never rolled back.
    pub fn remote_write_failed(&mut self, command: &RemoteCommand, error: &str, now: DateTime<Utc>) -> Outcome {
        let what = command.describe();
        warn!(command = %what, error, "remote write failed");
        let message = format!("Could not {what}: {error}");
        let notification_id = self.notifications.push(
            NotificationLevel::Error,
            "Sync failed",
            message.clone(),
            now,
        );
        Outcome::from_events(vec![Event::RemoteWriteFailed {
            notification_id,
            message,
            at: now,
        }])
    }

    pub fn dismiss_notification(&mut self, id: Uuid) -> bool {
        self.notifications.dismiss(id)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn tick_clock(&mut self, now: DateTime<Utc>) -> Outcome {
        self.transition(now, |state| state.tick(now))
    }

    fn finish(&mut self, action: TerminalAction, now: DateTime<Utc>) -> Outcome {
        self.transition(now, |state| state.terminate(action, now))
    }

    fn transition(
        &mut self,
        now: DateTime<Utc>,
        f: impl FnOnce(SessionState) -> (SessionState, Vec<Event>),
    ) -> Outcome {
        let state = std::mem::take(&mut self.state);
        let (next, events) = f(state);
        self.state = next;
        let mut outcome = Outcome::from_events(events);
        self.after_transition(now, &mut outcome);
        outcome
    }

    /// Phase-flip notifications, then resolution if the session ended.
    fn after_transition(&mut self, now: DateTime<Utc>, outcome: &mut Outcome) {
        let break_min = self.settings.pomodoro.break_ms / 60_000;
        for event in &outcome.events {
            if let Event::PomodoroPhaseChanged { to, count, .. } = event {
                let (title, body) = match to {
                    PomodoroPhase::Break => (
                        "Break time".to_string(),
                        format!("Pomodoro {count} done. Take {break_min} minutes."),
                    ),
                    PomodoroPhase::Work => (
                        "Back to work".to_string(),
                        format!("Pomodoro {count} of {MAX_POMODOROS}."),
                    ),
                    PomodoroPhase::Hold => (
                        "Pomodoro cycle finished".to_string(),
                        "Toggle Pomodoro to start a new cycle.".to_string(),
                    ),
                };
                self.notifications.push(NotificationLevel::Info, title, body, now);
            }
        }
        if matches!(self.state, SessionState::Terminal(_)) {
            outcome.merge(self.resolve(now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Subtask, Task};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(n)
    }

    fn record(id: i64, minutes: i64) -> SessionRecord {
        SessionRecord {
            id,
            task_id: Some(3),
            subject_id: None,
            start_time: t0(),
            end_time: t0() + Duration::minutes(minutes),
            status: SessionStatus::Planned,
            focus: "Chemistry".into(),
        }
    }

    fn task() -> Task {
        Task {
            id: 3,
            title: "Lab report".into(),
            description: String::new(),
            estimated_minutes: 25,
            timer_minutes_spent: 10,
            subtasks: vec![Subtask {
                id: 1,
                title: "Intro".into(),
                done: false,
            }],
        }
    }

    fn session_writes(outcome: &Outcome) -> usize {
        outcome
            .commands
            .iter()
            .filter(|c| matches!(c, RemoteCommand::UpdateSession { .. }))
            .count()
    }

    #[test]
    fn scheduled_start_marks_in_progress() {
        let mut c = FocusController::default();
        let outcome = c.start_session(record(7, 60), SessionContext::default(), t0()).unwrap();
        assert!(c.is_active());
        assert_eq!(
            outcome.commands,
            vec![RemoteCommand::UpdateSession {
                session_id: 7,
                patch: SessionPatch::status(SessionStatus::InProgress),
            }]
        );
    }

    #[test]
    fn second_start_is_rejected() {
        let mut c = FocusController::default();
        c.start_session(record(7, 60), SessionContext::default(), t0()).unwrap();
        let err = c.start_ad_hoc(Some(10), SessionContext::default(), secs(5)).unwrap_err();
        assert!(matches!(err, CoreError::SessionActive { session_id: 7 }));
    }

    #[test]
    fn ad_hoc_length_falls_back_to_estimate_then_default() {
        let mut c = FocusController::default();
        c.start_ad_hoc(None, SessionContext::with_task(task()), t0()).unwrap();
        assert_eq!(c.snapshot(t0()).total_seconds, 25 * 60);
        c.skip(secs(1));

        let mut c = FocusController::new(ControllerSettings {
            default_ad_hoc_minutes: 45,
            ..ControllerSettings::default()
        });
        c.start_ad_hoc(None, SessionContext::default(), t0()).unwrap();
        assert_eq!(c.snapshot(t0()).total_seconds, 45 * 60);
        assert_eq!(c.snapshot(t0()).focus.as_deref(), Some(DEFAULT_FOCUS_LABEL));
    }

    #[test]
    fn stop_requires_confirmation() {
        let mut c = FocusController::default();
        c.start_session(record(7, 60), SessionContext::default(), t0()).unwrap();
        let first = c.request_stop(secs(60));
        assert!(matches!(first.events[0], Event::StopArmed { .. }));
        assert!(c.is_active());

        let disarm = c.tick(secs(64));
        assert!(disarm.events.iter().any(|e| matches!(e, Event::StopDisarmed { .. })));
        assert!(c.is_active());

        c.request_stop(secs(70));
        let second = c.request_stop(secs(72));
        assert!(!c.is_active());
        assert_eq!(session_writes(&second), 1);
    }

    #[test]
    fn skip_twice_writes_once() {
        let mut c = FocusController::default();
        c.start_session(record(7, 60), SessionContext::default(), t0()).unwrap();
        let first = c.skip(secs(30));
        let second = c.skip(secs(31));
        assert_eq!(session_writes(&first), 1);
        assert!(second.is_empty());
        assert_eq!(c.state(), &SessionState::Idle);
    }

    #[test]
    fn extend_mirrors_scheduled_end() {
        let mut c = FocusController::default();
        c.start_session(record(7, 60), SessionContext::default(), t0()).unwrap();
        let outcome = c.extend(10, secs(60));
        assert_eq!(
            outcome.commands,
            vec![RemoteCommand::UpdateSession {
                session_id: 7,
                patch: SessionPatch {
                    end_time: Some(t0() + Duration::minutes(70)),
                    ..SessionPatch::default()
                },
            }]
        );
        assert_eq!(c.snapshot(secs(60)).remaining_seconds, 69 * 60);
    }

    #[test]
    fn pomodoro_flip_raises_one_notification() {
        let mut c = FocusController::new(ControllerSettings {
            pomodoro: PomodoroDurations::from_minutes(1, 1),
            ..ControllerSettings::default()
        });
        c.start_ad_hoc(Some(30), SessionContext::default(), t0()).unwrap();
        c.toggle_pomodoro(t0());
        for s in 1..=90 {
            c.tick(secs(s));
        }
        let titles: Vec<_> = c.notifications().items().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Break time"]);
    }

    #[test]
    fn pomodoro_hold_restarts_after_toggle_off_and_on() {
        let mut c = FocusController::new(ControllerSettings {
            pomodoro: PomodoroDurations::from_minutes(1, 1),
            ..ControllerSettings::default()
        });
        c.start_ad_hoc(Some(30), SessionContext::default(), t0()).unwrap();
        c.toggle_pomodoro(t0());
        for s in 1..=8 * 60 + 5 {
            c.tick(secs(s));
        }
        let held = c.snapshot(secs(485)).pomodoro.unwrap();
        assert_eq!(held.phase, PomodoroPhase::Hold);

        c.tick(secs(600));
        assert_eq!(c.snapshot(secs(600)).pomodoro.unwrap().phase, PomodoroPhase::Hold);

        let off = c.toggle_pomodoro(secs(601));
        assert!(matches!(off.events.last(), Some(Event::PomodoroDisabled { .. })));
        assert!(c.snapshot(secs(601)).pomodoro.is_none());
        c.toggle_pomodoro(secs(602));
        let fresh = c.snapshot(secs(602)).pomodoro.unwrap();
        assert_eq!(fresh.phase, PomodoroPhase::Work);
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.remaining_seconds, 60);
    }

    #[test]
    fn manual_resume_discards_pending_navigation() {
        let mut c = FocusController::default();
        c.start_session(record(7, 60), SessionContext::default(), t0()).unwrap();
        let (guard, _) = c.interrupt(
            Interrupt::Navigation {
                target: "/calendar".into(),
            },
            secs(300),
        );
        assert!(matches!(guard, GuardOutcome::ConfirmationRequired { .. }));
        assert_eq!(c.snapshot(secs(300)).pending_navigation.as_deref(), Some("/calendar"));

        let resumed = c.resume(secs(360));
        assert!(c.state().is_running());
        assert!(resumed
            .events
            .iter()
            .any(|e| matches!(e, Event::NavigationCancelled { target, .. } if target == "/calendar")));
        assert!(c.snapshot(secs(360)).pending_navigation.is_none());

        let (target, outcome) = c.confirm_navigation(secs(1800));
        assert!(target.is_none());
        assert!(outcome.is_empty());
        assert!(c.is_active());
    }

    #[test]
    fn toggle_subtask_pushes_full_list() {
        let mut c = FocusController::default();
        c.start_ad_hoc(None, SessionContext::with_task(task()), t0()).unwrap();
        let outcome = c.toggle_subtask(1, secs(10));
        match &outcome.commands[0] {
            RemoteCommand::UpdateTask { task_id, patch } => {
                assert_eq!(*task_id, 3);
                assert_eq!(patch.subtasks.as_ref().map(|s| s[0].done), Some(true));
                assert!(patch.timer_minutes_spent.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(c.toggle_subtask(99, secs(11)).is_empty());
    }

    #[test]
    fn failed_write_becomes_dismissible_notification() {
        let mut c = FocusController::default();
        let cmd = RemoteCommand::UpdateSession {
            session_id: 7,
            patch: SessionPatch::status(SessionStatus::Partial),
        };
        let outcome = c.remote_write_failed(&cmd, "HTTP 500", t0());
        let id = match &outcome.events[0] {
            Event::RemoteWriteFailed { notification_id, message, .. } => {
                assert!(message.contains("mark session 7 as partial"));
                *notification_id
            }
            other => panic!("unexpected event {other:?}"),
        };
        assert_eq!(c.notifications().errors().count(), 1);
        assert!(c.dismiss_notification(id));
        assert!(c.notifications().is_empty());
    }

    #[test]
    fn reconfigure_only_between_sessions() {
        let mut c = FocusController::default();
        let longer = ControllerSettings {
            default_ad_hoc_minutes: 50,
            ..ControllerSettings::default()
        };
        assert!(c.reconfigure(longer.clone()));
        c.start_ad_hoc(None, SessionContext::default(), t0()).unwrap();
        assert_eq!(c.snapshot(t0()).total_seconds, 50 * 60);
        assert!(!c.reconfigure(ControllerSettings::default()));
        assert_eq!(c.settings(), &longer);
    }

    #[test]
    fn controller_round_trips_through_json() {
        let mut c = FocusController::default();
        c.start_session(record(7, 60), SessionContext::with_task(task()), t0()).unwrap();
        c.pause(secs(90));
        let json = serde_json::to_string(&c).unwrap();
        let restored: FocusController = serde_json::from_str(&json).unwrap();
        assert!(restored.state().is_paused());
        assert_eq!(restored.snapshot(secs(500)).remaining_seconds, 3600 - 90);
    }
}
