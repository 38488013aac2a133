//! Navigation guard ("soft lock").
//!
//! The host reports interrupt attempts through [`Interrupt`]; the guard
//! pauses the live session straight away and remembers what was attempted.
//! In-app navigation waits for the user to confirm (stop and leave) or
//! cancel (resume and stay). A page unload has no dialog of ours: the pause
//! is recorded and, if the page survives, the session simply stays paused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::Event;
use crate::timer::SessionState;

/// What the host environment is trying to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interrupt {
    /// In-app route change or history navigation towards `target`.
    Navigation { target: String },
    /// Page/process unload. No confirmation UI is possible.
    Unload,
}

/// What the host should do with the attempted interrupt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    /// Nothing to protect; let the navigation through.
    Proceed,
    /// Show the stop-or-stay dialog for `target`.
    ConfirmationRequired { target: String },
    /// Let the native "leave page?" prompt handle it.
    NativePrompt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    pub interrupt: Interrupt,
    /// Whether the guard itself paused the session (it was running).
    pub paused_by_guard: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationGuard {
    #[serde(default)]
    pending: Option<PendingInterrupt>,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt handlers are registered only while a session is live.
    pub fn is_armed(state: &SessionState) -> bool {
        state.is_active()
    }

    pub fn pending(&self) -> Option<&PendingInterrupt> {
        self.pending.as_ref()
    }

    /// Target of a navigation waiting for the user's decision.
    pub fn pending_target(&self) -> Option<&str> {
        match self.pending.as_ref().map(|p| &p.interrupt) {
            Some(Interrupt::Navigation { target }) => Some(target),
            _ => None,
        }
    }

    /// Pause the session and record the attempt.
    pub fn intercept(
        &mut self,
        state: SessionState,
        interrupt: Interrupt,
        now: DateTime<Utc>,
    ) -> (SessionState, GuardOutcome, Vec<Event>) {
        if !Self::is_armed(&state) {
            return (state, GuardOutcome::Proceed, Vec::new());
        }

        // A repeated attempt keeps the original pause ownership.
        let paused_by_guard = state.is_running()
            || self.pending.as_ref().is_some_and(|p| p.paused_by_guard);
        let (state, mut events) = state.pause(now);
        if !state.is_active() {
            // The flush reached zero: the session completed on its own.
            self.pending = None;
            return (state, GuardOutcome::Proceed, events);
        }

        let outcome = match &interrupt {
            Interrupt::Navigation { target } => {
                events.push(Event::NavigationPending {
                    target: target.clone(),
                    at: now,
                });
                GuardOutcome::ConfirmationRequired {
                    target: target.clone(),
                }
            }
            Interrupt::Unload => {
                events.push(Event::UnloadIntercepted { at: now });
                GuardOutcome::NativePrompt
            }
        };
        self.pending = Some(PendingInterrupt {
            interrupt,
            paused_by_guard,
            at: now,
        });
        (state, outcome, events)
    }

    /// The user chose to leave. Returns the navigation target to commit;
    /// the caller resolves the session as a stop.
    pub fn confirm(&mut self) -> Option<String> {
        match self.pending.take() {
            Some(PendingInterrupt {
                interrupt: Interrupt::Navigation { target },
                ..
            }) => Some(target),
            other => {
                self.pending = other;
                None
            }
        }
    }

    /// The user chose to stay: drop the target and resume if we paused.
    pub fn cancel(&mut self, state: SessionState, now: DateTime<Utc>) -> (SessionState, Vec<Event>) {
        let Some(pending) = self.pending.take() else {
            return (state, Vec::new());
        };
        let mut events = Vec::new();
        if let Interrupt::Navigation { target } = pending.interrupt {
            events.push(Event::NavigationCancelled { target, at: now });
        }
        if !pending.paused_by_guard {
            debug!("session was paused before the interrupt; leaving it paused");
            return (state, events);
        }
        let (state, resumed) = state.resume(now);
        events.extend(resumed);
        (state, events)
    }

    /// The native unload prompt was dismissed and the host is still alive.
    /// The session stays paused until the user resumes it.
    pub fn unload_survived(&mut self, now: DateTime<Utc>) -> Option<Event> {
        match self.pending {
            Some(PendingInterrupt {
                interrupt: Interrupt::Unload,
                ..
            }) => {
                self.pending = None;
                Some(Event::UnloadSurvived { at: now })
            }
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRecord;
    use crate::timer::{ActiveSession, RunningSession};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap()
    }

    fn running() -> SessionState {
        let record = SessionRecord::ad_hoc(None, "", 30, t0());
        let active = ActiveSession::new(record, t0()).unwrap();
        SessionState::Running(RunningSession::start(active, t0()))
    }

    fn nav(target: &str) -> Interrupt {
        Interrupt::Navigation {
            target: target.into(),
        }
    }

    #[test]
    fn idle_navigation_proceeds() {
        let mut guard = NavigationGuard::new();
        let (state, outcome, events) = guard.intercept(SessionState::Idle, nav("/tasks"), t0());
        assert_eq!(state, SessionState::Idle);
        assert_eq!(outcome, GuardOutcome::Proceed);
        assert!(events.is_empty());
        assert!(guard.pending().is_none());
    }

    #[test]
    fn navigation_pauses_and_asks() {
        let mut guard = NavigationGuard::new();
        let (state, outcome, _) = guard.intercept(running(), nav("/tasks"), t0() + Duration::seconds(30));
        assert!(state.is_paused());
        assert_eq!(
            outcome,
            GuardOutcome::ConfirmationRequired {
                target: "/tasks".into()
            }
        );
        assert_eq!(guard.pending_target(), Some("/tasks"));
    }

    #[test]
    fn cancel_resumes_with_same_remaining() {
        let mut guard = NavigationGuard::new();
        let (state, _, _) = guard.intercept(running(), nav("/back"), t0() + Duration::seconds(30));
        let before = state.active().unwrap().remaining_seconds();
        let (state, events) = guard.cancel(state, t0() + Duration::seconds(90));
        assert!(state.is_running());
        assert_eq!(state.active().unwrap().remaining_seconds(), before);
        assert!(matches!(events[0], Event::NavigationCancelled { .. }));
        assert!(guard.pending().is_none());
    }

    #[test]
    fn cancel_keeps_user_pause() {
        let mut guard = NavigationGuard::new();
        let (paused, _) = running().pause(t0() + Duration::seconds(10));
        let (state, _, _) = guard.intercept(paused, nav("/x"), t0() + Duration::seconds(20));
        let (state, _) = guard.cancel(state, t0() + Duration::seconds(30));
        assert!(state.is_paused());
    }

    #[test]
    fn confirm_returns_target_once() {
        let mut guard = NavigationGuard::new();
        let (_, _, _) = guard.intercept(running(), nav("/stats"), t0());
        assert_eq!(guard.confirm(), Some("/stats".to_string()));
        assert_eq!(guard.confirm(), None);
    }

    #[test]
    fn unload_stays_paused_after_survival() {
        let mut guard = NavigationGuard::new();
        let (state, outcome, events) = guard.intercept(running(), Interrupt::Unload, t0());
        assert_eq!(outcome, GuardOutcome::NativePrompt);
        assert!(state.is_paused());
        assert!(matches!(events.last(), Some(Event::UnloadIntercepted { .. })));
        assert_eq!(guard.confirm(), None);
        assert!(guard.unload_survived(t0()).is_some());
        assert!(guard.unload_survived(t0()).is_none());
    }
}
