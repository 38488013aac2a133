//! Session state machine.
//!
//! Wall-clock based, no internal thread: the caller passes `now` into every
//! transition and calls [`SessionState::tick`] periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |          |
//!            +--> Terminal{action} --(resolver)--> Idle
//! ```
//!
//! Transitions live on the variant they are valid for (`RunningSession::pause`,
//! `PausedSession::resume`), so an invalid transition has no method to call.
//! The enum-level helpers map every other combination to "unchanged".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::ActiveSession;
use super::pomodoro::{PomodoroCycle, PomodoroDurations, PomodoroPhase, PomodoroTransition};
use crate::events::Event;

/// How a session left the live states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalAction {
    AutoComplete,
    Stop,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningSession {
    active: ActiveSession,
    /// Last instant a wall-clock delta was applied.
    last_tick: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausedSession {
    active: ActiveSession,
    paused_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSession {
    active: ActiveSession,
    action: TerminalAction,
    ended_at: DateTime<Utc>,
    elapsed_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Running(RunningSession),
    Paused(PausedSession),
    Terminal(TerminalSession),
}

impl RunningSession {
    pub fn start(active: ActiveSession, now: DateTime<Utc>) -> Self {
        Self {
            active,
            last_tick: now,
        }
    }

    pub fn active(&self) -> &ActiveSession {
        &self.active
    }

    /// Apply the wall-clock delta since the previous tick.
    ///
    /// Returns the terminal session when the countdown hits zero.
    fn advance(mut self, now: DateTime<Utc>, events: &mut Vec<Event>) -> SessionState {
        let delta_ms = (now - self.last_tick).num_milliseconds().max(0) as u64;
        // Never move the anchor backwards if the host clock jumps.
        if now > self.last_tick {
            self.last_tick = now;
        }
        let flips = self.active.advance(delta_ms);
        push_pomodoro_events(&flips, now, events);

        if self.active.is_finished() {
            events.push(Event::SessionCompleted {
                session_id: self.active.session_id(),
                at: now,
            });
            return SessionState::Terminal(self.finish(TerminalAction::AutoComplete, now));
        }
        SessionState::Running(self)
    }

    pub fn pause(mut self, now: DateTime<Utc>) -> PausedSession {
        self.active.record_pause();
        PausedSession {
            active: self.active,
            paused_at: now,
        }
    }

    pub fn finish(self, action: TerminalAction, now: DateTime<Utc>) -> TerminalSession {
        let elapsed_minutes = self.active.elapsed_minutes_until(now);
        TerminalSession {
            active: self.active,
            action,
            ended_at: now,
            elapsed_minutes,
        }
    }
}

impl PausedSession {
    pub fn active(&self) -> &ActiveSession {
        &self.active
    }

    pub fn paused_at(&self) -> DateTime<Utc> {
        self.paused_at
    }

    pub fn resume(mut self, now: DateTime<Utc>) -> RunningSession {
        let paused_for = (now - self.paused_at).num_milliseconds().max(0) as u64;
        self.active.record_resume(paused_for);
        RunningSession {
            active: self.active,
            last_tick: now,
        }
    }

    /// Credit stops at `paused_at`; `ended_at` is still the real `now`.
    pub fn finish(self, action: TerminalAction, now: DateTime<Utc>) -> TerminalSession {
        let elapsed_minutes = self.active.elapsed_minutes_until(self.paused_at);
        TerminalSession {
            active: self.active,
            action,
            ended_at: now,
            elapsed_minutes,
        }
    }
}

impl TerminalSession {
    pub fn active(&self) -> &ActiveSession {
        &self.active
    }

    pub fn action(&self) -> TerminalAction {
        self.action
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_minutes
    }
}

impl SessionState {
    // ── Queries ──────────────────────────────────────────────────────

    /// Running or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running(_) | SessionState::Paused(_))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, SessionState::Paused(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running(_) => "running",
            SessionState::Paused(_) => "paused",
            SessionState::Terminal(_) => "terminal",
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(r) => Some(&r.active),
            SessionState::Paused(p) => Some(&p.active),
            SessionState::Terminal(t) => Some(&t.active),
        }
    }

    /// Live session data, only while running or paused.
    fn live_mut(&mut self) -> Option<&mut ActiveSession> {
        match self {
            SessionState::Running(r) => Some(&mut r.active),
            SessionState::Paused(p) => Some(&mut p.active),
            _ => None,
        }
    }

    /// Minutes credited so far, measured from the user's actual start to
    /// `now` (or to the pause mark while paused). Paused time is not
    /// subtracted.
    pub fn elapsed_active_minutes(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(r) => Some(r.active.elapsed_minutes_until(now)),
            SessionState::Paused(p) => Some(p.active.elapsed_minutes_until(p.paused_at)),
            SessionState::Terminal(t) => Some(t.elapsed_minutes),
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Advance the clock to `now`. Only a running session moves.
    pub fn tick(self, now: DateTime<Utc>) -> (SessionState, Vec<Event>) {
        let mut events = Vec::new();
        let next = match self {
            SessionState::Running(running) => running.advance(now, &mut events),
            other => other,
        };
        (next, events)
    }

    /// Pause a running session. Elapsed time is flushed first, so a pause
    /// that lands after the deadline completes the session instead.
    pub fn pause(self, now: DateTime<Utc>) -> (SessionState, Vec<Event>) {
        let (state, mut events) = self.tick(now);
        match state {
            SessionState::Running(running) => {
                let paused = running.pause(now);
                events.push(Event::SessionPaused {
                    remaining_secs: paused.active.remaining_seconds(),
                    at: now,
                });
                (SessionState::Paused(paused), events)
            }
            other => (other, events),
        }
    }

    pub fn resume(self, now: DateTime<Utc>) -> (SessionState, Vec<Event>) {
        match self {
            SessionState::Paused(paused) => {
                let running = paused.resume(now);
                let event = Event::SessionResumed {
                    remaining_secs: running.active.remaining_seconds(),
                    at: now,
                };
                (SessionState::Running(running), vec![event])
            }
            other => (other, Vec::new()),
        }
    }

    /// Move a live session to `Terminal`. Already-terminal or idle states are
    /// returned unchanged.
    pub fn terminate(self, action: TerminalAction, now: DateTime<Utc>) -> (SessionState, Vec<Event>) {
        let (state, mut events) = self.tick(now);
        let terminal = match state {
            SessionState::Running(running) => running.finish(action, now),
            SessionState::Paused(paused) => paused.finish(action, now),
            other => return (other, events),
        };
        events.push(Event::SessionTerminated {
            session_id: terminal.active.session_id(),
            action,
            elapsed_minutes: terminal.elapsed_minutes,
            at: now,
        });
        (SessionState::Terminal(terminal), events)
    }

    /// Push the planned end forward. Returns the new planned end.
    pub fn extend(&mut self, minutes: u32) -> Option<DateTime<Utc>> {
        if minutes == 0 {
            return None;
        }
        self.live_mut().map(|active| active.extend(minutes))
    }

    /// Enable or disable the Pomodoro sub-cycle without touching the
    /// primary clock. Returns the new enabled flag, `None` if not live.
    pub fn toggle_pomodoro(&mut self, durations: PomodoroDurations) -> Option<bool> {
        let active = self.live_mut()?;
        if active.pomodoro().is_some() {
            active.set_pomodoro(None);
            Some(false)
        } else {
            active.set_pomodoro(Some(PomodoroCycle::start(durations)));
            Some(true)
        }
    }

    /// Hand the terminal session to the resolver, leaving `Idle` behind.
    pub fn take_terminal(&mut self) -> Option<TerminalSession> {
        match std::mem::take(self) {
            SessionState::Terminal(terminal) => Some(terminal),
            other => {
                *self = other;
                None
            }
        }
    }
}

fn push_pomodoro_events(flips: &[PomodoroTransition], now: DateTime<Utc>, events: &mut Vec<Event>) {
    for flip in flips {
        events.push(Event::PomodoroPhaseChanged {
            from: flip.from,
            to: flip.to,
            count: flip.count,
            at: now,
        });
        if flip.to == PomodoroPhase::Hold {
            events.push(Event::PomodoroCycleFinished {
                count: flip.count,
                at: now,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionRecord, SessionStatus};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(n)
    }

    fn running(minutes: u32) -> SessionState {
        let record = SessionRecord {
            id: 5,
            task_id: None,
            subject_id: None,
            start_time: t0(),
            end_time: t0() + Duration::minutes(i64::from(minutes)),
            status: SessionStatus::Planned,
            focus: String::new(),
        };
        let active = ActiveSession::new(record, t0()).unwrap();
        SessionState::Running(RunningSession::start(active, t0()))
    }

    fn remaining(state: &SessionState) -> u64 {
        state.active().map(|a| a.remaining_seconds()).unwrap_or(0)
    }

    #[test]
    fn tick_decrements_by_wall_clock() {
        let (state, events) = running(1).tick(secs(1));
        assert!(events.is_empty());
        assert_eq!(remaining(&state), 59);
        let (state, _) = state.tick(secs(31));
        assert_eq!(remaining(&state), 29);
    }

    #[test]
    fn completion_fires_exactly_once() {
        let mut state = running(1);
        let mut completions = 0;
        for s in 1..=120 {
            let (next, events) = state.tick(secs(s));
            completions += events
                .iter()
                .filter(|e| matches!(e, Event::SessionCompleted { .. }))
                .count();
            state = next;
        }
        assert_eq!(completions, 1);
        match &state {
            SessionState::Terminal(t) => {
                assert_eq!(t.action(), TerminalAction::AutoComplete);
                assert_eq!(t.elapsed_minutes(), 1);
            }
            other => panic!("expected terminal, got {}", other.name()),
        }
    }

    #[test]
    fn paused_state_does_not_tick() {
        let (state, _) = running(10).pause(secs(60));
        assert!(state.is_paused());
        let (state, events) = state.tick(secs(500));
        assert!(events.is_empty());
        assert_eq!(remaining(&state), 9 * 60);
    }

    #[test]
    fn resume_keeps_remaining() {
        let (state, _) = running(10).pause(secs(90));
        let before = remaining(&state);
        let (state, events) = state.resume(secs(900));
        assert_eq!(remaining(&state), before);
        assert!(matches!(events[0], Event::SessionResumed { remaining_secs, .. } if remaining_secs == before));
        let (state, _) = state.tick(secs(901));
        assert_eq!(remaining(&state), before - 1);
    }

    #[test]
    fn invalid_transitions_are_noops() {
        let (idle, events) = SessionState::Idle.pause(t0());
        assert_eq!(idle, SessionState::Idle);
        assert!(events.is_empty());

        let state = running(5);
        let (same, events) = state.clone().resume(secs(3));
        assert_eq!(same, state);
        assert!(events.is_empty());

        let (paused, _) = running(5).pause(secs(1));
        let (still, events) = paused.clone().pause(secs(2));
        assert_eq!(still, paused);
        assert!(events.is_empty());
    }

    #[test]
    fn elapsed_includes_paused_time_but_freezes_while_paused() {
        let (state, _) = running(60).pause(secs(5 * 60));
        assert_eq!(state.elapsed_active_minutes(secs(40 * 60)), Some(5));
        let (state, _) = state.resume(secs(20 * 60));
        assert_eq!(state.elapsed_active_minutes(secs(21 * 60)), Some(21));
    }

    #[test]
    fn terminate_from_paused_credits_until_pause_mark() {
        let (state, _) = running(60).pause(secs(12 * 60 + 30));
        let (state, events) = state.terminate(TerminalAction::Stop, secs(30 * 60));
        assert!(matches!(
            events.last(),
            Some(Event::SessionTerminated { elapsed_minutes: 12, .. })
        ));
        match state {
            SessionState::Terminal(t) => assert_eq!(t.ended_at(), secs(30 * 60)),
            other => panic!("expected terminal, got {}", other.name()),
        }
    }

    #[test]
    fn terminate_twice_is_noop() {
        let (state, _) = running(5).terminate(TerminalAction::Skip, secs(1));
        let (again, events) = state.clone().terminate(TerminalAction::Stop, secs(2));
        assert_eq!(again, state);
        assert!(events.is_empty());
    }

    #[test]
    fn pomodoro_toggle_leaves_primary_clock_alone() {
        let (mut state, _) = running(50).tick(secs(10 * 60));
        assert_eq!(state.toggle_pomodoro(PomodoroDurations::default()), Some(true));
        assert_eq!(remaining(&state), 40 * 60);
        let cycle = state.active().and_then(|a| a.pomodoro()).cloned().unwrap();
        assert_eq!(cycle.phase(), PomodoroPhase::Work);
        assert_eq!(cycle.remaining_seconds(), 25 * 60);

        let (state, _) = state.tick(secs(10 * 60 + 1));
        assert_eq!(remaining(&state), 40 * 60 - 1);
        let cycle = state.active().and_then(|a| a.pomodoro()).unwrap();
        assert_eq!(cycle.remaining_seconds(), 25 * 60 - 1);
    }

    #[test]
    fn pomodoro_flip_reported_once_per_transition() {
        let mut state = running(60);
        state.toggle_pomodoro(PomodoroDurations::from_minutes(1, 1));
        let mut flips = 0;
        for s in 1..=90 {
            let (next, events) = state.tick(secs(s));
            flips += events
                .iter()
                .filter(|e| matches!(e, Event::PomodoroPhaseChanged { .. }))
                .count();
            state = next;
        }
        assert_eq!(flips, 1);
    }

    #[test]
    fn take_terminal_only_from_terminal() {
        let mut state = running(5);
        assert!(state.take_terminal().is_none());
        assert!(state.is_running());

        let (mut state, _) = state.terminate(TerminalAction::Stop, secs(1));
        assert!(state.take_terminal().is_some());
        assert_eq!(state, SessionState::Idle);
        assert!(state.take_terminal().is_none());
    }

    proptest! {
        #[test]
        fn pause_resume_preserves_remaining(steps in proptest::collection::vec((1i64..300, 1i64..900), 1..20)) {
            let mut state = running(600);
            let mut clock = 0i64;
            for (run_for, pause_for) in steps {
                clock += run_for;
                let (paused, _) = state.pause(secs(clock));
                let before = remaining(&paused);
                clock += pause_for;
                let (resumed, _) = paused.resume(secs(clock));
                prop_assert_eq!(remaining(&resumed), before);
                state = resumed;
            }
        }

        #[test]
        fn elapsed_minutes_never_decrease(ops in proptest::collection::vec(0u8..3, 1..40)) {
            let mut state = running(600);
            let mut clock = 0i64;
            let mut last = 0u64;
            for op in ops {
                clock += 37;
                state = match op {
                    0 => state.tick(secs(clock)).0,
                    1 => state.pause(secs(clock)).0,
                    _ => state.resume(secs(clock)).0,
                };
                let elapsed = state.elapsed_active_minutes(secs(clock)).unwrap();
                prop_assert!(elapsed >= last);
                last = elapsed;
            }
        }
    }
}
