//! Primary countdown for a live session.
//!
//! [`ActiveSession`] is the data shared by the running and paused states:
//! the bound record, when the user actually started, and how much of the
//! planned span is left. It knows nothing about pausing; the state machine
//! in `state.rs` decides when wall-clock deltas are applied.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::pomodoro::{PomodoroCycle, PomodoroTransition};
use crate::error::ValidationError;
use crate::session::{SessionKind, SessionRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    record: SessionRecord,
    /// When the user pressed start (may differ from the scheduled start).
    started_at: DateTime<Utc>,
    total_ms: u64,
    remaining_ms: u64,
    #[serde(default)]
    pomodoro: Option<PomodoroCycle>,
    #[serde(default)]
    pause_count: u32,
    #[serde(default)]
    paused_ms: u64,
}

impl ActiveSession {
    /// # Errors
    /// Rejects records whose `start_time` is not before `end_time`.
    pub fn new(record: SessionRecord, started_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        record.validate()?;
        let total_ms = record.planned_ms();
        Ok(Self {
            record,
            started_at,
            total_ms,
            remaining_ms: total_ms,
            pomodoro: None,
            pause_count: 0,
            paused_ms: 0,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn session_id(&self) -> i64 {
        self.record.id
    }

    pub fn kind(&self) -> SessionKind {
        self.record.kind()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// End of the planned block, including any extensions.
    pub fn planned_end(&self) -> DateTime<Utc> {
        self.record.end_time
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_ms / 1000
    }

    /// Whole seconds left, rounded up so the display reads `00:01` until the
    /// very last millisecond is gone.
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_ms.div_ceil(1000)
    }

    /// 0.0 .. 100.0 progress through the planned span.
    pub fn progress_percent(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        let done = self.total_ms.saturating_sub(self.remaining_ms) as f64;
        (done / self.total_ms as f64 * 100.0).min(100.0)
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_ms == 0
    }

    pub fn pomodoro(&self) -> Option<&PomodoroCycle> {
        self.pomodoro.as_ref()
    }

    pub fn pause_count(&self) -> u32 {
        self.pause_count
    }

    /// Total time spent paused so far. Informational only: credited minutes
    /// are measured from `started_at` regardless of pauses.
    pub fn paused_ms(&self) -> u64 {
        self.paused_ms
    }

    /// `floor((until - started_at) / 60s)`, never negative.
    pub fn elapsed_minutes_until(&self, until: DateTime<Utc>) -> u64 {
        (until - self.started_at).num_milliseconds().max(0) as u64 / 60_000
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Apply `delta_ms` of running time to the primary clock and the
    /// Pomodoro cycle, returning any Pomodoro flips.
    pub(crate) fn advance(&mut self, delta_ms: u64) -> Vec<PomodoroTransition> {
        self.remaining_ms = self.remaining_ms.saturating_sub(delta_ms);
        match self.pomodoro.as_mut() {
            Some(cycle) => cycle.advance(delta_ms),
            None => Vec::new(),
        }
    }

    /// Push the planned end forward without touching elapsed progress.
    pub(crate) fn extend(&mut self, minutes: u32) -> DateTime<Utc> {
        let added_ms = u64::from(minutes).saturating_mul(60_000);
        self.record.end_time += Duration::minutes(i64::from(minutes));
        self.total_ms = self.total_ms.saturating_add(added_ms);
        self.remaining_ms = self.remaining_ms.saturating_add(added_ms);
        self.record.end_time
    }

    pub(crate) fn set_pomodoro(&mut self, cycle: Option<PomodoroCycle>) {
        self.pomodoro = cycle;
    }

    pub(crate) fn record_pause(&mut self) {
        self.pause_count = self.pause_count.saturating_add(1);
    }

    pub(crate) fn record_resume(&mut self, paused_for_ms: u64) {
        self.paused_ms = self.paused_ms.saturating_add(paused_for_ms);
    }
}
