//! Optional Pomodoro work/break sub-cycle nested inside a focus session.
//!
//! The cycle advances on the same wall-clock deltas as the primary clock but
//! never touches it. Phases run `Work(1) -> Break(1) -> ... -> Work(4) ->
//! Break(4) -> Hold`; `Hold` is terminal until the cycle is toggled off and
//! on again.

use serde::{Deserialize, Serialize};

/// Work phases per cycle before the cycle holds.
pub const MAX_POMODOROS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PomodoroPhase {
    Work,
    Break,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroDurations {
    pub work_ms: u64,
    pub break_ms: u64,
}

impl PomodoroDurations {
    pub fn from_minutes(work_min: u32, break_min: u32) -> Self {
        Self {
            work_ms: u64::from(work_min).saturating_mul(60_000),
            break_ms: u64::from(break_min).saturating_mul(60_000),
        }
    }
}

impl Default for PomodoroDurations {
    fn default() -> Self {
        Self::from_minutes(25, 5)
    }
}

/// A single phase flip, reported once per transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroTransition {
    pub from: PomodoroPhase,
    pub to: PomodoroPhase,
    /// Work-phase count after the flip.
    pub count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroCycle {
    phase: PomodoroPhase,
    count: u8,
    remaining_ms: u64,
    durations: PomodoroDurations,
}

impl PomodoroCycle {
    /// Fresh cycle starting at `Work(1)` with a full work phase.
    pub fn start(durations: PomodoroDurations) -> Self {
        Self {
            phase: PomodoroPhase::Work,
            count: 1,
            remaining_ms: durations.work_ms,
            durations,
        }
    }

    pub fn phase(&self) -> PomodoroPhase {
        self.phase
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_ms.div_ceil(1000)
    }

    pub fn durations(&self) -> PomodoroDurations {
        self.durations
    }

    pub fn is_holding(&self) -> bool {
        self.phase == PomodoroPhase::Hold
    }

    /// Consume `delta_ms` of running time.
    ///
    /// Overflow past a phase boundary carries into the next phase, so one
    /// long delta may report several transitions; each flip still appears
    /// exactly once.
    pub fn advance(&mut self, delta_ms: u64) -> Vec<PomodoroTransition> {
        let mut transitions = Vec::new();
        let mut left = delta_ms;

        while left > 0 && self.phase != PomodoroPhase::Hold {
            if left < self.remaining_ms {
                self.remaining_ms -= left;
                break;
            }
            left -= self.remaining_ms;
            transitions.push(self.flip());
        }

        transitions
    }

    fn flip(&mut self) -> PomodoroTransition {
        let from = self.phase;
        match self.phase {
            PomodoroPhase::Work => {
                self.phase = PomodoroPhase::Break;
                self.remaining_ms = self.durations.break_ms;
            }
            PomodoroPhase::Break if self.count >= MAX_POMODOROS => {
                self.phase = PomodoroPhase::Hold;
                self.remaining_ms = 0;
            }
            PomodoroPhase::Break => {
                self.count += 1;
                self.phase = PomodoroPhase::Work;
                self.remaining_ms = self.durations.work_ms;
            }
            PomodoroPhase::Hold => {}
        }
        PomodoroTransition {
            from,
            to: self.phase,
            count: self.count,
        }
    }
}
