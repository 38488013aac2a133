mod clock;
mod pomodoro;
mod state;

pub use clock::ActiveSession;
pub use pomodoro::{
    PomodoroCycle, PomodoroDurations, PomodoroPhase, PomodoroTransition, MAX_POMODOROS,
};
pub use state::{PausedSession, RunningSession, SessionState, TerminalAction, TerminalSession};
