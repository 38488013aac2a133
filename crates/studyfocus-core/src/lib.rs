//! # Studyfocus Core Library
//!
//! Focus session timer for the study planner. A session is started from a
//! scheduled slot or ad hoc, counts down on wall-clock time, can be paused,
//! extended and split into Pomodoro work/break phases, and is resolved into
//! remote writes (session status, tracked task minutes) when it ends.
//!
//! ## Architecture
//!
//! - **Timer**: tagged-union state machine advanced by a pure `tick(now)`
//! - **Controller**: owns the state plus stop confirmation, navigation guard,
//!   encouragement and notifications; returns events and remote commands
//! - **Driver**: tokio loop that ticks the controller and runs remote
//!   commands without blocking the countdown
//! - **Storage**: TOML configuration and a SQLite log/kv store
//!
//! ## Key Components
//!
//! - [`FocusController`]: session lifecycle and everything reacting to it
//! - [`SessionDriver`]: async host loop around the controller
//! - [`Backend`]: remote session, task and coach collaborators
//! - [`Database`]: resolved-session log and persisted controller
//! - [`Config`]: application configuration management

pub mod controller;
pub mod driver;
pub mod encouragement;
pub mod error;
pub mod events;
pub mod guard;
pub mod notify;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod timer;

pub use controller::{ControllerSettings, FocusController, Outcome, RemoteCommand};
pub use driver::{AnchoredClock, HostInput, SessionDriver};
pub use error::{ConfigError, CoreError, DatabaseError, RemoteError, ValidationError};
pub use events::Event;
pub use guard::{GuardOutcome, Interrupt};
pub use remote::{Backend, HttpBackend, MemoryBackend};
pub use session::{
    SessionContext, SessionKind, SessionPatch, SessionRecord, SessionStatus, Subject, Subtask,
    Task, TaskPatch,
};
pub use snapshot::{format_clock, Snapshot};
pub use storage::{Config, Database};
pub use timer::{PomodoroPhase, SessionState, TerminalAction};
