//! Async driver around [`FocusController`].
//!
//! The controller is a pure state machine; the driver gives it a clock, a
//! ticker and a [`Backend`]. Remote commands are spawned onto a `JoinSet`
//! so a slow collaborator never delays the next tick, and their results are
//! fed back into the controller as they land.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::controller::{FocusController, Outcome, RemoteCommand};
use crate::error::RemoteError;
use crate::events::Event;
use crate::guard::Interrupt;
use crate::remote::Backend;
use crate::snapshot::Snapshot;

/// Wall-clock time derived from the tokio clock.
///
/// Anchoring to `tokio::time::Instant` lets tests run whole sessions under
/// paused time.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl AnchoredClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin_utc,
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin_utc + elapsed
    }
}

impl Default for AnchoredClock {
    fn default() -> Self {
        Self::new()
    }
}

/// User and platform input delivered to a running driver.
#[derive(Debug, Clone, PartialEq)]
pub enum HostInput {
    Pause,
    Resume,
    Extend(u32),
    TogglePomodoro,
    Stop,
    Skip,
    ToggleSubtask(i64),
    Navigate(String),
    Unload,
    UnloadSurvived,
    ConfirmNavigation,
    CancelNavigation,
    Dismiss(Uuid),
}

enum RemoteResult {
    Written {
        command: RemoteCommand,
        result: Result<(), RemoteError>,
    },
    Encouragement {
        milestone: u8,
        result: Result<String, RemoteError>,
    },
}

async fn execute(backend: Arc<dyn Backend>, command: RemoteCommand) -> RemoteResult {
    match &command {
        RemoteCommand::UpdateSession { session_id, patch } => {
            let result = backend.update_session(*session_id, patch).await;
            RemoteResult::Written { command, result }
        }
        RemoteCommand::UpdateTask { task_id, patch } => {
            let result = backend.update_task(*task_id, patch).await;
            RemoteResult::Written { command, result }
        }
        RemoteCommand::FetchEncouragement { milestone, request } => RemoteResult::Encouragement {
            milestone: *milestone,
            result: backend.fetch_encouragement(request).await,
        },
    }
}

pub struct SessionDriver {
    controller: FocusController,
    backend: Arc<dyn Backend>,
    tick: Duration,
    clock: AnchoredClock,
    in_flight: JoinSet<RemoteResult>,
}

impl SessionDriver {
    pub fn new(controller: FocusController, backend: Arc<dyn Backend>) -> Self {
        Self {
            controller,
            backend,
            tick: Duration::from_secs(1),
            clock: AnchoredClock::new(),
            in_flight: JoinSet::new(),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(10));
        self
    }

    pub fn with_clock(mut self, clock: AnchoredClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn controller(&self) -> &FocusController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut FocusController {
        &mut self.controller
    }

    pub fn snapshot(&self) -> Snapshot {
        self.controller.snapshot(self.now())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Spawn the outcome's remote commands and hand back its events.
    pub fn handle(&mut self, outcome: Outcome) -> Vec<Event> {
        for command in outcome.commands {
            debug!(backend = self.backend.name(), command = %command.describe(), "dispatch");
            let backend = Arc::clone(&self.backend);
            self.in_flight.spawn(execute(backend, command));
        }
        outcome.events
    }

    pub fn tick(&mut self) -> Vec<Event> {
        let outcome = self.controller.tick(self.now());
        self.handle(outcome)
    }

    pub fn apply(&mut self, input: HostInput) -> Vec<Event> {
        let now = self.now();
        let c = &mut self.controller;
        let outcome = match input {
            HostInput::Pause => c.pause(now),
            HostInput::Resume => c.resume(now),
            HostInput::Extend(minutes) => c.extend(minutes, now),
            HostInput::TogglePomodoro => c.toggle_pomodoro(now),
            HostInput::Stop => c.request_stop(now),
            HostInput::Skip => c.skip(now),
            HostInput::ToggleSubtask(id) => c.toggle_subtask(id, now),
            HostInput::Navigate(target) => c.interrupt(Interrupt::Navigation { target }, now).1,
            HostInput::Unload => c.interrupt(Interrupt::Unload, now).1,
            HostInput::UnloadSurvived => c.unload_survived(now),
            HostInput::ConfirmNavigation => c.confirm_navigation(now).1,
            HostInput::CancelNavigation => c.cancel_navigation(now),
            HostInput::Dismiss(id) => {
                c.dismiss_notification(id);
                Outcome::default()
            }
        };
        self.handle(outcome)
    }

    fn absorb(&mut self, joined: Result<RemoteResult, tokio::task::JoinError>) -> Vec<Event> {
        let now = self.now();
        let outcome = match joined {
            Ok(RemoteResult::Written { command, result: Ok(()) }) => {
                debug!(command = %command.describe(), "remote write ok");
                Outcome::default()
            }
            Ok(RemoteResult::Written { command, result: Err(e) }) => {
                self.controller.remote_write_failed(&command, &e.to_string(), now)
            }
            Ok(RemoteResult::Encouragement { milestone, result: Ok(message) }) => {
                self.controller.encouragement_arrived(milestone, message, now)
            }
            Ok(RemoteResult::Encouragement { milestone, result: Err(e) }) => {
                self.controller.encouragement_failed(milestone, &e.to_string());
                Outcome::default()
            }
            Err(e) => {
                warn!(error = %e, "remote task aborted");
                Outcome::default()
            }
        };
        self.handle(outcome)
    }

    /// Wait for every in-flight remote call and fold the results back in.
    pub async fn settle(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(joined) = self.in_flight.join_next().await {
            events.extend(self.absorb(joined));
        }
        events
    }

    /// Tick until the session is over and every remote call has landed.
    ///
    /// If `input` closes first the driver stops ticking, settles in-flight
    /// calls and returns the controller with the session still live.
    pub async fn run<F>(mut self, mut input: mpsc::Receiver<HostInput>, mut on_update: F) -> FocusController
    where
        F: FnMut(&[Event], &Snapshot),
    {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if !self.controller.is_active() && self.in_flight.is_empty() {
                break;
            }
            let events = tokio::select! {
                _ = ticker.tick() => self.tick(),
                received = input.recv() => match received {
                    Some(host_input) => self.apply(host_input),
                    None => {
                        debug!("input closed; detaching from live session");
                        break;
                    }
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.absorb(joined)
                }
            };
            if !events.is_empty() {
                on_update(&events, &self.snapshot());
            }
        }

        let events = self.settle().await;
        if !events.is_empty() {
            on_update(&events, &self.snapshot());
        }
        self.controller
    }
}
