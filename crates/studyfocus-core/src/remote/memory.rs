//! In-process backend that records every call.
//!
//! Used by the CLI when no `backend.base_url` is configured and by tests that
//! need to inspect what the timer wrote.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Backend, EncouragementService, SessionService, TaskService};
use crate::encouragement::EncouragementRequest;
use crate::error::RemoteError;
use crate::session::{SessionPatch, TaskPatch};

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Session { id: i64, patch: SessionPatch },
    Task { id: i64, patch: TaskPatch },
    Encouragement(EncouragementRequest),
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    calls: Mutex<Vec<RemoteCall>>,
    fail_writes: bool,
    fail_encouragement: bool,
    message: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session and task updates return [`RemoteError::Unavailable`].
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn failing_encouragement(mut self) -> Self {
        self.fail_encouragement = true;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Calls in the order they were received.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().clone()
    }

    pub fn session_patches(&self, session_id: i64) -> Vec<SessionPatch> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                RemoteCall::Session { id, patch } if *id == session_id => Some(patch.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn task_patches(&self, task_id: i64) -> Vec<TaskPatch> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                RemoteCall::Task { id, patch } if *id == task_id => Some(patch.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RemoteCall>> {
        // A panicking test thread must not hide the recorded calls.
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RemoteCall) {
        self.lock().push(call);
    }
}

#[async_trait]
impl SessionService for MemoryBackend {
    async fn update_session(&self, session_id: i64, patch: &SessionPatch) -> Result<(), RemoteError> {
        self.record(RemoteCall::Session {
            id: session_id,
            patch: patch.clone(),
        });
        if self.fail_writes {
            return Err(RemoteError::Unavailable {
                service: "sessions",
                message: "offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskService for MemoryBackend {
    async fn update_task(&self, task_id: i64, patch: &TaskPatch) -> Result<(), RemoteError> {
        self.record(RemoteCall::Task {
            id: task_id,
            patch: patch.clone(),
        });
        if self.fail_writes {
            return Err(RemoteError::Unavailable {
                service: "tasks",
                message: "offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EncouragementService for MemoryBackend {
    async fn fetch_encouragement(&self, request: &EncouragementRequest) -> Result<String, RemoteError> {
        self.record(RemoteCall::Encouragement(request.clone()));
        if self.fail_encouragement {
            return Err(RemoteError::Unavailable {
                service: "coach",
                message: "offline".into(),
            });
        }
        Ok(self
            .message
            .clone()
            .unwrap_or_else(|| format!("{}% done. Keep it up!", request.progress_percent)))
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[tokio::test]
    async fn records_calls_in_order() {
        let backend = MemoryBackend::new();
        backend
            .update_session(3, &SessionPatch::status(SessionStatus::InProgress))
            .await
            .unwrap();
        backend
            .update_task(
                9,
                &TaskPatch {
                    timer_minutes_spent: Some(12),
                    subtasks: None,
                },
            )
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], RemoteCall::Session { id: 3, .. }));
        assert_eq!(backend.task_patches(9)[0].timer_minutes_spent, Some(12));
        assert!(backend.session_patches(4).is_empty());
    }

    #[tokio::test]
    async fn failing_writes_still_record() {
        let backend = MemoryBackend::new().failing_writes();
        let err = backend
            .update_session(1, &SessionPatch::status(SessionStatus::Partial))
            .await
            .unwrap_err();
        assert_eq!(err.service(), "sessions");
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn canned_message() {
        let backend = MemoryBackend::new().with_message("Nice pace");
        let request = EncouragementRequest {
            elapsed_minutes: 10,
            remaining_minutes: 30,
            progress_percent: 25,
            task_title: String::new(),
            is_paused: false,
            pomodoro_count: 0,
        };
        assert_eq!(backend.fetch_encouragement(&request).await.unwrap(), "Nice pace");
    }
}
