//! Remote collaborators the timer writes to.
//!
//! Each collaborator is a small async trait so hosts can plug in the HTTP
//! backend, the in-memory recorder, or their own transport. Calls are
//! issued by the driver without blocking the tick loop.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::encouragement::EncouragementRequest;
use crate::error::RemoteError;
use crate::session::{SessionPatch, TaskPatch};

pub use http::HttpBackend;
pub use memory::{MemoryBackend, RemoteCall};

/// Session CRUD collaborator (partial updates only).
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn update_session(&self, session_id: i64, patch: &SessionPatch) -> Result<(), RemoteError>;
}

/// Task CRUD collaborator (tracked time and subtasks).
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn update_task(&self, task_id: i64, patch: &TaskPatch) -> Result<(), RemoteError>;
}

/// Coach collaborator producing short encouragement messages.
#[async_trait]
pub trait EncouragementService: Send + Sync {
    async fn fetch_encouragement(&self, request: &EncouragementRequest) -> Result<String, RemoteError>;
}

/// Everything the driver needs from the outside world.
pub trait Backend: SessionService + TaskService + EncouragementService {
    /// Identifier used in logs ("http", "memory").
    fn name(&self) -> &str;
}
