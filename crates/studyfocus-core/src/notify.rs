//! Dismissible notifications raised by the timer.
//!
//! Pomodoro phase flips and failed remote writes end up here. They outlive
//! the session that raised them so a failed final write can still be shown
//! after the timer screen is gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Oldest entries are dropped past this many.
const MAX_NOTIFICATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCenter {
    #[serde(default)]
    items: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        level: NotificationLevel,
        title: impl Into<String>,
        body: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.items.push(Notification {
            id,
            level,
            title: title.into(),
            body: body.into(),
            at,
        });
        if self.items.len() > MAX_NOTIFICATIONS {
            let overflow = self.items.len() - MAX_NOTIFICATIONS;
            self.items.drain(..overflow);
        }
        id
    }

    /// Returns false if `id` was already gone.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn errors(&self) -> impl Iterator<Item = &Notification> {
        self.items
            .iter()
            .filter(|n| n.level == NotificationLevel::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
