//! Milestone-driven encouragement messages.
//!
//! When progress enters a narrow band just above a milestone (25/50/75 % by
//! default) the trigger asks the coach collaborator for one message, shows
//! it for a fixed dwell time, then re-arms for the next milestone. Each
//! milestone fires at most once per session and fetches never overlap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::Event;
use crate::timer::ActiveSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncouragementSettings {
    pub enabled: bool,
    pub milestones: Vec<u8>,
    /// Width of the trigger band above each milestone, in percent.
    pub band_percent: f64,
    pub dwell_ms: u64,
}

impl Default for EncouragementSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            milestones: vec![25, 50, 75],
            band_percent: 2.0,
            dwell_ms: 12_000,
        }
    }
}

/// Body of the coach fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncouragementRequest {
    pub elapsed_minutes: u64,
    pub remaining_minutes: u64,
    pub progress_percent: u8,
    pub task_title: String,
    pub is_paused: bool,
    pub pomodoro_count: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShownMessage {
    pub milestone: u8,
    pub message: String,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncouragementTrigger {
    settings: EncouragementSettings,
    #[serde(default)]
    fired: Vec<u8>,
    #[serde(default)]
    in_flight: Option<u8>,
    #[serde(default)]
    shown: Option<ShownMessage>,
}

impl EncouragementTrigger {
    pub fn new(settings: EncouragementSettings) -> Self {
        Self {
            settings,
            fired: Vec::new(),
            in_flight: None,
            shown: None,
        }
    }

    pub fn message(&self) -> Option<&ShownMessage> {
        self.shown.as_ref()
    }

    pub fn in_flight(&self) -> Option<u8> {
        self.in_flight
    }

    /// Clear a message whose dwell time is over. Runs on every tick,
    /// paused or not.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Event> {
        match &self.shown {
            Some(shown) if now >= shown.until => {
                self.shown = None;
                Some(Event::EncouragementCleared { at: now })
            }
            _ => None,
        }
    }

    /// Check a running session's progress. Returns the milestone and the
    /// fetch to issue when one is due.
    pub fn observe(
        &mut self,
        active: &ActiveSession,
        elapsed_minutes: u64,
        task_title: &str,
    ) -> Option<(u8, EncouragementRequest)> {
        if !self.settings.enabled || self.shown.is_some() || self.in_flight.is_some() {
            return None;
        }
        let progress = active.progress_percent();
        let band = self.settings.band_percent;
        let milestone = self.settings.milestones.iter().copied().find(|&m| {
            let m_f = f64::from(m);
            progress >= m_f && progress < m_f + band && !self.fired.contains(&m)
        })?;

        self.fired.push(milestone);
        self.in_flight = Some(milestone);
        let request = EncouragementRequest {
            elapsed_minutes,
            remaining_minutes: active.remaining_seconds() / 60,
            progress_percent: progress.round().clamp(0.0, 100.0) as u8,
            task_title: task_title.to_string(),
            is_paused: false,
            pomodoro_count: active.pomodoro().map(|c| c.count()).unwrap_or(0),
        };
        Some((milestone, request))
    }

    /// A fetch came back. Stale answers (other milestone, or after a reset)
    /// are dropped.
    pub fn arrived(&mut self, milestone: u8, message: String, now: DateTime<Utc>) -> Option<Event> {
        if self.in_flight != Some(milestone) {
            debug!(milestone, "dropping stale encouragement");
            return None;
        }
        self.in_flight = None;
        let message = message.trim().to_string();
        if message.is_empty() {
            return None;
        }
        let dwell = Duration::milliseconds(i64::try_from(self.settings.dwell_ms).unwrap_or(i64::MAX));
        let until = now + dwell;
        self.shown = Some(ShownMessage {
            milestone,
            message: message.clone(),
            until,
        });
        Some(Event::EncouragementShown {
            milestone,
            message,
            until,
        })
    }

    /// Failures are silent; the next milestone tries again on its own.
    pub fn failed(&mut self, milestone: u8) {
        if self.in_flight == Some(milestone) {
            self.in_flight = None;
        }
    }

    /// Forget everything for the next session.
    pub fn reset(&mut self) {
        self.fired.clear();
        self.in_flight = None;
        self.shown = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRecord;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    /// 100-minute session advanced by `minutes`, so progress == minutes.
    fn at_progress(minutes: u64) -> ActiveSession {
        let record = SessionRecord::ad_hoc(None, "", 100, t0());
        let mut active = ActiveSession::new(record, t0()).unwrap();
        active.advance(minutes * 60_000);
        active
    }

    #[test]
    fn fires_once_inside_band() {
        let mut trig = EncouragementTrigger::new(EncouragementSettings::default());
        assert!(trig.observe(&at_progress(24), 24, "Essay").is_none());

        let (milestone, req) = trig.observe(&at_progress(25), 25, "Essay").unwrap();
        assert_eq!(milestone, 25);
        assert_eq!(req.remaining_minutes, 75);
        assert_eq!(req.progress_percent, 25);
        assert_eq!(req.task_title, "Essay");

        // In flight: no overlap.
        assert!(trig.observe(&at_progress(26), 26, "Essay").is_none());
        trig.failed(25);
        // Already fired: no retry for this milestone.
        assert!(trig.observe(&at_progress(26), 26, "Essay").is_none());
    }

    #[test]
    fn band_is_narrow() {
        let mut trig = EncouragementTrigger::new(EncouragementSettings::default());
        assert!(trig.observe(&at_progress(28), 28, "").is_none());
        assert!(trig.observe(&at_progress(50), 50, "").is_some());
    }

    #[test]
    fn shown_message_blocks_then_clears() {
        let mut trig = EncouragementTrigger::new(EncouragementSettings::default());
        trig.observe(&at_progress(50), 50, "");
        let shown = trig.arrived(50, "Halfway there".into(), t0()).unwrap();
        assert!(matches!(shown, Event::EncouragementShown { milestone: 50, .. }));
        assert_eq!(trig.message().map(|m| m.message.as_str()), Some("Halfway there"));

        assert!(trig.expire(t0() + Duration::seconds(5)).is_none());
        assert!(trig.expire(t0() + Duration::seconds(12)).is_some());
        assert!(trig.message().is_none());
        assert!(trig.observe(&at_progress(75), 75, "").is_some());
    }

    #[test]
    fn stale_arrival_ignored_after_reset() {
        let mut trig = EncouragementTrigger::new(EncouragementSettings::default());
        trig.observe(&at_progress(25), 25, "");
        trig.reset();
        assert!(trig.arrived(25, "late".into(), t0()).is_none());
        assert!(trig.message().is_none());
    }

    #[test]
    fn disabled_never_fires() {
        let mut trig = EncouragementTrigger::new(EncouragementSettings {
            enabled: false,
            ..EncouragementSettings::default()
        });
        assert!(trig.observe(&at_progress(25), 25, "").is_none());
    }
}
