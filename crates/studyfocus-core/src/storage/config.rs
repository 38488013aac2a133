//! TOML-based application configuration.
//!
//! Stores:
//! - Pomodoro work/break lengths
//! - The stop confirmation window
//! - Encouragement milestones and dwell time
//! - Backend URL, token and timeout
//! - Tick interval and the default ad-hoc length
//!
//! Configuration is stored at `~/.config/studyfocus/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::controller::ControllerSettings;
use crate::encouragement::EncouragementSettings;
use crate::error::ConfigError;
use crate::timer::PomodoroDurations;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Window in which a second stop request confirms the first.
    #[serde(default = "default_stop_confirm_secs")]
    pub stop_confirm_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncouragementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_milestones")]
    pub milestones: Vec<u8>,
    #[serde(default = "default_band_percent")]
    pub band_percent: f64,
    #[serde(default = "default_dwell_secs")]
    pub dwell_secs: u64,
}

/// Planner backend. Without a `base_url` the CLI records writes locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    #[serde(default = "default_ad_hoc_minutes")]
    pub default_ad_hoc_minutes: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyfocus/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub encouragement: EncouragementConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_stop_confirm_secs() -> u64 {
    3
}
fn default_true() -> bool {
    true
}
fn default_milestones() -> Vec<u8> {
    vec![25, 50, 75]
}
fn default_band_percent() -> f64 {
    2.0
}
fn default_dwell_secs() -> u64 {
    12
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_tick_millis() -> u64 {
    1000
}
fn default_ad_hoc_minutes() -> u32 {
    25
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            break_minutes: default_break_minutes(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            stop_confirm_secs: default_stop_confirm_secs(),
        }
    }
}

impl Default for EncouragementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            milestones: default_milestones(),
            band_percent: default_band_percent(),
            dwell_secs: default_dwell_secs(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn token(&self) -> Option<String> {
        Some(self.token.trim().to_string()).filter(|t| !t.is_empty())
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            default_ad_hoc_minutes: default_ad_hoc_minutes(),
        }
    }
}

impl TimerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

impl From<&Config> for ControllerSettings {
    fn from(cfg: &Config) -> Self {
        ControllerSettings {
            pomodoro: PomodoroDurations::from_minutes(
                cfg.pomodoro.work_minutes,
                cfg.pomodoro.break_minutes,
            ),
            stop_confirm_ms: cfg.resolver.stop_confirm_secs.saturating_mul(1000),
            encouragement: EncouragementSettings {
                enabled: cfg.encouragement.enabled,
                milestones: cfg.encouragement.milestones.clone(),
                band_percent: cfg.encouragement.band_percent,
                dwell_ms: cfg.encouragement.dwell_secs.saturating_mul(1000),
            },
            default_ad_hoc_minutes: cfg.timer.default_ad_hoc_minutes,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                continue;
            }
            let obj = current
                .as_object_mut()
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Reject values that would make the timer misbehave.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.pomodoro.work_minutes == 0 {
            return Err(invalid("pomodoro.work_minutes", "must be at least 1"));
        }
        if self.pomodoro.break_minutes == 0 {
            return Err(invalid("pomodoro.break_minutes", "must be at least 1"));
        }
        if self.timer.tick_millis == 0 {
            return Err(invalid("timer.tick_millis", "must be at least 1"));
        }
        if self.timer.default_ad_hoc_minutes == 0 {
            return Err(invalid("timer.default_ad_hoc_minutes", "must be at least 1"));
        }
        if self.encouragement.milestones.iter().any(|m| *m == 0 || *m >= 100) {
            return Err(invalid("encouragement.milestones", "must be between 1 and 99"));
        }
        let band = self.encouragement.band_percent;
        if band.is_nan() || band <= 0.0 {
            return Err(invalid("encouragement.band_percent", "must be positive"));
        }
        Ok(())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if absent.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without persisting.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value does not parse or
    /// validate.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Set a value by key and save.
    ///
    /// # Errors
    /// See [`Config::apply`] and [`Config::save`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings::from(self)
    }
}
