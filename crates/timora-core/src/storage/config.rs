//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Timer durations and long-break cadence
//! - Planner rule overrides and the optional remote optimizer
//! - Sync retry behaviour
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::rules::RuleSet;
use crate::sync::RetryPolicy;
use crate::timer::TimerSettings;

/// Timer-specific configuration. Missing keys take the
/// [`TimerSettings`] defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub sessions_before_long_break: u32,
}

/// Planner rule overrides. Anything not listed keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_day_start")]
    pub day_start: String,
    #[serde(default = "default_max_block_minutes")]
    pub max_block_minutes: u16,
    #[serde(default = "default_micro_break_minutes")]
    pub micro_break_minutes: u16,
    #[serde(default = "default_long_break_planned")]
    pub long_break_minutes: u16,
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u16,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub optimizer_enabled: bool,
    #[serde(default = "default_optimizer_url")]
    pub optimizer_url: String,
    #[serde(default = "default_optimizer_timeout_secs")]
    pub optimizer_timeout_secs: u64,
}

/// Sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

// Default functions
fn default_day_start() -> String {
    "09:00".into()
}
fn default_max_block_minutes() -> u16 {
    60
}
fn default_micro_break_minutes() -> u16 {
    10
}
fn default_long_break_planned() -> u16 {
    30
}
fn default_long_break_every() -> u16 {
    4
}
fn default_topics() -> Vec<String> {
    RuleSet::default().topics
}
fn default_optimizer_url() -> String {
    "http://localhost:3000/api/generate-plan".into()
}
fn default_optimizer_timeout_secs() -> u64 {
    20
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerSettings::default().into()
    }
}

impl TimerConfig {
    pub fn settings(&self) -> TimerSettings {
        TimerSettings {
            focus_minutes: self.focus_minutes,
            short_break_minutes: self.short_break_minutes,
            long_break_minutes: self.long_break_minutes,
            sessions_before_long_break: self.sessions_before_long_break,
        }
    }
}

impl From<TimerSettings> for TimerConfig {
    fn from(s: TimerSettings) -> Self {
        Self {
            focus_minutes: s.focus_minutes,
            short_break_minutes: s.short_break_minutes,
            long_break_minutes: s.long_break_minutes,
            sessions_before_long_break: s.sessions_before_long_break,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            day_start: default_day_start(),
            max_block_minutes: default_max_block_minutes(),
            micro_break_minutes: default_micro_break_minutes(),
            long_break_minutes: default_long_break_planned(),
            long_break_every: default_long_break_every(),
            topics: default_topics(),
            optimizer_enabled: false,
            optimizer_url: default_optimizer_url(),
            optimizer_timeout_secs: default_optimizer_timeout_secs(),
        }
    }
}

impl PlannerConfig {
    /// Build the rule set these overrides describe.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for an unparseable day start,
    /// planned break lengths outside their allowed windows, or a rule set
    /// that cannot fit in a day.
    pub fn to_rules(&self) -> Result<RuleSet, ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: format!("planner.{key}"),
            message,
        };

        let mut rules = RuleSet::default();
        rules.day_start = self
            .day_start
            .parse()
            .map_err(|e| invalid("day_start", format!("{e}")))?;
        rules.max_block_minutes = self.max_block_minutes;
        rules.long_break_every = self.long_break_every;
        rules.topics = self.topics.clone();

        if !rules.micro_break.contains(self.micro_break_minutes) {
            return Err(invalid(
                "micro_break_minutes",
                format!(
                    "must be within {}..={}",
                    rules.micro_break.min_minutes, rules.micro_break.max_minutes
                ),
            ));
        }
        rules.micro_break.planned_minutes = self.micro_break_minutes;

        if !rules.long_break.contains(self.long_break_minutes) {
            return Err(invalid(
                "long_break_minutes",
                format!(
                    "must be within {}..={}",
                    rules.long_break.min_minutes, rules.long_break.max_minutes
                ),
            ));
        }
        rules.long_break.planned_minutes = self.long_break_minutes;

        if rules.max_block_minutes > 60 {
            return Err(invalid("max_block_minutes", "study blocks last at most 60 minutes".into()));
        }
        rules
            .check()
            .map_err(|e| ConfigError::InvalidValue {
                key: "planner".into(),
                message: e.to_string(),
            })?;
        Ok(rules)
    }

    pub fn optimizer_timeout(&self) -> Duration {
        Duration::from_secs(self.optimizer_timeout_secs.max(1))
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
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as a whole number")));
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

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn flatten_into(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    Self::flatten_into(&key, v, out);
                }
            }
            serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    /// `<data_dir>/config.toml`
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory or write and return the default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
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

    /// Persist to the data directory.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written to disk.
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

    /// Set a config value by key, in memory. The result is checked before
    /// it replaces the current config; call [`Config::save`] to persist.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting planner rules are inconsistent.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.planner.to_rules()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            Self::flatten_into("", &json, &mut out);
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.timer.focus_minutes, 25);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nfocus_minutes = 50\n").unwrap();
        assert_eq!(parsed.timer.focus_minutes, 50);
        assert_eq!(parsed.timer.short_break_minutes, 5);
        assert_eq!(parsed.planner.day_start, "09:00");
        assert_eq!(parsed.sync.retry.max_attempts, 5);
    }

    #[test]
    fn timer_defaults_follow_timer_settings() {
        let defaults = TimerSettings::default();
        assert_eq!(TimerConfig::default().settings(), defaults);

        let parsed: Config = toml::from_str("[timer]\nlong_break_minutes = 30\n").unwrap();
        let settings = parsed.timer.settings();
        assert_eq!(settings.long_break_minutes, 30);
        assert_eq!(settings.focus_minutes, defaults.focus_minutes);
        assert_eq!(settings.sessions_before_long_break, defaults.sessions_before_long_break);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("planner.day_start").as_deref(), Some("09:00"));
        assert_eq!(cfg.get("sync.retry.jitter").as_deref(), Some("true"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("timer.focus_minutes", "40").unwrap();
        cfg.set("planner.optimizer_enabled", "true").unwrap();
        cfg.set("planner.day_start", "07:30").unwrap();
        cfg.set("planner.topics", r#"["Drill","Recap"]"#).unwrap();
        assert_eq!(cfg.timer.focus_minutes, 40);
        assert!(cfg.planner.optimizer_enabled);
        assert_eq!(cfg.planner.to_rules().unwrap().day_start.to_string(), "07:30");
        assert_eq!(cfg.planner.topics, ["Drill", "Recap"]);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("planner.optimizer_enabled", "maybe").is_err());
        assert!(cfg.set("timer.focus_minutes", "-3").is_err());
        assert!(cfg.set("planner.day_start", "25:00").is_err());
        assert!(cfg.set("planner.micro_break_minutes", "40").is_err());
        // Failed sets leave the config untouched.
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn planner_defaults_match_rule_defaults() {
        assert_eq!(PlannerConfig::default().to_rules().unwrap(), RuleSet::default());
    }

    #[test]
    fn entries_lists_leaf_keys() {
        let entries = Config::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "timer.focus_minutes" && v == "25"));
        assert!(entries.iter().any(|(k, _)| k == "sync.retry.max_attempts"));
        let keys: Vec<&String> = entries.iter().map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn load_from_missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg;
        changed.set("timer.long_break_minutes", "20").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().timer.long_break_minutes, 20);
    }

    #[test]
    fn load_from_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
