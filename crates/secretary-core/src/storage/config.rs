//! TOML-based planner configuration.
//!
//! Stores user preferences including:
//! - Planner tunables (timezone, horizon, slot grid, candidate limit, timeout)
//! - Default pomodoro settings
//! - Daily quiet hours
//! - Objective weights
//!
//! Configuration is stored at `~/.config/calendar-secretary/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::availability::QuietHours;
use crate::calendar::parse_timezone;
use crate::error::ConfigError;
use crate::planner::ObjectiveWeights;
use crate::pomodoro::PomodoroSettings;

/// `[planner]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// IANA timezone used for days, weeks and quiet hours.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u32,
    #[serde(default = "default_slot_granularity")]
    pub slot_granularity_min: u32,
    #[serde(default = "default_min_useful_gap")]
    pub min_useful_gap_min: u32,
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_task: usize,
    /// Planning budget; unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/calendar-secretary/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub pomodoro: PomodoroSettings,
    #[serde(default)]
    pub weights: ObjectiveWeights,
    #[serde(default)]
    pub quiet_hours: Vec<QuietHours>,
}

fn default_timezone() -> String {
    "UTC".into()
}
fn default_horizon_hours() -> u32 {
    168
}
fn default_slot_granularity() -> u32 {
    5
}
fn default_min_useful_gap() -> u32 {
    15
}
fn default_max_candidates() -> usize {
    96
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            horizon_hours: default_horizon_hours(),
            slot_granularity_min: default_slot_granularity(),
            min_useful_gap_min: default_min_useful_gap(),
            max_candidates_per_task: default_max_candidates(),
            timeout_ms: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            pomodoro: PomodoroSettings::default(),
            weights: ObjectiveWeights::default(),
            quiet_hours: Vec::new(),
        }
    }
}

fn unknown(key: &str) -> ConfigError {
    ConfigError::UnknownKey(key.to_string())
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
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
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown(key));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(|| unknown(key))?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(|| unknown(key))?;
            let existing = obj.get(part).ok_or_else(|| unknown(key))?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(key, e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(key, format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(key, format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(key, e.to_string()))?
                }
                // Optional field currently unset.
                serde_json::Value::Null => match value {
                    "" | "none" | "null" => serde_json::Value::Null,
                    _ => serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.into())),
                },
                serde_json::Value::String(_) => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown(key))
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there when the file is missing.
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
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
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

    /// Set a config value by key, keeping the type of the current value.
    ///
    /// The change is validated but not saved; call [`Config::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range. On error `self` is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        // Optional fields skipped when unset still count as known keys.
        if let Some(planner) = json.get_mut("planner").and_then(|p| p.as_object_mut()) {
            planner
                .entry("timeout_ms")
                .or_insert(serde_json::Value::Null);
        }
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_timezone(&self.planner.timezone)?;
        if self.planner.horizon_hours == 0 {
            return Err(invalid("planner.horizon_hours", "must be at least 1"));
        }
        if !(1..=1440).contains(&self.planner.slot_granularity_min) {
            return Err(invalid(
                "planner.slot_granularity_min",
                "must be between 1 and 1440",
            ));
        }
        if self.planner.max_candidates_per_task == 0 {
            return Err(invalid("planner.max_candidates_per_task", "must be at least 1"));
        }
        self.pomodoro
            .validate()
            .map_err(|e| invalid("pomodoro", e.to_string()))?;
        for quiet in &self.quiet_hours {
            quiet.bounds()?;
        }
        let weights = serde_json::to_value(self.weights)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        if let Some(map) = weights.as_object() {
            for (name, weight) in map {
                if !weight.as_f64().is_some_and(f64::is_finite) {
                    return Err(invalid(&format!("weights.{name}"), "must be a finite number"));
                }
            }
        }
        Ok(())
    }

    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.planner.horizon_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.planner.timezone, "UTC");
        assert_eq!(cfg.planner.horizon_hours, 168);
        assert_eq!(cfg.planner.slot_granularity_min, 5);
        assert_eq!(cfg.planner.max_candidates_per_task, 96);
        assert!(!cfg.pomodoro.enabled);
        assert_eq!(cfg.pomodoro.pomodoro_len_min, 25);
        assert_eq!(cfg.weights.family_deficit, 3.0);
        assert!(cfg.quiet_hours.is_empty());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(indoc! {r#"
            [planner]
            timezone = "Europe/Helsinki"

            [weights]
            deadline = 6.5

            [[quiet_hours]]
            start = "22:00"
            end = "07:00"
        "#})
        .unwrap();
        assert_eq!(cfg.planner.timezone, "Europe/Helsinki");
        assert_eq!(cfg.planner.horizon_hours, 168);
        assert_eq!(cfg.weights.deadline, 6.5);
        assert_eq!(cfg.weights.priority, 1.0);
        assert_eq!(cfg.quiet_hours, vec![QuietHours::new("22:00", "07:00")]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("planner.timezone").as_deref(), Some("UTC"));
        assert_eq!(cfg.get("pomodoro.enabled").as_deref(), Some("false"));
        assert_eq!(cfg.get("planner.slot_granularity_min").as_deref(), Some("5"));
        assert!(cfg.get("planner.missing_key").is_none());
    }

    #[test]
    fn set_preserves_types() {
        let mut cfg = Config::default();
        cfg.set("pomodoro.enabled", "true").unwrap();
        cfg.set("planner.horizon_hours", "48").unwrap();
        cfg.set("weights.priority", "2.5").unwrap();
        cfg.set("planner.timezone", "Asia/Tokyo").unwrap();
        assert!(cfg.pomodoro.enabled);
        assert_eq!(cfg.planner.horizon_hours, 48);
        assert_eq!(cfg.weights.priority, 2.5);
        assert_eq!(cfg.planner.timezone, "Asia/Tokyo");
    }

    #[test]
    fn set_optional_timeout() {
        let mut cfg = Config::default();
        cfg.set("planner.timeout_ms", "500").unwrap();
        assert_eq!(cfg.planner.timeout_ms, Some(500));
        cfg.set("planner.timeout_ms", "none").unwrap();
        assert_eq!(cfg.planner.timeout_ms, None);
    }

    #[test]
    fn set_rejects_unknown_and_invalid() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("planner.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("pomodoro.enabled", "maybe").is_err());
        assert!(cfg.set("planner.horizon_hours", "-3").is_err());
        assert!(cfg.set("planner.timezone", "Nowhere/Special").is_err());
        assert!(cfg.set("pomodoro.pomodoro_len_min", "2").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.quiet_hours.push(QuietHours::new("12:00", "13:00"));
        cfg.planner.timeout_ms = Some(1000);
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn malformed_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[planner\nnot toml").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
