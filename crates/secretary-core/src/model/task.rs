//! Task records in the `EventItem` wire shape.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::window::TimeWindow;
use crate::error::ValidationError;

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 10;
/// Largest dependency lag, in either direction: one leap year.
pub const MAX_LAG_MIN: i64 = 366 * 24 * 60;

/// Whether the task sits at an immovable time or is placed by the planner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Externally determined start/end; never moved.
    Fixed,
    /// Placed by the planner into free time.
    Flexible,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Fixed => write!(f, "fixed"),
            TaskType::Flexible => write!(f, "flexible"),
        }
    }
}

/// Precedence relation between a task and one of its predecessors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DependencyType {
    /// Successor starts after predecessor finishes.
    #[default]
    #[serde(rename = "FS", alias = "finish-to-start")]
    FinishToStart,
    /// Successor starts after predecessor starts.
    #[serde(rename = "SS", alias = "start-to-start")]
    StartToStart,
    /// Successor finishes after predecessor finishes.
    #[serde(rename = "FF", alias = "finish-to-finish")]
    FinishToFinish,
    /// Successor finishes after predecessor starts.
    #[serde(rename = "SF", alias = "start-to-finish")]
    StartToFinish,
}

impl DependencyType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::FinishToStart => "FS",
            Self::StartToStart => "SS",
            Self::FinishToFinish => "FF",
            Self::StartToFinish => "SF",
        }
    }
}

/// One `depends_on` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub task_id: String,
    #[serde(rename = "type", default)]
    pub kind: DependencyType,
    #[serde(default)]
    pub lag_min: i64,
}

impl Dependency {
    pub fn finish_to_start(task_id: impl Into<String>, lag_min: i64) -> Self {
        Self {
            task_id: task_id.into(),
            kind: DependencyType::FinishToStart,
            lag_min,
        }
    }

    pub fn start_to_start(task_id: impl Into<String>, lag_min: i64) -> Self {
        Self {
            task_id: task_id.into(),
            kind: DependencyType::StartToStart,
            lag_min,
        }
    }
}

/// Extra padding around a flexible placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintOptions {
    #[serde(default)]
    pub min_buffer_before_min: u32,
    #[serde(default)]
    pub min_buffer_after_min: u32,
}

fn default_priority() -> i32 {
    5
}

/// A calendar entry: either a fixed event or a flexible task to be placed.
///
/// Serialized in the `EventItem` shape; fields the planner does not use
/// (`flex`, `location`, `metadata`, ...) are ignored on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TaskType,
    pub duration_min: u32,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,
    #[serde(default)]
    pub travel_time_min: u32,
    #[serde(default)]
    pub family_key: Option<String>,
    #[serde(default)]
    pub pomodoro_opt_in: bool,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<ConstraintOptions>,
    /// Explicit start of a fixed task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    /// Explicit end of a fixed task; defaults to `start + duration_min`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl Task {
    /// A flexible task with defaults for every optional field.
    pub fn flexible(id: impl Into<String>, title: impl Into<String>, duration_min: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: TaskType::Flexible,
            duration_min,
            priority: default_priority(),
            deadline: None,
            time_windows: Vec::new(),
            travel_time_min: 0,
            family_key: None,
            pomodoro_opt_in: false,
            depends_on: Vec::new(),
            constraints: None,
            start: None,
            end: None,
        }
    }

    /// A fixed task occupying `[start, start + duration_min)`.
    pub fn fixed(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        duration_min: u32,
    ) -> Self {
        Self {
            kind: TaskType::Fixed,
            start: Some(start),
            ..Self::flexible(id, title, duration_min)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_family(mut self, family_key: impl Into<String>) -> Self {
        self.family_key = Some(family_key.into());
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.time_windows.push(window);
        self
    }

    pub fn with_travel(mut self, minutes: u32) -> Self {
        self.travel_time_min = minutes;
        self
    }

    pub fn with_pomodoro(mut self) -> Self {
        self.pomodoro_opt_in = true;
        self
    }

    pub fn depending_on(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.kind == TaskType::Fixed
    }

    pub fn is_flexible(&self) -> bool {
        self.kind == TaskType::Flexible
    }

    /// Occupied interval of a fixed task, excluding travel.
    ///
    /// Explicit `start`/`end` win; otherwise the first time window's start is
    /// taken as the start. Flexible tasks have no interval.
    pub fn fixed_interval(&self) -> Option<TimeWindow> {
        if !self.is_fixed() {
            return None;
        }
        let start = self
            .start
            .or_else(|| self.time_windows.first().map(|w| w.start))?;
        let end = self
            .end
            .unwrap_or_else(|| start + Duration::minutes(i64::from(self.duration_min)));
        (end > start).then_some(TimeWindow { start, end })
    }

    /// Minutes reserved before a flexible placement (travel plus buffer).
    pub fn padding_before(&self) -> i64 {
        let buffer = self
            .constraints
            .as_ref()
            .map(|c| c.min_buffer_before_min)
            .unwrap_or(0);
        i64::from(self.travel_time_min) + i64::from(buffer)
    }

    /// Minutes reserved after a flexible placement (travel plus buffer).
    pub fn padding_after(&self) -> i64 {
        let buffer = self
            .constraints
            .as_ref()
            .map(|c| c.min_buffer_after_min)
            .unwrap_or(0);
        i64::from(self.travel_time_min) + i64::from(buffer)
    }

    /// Check field-level invariants that do not need other records.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::invalid("id", "must not be empty"));
        }
        if self.duration_min == 0 {
            return Err(ValidationError::invalid(
                "duration_min",
                format!("task '{}' must have a positive duration", self.id),
            ));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(ValidationError::invalid(
                "priority",
                format!(
                    "priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}, got {}",
                    self.priority
                ),
            ));
        }
        for window in &self.time_windows {
            if window.is_empty() {
                return Err(ValidationError::InvalidTimeRange {
                    start: window.start,
                    end: window.end,
                });
            }
        }
        if self.depends_on.iter().any(|d| d.task_id.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "depends_on",
                "dependency task_id must not be empty",
            ));
        }
        if let Some(dep) = self
            .depends_on
            .iter()
            .find(|d| !(-MAX_LAG_MIN..=MAX_LAG_MIN).contains(&d.lag_min))
        {
            return Err(ValidationError::invalid(
                "lag_min",
                format!(
                    "lag after '{}' must be within ±{MAX_LAG_MIN} min, got {}",
                    dep.task_id, dep.lag_min
                ),
            ));
        }

        match self.kind {
            TaskType::Fixed => {
                if self.fixed_interval().is_none() {
                    return Err(ValidationError::InconsistentPlacement {
                        task_id: self.id.clone(),
                        message: "fixed task needs a start (or a time window) and a positive span"
                            .into(),
                    });
                }
            }
            TaskType::Flexible => {
                if self.start.is_some() || self.end.is_some() {
                    return Err(ValidationError::InconsistentPlacement {
                        task_id: self.id.clone(),
                        message: "flexible task must not carry start/end".into(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn deserializes_event_item_shape() {
        let json = r#"{
            "id": "e1",
            "title": "Write report",
            "type": "flexible",
            "duration_min": 90,
            "priority": 7,
            "deadline": "2025-03-12T17:00:00Z",
            "time_windows": [{"start": "2025-03-10T09:00:00Z", "end": "2025-03-10T17:00:00Z"}],
            "flex": null,
            "location": "Office",
            "travel_time_min": 10,
            "calendar_id": null,
            "external_ids": null,
            "constraints": null,
            "metadata": null,
            "family_key": "work",
            "pomodoro_opt_in": true,
            "depends_on": [
                {"task_id": "e0", "type": "SS", "lag_min": 15},
                {"task_id": "e9"}
            ]
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.kind, TaskType::Flexible);
        assert_eq!(task.priority, 7);
        assert_eq!(task.time_windows.len(), 1);
        assert_eq!(task.depends_on[0].kind, DependencyType::StartToStart);
        assert_eq!(task.depends_on[1].kind, DependencyType::FinishToStart);
        assert_eq!(task.depends_on[1].lag_min, 0);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn long_dependency_spelling_is_accepted() {
        let dep: Dependency =
            serde_json::from_str(r#"{"task_id": "a", "type": "finish-to-finish", "lag_min": 5}"#)
                .unwrap();
        assert_eq!(dep.kind, DependencyType::FinishToFinish);
        assert_eq!(dep.kind.code(), "FF");
    }

    #[test]
    fn fixed_interval_falls_back_to_first_window() {
        let mut task = Task::flexible("f", "Standup", 30);
        task.kind = TaskType::Fixed;
        task.time_windows
            .push(TimeWindow::new(at(9, 0), at(12, 0)).unwrap());

        let interval = task.fixed_interval().unwrap();
        assert_eq!(interval.start, at(9, 0));
        assert_eq!(interval.end, at(9, 30));
    }

    #[test]
    fn fixed_without_time_is_invalid() {
        let mut task = Task::flexible("f", "Nowhere", 30);
        task.kind = TaskType::Fixed;
        assert!(matches!(
            task.validate(),
            Err(ValidationError::InconsistentPlacement { .. })
        ));
    }

    #[test]
    fn flexible_with_start_is_invalid() {
        let mut task = Task::flexible("x", "Bad", 30);
        task.start = Some(at(9, 0));
        assert!(task.validate().is_err());
    }

    #[test]
    fn priority_range_enforced() {
        assert!(Task::flexible("a", "A", 10).with_priority(0).validate().is_err());
        assert!(Task::flexible("a", "A", 10).with_priority(11).validate().is_err());
        assert!(Task::flexible("a", "A", 10).with_priority(10).validate().is_ok());
    }

    #[test]
    fn huge_dependency_lag_is_invalid() {
        let task = Task::flexible("b", "B", 30)
            .depending_on(Dependency::finish_to_start("a", 1_000_000_000_000));
        assert!(matches!(
            task.validate(),
            Err(ValidationError::InvalidValue { field, .. }) if field == "lag_min"
        ));
        let task = Task::flexible("b", "B", 30)
            .depending_on(Dependency::finish_to_start("a", -MAX_LAG_MIN));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn padding_adds_buffers_to_travel() {
        let mut task = Task::flexible("a", "A", 30).with_travel(10);
        task.constraints = Some(ConstraintOptions {
            min_buffer_before_min: 5,
            min_buffer_after_min: 0,
        });
        assert_eq!(task.padding_before(), 15);
        assert_eq!(task.padding_after(), 10);
    }
}
