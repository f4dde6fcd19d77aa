//! Pomodoro segmentation of flexible tasks.
//!
//! A task that opted in is split into work segments of `pomodoro_len_min`
//! separated by breaks; every `long_break_every` completed work segments the
//! break is a long one. Breaks only sit *between* work segments, so the work
//! segments always add up to exactly the task duration and the block's span is
//! work plus breaks.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::Task;

/// Work segments shorter than this are folded into the previous one.
pub const MIN_WORK_SEGMENT_MIN: u32 = 5;

/// Per-user pomodoro configuration, immutable for the duration of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_pomodoro_len")]
    pub pomodoro_len_min: u32,
    #[serde(default = "default_short_break")]
    pub short_break_min: u32,
    #[serde(default = "default_long_break")]
    pub long_break_min: u32,
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u32,
}

fn default_pomodoro_len() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_long_break_every() -> u32 {
    4
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            pomodoro_len_min: default_pomodoro_len(),
            short_break_min: default_short_break(),
            long_break_min: default_long_break(),
            long_break_every: default_long_break_every(),
        }
    }
}

impl PomodoroSettings {
    /// Enabled settings with the classic 25/5/15-every-4 rhythm.
    pub fn classic() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pomodoro_len_min < MIN_WORK_SEGMENT_MIN {
            return Err(ValidationError::invalid(
                "pomodoro_len_min",
                format!(
                    "must be at least {MIN_WORK_SEGMENT_MIN}, got {}",
                    self.pomodoro_len_min
                ),
            ));
        }
        if self.long_break_every == 0 {
            return Err(ValidationError::invalid(
                "long_break_every",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Kind of a segment in a segmented block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SegmentKind {
    pub fn is_break(&self) -> bool {
        !matches!(self, SegmentKind::Work)
    }
}

/// One piece of a segmented block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub length_min: u32,
}

impl Segment {
    pub fn work(length_min: u32) -> Self {
        Self {
            kind: SegmentKind::Work,
            length_min,
        }
    }
}

/// Split `duration_min` of work into pomodoros and breaks.
///
/// Work segments have `pomodoro_len_min`; a final remainder shorter than
/// [`MIN_WORK_SEGMENT_MIN`] is merged into the previous work segment. Zero
/// length breaks are omitted.
pub fn segment(duration_min: u32, settings: &PomodoroSettings) -> Vec<Segment> {
    if duration_min == 0 {
        return Vec::new();
    }
    let len = settings.pomodoro_len_min.max(1);

    let mut work = Vec::with_capacity((duration_min / len + 1) as usize);
    let mut remaining = duration_min;
    while remaining > 0 {
        let piece = remaining.min(len);
        work.push(piece);
        remaining -= piece;
    }
    if work.len() > 1 {
        if let Some(&tail) = work.last() {
            if tail < MIN_WORK_SEGMENT_MIN {
                work.pop();
                if let Some(prev) = work.last_mut() {
                    *prev += tail;
                }
            }
        }
    }

    let every = settings.long_break_every.max(1) as usize;
    let mut segments = Vec::with_capacity(work.len() * 2);
    for (index, length) in work.iter().enumerate() {
        segments.push(Segment::work(*length));
        let completed = index + 1;
        if completed == work.len() {
            break;
        }
        let (kind, length_min) = if completed % every == 0 {
            (SegmentKind::LongBreak, settings.long_break_min)
        } else {
            (SegmentKind::ShortBreak, settings.short_break_min)
        };
        if length_min > 0 {
            segments.push(Segment { kind, length_min });
        }
    }
    segments
}

/// Segments for `task`: pomodoro-split when the task opted in and pomodoro is
/// enabled, otherwise a single work segment of the full duration.
pub fn segment_task(task: &Task, settings: &PomodoroSettings) -> Vec<Segment> {
    if applies_to(task, settings) {
        segment(task.duration_min, settings)
    } else {
        vec![Segment::work(task.duration_min)]
    }
}

/// Whether pomodoro segmentation is used for `task`.
pub fn applies_to(task: &Task, settings: &PomodoroSettings) -> bool {
    settings.enabled && task.pomodoro_opt_in
}

/// Total span (work plus breaks) in minutes.
pub fn span_minutes(segments: &[Segment]) -> i64 {
    segments.iter().map(|s| i64::from(s.length_min)).sum()
}

/// Work-only minutes.
pub fn work_minutes(segments: &[Segment]) -> i64 {
    segments
        .iter()
        .filter(|s| !s.kind.is_break())
        .map(|s| i64::from(s.length_min))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(segments: &[Segment]) -> Vec<(SegmentKind, u32)> {
        segments.iter().map(|s| (s.kind, s.length_min)).collect()
    }

    #[test]
    fn ninety_five_minutes_classic() {
        let segments = segment(95, &PomodoroSettings::classic());
        assert_eq!(
            kinds(&segments),
            vec![
                (SegmentKind::Work, 25),
                (SegmentKind::ShortBreak, 5),
                (SegmentKind::Work, 25),
                (SegmentKind::ShortBreak, 5),
                (SegmentKind::Work, 25),
                (SegmentKind::ShortBreak, 5),
                (SegmentKind::Work, 20),
            ]
        );
        assert_eq!(work_minutes(&segments), 95);
        assert!(!segments.iter().any(|s| s.kind == SegmentKind::LongBreak));
    }

    #[test]
    fn long_break_after_fourth_pomodoro() {
        let segments = segment(130, &PomodoroSettings::classic());
        let long_at = segments
            .iter()
            .position(|s| s.kind == SegmentKind::LongBreak)
            .unwrap();
        let work_before = segments[..long_at]
            .iter()
            .filter(|s| s.kind == SegmentKind::Work)
            .count();
        assert_eq!(work_before, 4);
        assert_eq!(work_minutes(&segments), 130);
        assert_eq!(segments.last().unwrap().length_min, 5);
    }

    #[test]
    fn short_tail_merges_into_previous() {
        let segments = segment(52, &PomodoroSettings::classic());
        assert_eq!(
            kinds(&segments),
            vec![
                (SegmentKind::Work, 25),
                (SegmentKind::ShortBreak, 5),
                (SegmentKind::Work, 27),
            ]
        );
    }

    #[test]
    fn short_task_is_single_segment() {
        assert_eq!(kinds(&segment(3, &PomodoroSettings::classic())), vec![(SegmentKind::Work, 3)]);
        assert_eq!(kinds(&segment(25, &PomodoroSettings::classic())), vec![(SegmentKind::Work, 25)]);
    }

    #[test]
    fn opt_out_yields_one_segment() {
        let task = Task::flexible("t", "T", 95);
        let segments = segment_task(&task, &PomodoroSettings::classic());
        assert_eq!(kinds(&segments), vec![(SegmentKind::Work, 95)]);
    }

    #[test]
    fn disabled_settings_yield_one_segment() {
        let task = Task::flexible("t", "T", 95).with_pomodoro();
        let segments = segment_task(&task, &PomodoroSettings::default());
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn zero_length_breaks_are_skipped() {
        let settings = PomodoroSettings {
            short_break_min: 0,
            ..PomodoroSettings::classic()
        };
        let segments = segment(50, &settings);
        assert_eq!(kinds(&segments), vec![(SegmentKind::Work, 25), (SegmentKind::Work, 25)]);
    }

    #[test]
    fn validate_rejects_tiny_pomodoro() {
        let settings = PomodoroSettings {
            pomodoro_len_min: 3,
            ..PomodoroSettings::classic()
        };
        assert!(settings.validate().is_err());
        assert!(PomodoroSettings::classic().validate().is_ok());
    }
}
