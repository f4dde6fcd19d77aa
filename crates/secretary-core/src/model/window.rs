//! Half-open time intervals `[start, end)`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A half-open interval of wall-clock time.
///
/// Used both as the `time_windows` entries of a task and as the unit the
/// availability model works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window starting at `start` lasting `minutes`.
    pub fn from_minutes(start: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this window can fit a block of given duration
    pub fn can_fit(&self, minutes: i64) -> bool {
        self.duration_minutes() >= minutes
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether `other` lies completely inside this window.
    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if this window overlaps with another (touching ends do not overlap)
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeWindow { start, end })
    }

    /// Minutes of `self` that fall inside `range`.
    pub fn overlap_minutes(&self, range: &TimeWindow) -> i64 {
        self.intersect(range)
            .map(|w| w.duration_minutes())
            .unwrap_or(0)
    }

    /// Grow the window by `before` minutes at the start and `after` at the end.
    pub fn expand(&self, before: i64, after: i64) -> TimeWindow {
        TimeWindow {
            start: self.start - Duration::minutes(before),
            end: self.end + Duration::minutes(after),
        }
    }
}

/// Sort windows and merge overlapping or touching ones into a disjoint union.
pub fn merge_windows(mut windows: Vec<TimeWindow>) -> Vec<TimeWindow> {
    windows.retain(|w| !w.is_empty());
    windows.sort();

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                if window.end > last.end {
                    last.end = window.end;
                }
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Round `instant` up to the next multiple of `granularity_min` minutes since
/// the Unix epoch. Instants already on the grid are returned unchanged.
pub fn align_up(instant: DateTime<Utc>, granularity_min: u32) -> DateTime<Utc> {
    let step = i64::from(granularity_min.max(1)) * 60;
    let secs = instant.timestamp();
    let rem = secs.rem_euclid(step);
    if rem == 0 && instant.timestamp_subsec_nanos() == 0 {
        return instant;
    }
    let aligned = secs - rem + step;
    Utc.timestamp_opt(aligned, 0).single().unwrap_or(instant)
}
