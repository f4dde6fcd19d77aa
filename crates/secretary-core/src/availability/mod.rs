//! Availability model: free time as the complement of busy time.
//!
//! Busy time is made of fixed tasks (each grown by its travel time on both
//! sides), configured quiet hours, and whatever the planner has already
//! placed during the current pass. Intervals are half-open `[start, end)`.

mod quiet;

pub use quiet::QuietHours;

use chrono::{DateTime, Utc};

use crate::calendar::LocalCalendar;
use crate::error::{CoreError, Result};
use crate::model::{merge_windows, TimeWindow};
use crate::store::Snapshot;

/// Free/busy bookkeeping over a planning range.
///
/// Each planning pass owns its own model, so occupying time never leaks into
/// other passes.
#[derive(Debug, Clone)]
pub struct AvailabilityModel {
    range: TimeWindow,
    /// Sorted, disjoint busy intervals.
    busy: Vec<TimeWindow>,
}

impl AvailabilityModel {
    /// An entirely free model over `range`.
    pub fn new(range: TimeWindow) -> Self {
        Self {
            range,
            busy: Vec::new(),
        }
    }

    /// Build from the fixed tasks of `snapshot` plus quiet hours.
    ///
    /// Every fixed task is checked for overlap, wherever it sits; only those
    /// whose travel-expanded interval touches `range` become busy time.
    ///
    /// # Errors
    /// `SchedulingConflict` if any two fixed tasks overlap;
    /// `Config` if a quiet-hours entry cannot be parsed.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        range: TimeWindow,
        quiet_hours: &[QuietHours],
        calendar: &LocalCalendar,
    ) -> Result<Self> {
        let fixed: Vec<(&str, TimeWindow, i64)> = snapshot
            .fixed_tasks()
            .filter_map(|task| {
                let interval = task.fixed_interval()?;
                Some((task.id.as_str(), interval, i64::from(task.travel_time_min)))
            })
            .collect();

        detect_fixed_conflicts(fixed.iter().map(|(id, w, _)| (*id, *w)))?;

        let mut busy: Vec<TimeWindow> = fixed
            .iter()
            .map(|(_, interval, travel)| interval.expand(*travel, *travel))
            .filter(|expanded| expanded.overlaps(&range))
            .collect();
        for quiet in quiet_hours {
            busy.extend(quiet.windows_in(&range, calendar)?);
        }

        Ok(Self {
            range,
            busy: merge_windows(busy),
        })
    }

    pub fn range(&self) -> TimeWindow {
        self.range
    }

    pub fn busy(&self) -> &[TimeWindow] {
        &self.busy
    }

    /// Mark `window` as busy so later lookups no longer return it.
    pub fn occupy(&mut self, window: TimeWindow) {
        if window.is_empty() {
            return;
        }
        let at = self.busy.partition_point(|b| b.start < window.start);
        self.busy.insert(at, window);
        self.busy = merge_windows(std::mem::take(&mut self.busy));
    }

    /// Whether `window` lies in the model's range and overlaps no busy time.
    pub fn is_free(&self, window: &TimeWindow) -> bool {
        self.range.contains(window) && !self.busy.iter().any(|b| b.overlaps(window))
    }

    /// Free intervals within `range`, in ascending order.
    ///
    /// The returned iterator is lazy and can be cloned to restart it.
    pub fn free_windows(&self, range: TimeWindow) -> FreeWindows<'_> {
        let range = range.intersect(&self.range).unwrap_or(TimeWindow {
            start: self.range.start,
            end: self.range.start,
        });
        let next_busy = self.busy.partition_point(|b| b.end <= range.start);
        FreeWindows {
            busy: &self.busy,
            next_busy,
            cursor: range.start,
            end: range.end,
        }
    }

    /// Free intervals within `range`, restricted to the union of `constraint`
    /// when it is non-empty.
    pub fn free_windows_within<'a>(
        &'a self,
        range: TimeWindow,
        constraint: &[TimeWindow],
    ) -> impl Iterator<Item = TimeWindow> + Clone + 'a {
        let allowed: Vec<TimeWindow> = if constraint.is_empty() {
            vec![range]
        } else {
            merge_windows(constraint.to_vec())
                .into_iter()
                .filter_map(|w| w.intersect(&range))
                .collect()
        };
        allowed
            .into_iter()
            .flat_map(move |window| self.free_windows(window))
    }

    /// Longest free interval in `range`.
    pub fn largest_free_window(&self, range: TimeWindow) -> Option<TimeWindow> {
        self.free_windows(range)
            .max_by_key(|w| (w.duration_minutes(), std::cmp::Reverse(w.start)))
    }

    /// Total free minutes in `range`.
    pub fn free_minutes(&self, range: TimeWindow) -> i64 {
        self.free_windows(range).map(|w| w.duration_minutes()).sum()
    }
}

/// Lazy iterator over the gaps between busy intervals.
#[derive(Debug, Clone)]
pub struct FreeWindows<'a> {
    busy: &'a [TimeWindow],
    next_busy: usize,
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Iterator for FreeWindows<'_> {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        while self.cursor < self.end {
            let Some(busy) = self.busy.get(self.next_busy) else {
                let window = TimeWindow {
                    start: self.cursor,
                    end: self.end,
                };
                self.cursor = self.end;
                return Some(window);
            };
            self.next_busy += 1;

            if busy.end <= self.cursor {
                continue;
            }
            if busy.start <= self.cursor {
                self.cursor = busy.end;
                continue;
            }

            let window = TimeWindow {
                start: self.cursor,
                end: busy.start.min(self.end),
            };
            self.cursor = busy.end;
            return Some(window);
        }
        None
    }
}

/// Fail on the first pair of overlapping fixed intervals.
///
/// Fixed-event overlap is a data error; the planner never merges it away.
pub fn detect_fixed_conflicts<'a>(
    fixed: impl IntoIterator<Item = (&'a str, TimeWindow)>,
) -> Result<()> {
    let mut sorted: Vec<(&str, TimeWindow)> = fixed.into_iter().collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let mut reach: Option<(&str, TimeWindow)> = None;
    for (id, window) in sorted {
        if let Some((prev_id, prev)) = reach {
            if window.start < prev.end {
                return Err(CoreError::SchedulingConflict {
                    first: prev_id.to_string(),
                    second: id.to_string(),
                    overlap_start: window.start,
                    overlap_end: window.end.min(prev.end),
                });
            }
        }
        if reach.map_or(true, |(_, prev)| window.end > prev.end) {
            reach = Some((id, window));
        }
    }
    Ok(())
}
