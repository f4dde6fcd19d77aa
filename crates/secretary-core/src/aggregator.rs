//! Family time accounting against daily and weekly targets.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::LocalCalendar;
use crate::model::{Family, TimeWindow};
use crate::store::Snapshot;

/// Tracks minutes allocated to each family.
///
/// Seeded with the fixed tasks of a snapshot; a planning pass records its own
/// placements into its private copy. Families themselves are never mutated.
#[derive(Debug, Clone)]
pub struct FamilyAggregator<'s> {
    families: &'s BTreeMap<String, Family>,
    calendar: LocalCalendar,
    allocations: BTreeMap<String, Vec<TimeWindow>>,
}

impl<'s> FamilyAggregator<'s> {
    pub fn new(families: &'s BTreeMap<String, Family>, calendar: LocalCalendar) -> Self {
        Self {
            families,
            calendar,
            allocations: BTreeMap::new(),
        }
    }

    /// Aggregator with every fixed, family-tagged task counted as allocated.
    pub fn from_snapshot(snapshot: &'s Snapshot, calendar: LocalCalendar) -> Self {
        let mut aggregator = Self::new(&snapshot.families, calendar);
        for task in snapshot.fixed_tasks() {
            if let (Some(key), Some(interval)) = (&task.family_key, task.fixed_interval()) {
                aggregator.record(key, interval);
            }
        }
        aggregator
    }

    pub fn family(&self, key: &str) -> Option<&'s Family> {
        self.families.get(key)
    }

    /// Count `window` as time spent on `family_key`.
    pub fn record(&mut self, family_key: &str, window: TimeWindow) {
        self.allocations
            .entry(family_key.to_string())
            .or_default()
            .push(window);
    }

    /// Minutes of the family's allocations that fall inside `range`.
    pub fn minutes_allocated(&self, family_key: &str, range: &TimeWindow) -> i64 {
        self.allocations
            .get(family_key)
            .map(|windows| windows.iter().map(|w| w.overlap_minutes(range)).sum())
            .unwrap_or(0)
    }

    /// Minutes allocated in the ISO week containing `at`.
    pub fn weekly_allocated(&self, family_key: &str, at: DateTime<Utc>) -> i64 {
        self.minutes_allocated(family_key, &self.calendar.week_window(at))
    }

    pub fn daily_minutes(&self, family_key: &str, date: NaiveDate) -> i64 {
        self.minutes_allocated(family_key, &self.calendar.day_window(date))
    }

    /// Weekly target minus minutes allocated in the week containing `at`,
    /// floored at zero. Zero for unknown families or families without target.
    pub fn deficit(&self, family_key: &str, at: DateTime<Utc>) -> i64 {
        let Some(target) = self.family(family_key).and_then(|f| f.weekly_target_minutes) else {
            return 0;
        };
        (i64::from(target) - self.weekly_allocated(family_key, at)).max(0)
    }

    /// Minutes by which `extra` more minutes would push the week containing
    /// `at` beyond its target.
    pub fn weekly_overuse(&self, family_key: &str, at: DateTime<Utc>, extra: i64) -> i64 {
        let Some(target) = self.family(family_key).and_then(|f| f.weekly_target_minutes) else {
            return 0;
        };
        let target = i64::from(target);
        let allocated = self.weekly_allocated(family_key, at);
        (allocated + extra - target).max(0) - (allocated - target).max(0)
    }

    /// How far the day is below `min_daily_minutes`.
    pub fn daily_shortfall(&self, family_key: &str, date: NaiveDate) -> i64 {
        let Some(min) = self.family(family_key).and_then(|f| f.min_daily_minutes) else {
            return 0;
        };
        (i64::from(min) - self.daily_minutes(family_key, date)).max(0)
    }

    /// Whether adding `windows` would push any local day past
    /// `max_daily_minutes`.
    pub fn would_exceed_daily_cap(&self, family_key: &str, windows: &[TimeWindow]) -> bool {
        let Some(max) = self.family(family_key).and_then(|f| f.max_daily_minutes) else {
            return false;
        };
        let mut added: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for window in windows {
            for (date, part) in self.calendar.split_by_day(window) {
                *added.entry(date).or_default() += part.duration_minutes();
            }
        }
        added
            .into_iter()
            .any(|(date, minutes)| self.daily_minutes(family_key, date) + minutes > i64::from(max))
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }
}
