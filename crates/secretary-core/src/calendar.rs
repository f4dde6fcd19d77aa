//! Local calendar arithmetic: days and ISO weeks in the user's timezone.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::model::TimeWindow;

/// Parse an IANA timezone name such as `"Europe/Helsinki"`.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>().map_err(|_| ConfigError::InvalidValue {
        key: "planner.timezone".into(),
        message: format!("unknown timezone: {name}"),
    })
}

/// Maps instants to local calendar days and weeks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCalendar {
    tz: Tz,
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl LocalCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Local date containing `instant`.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// UTC instant of a local wall-clock time. DST gaps resolve to the first
    /// valid instant after the gap; folds resolve to the earlier instant.
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        self.resolve(date.and_time(time))
    }

    fn resolve(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
            LocalResult::None => {
                // Walk forward out of the gap; gaps are at most a few hours.
                (1..=4)
                    .find_map(|h| {
                        self.tz
                            .from_local_datetime(&(naive + Duration::hours(h)))
                            .earliest()
                    })
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
            }
        }
    }

    /// `[local midnight, next local midnight)` of `date`.
    pub fn day_window(&self, date: NaiveDate) -> TimeWindow {
        let next = date.succ_opt().unwrap_or(date);
        TimeWindow {
            start: self.to_utc(date, NaiveTime::MIN),
            end: self.to_utc(next, NaiveTime::MIN),
        }
    }

    /// The ISO week (Monday 00:00 local onwards) containing `instant`.
    pub fn week_window(&self, instant: DateTime<Utc>) -> TimeWindow {
        let day = self.day_of(instant);
        let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
        TimeWindow {
            start: self.to_utc(monday, NaiveTime::MIN),
            end: self.to_utc(monday + Duration::days(7), NaiveTime::MIN),
        }
    }

    /// Every local date touched by `range`.
    pub fn days_in(&self, range: &TimeWindow) -> Vec<NaiveDate> {
        if range.is_empty() {
            return Vec::new();
        }
        let first = self.day_of(range.start);
        let last = self.day_of(range.end - Duration::nanoseconds(1));
        first
            .iter_days()
            .take_while(|d| *d <= last)
            .collect()
    }

    /// Split `window` at local midnights.
    pub fn split_by_day(&self, window: &TimeWindow) -> Vec<(NaiveDate, TimeWindow)> {
        self.days_in(window)
            .into_iter()
            .filter_map(|date| {
                self.day_window(date)
                    .intersect(window)
                    .map(|part| (date, part))
            })
            .collect()
    }
}
