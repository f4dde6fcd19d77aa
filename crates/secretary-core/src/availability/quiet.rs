//! Recurring daily quiet hours.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::calendar::LocalCalendar;
use crate::error::ConfigError;
use crate::model::TimeWindow;

/// A daily range (`"HH:MM"` local time) in which nothing is scheduled.
///
/// `end <= start` wraps past midnight, e.g. `22:00`–`07:00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
}

impl QuietHours {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| ConfigError::InvalidValue {
            key: format!("quiet_hours.{key}"),
            message: format!("'{value}' is not HH:MM: {e}"),
        })
    }

    /// Parse both bounds.
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        Ok((
            Self::parse_time("start", &self.start)?,
            Self::parse_time("end", &self.end)?,
        ))
    }

    /// Concrete quiet intervals that intersect `range`.
    pub fn windows_in(
        &self,
        range: &TimeWindow,
        calendar: &LocalCalendar,
    ) -> Result<Vec<TimeWindow>, ConfigError> {
        let (start, end) = self.bounds()?;
        if start == end {
            // Zero-length range means "no quiet hours", not "always quiet".
            return Ok(Vec::new());
        }

        let mut days = calendar.days_in(range);
        // A range wrapping midnight that began the previous evening.
        if let Some(first) = days.first().and_then(|d| d.pred_opt()) {
            days.insert(0, first);
        }

        let windows = days
            .into_iter()
            .filter_map(|date| {
                let from = calendar.to_utc(date, start);
                let until = if end <= start {
                    calendar.to_utc(date.succ_opt()?, end)
                } else {
                    calendar.to_utc(date, end)
                };
                TimeWindow::new(from, until).ok()?.intersect(range)
            })
            .collect();
        Ok(windows)
    }
}
