use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::api::DateWindow;
use crate::error::{AppError, Result};

/// Which end of a date window a bare calendar date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// Midnight at the start of the day.
    Start,
    /// The last second of the day.
    End,
}

/// Parse `YYYY-MM-DD` or an RFC 3339 timestamp into UTC.
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let (hour, minute, second) = match bound {
            DateBound::Start => (0, 0, 0),
            DateBound::End => (23, 59, 59),
        };
        let time = NaiveTime::from_hms_opt(hour, minute, second)
            .ok_or_else(|| AppError::message("invalid time of day"))?;
        return Ok(Utc.from_utc_datetime(&date.and_time(time)));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| {
            AppError::message(format!(
                "`{value}` is neither YYYY-MM-DD nor an RFC 3339 timestamp: {err}"
            ))
        })
}

pub fn date_window(start: &str, end: &str) -> Result<DateWindow> {
    DateWindow::new(
        parse_date_bound(start, DateBound::Start)?,
        parse_date_bound(end, DateBound::End)?,
    )
}
