use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::notification::NotifyError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The Saturday on or after `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let saturday = Weekday::Sat.num_days_from_monday();
    let offset = (saturday + 7 - date.weekday().num_days_from_monday()) % 7;
    date + Days::new(u64::from(offset))
}

/// Week ending of the week before the one containing `today`.
pub fn previous_week_ending(today: NaiveDate) -> NaiveDate {
    week_ending(today) - Days::new(7)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, NotifyError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| NotifyError::InvalidDate(format!("{:?}: {}", value, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
