//! Consecutive date ranges, used to split exports by period.
use std::{fmt::Display, str::FromStr};

use chrono::{Datelike, Days, NaiveDate};

use crate::error::DateTimeError;

/// An inclusive range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateTimeError> {
        if end < start {
            return Err(DateTimeError::ReversedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// `YYYYMMDD-YYYYMMDD`, as used in exported file names.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.start.format("%Y%m%d"), self.end.format("%Y%m%d"))
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Length of the ranges made by a [`DateRangeGenerator`].
///
/// Calendar intervals end on the calendar boundary: a week ends on Sunday, a month on
/// its last day and a year on December 31st. A custom interval is a fixed number of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInterval {
    Day,
    Week,
    Month,
    Year,
    Custom(u32),
}

impl DateInterval {
    /// The last day of the range starting on `date`.
    fn period_end(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            DateInterval::Day => Some(date),
            DateInterval::Week => {
                let to_sunday = 6 - date.weekday().num_days_from_monday();
                date.checked_add_days(Days::new(to_sunday as u64))
            },
            DateInterval::Month => {
                let (y, m) = if date.month() == 12 { (date.year() + 1, 1) } else { (date.year(), date.month() + 1) };
                NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
            },
            DateInterval::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31),
            DateInterval::Custom(n) => date.checked_add_days(Days::new(n.saturating_sub(1) as u64)),
        }
    }
}

impl FromStr for DateInterval {
    type Err = DateTimeError;

    /// Parse `day`, `week`, `month`, `year` or a number of days such as `10` or `10d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "year" | "yearly" => Ok(Self::Year),
            other => other.trim_end_matches('d')
                .parse::<u32>()
                .map(Self::Custom)
                .map_err(|_| DateTimeError::UnknownInterval(s.to_string())),
        }
    }
}

impl Display for DateInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateInterval::Day => write!(f, "day"),
            DateInterval::Week => write!(f, "week"),
            DateInterval::Month => write!(f, "month"),
            DateInterval::Year => write!(f, "year"),
            DateInterval::Custom(n) => write!(f, "{n}d"),
        }
    }
}

/// Splits `[start, end]` into consecutive ranges of one interval each.
///
/// The ranges cover every day between `start` and `end` exactly once; the last one is
/// cut short at `end`.
#[derive(Debug, Clone)]
pub struct DateRangeGenerator {
    start: NaiveDate,
    end: NaiveDate,
    interval: DateInterval,
}

impl DateRangeGenerator {
    pub fn new(start: NaiveDate, end: NaiveDate, interval: DateInterval) -> Result<Self, DateTimeError> {
        if end < start {
            return Err(DateTimeError::ReversedRange { start, end });
        }
        if interval == DateInterval::Custom(0) {
            return Err(DateTimeError::ZeroLengthInterval);
        }
        Ok(Self { start, end, interval })
    }

    pub fn ranges(&self) -> impl Iterator<Item = DateRange> + '_ {
        let first = self.range_from(self.start);
        std::iter::successors(first, |prev| {
            let next_start = prev.end.succ_opt()?;
            self.range_from(next_start)
        })
    }

    fn range_from(&self, start: NaiveDate) -> Option<DateRange> {
        if start > self.end {
            return None;
        }
        let end = self.interval.period_end(start).unwrap_or(self.end).min(self.end);
        Some(DateRange { start, end })
    }
}
