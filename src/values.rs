//! The cell values stored in canonical tables.
//!
//! Every cell of a table is a [`Value`]. Values read from provider files are first
//! inferred leniently from their raw text (see [`Value::from_raw_str`]), then coerced
//! to the type declared by the variable that owns the column (see [`Value::coerce`]).
//! After coercion, the only marker for "no value" is [`Value::Missing`]; NaNs and
//! provider sentinels never make it into a canonical table.
use std::{cmp::Ordering, fmt::Display};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Format used to write timestamps in exported files.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    TIMESTAMP_FMT,
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y%m%d%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// The default origin for numeric times, 1950-01-01 00:00:00.
///
/// Numeric values coerced to timestamps are interpreted as (possibly fractional)
/// days since an origin. This is the origin used by ARGO files.
pub fn default_time_origin() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1950, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// The type of a variable, which every non-missing value in its column must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ValueType {
    #[strum(to_string = "integer", serialize = "int")]
    Integer,
    #[strum(to_string = "float", serialize = "double")]
    Float,
    #[strum(to_string = "text", serialize = "str", serialize = "string")]
    Text,
    #[strum(to_string = "timestamp", serialize = "datetime", serialize = "datetime64")]
    Timestamp,
}

/// A single cell in a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Infer a value from a raw cell of a text file.
    ///
    /// Empty cells and the usual spellings of NaN become [`Value::Missing`]. Otherwise
    /// the cell is an integer if it parses as one, then a float, and text as a last resort.
    /// No conversion to timestamps is attempted here; that happens in [`Value::coerce`].
    pub fn from_raw_str(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || is_nan_str(s) {
            return Self::Missing;
        }

        if let Ok(i) = s.parse::<i64>() {
            Self::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            Self::from_f64(f)
        } else {
            Self::Text(s.to_string())
        }
    }

    /// Wrap a float, mapping NaN to [`Value::Missing`].
    pub fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            Self::Missing
        } else {
            Self::Float(v)
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// The numeric value of integer and float cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Like [`Value::as_f64`], but also parses text that looks like a number.
    ///
    /// A leading `<` (detection limit notation, e.g. "<0.05") is ignored.
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::Text(s) => parse_float_text(s),
            _ => self.as_f64(),
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let Self::Timestamp(ts) = self {
            Some(*ts)
        } else {
            None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let Self::Text(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// The type of this value, `None` for a missing value.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Missing => None,
            Self::Int(_) => Some(ValueType::Integer),
            Self::Float(f) if f.is_nan() => None,
            Self::Float(_) => Some(ValueType::Float),
            Self::Text(_) => Some(ValueType::Text),
            Self::Timestamp(_) => Some(ValueType::Timestamp),
        }
    }

    /// Convert this value to `ty`.
    ///
    /// Returns `None` if the conversion is not possible, in which case the caller is
    /// expected to count the failure and store [`Value::Missing`]. Missing values
    /// (including NaN floats) always coerce to [`Value::Missing`].
    ///
    /// Numbers converted to timestamps are taken as days since `time_origin`.
    pub fn coerce(&self, ty: ValueType, time_origin: NaiveDateTime) -> Option<Value> {
        if self.is_missing() {
            return Some(Self::Missing);
        }

        match (ty, self) {
            (ValueType::Integer, Self::Int(_)) => Some(self.clone()),
            (ValueType::Integer, Self::Float(f)) => float_to_int(*f).map(Self::Int),
            (ValueType::Integer, Self::Text(s)) => {
                let s = s.trim();
                s.parse::<i64>().ok()
                    .or_else(|| parse_float_text(s).and_then(float_to_int))
                    .map(Self::Int)
            },
            (ValueType::Integer, Self::Timestamp(_)) => None,

            (ValueType::Float, Self::Int(i)) => Some(Self::Float(*i as f64)),
            (ValueType::Float, Self::Float(_)) => Some(self.clone()),
            (ValueType::Float, Self::Text(s)) => {
                if is_nan_str(s.trim()) {
                    Some(Self::Missing)
                } else {
                    parse_float_text(s).map(Self::from_f64)
                }
            },
            (ValueType::Float, Self::Timestamp(_)) => None,

            (ValueType::Text, Self::Text(_)) => Some(self.clone()),
            (ValueType::Text, _) => Some(Self::Text(self.to_string())),

            (ValueType::Timestamp, Self::Timestamp(_)) => Some(self.clone()),
            (ValueType::Timestamp, Self::Int(_) | Self::Float(_)) => {
                let days = self.as_f64()?;
                days_since(time_origin, days).map(Self::Timestamp)
            },
            (ValueType::Timestamp, Self::Text(s)) => parse_timestamp(s).map(Self::Timestamp),

            (_, Self::Missing) => Some(Self::Missing),
        }
    }

    /// Equality that treats integers, floats and numeric text as the same number.
    ///
    /// Used to compare quality flags (which may be read as integers, floats or characters
    /// depending on the file type) and allow-list constraints.
    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self.numeric_value(), other.numeric_value()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (Self::Text(a), Self::Text(b)) => a.trim() == b.trim(),
                _ => !self.is_missing() && self == other,
            },
        }
    }

    /// Ordering between two values of comparable kinds.
    ///
    /// Numbers compare with numbers, timestamps with timestamps and text with text.
    /// Any other combination, and any missing value, is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Missing => write!(f, "nan"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FMT)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Timestamp(value.and_time(NaiveTime::MIN))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(|v| v.into()).unwrap_or(Value::Missing)
    }
}

fn is_nan_str(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "nan" | "na" | "n/a" | "null" | "none")
}

fn parse_float_text(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_prefix('<').unwrap_or(s).trim_start();
    s.parse::<f64>().ok()
}

fn float_to_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn days_since(origin: NaiveDateTime, days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() {
        return None;
    }
    // Round to the second; ARGO times are stored as fractional days
    let seconds = (days * 86400.0).round();
    if seconds.abs() > 1e13 {
        return None;
    }
    origin.checked_add_signed(TimeDelta::try_seconds(seconds as i64)?)
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}
