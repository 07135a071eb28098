//! Scalar value type
//!
//! Every boundary conversion in the resolver core (column extraction,
//! formula evaluation, display serialisation) passes through [`Scalar`].

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// A civil date with an optional time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl DateValue {
    /// Create a date-only value.
    pub fn new(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    /// Create a date with time-of-day.
    pub fn with_time(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }

    /// Parse an ISO-8601-ish date or date-time string.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and
    /// `YYYY-MM-DDTHH:MM[:SS]` (a trailing `Z` is tolerated).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_end_matches('Z');

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::new(date));
        }

        for fmt in [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
        ] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Self::with_time(dt.date(), dt.time()));
            }
        }

        None
    }

    /// Serial representation: days from the Common Era plus the time-of-day
    /// as a fraction of a day. Used for numeric coercion and comparison.
    pub fn as_serial(&self) -> f64 {
        let days = self.date.num_days_from_ce() as f64;
        let fraction = match self.time {
            Some(t) => t.num_seconds_from_midnight() as f64 / 86_400.0,
            None => 0.0,
        };
        days + fraction
    }
}

/// Tagged scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// IEEE-754 double
    Number(f64),
    /// UTF-8 text
    Text(String),
    /// Boolean
    Bool(bool),
    /// Civil date, optional time-of-day
    Date(DateValue),
    /// Absent value
    Empty,
}

impl Scalar {
    /// Create a text scalar.
    pub fn text<S: Into<String>>(s: S) -> Self {
        Scalar::Text(s.into())
    }

    /// Check if the scalar is empty. The empty string counts as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Scalar::Empty => true,
            Scalar::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Convert to number, if possible.
    ///
    /// Strings parse leniently (surrounding whitespace and thousands
    /// separators are tolerated). Dates coerce to their serial form so that
    /// comparisons order chronologically.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Bool(true) => Some(1.0),
            Scalar::Bool(false) => Some(0.0),
            Scalar::Text(s) => parse_number_lenient(s),
            Scalar::Date(d) => Some(d.as_serial()),
            Scalar::Empty => Some(0.0),
        }
    }

    /// Numeric coercion with the fallback the function library uses:
    /// values that do not coerce contribute 0.
    pub fn as_number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Whether this scalar coerces to a number. Non-numeric text does not.
    pub fn is_numeric(&self) -> bool {
        match self {
            Scalar::Text(s) => parse_number_lenient(s).is_some(),
            Scalar::Empty => false,
            _ => true,
        }
    }

    /// Convert to boolean.
    pub fn as_bool(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => *n != 0.0,
            Scalar::Text(s) => {
                if s.eq_ignore_ascii_case("false") || s.is_empty() {
                    false
                } else if s.eq_ignore_ascii_case("true") {
                    true
                } else {
                    // Non-empty text is truthy unless it is a zero number
                    parse_number_lenient(s).map_or(true, |n| n != 0.0)
                }
            }
            Scalar::Date(_) => true,
            Scalar::Empty => false,
        }
    }

    /// The display string of this scalar (same as `Display`).
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Loose equality: numeric when both sides coerce to numbers, otherwise
    /// by display string. This is the `=` operator's and `SWITCH`'s notion
    /// of equality.
    pub fn loosely_eq(&self, other: &Scalar) -> bool {
        if self.is_numeric() && other.is_numeric() {
            self.as_number() == other.as_number()
        } else {
            self.to_string() == other.to_string()
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", format_number(*n)),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Date(d) => match d.time {
                Some(t) => write!(
                    f,
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    d.date.year(),
                    d.date.month(),
                    d.date.day(),
                    t.hour(),
                    t.minute(),
                    t.second()
                ),
                None => write!(
                    f,
                    "{:04}-{:02}-{:02}",
                    d.date.year(),
                    d.date.month(),
                    d.date.day()
                ),
            },
            Scalar::Empty => Ok(()),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// Lenient numeric parse: trims whitespace, tolerates thousands separators
/// and a trailing percent sign.
pub fn parse_number_lenient(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(stripped) = trimmed.strip_suffix('%') {
        return stripped.trim().replace(',', "").parse::<f64>().ok().map(|n| n / 100.0);
    }

    trimmed.replace(',', "").parse::<f64>().ok()
}

/// Format a number the way cells display it: integers in plain decimal form,
/// fractional values rounded to 6 decimal places.
fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded = (n * 1e6).round() / 1e6;
    if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}
