//! Date/time functions
//!
//! Date arguments accept the date scalar or any string [`DateValue::parse`]
//! understands. `WORKDAY`/`WORKDAYS` treat Saturday and Sunday as
//! non-working. `ISOWEEKNUM` follows ISO-8601 (the week containing the
//! year's first Thursday).

use boardcalc_core::{DateValue, Scalar};
use chrono::{Datelike, Days, Local, NaiveDate, NaiveTime, Timelike, Weekday};

fn arg_date(args: &[Scalar], index: usize) -> Option<DateValue> {
    match args.get(index)? {
        Scalar::Date(d) => Some(*d),
        Scalar::Text(s) => DateValue::parse(s),
        _ => None,
    }
}

fn arg_int(args: &[Scalar], index: usize) -> i64 {
    args.get(index)
        .map_or(0.0, |a| a.as_number_or_zero())
        .trunc() as i64
}

/// TODAY() - current civil date.
pub fn fn_today(_args: &[Scalar]) -> Scalar {
    Scalar::Date(DateValue::new(Local::now().date_naive()))
}

/// NOW() - current date and time.
pub fn fn_now(_args: &[Scalar]) -> Scalar {
    let now = Local::now().naive_local();
    Scalar::Date(DateValue::with_time(now.date(), now.time()))
}

/// DATE(year, month, day) - out-of-range components fall back to empty.
pub fn fn_date(args: &[Scalar]) -> Scalar {
    let year = arg_int(args, 0) as i32;
    let month = arg_int(args, 1);
    let day = arg_int(args, 2);

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Scalar::Empty;
    }

    match NaiveDate::from_ymd_opt(year, month as u32, day as u32) {
        Some(date) => Scalar::Date(DateValue::new(date)),
        None => Scalar::Empty,
    }
}

/// DATEVALUE(text) - parse an ISO-8601 date or date-time string.
pub fn fn_datevalue(args: &[Scalar]) -> Scalar {
    match arg_date(args, 0) {
        Some(d) => Scalar::Date(d),
        None => Scalar::Empty,
    }
}

pub fn fn_year(args: &[Scalar]) -> Scalar {
    arg_date(args, 0).map_or(Scalar::Empty, |d| Scalar::Number(d.date.year() as f64))
}

pub fn fn_month(args: &[Scalar]) -> Scalar {
    arg_date(args, 0).map_or(Scalar::Empty, |d| Scalar::Number(d.date.month() as f64))
}

pub fn fn_day(args: &[Scalar]) -> Scalar {
    arg_date(args, 0).map_or(Scalar::Empty, |d| Scalar::Number(d.date.day() as f64))
}

pub fn fn_hour(args: &[Scalar]) -> Scalar {
    time_component(args, |t| t.hour())
}

pub fn fn_minute(args: &[Scalar]) -> Scalar {
    time_component(args, |t| t.minute())
}

pub fn fn_second(args: &[Scalar]) -> Scalar {
    time_component(args, |t| t.second())
}

fn time_component(args: &[Scalar], get: fn(&NaiveTime) -> u32) -> Scalar {
    match arg_date(args, 0) {
        Some(DateValue { time: Some(t), .. }) => Scalar::Number(get(&t) as f64),
        Some(_) => Scalar::Number(0.0),
        None => Scalar::Empty,
    }
}

/// DAYS(end, start) - whole days from `start` to `end`.
pub fn fn_days(args: &[Scalar]) -> Scalar {
    match (arg_date(args, 0), arg_date(args, 1)) {
        (Some(end), Some(start)) => {
            Scalar::Number((end.date - start.date).num_days() as f64)
        }
        _ => Scalar::Empty,
    }
}

/// ADD_DAYS(date, count)
pub fn fn_add_days(args: &[Scalar]) -> Scalar {
    shift_days(args, 1)
}

/// SUBTRACT_DAYS(date, count)
pub fn fn_subtract_days(args: &[Scalar]) -> Scalar {
    shift_days(args, -1)
}

fn shift_days(args: &[Scalar], sign: i64) -> Scalar {
    let base = match arg_date(args, 0) {
        Some(d) => d,
        None => return Scalar::Empty,
    };
    let count = arg_int(args, 1) * sign;

    let shifted = if count >= 0 {
        base.date.checked_add_days(Days::new(count as u64))
    } else {
        base.date.checked_sub_days(Days::new((-count) as u64))
    };

    match shifted {
        Some(date) => Scalar::Date(DateValue { date, time: base.time }),
        None => Scalar::Empty,
    }
}

/// WEEKDAY(date) - 1 = Sunday through 7 = Saturday.
pub fn fn_weekday(args: &[Scalar]) -> Scalar {
    arg_date(args, 0).map_or(Scalar::Empty, |d| {
        Scalar::Number(d.date.weekday().num_days_from_sunday() as f64 + 1.0)
    })
}

/// WEEKNUM(date) - week of year with weeks starting Sunday; the week
/// containing January 1st is week 1.
pub fn fn_weeknum(args: &[Scalar]) -> Scalar {
    let d = match arg_date(args, 0) {
        Some(d) => d,
        None => return Scalar::Empty,
    };
    let jan1 = NaiveDate::from_ymd_opt(d.date.year(), 1, 1).unwrap();
    let offset = jan1.weekday().num_days_from_sunday() as i64;
    let ordinal0 = d.date.ordinal0() as i64;
    Scalar::Number(((ordinal0 + offset) / 7 + 1) as f64)
}

/// ISOWEEKNUM(date)
pub fn fn_isoweeknum(args: &[Scalar]) -> Scalar {
    arg_date(args, 0).map_or(Scalar::Empty, |d| {
        Scalar::Number(d.date.iso_week().week() as f64)
    })
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// WORKDAY(start, count) - the date `count` working days from `start`,
/// skipping Saturdays and Sundays. The start day itself is not counted.
pub fn fn_workday(args: &[Scalar]) -> Scalar {
    let start = match arg_date(args, 0) {
        Some(d) => d,
        None => return Scalar::Empty,
    };
    let count = arg_int(args, 1);

    let step = if count >= 0 { 1 } else { -1 };
    let mut remaining = count.abs();
    let mut date = start.date;
    while remaining > 0 {
        date = match if step > 0 {
            date.checked_add_days(Days::new(1))
        } else {
            date.checked_sub_days(Days::new(1))
        } {
            Some(d) => d,
            None => return Scalar::Empty,
        };
        if !is_weekend(date) {
            remaining -= 1;
        }
    }

    Scalar::Date(DateValue::new(date))
}

/// WORKDAYS(start, end) - count of working days in the inclusive range,
/// negated when `end` precedes `start`.
pub fn fn_workdays(args: &[Scalar]) -> Scalar {
    let (start, end) = match (arg_date(args, 0), arg_date(args, 1)) {
        (Some(a), Some(b)) => (a.date, b.date),
        _ => return Scalar::Empty,
    };

    let (lo, hi, sign) = if start <= end {
        (start, end, 1.0)
    } else {
        (end, start, -1.0)
    };

    let mut count = 0i64;
    let mut date = lo;
    while date <= hi {
        if !is_weekend(date) {
            count += 1;
        }
        date = match date.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => break,
        };
    }

    Scalar::Number(count as f64 * sign)
}

/// Pattern tokens, longest first so greedy matching picks `MMMM` over `MM`.
const PATTERN_TOKENS: &[&str] = &[
    "YYYY", "MMMM", "dddd", "MMM", "ddd", "YY", "MM", "Do", "DD", "HH", "hh", "mm", "ss", "M",
    "D", "H", "h", "m", "s", "A", "a",
];

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const DAY_NAMES: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

fn render_token(token: &str, d: &DateValue) -> String {
    let date = d.date;
    let time = d.time.unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    match token {
        "YYYY" => format!("{:04}", date.year()),
        "YY" => format!("{:02}", date.year().rem_euclid(100)),
        "MMMM" => MONTH_NAMES[date.month0() as usize].to_string(),
        "MMM" => MONTH_NAMES[date.month0() as usize][..3].to_string(),
        "MM" => format!("{:02}", date.month()),
        "M" => date.month().to_string(),
        "dddd" => DAY_NAMES[date.weekday().num_days_from_monday() as usize].to_string(),
        "ddd" => DAY_NAMES[date.weekday().num_days_from_monday() as usize][..3].to_string(),
        "Do" => format!("{}{}", date.day(), ordinal_suffix(date.day())),
        "DD" => format!("{:02}", date.day()),
        "D" => date.day().to_string(),
        "HH" => format!("{:02}", time.hour()),
        "H" => time.hour().to_string(),
        "hh" => format!("{:02}", hour12(&time)),
        "h" => hour12(&time).to_string(),
        "mm" => format!("{:02}", time.minute()),
        "m" => time.minute().to_string(),
        "ss" => format!("{:02}", time.second()),
        "s" => time.second().to_string(),
        "A" => if time.hour() < 12 { "AM" } else { "PM" }.to_string(),
        "a" => if time.hour() < 12 { "am" } else { "pm" }.to_string(),
        _ => token.to_string(),
    }
}

fn hour12(time: &NaiveTime) -> u32 {
    match time.hour() % 12 {
        0 => 12,
        h => h,
    }
}

/// FORMAT_DATE(date, [pattern]) - pattern defaults to `YYYY-MM-DD`.
pub fn fn_format_date(args: &[Scalar]) -> Scalar {
    let d = match arg_date(args, 0) {
        Some(d) => d,
        None => return Scalar::Empty,
    };
    let pattern = args
        .get(1)
        .map_or_else(|| "YYYY-MM-DD".to_string(), |a| a.to_string());

    let mut out = String::new();
    let mut rest = pattern.as_str();
    'outer: while !rest.is_empty() {
        for token in PATTERN_TOKENS {
            if rest.starts_with(token) {
                out.push_str(&render_token(token, &d));
                rest = &rest[token.len()..];
                continue 'outer;
            }
        }
        let c = rest.chars().next().unwrap();
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    Scalar::Text(out)
}

/// HOURS_DIFF(a, b) - difference between two times as `H:MM` text. Accepts
/// `HH:MM` strings, date-times, or date-only values (midnight).
pub fn fn_hours_diff(args: &[Scalar]) -> Scalar {
    let a = arg_minutes(args, 0);
    let b = arg_minutes(args, 1);
    match (a, b) {
        (Some(a), Some(b)) => {
            let diff = a - b;
            let sign = if diff < 0 { "-" } else { "" };
            let diff = diff.abs();
            Scalar::Text(format!("{}{}:{:02}", sign, diff / 60, diff % 60))
        }
        _ => Scalar::Empty,
    }
}

fn arg_minutes(args: &[Scalar], index: usize) -> Option<i64> {
    match args.get(index)? {
        Scalar::Date(d) => {
            let t = d.time?;
            Some((t.hour() * 60 + t.minute()) as i64)
        }
        Scalar::Text(s) => {
            let s = s.trim();
            if let Some(d) = DateValue::parse(s) {
                let t = d.time.unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
                return Some((t.hour() * 60 + t.minute()) as i64);
            }
            let (h, m) = s.split_once(':')?;
            Some(h.trim().parse::<i64>().ok()? * 60 + m.trim().parse::<i64>().ok()?)
        }
        _ => None,
    }
}
