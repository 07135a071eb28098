//! Text functions

use boardcalc_core::Scalar;

fn arg_text(args: &[Scalar], index: usize) -> String {
    args.get(index).map_or(String::new(), |a| a.to_string())
}

fn arg_int(args: &[Scalar], index: usize, default: i64) -> i64 {
    args.get(index)
        .and_then(|a| a.as_number())
        .map_or(default, |n| n.trunc() as i64)
}

/// CONCATENATE(a, b, ...) - equivalent to chaining `&`.
pub fn fn_concatenate(args: &[Scalar]) -> Scalar {
    let mut out = String::new();
    for a in args {
        out.push_str(&a.to_string());
    }
    Scalar::Text(out)
}

/// LEFT(text, [count]) - count defaults to 1; negative counts yield empty.
pub fn fn_left(args: &[Scalar]) -> Scalar {
    let s = arg_text(args, 0);
    let count = arg_int(args, 1, 1).max(0) as usize;
    Scalar::Text(s.chars().take(count).collect())
}

/// RIGHT(text, [count])
pub fn fn_right(args: &[Scalar]) -> Scalar {
    let s = arg_text(args, 0);
    let count = arg_int(args, 1, 1).max(0) as usize;
    let len = s.chars().count();
    Scalar::Text(s.chars().skip(len.saturating_sub(count)).collect())
}

/// MID(text, start, count) - start is 1-based.
pub fn fn_mid(args: &[Scalar]) -> Scalar {
    let s = arg_text(args, 0);
    let start = arg_int(args, 1, 1);
    let count = arg_int(args, 2, 0).max(0) as usize;
    if start < 1 {
        return Scalar::text("");
    }
    Scalar::Text(s.chars().skip(start as usize - 1).take(count).collect())
}

pub fn fn_len(args: &[Scalar]) -> Scalar {
    Scalar::Number(arg_text(args, 0).chars().count() as f64)
}

pub fn fn_lower(args: &[Scalar]) -> Scalar {
    Scalar::Text(arg_text(args, 0).to_lowercase())
}

pub fn fn_upper(args: &[Scalar]) -> Scalar {
    Scalar::Text(arg_text(args, 0).to_uppercase())
}

pub fn fn_trim(args: &[Scalar]) -> Scalar {
    Scalar::Text(arg_text(args, 0).trim().to_string())
}

/// REPLACE(text, start, count, replacement) - start is 1-based; out-of-range
/// positions clamp to the text bounds.
pub fn fn_replace(args: &[Scalar]) -> Scalar {
    let s = arg_text(args, 0);
    let start = (arg_int(args, 1, 1).max(1) as usize).saturating_sub(1);
    let count = arg_int(args, 2, 0).max(0) as usize;
    let replacement = arg_text(args, 3);

    let chars: Vec<char> = s.chars().collect();
    let start = start.min(chars.len());
    let end = (start + count).min(chars.len());

    let mut out: String = chars[..start].iter().collect();
    out.push_str(&replacement);
    out.extend(&chars[end..]);
    Scalar::Text(out)
}

/// REPT(text, count)
pub fn fn_rept(args: &[Scalar]) -> Scalar {
    let s = arg_text(args, 0);
    let count = arg_int(args, 1, 0).max(0) as usize;
    Scalar::Text(s.repeat(count))
}

/// SEARCH(needle, haystack, [start]) - case-insensitive, 1-based position,
/// 0 when not found.
pub fn fn_search(args: &[Scalar]) -> Scalar {
    let needle = arg_text(args, 0).to_lowercase();
    let haystack = arg_text(args, 1).to_lowercase();
    let start = (arg_int(args, 2, 1).max(1) as usize).saturating_sub(1);

    let chars: Vec<char> = haystack.chars().collect();
    if start > chars.len() {
        return Scalar::Number(0.0);
    }
    let tail: String = chars[start..].iter().collect();
    match tail.find(&needle) {
        Some(byte_idx) => {
            let char_idx = tail[..byte_idx].chars().count();
            Scalar::Number((start + char_idx + 1) as f64)
        }
        None => Scalar::Number(0.0),
    }
}

/// SUBSTITUTE(text, old, new, [instance]) - replaces every occurrence, or
/// only the nth (1-based) when `instance` is given.
pub fn fn_substitute(args: &[Scalar]) -> Scalar {
    let s = arg_text(args, 0);
    let old = arg_text(args, 1);
    let new = arg_text(args, 2);

    if old.is_empty() {
        return Scalar::Text(s);
    }

    match args.get(3) {
        None => Scalar::Text(s.replace(&old, &new)),
        Some(instance) => {
            let nth = instance.as_number_or_zero().trunc() as i64;
            if nth < 1 {
                return Scalar::Text(s);
            }
            let mut count = 0i64;
            let mut out = String::new();
            let mut rest = s.as_str();
            while let Some(idx) = rest.find(&old) {
                count += 1;
                if count == nth {
                    out.push_str(&rest[..idx]);
                    out.push_str(&new);
                    out.push_str(&rest[idx + old.len()..]);
                    return Scalar::Text(out);
                }
                out.push_str(&rest[..idx + old.len()]);
                rest = &rest[idx + old.len()..];
            }
            Scalar::Text(s)
        }
    }
}

/// TEXT(value, [format]) - renders the value as its display string. When a
/// format is given and the value is a date, the date pattern language of
/// FORMAT_DATE applies.
pub fn fn_text(args: &[Scalar]) -> Scalar {
    match (args.get(0), args.get(1)) {
        (Some(value), Some(_format)) if matches!(value, Scalar::Date(_)) => {
            super::date::fn_format_date(args)
        }
        (Some(value), _) => Scalar::Text(value.to_string()),
        (None, _) => Scalar::text(""),
    }
}
