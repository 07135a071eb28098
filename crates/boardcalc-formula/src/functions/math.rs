//! Math functions

use boardcalc_core::Scalar;

/// SUM: strings that do not parse contribute 0.
pub fn fn_sum(args: &[Scalar]) -> Scalar {
    Scalar::Number(args.iter().map(|a| a.as_number_or_zero()).sum())
}

/// AVERAGE over the arguments that coerce to numbers.
pub fn fn_average(args: &[Scalar]) -> Scalar {
    let numbers: Vec<f64> = args.iter().filter_map(|a| numeric(a)).collect();
    if numbers.is_empty() {
        return Scalar::Number(0.0);
    }
    Scalar::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// COUNT of the arguments that coerce to numbers.
pub fn fn_count(args: &[Scalar]) -> Scalar {
    Scalar::Number(args.iter().filter(|a| numeric(a).is_some()).count() as f64)
}

pub fn fn_max(args: &[Scalar]) -> Scalar {
    let max = args
        .iter()
        .filter_map(numeric)
        .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |m| m.max(n))));
    Scalar::Number(max.unwrap_or(0.0))
}

pub fn fn_min(args: &[Scalar]) -> Scalar {
    let min = args
        .iter()
        .filter_map(numeric)
        .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |m| m.min(n))));
    Scalar::Number(min.unwrap_or(0.0))
}

pub fn fn_abs(args: &[Scalar]) -> Scalar {
    Scalar::Number(arg_number(args, 0).abs())
}

/// ROUND(number, [digits]) - half away from zero. Negative digits round to
/// powers of ten.
pub fn fn_round(args: &[Scalar]) -> Scalar {
    let number = arg_number(args, 0);
    let digits = args.get(1).map_or(0.0, |a| a.as_number_or_zero()).trunc() as i32;
    Scalar::Number(round_to(number, digits, f64::round))
}

/// ROUNDUP(number, [digits]) - away from zero.
pub fn fn_roundup(args: &[Scalar]) -> Scalar {
    let number = arg_number(args, 0);
    let digits = args.get(1).map_or(0.0, |a| a.as_number_or_zero()).trunc() as i32;
    let rounded = round_to(number.abs(), digits, f64::ceil);
    Scalar::Number(rounded.copysign(number))
}

/// ROUNDDOWN(number, [digits]) - toward zero.
pub fn fn_rounddown(args: &[Scalar]) -> Scalar {
    let number = arg_number(args, 0);
    let digits = args.get(1).map_or(0.0, |a| a.as_number_or_zero()).trunc() as i32;
    let rounded = round_to(number.abs(), digits, f64::floor);
    Scalar::Number(rounded.copysign(number))
}

/// MOD by zero returns 0.
pub fn fn_mod(args: &[Scalar]) -> Scalar {
    let divisor = arg_number(args, 1);
    if divisor == 0.0 {
        return Scalar::Number(0.0);
    }
    Scalar::Number(arg_number(args, 0) % divisor)
}

pub fn fn_power(args: &[Scalar]) -> Scalar {
    Scalar::Number(arg_number(args, 0).powf(arg_number(args, 1)))
}

/// SQRT of a negative number falls back to 0.
pub fn fn_sqrt(args: &[Scalar]) -> Scalar {
    let n = arg_number(args, 0);
    if n < 0.0 {
        return Scalar::Number(0.0);
    }
    Scalar::Number(n.sqrt())
}

/// LOG(number, [base]) - base defaults to 10. Non-positive inputs fall back
/// to 0.
pub fn fn_log(args: &[Scalar]) -> Scalar {
    let n = arg_number(args, 0);
    let base = args.get(1).map_or(10.0, |a| a.as_number_or_zero());
    if n <= 0.0 || base <= 0.0 || base == 1.0 {
        return Scalar::Number(0.0);
    }
    Scalar::Number(n.log(base))
}

/// DIVIDE by zero returns 0.
pub fn fn_divide(args: &[Scalar]) -> Scalar {
    let divisor = arg_number(args, 1);
    if divisor == 0.0 {
        return Scalar::Number(0.0);
    }
    Scalar::Number(arg_number(args, 0) / divisor)
}

pub fn fn_multiply(args: &[Scalar]) -> Scalar {
    Scalar::Number(arg_number(args, 0) * arg_number(args, 1))
}

pub fn fn_minus(args: &[Scalar]) -> Scalar {
    Scalar::Number(arg_number(args, 0) - arg_number(args, 1))
}

pub fn fn_sign(args: &[Scalar]) -> Scalar {
    let n = arg_number(args, 0);
    Scalar::Number(if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    })
}

pub fn fn_pi(_args: &[Scalar]) -> Scalar {
    Scalar::Number(std::f64::consts::PI)
}

// === helpers ===

fn numeric(v: &Scalar) -> Option<f64> {
    if v.is_numeric() {
        v.as_number()
    } else {
        None
    }
}

fn arg_number(args: &[Scalar], index: usize) -> f64 {
    args.get(index).map_or(0.0, |a| a.as_number_or_zero())
}

fn round_to(n: f64, digits: i32, mode: fn(f64) -> f64) -> f64 {
    let factor = 10f64.powi(digits);
    mode(n * factor) / factor
}
