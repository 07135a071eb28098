//! Logical functions

use boardcalc_core::Scalar;

/// IF(condition, then, [else]) - the else branch defaults to empty.
pub fn fn_if(args: &[Scalar]) -> Scalar {
    let cond = args.get(0).map_or(false, |a| a.as_bool());
    if cond {
        args.get(1).cloned().unwrap_or(Scalar::Empty)
    } else {
        args.get(2).cloned().unwrap_or(Scalar::Empty)
    }
}

pub fn fn_and(args: &[Scalar]) -> Scalar {
    Scalar::Bool(!args.is_empty() && args.iter().all(|a| a.as_bool()))
}

pub fn fn_or(args: &[Scalar]) -> Scalar {
    Scalar::Bool(args.iter().any(|a| a.as_bool()))
}

pub fn fn_not(args: &[Scalar]) -> Scalar {
    Scalar::Bool(!args.get(0).map_or(false, |a| a.as_bool()))
}

pub fn fn_xor(args: &[Scalar]) -> Scalar {
    let truthy = args.iter().filter(|a| a.as_bool()).count();
    Scalar::Bool(truthy % 2 == 1)
}

/// SWITCH(expr, k1, v1, ..., [default]) - returns the value paired with the
/// first key loosely equal to `expr`, the trailing default on no match, or
/// the empty string when no default is given.
pub fn fn_switch(args: &[Scalar]) -> Scalar {
    let expr = match args.first() {
        Some(e) => e,
        None => return Scalar::text(""),
    };

    let rest = &args[1..];
    let mut pairs = rest.chunks_exact(2);
    for pair in &mut pairs {
        if expr.loosely_eq(&pair[0]) {
            return pair[1].clone();
        }
    }

    match pairs.remainder() {
        [default] => default.clone(),
        _ => Scalar::text(""),
    }
}

/// EXACT(a, b) - case-sensitive string equality.
pub fn fn_exact(args: &[Scalar]) -> Scalar {
    let a = args.get(0).map_or(String::new(), |v| v.to_string());
    let b = args.get(1).map_or(String::new(), |v| v.to_string());
    Scalar::Bool(a == b)
}

pub fn fn_true(_args: &[Scalar]) -> Scalar {
    Scalar::Bool(true)
}

pub fn fn_false(_args: &[Scalar]) -> Scalar {
    Scalar::Bool(false)
}
