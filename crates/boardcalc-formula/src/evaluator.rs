//! Formula evaluator
//!
//! Walks an expression tree against a column environment. Evaluation is
//! total: missing columns yield empty, unknown functions yield empty, and
//! division by zero yields 0. The evaluator never performs I/O; the
//! resolver populates the environment before calling in.

use std::collections::HashMap;
use std::sync::OnceLock;

use boardcalc_core::Scalar;

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::functions::FunctionRegistry;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// A column binding: either a plain scalar, or a record of per-subfield
/// scalars for compound columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Scalar),
    Record {
        /// Value used when the reference has no subfield
        value: Scalar,
        fields: HashMap<String, Scalar>,
    },
}

/// The `ColumnId → value` environment a formula evaluates against.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a column to a scalar.
    pub fn insert(&mut self, column_id: impl Into<String>, value: Scalar) {
        self.bindings
            .insert(column_id.into(), Binding::Value(value));
    }

    /// Bind a compound column with per-subfield values.
    pub fn insert_record(
        &mut self,
        column_id: impl Into<String>,
        value: Scalar,
        fields: HashMap<String, Scalar>,
    ) {
        self.bindings
            .insert(column_id.into(), Binding::Record { value, fields });
    }

    /// Look up a column reference. Missing columns and missing subfields
    /// yield empty.
    pub fn get(&self, column_id: &str, subfield: Option<&str>) -> Scalar {
        match (self.bindings.get(column_id), subfield) {
            (None, _) => Scalar::Empty,
            (Some(Binding::Value(v)), None) => v.clone(),
            (Some(Binding::Value(_)), Some(_)) => Scalar::Empty,
            (Some(Binding::Record { value, .. }), None) => value.clone(),
            (Some(Binding::Record { fields, .. }), Some(sub)) => {
                fields.get(sub).cloned().unwrap_or(Scalar::Empty)
            }
        }
    }
}

/// Evaluate a formula expression against an environment.
pub fn evaluate(expr: &Expr, env: &Environment) -> Scalar {
    match expr {
        Expr::Number(n) => Scalar::Number(*n),
        Expr::Text(s) => Scalar::Text(s.clone()),
        Expr::Bool(b) => Scalar::Bool(*b),

        Expr::ColumnRef(r) => env.get(&r.column_id, r.subfield.as_deref()),

        Expr::BinaryOp { op, left, right } => {
            let l = evaluate(left, env);
            let r = evaluate(right, env);
            evaluate_binary_op(*op, &l, &r)
        }

        Expr::UnaryOp { op, operand } => {
            let v = evaluate(operand, env);
            match op {
                UnaryOperator::Negate => Scalar::Number(-v.as_number_or_zero()),
            }
        }

        Expr::FunctionCall { name, args } => {
            let values: Vec<Scalar> = args.iter().map(|a| evaluate(a, env)).collect();
            match get_function_registry().get(name) {
                Some(def) => (def.implementation)(&values),
                None => {
                    tracing::debug!(function = %name, "unknown function evaluates to empty");
                    Scalar::Empty
                }
            }
        }
    }
}

fn evaluate_binary_op(op: BinaryOperator, left: &Scalar, right: &Scalar) -> Scalar {
    match op {
        // `+` is numeric when both operands coerce, otherwise string concat
        BinaryOperator::Add => match (numeric_operand(left), numeric_operand(right)) {
            (Some(a), Some(b)) => Scalar::Number(a + b),
            _ => Scalar::Text(format!("{}{}", left, right)),
        },

        BinaryOperator::Subtract => {
            Scalar::Number(left.as_number_or_zero() - right.as_number_or_zero())
        }

        BinaryOperator::Multiply => {
            Scalar::Number(left.as_number_or_zero() * right.as_number_or_zero())
        }

        BinaryOperator::Divide => {
            let divisor = right.as_number_or_zero();
            if divisor == 0.0 {
                Scalar::Number(0.0)
            } else {
                Scalar::Number(left.as_number_or_zero() / divisor)
            }
        }

        BinaryOperator::Modulo => {
            let divisor = right.as_number_or_zero();
            if divisor == 0.0 {
                Scalar::Number(0.0)
            } else {
                Scalar::Number(left.as_number_or_zero() % divisor)
            }
        }

        BinaryOperator::Concat => Scalar::Text(format!("{}{}", left, right)),

        // Equality compares numerically when both coerce, else by string
        BinaryOperator::Equal => Scalar::Bool(scalar_eq(left, right)),
        BinaryOperator::NotEqual => Scalar::Bool(!scalar_eq(left, right)),

        BinaryOperator::LessThan => {
            Scalar::Bool(left.as_number_or_zero() < right.as_number_or_zero())
        }
        BinaryOperator::LessEqual => {
            Scalar::Bool(left.as_number_or_zero() <= right.as_number_or_zero())
        }
        BinaryOperator::GreaterThan => {
            Scalar::Bool(left.as_number_or_zero() > right.as_number_or_zero())
        }
        BinaryOperator::GreaterEqual => {
            Scalar::Bool(left.as_number_or_zero() >= right.as_number_or_zero())
        }
    }
}

/// Numeric view of an operand for `+`. Non-numeric text disqualifies the
/// numeric interpretation; empty counts as 0.
fn numeric_operand(v: &Scalar) -> Option<f64> {
    match v {
        Scalar::Text(s) if !s.trim().is_empty() => boardcalc_core::scalar::parse_number_lenient(s),
        _ => v.as_number(),
    }
}

fn scalar_eq(left: &Scalar, right: &Scalar) -> bool {
    left.loosely_eq(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_formula;

    fn eval(src: &str) -> Scalar {
        evaluate(&parse_formula(src).unwrap(), &Environment::new())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1+2*3"), Scalar::Number(7.0));
        assert_eq!(eval("(1+2)*3"), Scalar::Number(9.0));
        assert_eq!(eval("10 % 3"), Scalar::Number(1.0));
        assert_eq!(eval("-5 + 2"), Scalar::Number(-3.0));
    }

    #[test]
    fn test_divide_by_zero_is_zero() {
        assert_eq!(eval("5 / 0"), Scalar::Number(0.0));
        assert_eq!(eval("5 % 0"), Scalar::Number(0.0));
    }

    #[test]
    fn test_plus_falls_back_to_concat() {
        assert_eq!(eval("\"5\" + 3"), Scalar::Number(8.0));
        assert_eq!(eval("\"a\" + 3"), Scalar::Text("a3".into()));
    }

    #[test]
    fn test_ampersand_always_concat() {
        assert_eq!(eval("5 & 3"), Scalar::Text("53".into()));
        assert_eq!(eval("\"a\" & \"b\""), Scalar::Text("ab".into()));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("5 > 3"), Scalar::Bool(true));
        assert_eq!(eval("\"10\" >= 10"), Scalar::Bool(true));
        assert_eq!(eval("5 = \"5\""), Scalar::Bool(true));
        assert_eq!(eval("\"abc\" = \"abc\""), Scalar::Bool(true));
        assert_eq!(eval("\"abc\" <> \"abd\""), Scalar::Bool(true));
    }

    #[test]
    fn test_missing_column_is_empty() {
        assert_eq!(eval("{ghost}"), Scalar::Empty);
        // Empty coerces to 0 in numeric position
        assert_eq!(eval("{ghost} + 1"), Scalar::Number(1.0));
    }

    #[test]
    fn test_environment_lookup() {
        let ast = parse_formula("{numbers1} * 2").unwrap();
        let mut env = Environment::new();
        env.insert("numbers1", Scalar::Number(25.0));
        assert_eq!(evaluate(&ast, &env), Scalar::Number(50.0));
    }

    #[test]
    fn test_subfield_lookup() {
        let ast = parse_formula("{status1#index}").unwrap();
        let mut env = Environment::new();
        let mut fields = HashMap::new();
        fields.insert("index".to_string(), Scalar::Number(3.0));
        env.insert_record("status1", Scalar::text("Done"), fields);
        assert_eq!(evaluate(&ast, &env), Scalar::Number(3.0));

        // Without the subfield the record's primary value is used
        let ast = parse_formula("{status1}").unwrap();
        assert_eq!(evaluate(&ast, &env), Scalar::text("Done"));
    }

    #[test]
    fn test_unknown_function_is_empty() {
        assert_eq!(eval("FROBNICATE(1)"), Scalar::Empty);
    }

    #[test]
    fn test_whitespace_equivalent_sources() {
        assert_eq!(eval("5 + 3"), eval("5+3"));
        assert_eq!(eval(" 5 + 3 "), eval("5+3"));
    }

    #[test]
    fn test_unterminated_string_evaluates() {
        assert_eq!(eval("\"abc"), Scalar::Text("abc".into()));
    }
}
