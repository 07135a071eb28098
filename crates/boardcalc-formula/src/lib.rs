//! # boardcalc-formula
//!
//! Formula language front-end for boardcalc.
//!
//! This crate provides:
//! - Tokenizing (text → tokens, with `{columnId}` references)
//! - Parsing (tokens → AST with operator precedence)
//! - Evaluation (AST → [`Scalar`] against a column environment)
//! - Built-in functions (~60)
//! - Column-reference extraction for dependency planning
//!
//! ## Example
//!
//! ```rust
//! use boardcalc_formula::{parse_formula, evaluate, Environment};
//!
//! let ast = parse_formula("{numbers1} * 2").unwrap();
//! let mut env = Environment::new();
//! env.insert("numbers1", 25.0.into());
//! let result = evaluate(&ast, &env);
//! assert_eq!(result.as_number(), Some(50.0));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod token;

pub use ast::{BinaryOperator, ColumnRef, Expr, UnaryOperator};
pub use error::{ParseError, ParseResult};
pub use evaluator::{evaluate, Binding, Environment};
pub use parser::{extract_column_ids, parse_formula};

use boardcalc_core::Scalar;

/// Parse and evaluate a formula in one step.
///
/// Parse failures yield [`Scalar::Empty`] after logging, matching the
/// resolver's tolerance contract.
pub fn evaluate_formula(source: &str, env: &Environment) -> Scalar {
    match parse_formula(source) {
        Ok(ast) => evaluate(&ast, env),
        Err(e) => {
            tracing::warn!(formula = source, error = %e, "formula failed to parse");
            Scalar::Empty
        }
    }
}
