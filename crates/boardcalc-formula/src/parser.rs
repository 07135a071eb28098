//! Formula parser
//!
//! A recursive descent parser with this precedence, loosest first:
//! comparisons (`= <> < <= > >=`), additive (`+ -`), multiplicative
//! (`* / %`), string concatenation (`&`). Unary minus binds tighter than
//! any binary operator.
//!
//! Unknown function names never fail the parse; they are carried through as
//! function calls and resolved (or defaulted) at evaluation time.

use std::collections::BTreeSet;

use crate::ast::{BinaryOperator, ColumnRef, Expr, UnaryOperator};
use crate::error::{ParseError, ParseResult};
use crate::token::{tokenize, SpannedToken, Token};

/// Builtins accepted without parentheses, e.g. `TODAY` for `TODAY()`.
const BARE_BUILTINS: &[&str] = &["PI", "TODAY", "NOW"];

/// Parse a formula string into an AST.
///
/// Empty input yields an empty string literal.
///
/// # Example
/// ```rust
/// use boardcalc_formula::parse_formula;
///
/// let ast = parse_formula("1+2").unwrap();
/// let ast = parse_formula("SUM({a}, {b})").unwrap();
/// let ast = parse_formula("IF({status1} = \"Done\", 1, 0)").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> ParseResult<Expr> {
    let tokens = tokenize(formula);
    let mut parser = Parser::new(tokens);

    if parser.current() == &Token::Eof {
        return Ok(Expr::Text(String::new()));
    }

    let expr = parser.parse_expression()?;

    if parser.current() != &Token::Eof {
        return Err(ParseError::new(
            parser.current_pos(),
            format!("unexpected token after expression: {:?}", parser.current()),
        ));
    }

    Ok(expr)
}

/// Collect every column id referenced by a formula, by a token-only pass.
///
/// This is a superset of the ids touched during evaluation, used by the
/// resolver to plan dependency fetches before evaluating anything.
pub fn extract_column_ids(formula: &str) -> BTreeSet<String> {
    tokenize(formula)
        .into_iter()
        .filter_map(|t| match t.token {
            Token::ColumnRef { column_id, .. } if !column_id.is_empty() => Some(column_id),
            _ => None,
        })
        .collect()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_pos(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.pos).unwrap_or(0)
    }

    fn consume(&mut self) -> Token {
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| t.token.clone())
            .unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        if self.current() == expected {
            self.consume();
            Ok(())
        } else {
            Err(ParseError::new(
                self.current_pos(),
                format!("expected {:?}, got {:?}", expected, self.current()),
            ))
        }
    }

    // === Expression parsing with precedence ===

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_additive()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_concat()?;

        loop {
            let op = match self.current() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            let right = self.parse_concat()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_concat(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while matches!(self.current(), Token::Ampersand) {
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if matches!(self.current(), Token::Minus) {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        if matches!(self.current(), Token::Plus) {
            self.consume();
            return self.parse_unary();
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.current().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(Expr::Number(n))
            }

            Token::Text(s) => {
                self.consume();
                Ok(Expr::Text(s))
            }

            Token::Bool(b) => {
                self.consume();
                Ok(Expr::Bool(b))
            }

            Token::ColumnRef { column_id, subfield } => {
                self.consume();
                Ok(Expr::ColumnRef(ColumnRef { column_id, subfield }))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::Ident(name) => {
                self.consume();
                let name = name.to_uppercase();
                if matches!(self.current(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    if !BARE_BUILTINS.contains(&name.as_str()) {
                        // Tolerated: evaluates to empty
                        tracing::debug!(identifier = %name, "bare identifier treated as call");
                    }
                    Ok(Expr::FunctionCall { name, args: vec![] })
                }
            }

            other => Err(ParseError::new(
                self.current_pos(),
                format!("unexpected token: {:?}", other),
            )),
        }
    }

    fn parse_function_call(&mut self, name: String) -> ParseResult<Expr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current(), Token::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(Expr::FunctionCall { name, args })
    }
}
