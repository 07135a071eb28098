//! Formula tokenizer
//!
//! Scans a formula string into a flat token sequence. Scanning is tolerant:
//! unterminated string literals and column references produce best-effort
//! tokens with a warning, and unrecognised characters are skipped.

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Text(String),
    Bool(bool),

    // References and identifiers
    /// Column reference `{columnId}` or `{columnId#subfield}`
    ColumnRef {
        column_id: String,
        subfield: Option<String>,
    },
    /// Function name (matched case-insensitively at parse time)
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // End of input
    Eof,
}

impl Token {
    /// Whether this token can end an operand. A `-` after an operand is the
    /// subtraction operator; anywhere else it may open a negative literal.
    fn is_operand_end(&self) -> bool {
        matches!(
            self,
            Token::Number(_)
                | Token::Text(_)
                | Token::Bool(_)
                | Token::ColumnRef { .. }
                | Token::Ident(_)
                | Token::RightParen
        )
    }
}

/// A token with its character offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: usize,
}

/// Scan a formula into tokens. The sequence is always terminated by
/// [`Token::Eof`].
pub fn tokenize(input: &str) -> Vec<SpannedToken> {
    let mut scanner = Scanner::new(input);
    let mut tokens = Vec::new();

    loop {
        let pos = scanner.pos;
        let prev_is_operand = tokens
            .last()
            .map_or(false, |t: &SpannedToken| t.token.is_operand_end());
        let token = scanner.scan_token(prev_is_operand);
        let is_eof = token == Token::Eof;
        tokens.push(SpannedToken { token, pos });
        if is_eof {
            break;
        }
    }

    tokens
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn scan_token(&mut self, prev_is_operand: bool) -> Token {
        self.skip_whitespace();

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Token::Eof,
        };

        match c {
            '+' => {
                self.advance();
                return Token::Plus;
            }
            '-' => {
                // A minus not following an operand may open a negative number
                if !prev_is_operand
                    && self
                        .peek_char_at(1)
                        .map_or(false, |n| n.is_ascii_digit() || n == '.')
                {
                    return self.scan_number();
                }
                self.advance();
                return Token::Minus;
            }
            '*' => {
                self.advance();
                return Token::Star;
            }
            '/' => {
                self.advance();
                return Token::Slash;
            }
            '%' => {
                self.advance();
                return Token::Percent;
            }
            '&' => {
                self.advance();
                return Token::Ampersand;
            }
            '=' => {
                self.advance();
                return Token::Equal;
            }
            '(' => {
                self.advance();
                return Token::LeftParen;
            }
            ')' => {
                self.advance();
                return Token::RightParen;
            }
            ',' => {
                self.advance();
                return Token::Comma;
            }
            _ => {}
        }

        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::LessEqual;
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Token::NotEqual;
            }
            return Token::LessThan;
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::GreaterEqual;
            }
            return Token::GreaterThan;
        }

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        if c == '{' {
            return self.scan_column_ref();
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit())) {
            return self.scan_number();
        }

        if c.is_alphanumeric() || c == '_' {
            return self.scan_identifier();
        }

        // Unknown character: skip it and keep scanning
        tracing::warn!(position = self.pos, character = %c, "skipping unrecognised character");
        self.advance();
        self.scan_token(prev_is_operand)
    }

    /// Scan a quoted string. The same quote character is escapable with a
    /// backslash; other escapes are kept verbatim.
    fn scan_string(&mut self, quote: char) -> Token {
        let start = self.pos;
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('\\') if self.peek_char_at(1) == Some(quote) => {
                    s.push(quote);
                    self.advance();
                    self.advance();
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Token::Text(s);
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => {
                    tracing::warn!(position = start, "unterminated string literal");
                    return Token::Text(s);
                }
            }
        }
    }

    /// Scan `{columnId}` or `{columnId#subfield}`. Contents are opaque and
    /// trimmed.
    fn scan_column_ref(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // '{'

        let body_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '}' {
                break;
            }
            self.advance();
        }

        let body = &self.input[body_start..self.pos];
        if self.peek_char() == Some('}') {
            self.advance();
        } else {
            tracing::warn!(position = start, "unterminated column reference");
        }

        let (column_id, subfield) = match body.split_once('#') {
            Some((id, sub)) => (id.trim().to_string(), Some(sub.trim().to_string())),
            None => (body.trim().to_string(), None),
        };

        Token::ColumnRef { column_id, subfield }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        if self.peek_char() == Some('-') {
            self.advance();
        }
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num: f64 = self.input[start..self.pos].parse().unwrap_or(0.0);
        Token::Number(num)
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // TRUE/FALSE are boolean literals unless called like functions
        if self.peek_char() != Some('(') {
            if text.eq_ignore_ascii_case("true") {
                return Token::Bool(true);
            }
            if text.eq_ignore_ascii_case("false") {
                return Token::Bool(false);
            }
        }

        Token::Ident(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_scan_numbers() {
        assert_eq!(kinds("42"), vec![Token::Number(42.0), Token::Eof]);
        assert_eq!(kinds("3.14"), vec![Token::Number(3.14), Token::Eof]);
        assert_eq!(kinds(".5"), vec![Token::Number(0.5), Token::Eof]);
    }

    #[test]
    fn test_negative_number_vs_subtraction() {
        // Leading minus folds into the literal when not after an operand
        assert_eq!(kinds("-5"), vec![Token::Number(-5.0), Token::Eof]);
        assert_eq!(
            kinds("3-5"),
            vec![Token::Number(3.0), Token::Minus, Token::Number(5.0), Token::Eof]
        );
        assert_eq!(
            kinds("(-5)"),
            vec![Token::LeftParen, Token::Number(-5.0), Token::RightParen, Token::Eof]
        );
        assert_eq!(
            kinds("2 * -3"),
            vec![Token::Number(2.0), Token::Star, Token::Number(-3.0), Token::Eof]
        );
    }

    #[test]
    fn test_scan_strings() {
        assert_eq!(kinds("\"hello\""), vec![Token::Text("hello".into()), Token::Eof]);
        assert_eq!(kinds("'hello'"), vec![Token::Text("hello".into()), Token::Eof]);
        // Backslash escapes the same quote
        assert_eq!(
            kinds(r#""say \"hi\"""#),
            vec![Token::Text("say \"hi\"".into()), Token::Eof]
        );
        // The other quote passes through unescaped
        assert_eq!(
            kinds(r#""it's fine""#),
            vec![Token::Text("it's fine".into()), Token::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_best_effort() {
        assert_eq!(kinds("\"abc"), vec![Token::Text("abc".into()), Token::Eof]);
    }

    #[test]
    fn test_scan_column_refs() {
        assert_eq!(
            kinds("{numbers1}"),
            vec![
                Token::ColumnRef {
                    column_id: "numbers1".into(),
                    subfield: None
                },
                Token::Eof
            ]
        );
        assert_eq!(
            kinds("{ status1 # index }"),
            vec![
                Token::ColumnRef {
                    column_id: "status1".into(),
                    subfield: Some("index".into())
                },
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_column_ref() {
        assert_eq!(
            kinds("{numbers1"),
            vec![
                Token::ColumnRef {
                    column_id: "numbers1".into(),
                    subfield: None
                },
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_scan_booleans() {
        assert_eq!(kinds("TRUE"), vec![Token::Bool(true), Token::Eof]);
        assert_eq!(kinds("false"), vec![Token::Bool(false), Token::Eof]);
        // Called like a function, TRUE is a call, not a literal
        assert_eq!(
            kinds("TRUE()"),
            vec![
                Token::Ident("TRUE".into()),
                Token::LeftParen,
                Token::RightParen,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_scan_operators() {
        assert_eq!(
            kinds("<= >= <> < > ="),
            vec![
                Token::LessEqual,
                Token::GreaterEqual,
                Token::NotEqual,
                Token::LessThan,
                Token::GreaterThan,
                Token::Equal,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_scan_call() {
        assert_eq!(
            kinds("SUM({a}, 2)"),
            vec![
                Token::Ident("SUM".into()),
                Token::LeftParen,
                Token::ColumnRef {
                    column_id: "a".into(),
                    subfield: None
                },
                Token::Comma,
                Token::Number(2.0),
                Token::RightParen,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_whitespace_insignificant() {
        assert_eq!(kinds(" 5 + 3 "), kinds("5+3"));
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("1 + 2");
        assert_eq!(tokens[0].pos, 0);
        assert_eq!(tokens[1].pos, 2);
        assert_eq!(tokens[2].pos, 4);
    }
}
