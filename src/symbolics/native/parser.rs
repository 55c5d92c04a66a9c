//! Infix expression lexer and parser for the native backend
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom (('^' | '**') unary)?
//! atom   := number | ident ['(' [expr (',' expr)*] ')'] | '(' expr ')'
//! ```
//!
//! Identifiers may contain `_` and `.`, so path-qualified parameters such as
//! `child.N` are single symbols.
use std::fmt;

use super::coeff::Coefficient;
use super::expr::Expr;
use super::normalize;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(Coefficient),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Number(c) => write!(f, "{}", c),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Error produced while tokenizing or parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        ParseError {
            position,
            message: message.into(),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn read_number(&mut self) -> Result<Coefficient, ParseError> {
        let start = self.pos;
        let mut text = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.' && !is_float {
                is_float = true;
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Exponent only when digits follow; otherwise `e` starts the next token.
        if matches!(self.current(), Some('e') | Some('E')) {
            let sign_len = usize::from(matches!(self.peek(1), Some('+') | Some('-')));
            if matches!(self.peek(1 + sign_len), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                for _ in 0..=sign_len {
                    if let Some(ch) = self.advance() {
                        text.push(ch);
                    }
                }
                while let Some(ch) = self.current().filter(char::is_ascii_digit) {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(Coefficient::float)
                .map_err(|e| ParseError::new(start, format!("invalid number '{}': {}", text, e)))
        } else {
            text.parse::<i128>()
                .map(Coefficient::int)
                .map_err(|e| ParseError::new(start, format!("invalid number '{}': {}", text, e)))
        }
    }

    fn read_ident(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    /// Tokenize the whole input, returning tokens paired with their start offsets.
    pub fn tokenize(&mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let ch = match self.current() {
                Some(ch) => ch,
                None => {
                    tokens.push((Token::Eof, start));
                    return Ok(tokens);
                }
            };

            let token = match ch {
                '0'..='9' => Token::Number(self.read_number()?),
                '.' if matches!(self.peek(1), Some(d) if d.is_ascii_digit()) => {
                    Token::Number(self.read_number()?)
                }
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident()),
                '+' => {
                    self.advance();
                    Token::Plus
                }
                '-' => {
                    self.advance();
                    Token::Minus
                }
                '*' if self.peek(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    Token::Caret
                }
                '*' => {
                    self.advance();
                    Token::Star
                }
                '/' => {
                    self.advance();
                    Token::Slash
                }
                '^' => {
                    self.advance();
                    Token::Caret
                }
                '(' => {
                    self.advance();
                    Token::LParen
                }
                ')' => {
                    self.advance();
                    Token::RParen
                }
                ',' => {
                    self.advance();
                    Token::Comma
                }
                other => {
                    return Err(ParseError::new(start, format!("unexpected character '{}'", other)))
                }
            };
            tokens.push((token, start));
        }
    }
}

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<(Token, usize)>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).map(|(t, _)| t).unwrap_or(&Token::Eof)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(
                self.position(),
                format!("expected '{}', found '{}'", expected, self.current()),
            ))
        }
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_sum()?;
        match self.current() {
            Token::Eof => Ok(expr),
            other => Err(ParseError::new(
                self.position(),
                format!("unexpected '{}' after expression", other),
            )),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_product()?];
        loop {
            match self.current() {
                Token::Plus => {
                    self.advance();
                    terms.push(self.parse_product()?);
                }
                Token::Minus => {
                    self.advance();
                    terms.push(normalize::neg(self.parse_product()?));
                }
                _ => break,
            }
        }
        Ok(normalize::add(terms))
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            match self.current() {
                Token::Star => {
                    self.advance();
                    expr = normalize::mul(vec![expr, self.parse_unary()?]);
                }
                Token::Slash => {
                    self.advance();
                    expr = normalize::div(expr, self.parse_unary()?);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.current() {
            Token::Minus => {
                self.advance();
                Ok(normalize::neg(self.parse_unary()?))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_atom()?;
        if *self.current() == Token::Caret {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(normalize::pow(base, exponent));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        match self.advance() {
            Token::Number(c) => Ok(Expr::Num(c)),
            Token::Ident(name) => {
                if *self.current() != Token::LParen {
                    return Ok(Expr::Sym(name));
                }
                self.advance();
                let mut args = Vec::new();
                if *self.current() != Token::RParen {
                    args.push(self.parse_sum()?);
                    while *self.current() == Token::Comma {
                        self.advance();
                        args.push(self.parse_sum()?);
                    }
                }
                self.expect(Token::RParen)?;
                Ok(normalize::call(name, args))
            }
            Token::LParen => {
                let inner = self.parse_sum()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ParseError::new(position, format!("unexpected '{}'", other))),
        }
    }
}

/// Parse infix text into a canonical expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolics::native::normalize::{add, mul, pow};

    #[test]
    fn test_tokenize_operators() {
        let tokens: Vec<Token> = Lexer::new("a**2 - b/c")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".to_string()),
                Token::Caret,
                Token::Number(Coefficient::int(2)),
                Token::Minus,
                Token::Ident("b".to_string()),
                Token::Slash,
                Token::Ident("c".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_precedence() {
        let x = Expr::symbol("x");
        assert_eq!(
            parse("1 + 2*x^2").unwrap(),
            add(vec![Expr::int(1), mul(vec![Expr::int(2), pow(x.clone(), Expr::int(2))])])
        );
        // unary minus binds looser than ^
        assert_eq!(
            parse("-x^2").unwrap(),
            mul(vec![Expr::int(-1), pow(x, Expr::int(2))])
        );
    }

    #[test]
    fn test_dotted_identifiers_and_calls() {
        let expr = parse("ceiling(child.N / 2) + max(a, b)").unwrap();
        assert_eq!(
            expr.free_symbols().into_iter().collect::<Vec<_>>(),
            vec!["a", "b", "child.N"]
        );
        assert_eq!(
            expr.function_calls().into_iter().collect::<Vec<_>>(),
            vec!["ceiling", "max"]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse("0.5").unwrap(), Expr::Num(Coefficient::float(0.5)));
        assert_eq!(parse("1e-3").unwrap(), Expr::Num(Coefficient::float(0.001)));
        assert_eq!(parse("6/4").unwrap(), Expr::Num(Coefficient::Rational(3, 2)));
    }

    #[test]
    fn test_errors_report_position() {
        let err = parse("2 * (x + 1").unwrap_err();
        assert_eq!(err.position, 10);
        assert!(parse("x $ y").is_err());
        assert!(parse("").is_err());
        assert!(parse("f(x,)").is_err());
    }
}
