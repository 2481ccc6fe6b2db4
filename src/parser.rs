// Expression tokenizer and recursive-descent parser
//
// Grammar, lowest to highest precedence:
//
//   expression     := ternary
//   ternary        := or ( "?" expression ":" expression )?
//   or             := and ( "||" and )*
//   and            := equality ( "&&" equality )*
//   equality       := relational ( ( "==" | "!=" | "in" ) relational )*
//   relational     := additive ( ( "<" | ">" | "<=" | ">=" ) additive )*
//   additive       := multiplicative ( ( "+" | "-" ) multiplicative )*
//   multiplicative := unary ( ( "*" | "/" | "%" ) unary )*
//   unary          := ( "!" | "-" ) unary | postfix
//   postfix        := primary ( "." IDENT | "[" literal "]" | "(" args ")" )*
//   primary        := STRING | NUMBER | BOOLEAN | IDENT | "(" expression ")"

use crate::ast::{BinaryOp, Expression, UnaryOp};
use crate::utils::format_number;
use crate::value::Value;
use thiserror::Error;

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Unexpected character: '{0}'")]
    UnexpectedCharacter(char),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Expected {expected}, found {found}")]
    Expected { expected: String, found: String },

    #[error("Expected ':' in ternary expression, found {0}")]
    MissingColon(String),

    #[error("Expected identifier after '.', found {0}")]
    ExpectedIdentifier(String),

    #[error("Expected function name before '('")]
    ExpectedFunctionName,

    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Index '{0}' contains '.' and cannot address a single key")]
    InvalidIndex(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,
}

/// Token types produced by the tokenizer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    String(String),
    Number(f64),
    Boolean(bool),

    Identifier(String),
    Operator(&'static str),

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Question,
    Colon,

    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::String(s) => format!("string '{}'", s),
            Token::Number(n) => format!("number {}", format_number(*n)),
            Token::Boolean(b) => format!("boolean {}", b),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Operator(op) => format!("operator '{}'", op),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Question => "'?'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Eof => "end of expression".to_string(),
        }
    }
}

/// Two-character operators, matched before their one-character prefixes
const TWO_CHAR_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||"];

/// Single-character operators
const ONE_CHAR_OPERATORS: &[&str] = &["+", "-", "*", "/", "%", "=", "!", "<", ">", "&", "|"];

/// Single left-to-right scanner over an expression source
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, ParserError> {
        let mut result = String::new();
        self.advance(); // skip opening quote

        loop {
            match self.current() {
                None => return Err(ParserError::UnterminatedString),
                Some(ch) if ch == quote_char => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        None => return Err(ParserError::UnterminatedString),
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        // Any other escaped character is taken literally
                        Some(ch) => result.push(ch),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, ParserError> {
        let start = self.position;

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let num_str: String = self.input[start..self.position].iter().collect();
        num_str
            .parse()
            .map_err(|_| ParserError::InvalidNumber(num_str))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        self.advance(); // first char already validated

        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        self.input[start..self.position].iter().collect()
    }

    fn read_operator(&mut self) -> Option<&'static str> {
        let first = self.current()?;
        if let Some(second) = self.peek(1) {
            let pair: String = [first, second].iter().collect();
            if let Some(op) = TWO_CHAR_OPERATORS.iter().find(|op| **op == pair) {
                self.advance();
                self.advance();
                return Some(*op);
            }
        }
        let single = first.to_string();
        let op = ONE_CHAR_OPERATORS.iter().find(|op| **op == single)?;
        self.advance();
        Some(*op)
    }

    pub fn next_token(&mut self) -> Result<Token, ParserError> {
        self.skip_whitespace();

        let ch = match self.current() {
            None => return Ok(Token::Eof),
            Some(ch) => ch,
        };

        let token = match ch {
            '"' | '\'' => Token::String(self.read_string(ch)?),
            c if c.is_ascii_digit() => Token::Number(self.read_number()?),
            c if c.is_alphabetic() || c == '$' || c == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "in" => Token::Operator("in"),
                    _ => Token::Identifier(ident),
                }
            }
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ',' => self.single(Token::Comma),
            '.' => self.single(Token::Dot),
            '?' => self.single(Token::Question),
            ':' => self.single(Token::Colon),
            _ => match self.read_operator() {
                Some(op) => Token::Operator(op),
                None => return Err(ParserError::UnexpectedCharacter(ch)),
            },
        };

        Ok(token)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }
}

/// Convert an expression source into a flat token stream ending in `Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParserError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

static EOF: Token = Token::Eof;

/// Recursive-descent parser over a token stream.
///
/// A parser owns its tokens and cursor, and [`parse`] builds a fresh one per
/// call, so parsing needs no synchronization.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParserError> {
        Ok(Parser {
            tokens: tokenize(input)?,
            position: 0,
        })
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&EOF)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_operator(&self, candidates: &[&str]) -> Option<&'static str> {
        match self.current() {
            Token::Operator(op) if candidates.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParserError::Expected {
                expected: expected.describe(),
                found: self.current().describe(),
            })
        }
    }

    /// Parse a complete expression, rejecting trailing tokens.
    pub fn parse(mut self) -> Result<Expression, ParserError> {
        if *self.current() == Token::Eof {
            return Err(ParserError::UnexpectedEnd);
        }
        let expr = self.parse_expression()?;
        match self.current() {
            Token::Eof => Ok(expr),
            other => Err(ParserError::UnexpectedToken(other.describe())),
        }
    }

    fn parse_expression(&mut self) -> Result<Expression, ParserError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expression, ParserError> {
        let condition = self.parse_or()?;

        if *self.current() != Token::Question {
            return Ok(condition);
        }
        self.advance(); // consume '?'
        let when_true = self.parse_expression()?;

        if *self.current() != Token::Colon {
            return Err(ParserError::MissingColon(self.current().describe()));
        }
        self.advance(); // consume ':'
        let when_false = self.parse_expression()?;

        Ok(Expression::ternary(condition, when_true, when_false))
    }

    fn parse_or(&mut self) -> Result<Expression, ParserError> {
        let mut lhs = self.parse_and()?;
        while self.is_operator(&["||"]).is_some() {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expression::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression, ParserError> {
        let mut lhs = self.parse_equality()?;
        while self.is_operator(&["&&"]).is_some() {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expression::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expression, ParserError> {
        let mut lhs = self.parse_relational()?;
        while let Some(op) = self.is_operator(&["==", "!=", "in"]) {
            self.advance();
            let rhs = self.parse_relational()?;
            let op = match op {
                "==" => BinaryOp::Equal,
                "!=" => BinaryOp::NotEqual,
                _ => BinaryOp::In,
            };
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParserError> {
        let mut lhs = self.parse_additive()?;
        while let Some(op) = self.is_operator(&["<", ">", "<=", ">="]) {
            self.advance();
            let rhs = self.parse_additive()?;
            let op = match op {
                "<" => BinaryOp::LessThan,
                ">" => BinaryOp::GreaterThan,
                "<=" => BinaryOp::LessThanOrEqual,
                _ => BinaryOp::GreaterThanOrEqual,
            };
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParserError> {
        let mut lhs = self.parse_multiplicative()?;
        while let Some(op) = self.is_operator(&["+", "-"]) {
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let op = if op == "+" {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParserError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.is_operator(&["*", "/", "%"]) {
            self.advance();
            let rhs = self.parse_unary()?;
            let op = match op {
                "*" => BinaryOp::Multiply,
                "/" => BinaryOp::Divide,
                _ => BinaryOp::Modulo,
            };
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParserError> {
        if let Some(op) = self.is_operator(&["!", "-"]) {
            self.advance();
            let operand = self.parse_unary()?;
            let op = if op == "!" {
                UnaryOp::Not
            } else {
                UnaryOp::Negate
            };
            return Ok(Expression::unary(op, operand));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParserError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current() {
                Token::Dot => {
                    self.advance(); // consume '.'
                    let property = match self.current() {
                        Token::Identifier(name) => name.clone(),
                        other => return Err(ParserError::ExpectedIdentifier(other.describe())),
                    };
                    self.advance();
                    expr = extend_path(expr, &property)?;
                }
                Token::LeftBracket => {
                    self.advance(); // consume '['
                    let segment = match self.current() {
                        Token::Number(n) => format_number(*n),
                        Token::String(s) => s.clone(),
                        other => {
                            return Err(ParserError::UnexpectedToken(other.describe()));
                        }
                    };
                    if segment.contains('.') {
                        return Err(ParserError::InvalidIndex(segment));
                    }
                    self.advance();
                    self.expect(Token::RightBracket)?;
                    expr = extend_path(expr, &segment)?;
                }
                Token::LeftParen => {
                    let name = match expr {
                        Expression::PropertyAccess(path) => path,
                        _ => return Err(ParserError::ExpectedFunctionName),
                    };
                    self.advance(); // consume '('

                    let mut args = Vec::new();
                    if *self.current() != Token::RightParen {
                        args.push(self.parse_expression()?);
                        while *self.current() == Token::Comma {
                            self.advance();
                            args.push(self.parse_expression()?);
                        }
                    }
                    self.expect(Token::RightParen)?;

                    expr = Expression::FunctionCall { name, args };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParserError> {
        let expr = match self.current() {
            Token::String(s) => Expression::Literal(Value::from(s.as_str())),
            Token::Number(n) => Expression::Literal(Value::Number(*n)),
            Token::Boolean(b) => Expression::Literal(Value::Bool(*b)),
            Token::Identifier(name) => Expression::PropertyAccess(name.clone()),
            Token::LeftParen => {
                self.advance(); // consume '('
                let inner = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                return Ok(inner);
            }
            Token::Eof => return Err(ParserError::UnexpectedEnd),
            other => return Err(ParserError::UnexpectedToken(other.describe())),
        };
        self.advance();
        Ok(expr)
    }
}

/// Fold another segment into a property path.
/// Append `segment` to a dotted path.
///
/// Paths are split on `.` when resolved, so a segment must not contain one.
fn extend_path(expr: Expression, segment: &str) -> Result<Expression, ParserError> {
    match expr {
        Expression::PropertyAccess(path) => {
            Ok(Expression::PropertyAccess(format!("{}.{}", path, segment)))
        }
        _ => Err(ParserError::UnexpectedToken(format!(
            "property access '{}' on a non-path expression",
            segment
        ))),
    }
}

/// Parse an expression source into an AST.
pub fn parse(input: &str) -> Result<Expression, ParserError> {
    Parser::new(input)?.parse()
}
