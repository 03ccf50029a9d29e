//! Parser for form expressions
//!
//! A recursive descent parser over a fixed grammar, lowest precedence first:
//! conditional (`t ? a : b` or `a if t else b`), `or`, `and`, comparison chains,
//! `+ -`, `* / %`, unary `+ -`, `**`, then literals, names, calls and groups.
//! Everything outside the grammar (assignment, attribute access, indexing,
//! statements, other keywords) is rejected with a positioned [`ParseError`].

use crate::calculator::ast::{
    BinaryOperator, BoolOperator, CompareOperator, Expression, UnaryOperator,
};
use crate::constants::limits;
use crate::error::ParseError;
use std::fmt;

/// Python keywords with no meaning in the expression language
const RESERVED_WORDS: &[&str] = &[
    "not", "lambda", "import", "from", "for", "in", "is", "del", "def", "class", "return",
    "yield", "await", "async", "with", "while", "assert", "pass", "raise", "try", "except",
    "finally", "break", "continue", "elif", "global", "nonlocal", "as",
];

/// Token types recognized by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    True,
    False,

    // Identifiers and keywords
    Identifier(String),
    And,
    Or,
    If,
    Else,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Question,
    Colon,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // Special
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Power => write!(f, "**"),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::LessThan => write!(f, "<"),
            Token::LessThanEqual => write!(f, "<="),
            Token::GreaterThan => write!(f, ">"),
            Token::GreaterThanEqual => write!(f, ">="),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for tokenizing expressions
pub struct Lexer {
    input: Vec<(usize, char)>,
    source_len: usize,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<(usize, char)> = input.char_indices().collect();
        let current_char = chars.first().map(|(_, ch)| *ch);

        Self { input: chars, source_len: input.len(), position: 0, current_char }
    }

    /// Byte offset of the current character
    fn offset(&self) -> usize {
        self.input.get(self.position).map_or(self.source_len, |(offset, _)| *offset)
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).map(|(_, ch)| *ch);
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).map(|(_, ch)| *ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_digits(&mut self, number: &mut String) -> usize {
        let mut count = 0;
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.offset();
        let mut number = String::new();
        let mut is_float = false;

        self.read_digits(&mut number);

        if self.current_char == Some('.') {
            is_float = true;
            number.push('.');
            self.advance();
            self.read_digits(&mut number);
        }

        if matches!(self.current_char, Some('e' | 'E')) {
            is_float = true;
            number.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char {
                number.push(sign);
                self.advance();
            }
            if self.read_digits(&mut number) == 0 {
                return Err(ParseError::InvalidNumber { literal: number, position: start });
            }
        }

        if is_float {
            match number.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Token::Float(value)),
                _ => Err(ParseError::InvalidNumber { literal: number, position: start }),
            }
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| ParseError::InvalidNumber { literal: number, position: start })
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.offset();
        let mut string = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance();
                return Ok(Token::String(string));
            } else if ch == '\\' {
                self.advance();
                match self.current_char {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some('r') => string.push('\r'),
                    Some('\\') => string.push('\\'),
                    Some('\'') => string.push('\''),
                    Some('"') => string.push('"'),
                    Some(other) => {
                        string.push('\\');
                        string.push(other);
                    }
                    None => break,
                }
                self.advance();
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(ParseError::UnterminatedString { position: start })
    }

    fn read_identifier(&mut self) -> Result<Token, ParseError> {
        let start = self.offset();
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match identifier.as_str() {
            "and" => Ok(Token::And),
            "or" => Ok(Token::Or),
            "if" => Ok(Token::If),
            "else" => Ok(Token::Else),
            "true" | "True" => Ok(Token::True),
            "false" | "False" => Ok(Token::False),
            word if RESERVED_WORDS.contains(&word) => Err(ParseError::Disallowed {
                construct: format!("keyword '{word}'"),
                position: start,
            }),
            _ => Ok(Token::Identifier(identifier)),
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, ParseError> {
        self.advance();
        Ok(token)
    }

    fn double(&mut self, token: Token) -> Result<Token, ParseError> {
        self.advance();
        self.advance();
        Ok(token)
    }

    fn disallowed(&self, construct: &str) -> Result<Token, ParseError> {
        Err(ParseError::Disallowed { construct: construct.to_string(), position: self.offset() })
    }

    /// Next token together with the byte offset it starts at
    pub fn next_token(&mut self) -> Result<(Token, usize), ParseError> {
        self.skip_whitespace();
        let start = self.offset();

        let token = match self.current_char {
            None => Ok(Token::Eof),
            Some(ch) => match ch {
                '0'..='9' => self.read_number(),
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => self.read_number(),
                '"' | '\'' => self.read_string(ch),
                c if c.is_alphabetic() || c == '_' => self.read_identifier(),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '*' if self.peek() == Some('*') => self.double(Token::Power),
                '*' => self.single(Token::Star),
                '/' if self.peek() == Some('/') => self.disallowed("floor division '//'"),
                '/' => self.single(Token::Slash),
                '%' => self.single(Token::Percent),
                '=' if self.peek() == Some('=') => self.double(Token::Equal),
                '=' => self.disallowed("assignment '='"),
                '!' if self.peek() == Some('=') => self.double(Token::NotEqual),
                '<' if self.peek() == Some('=') => self.double(Token::LessThanEqual),
                '<' => self.single(Token::LessThan),
                '>' if self.peek() == Some('=') => self.double(Token::GreaterThanEqual),
                '>' => self.single(Token::GreaterThan),
                '?' => self.single(Token::Question),
                ':' => self.single(Token::Colon),
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                ',' => self.single(Token::Comma),
                '.' => self.disallowed("attribute access '.'"),
                '[' | ']' => self.disallowed("indexing '[]'"),
                '{' | '}' => self.disallowed("braces '{}'"),
                ';' => self.disallowed("statement separator ';'"),
                _ => Err(ParseError::UnexpectedChar { ch, position: start }),
            },
        }?;

        Ok((token, start))
    }
}

/// Parser for form expressions
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_position: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(lexer: Lexer, max_depth: usize) -> Result<Self, ParseError> {
        let mut parser =
            Self { lexer, current_token: Token::Eof, current_position: 0, depth: 0, max_depth };
        parser.advance()?;
        Ok(parser)
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let (token, position) = self.lexer.next_token()?;
        self.current_token = token;
        self.current_position = position;
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current_token {
            Token::Eof => ParseError::UnexpectedEnd {
                expected: expected.to_string(),
                position: self.current_position,
            },
            ref found => ParseError::UnexpectedToken {
                found: found.to_string(),
                expected: expected.to_string(),
                position: self.current_position,
            },
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current_token == expected {
            self.advance()
        } else {
            Err(self.unexpected(&format!("'{}'", expected)))
        }
    }

    /// Runs `parse` one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::TooDeep { max_depth: self.max_depth });
        }
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Depth of a node built from children no deeper than `child_depth`, failing
    /// as soon as it passes the limit so operator chains never grow past it
    fn node_depth(&self, child_depth: usize) -> Result<usize, ParseError> {
        let depth = child_depth + 1;
        if depth > self.max_depth {
            return Err(ParseError::TooDeep { max_depth: self.max_depth });
        }
        Ok(depth)
    }

    /// Parse a complete expression, rejecting trailing input
    pub fn parse(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_expression()?;
        if self.current_token != Token::Eof {
            return Err(self.unexpected("end of input"));
        }
        if expr.depth() > self.max_depth {
            return Err(ParseError::TooDeep { max_depth: self.max_depth });
        }
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_or_expression()?;

        match self.current_token {
            Token::Question => {
                self.advance()?;
                let then_expr = self.nested(Self::parse_expression)?;
                self.expect(Token::Colon)?;
                let else_expr = self.nested(Self::parse_expression)?;
                Ok(Expression::conditional(expr, then_expr, else_expr))
            }
            // `then if test else otherwise`
            Token::If => {
                self.advance()?;
                let test = self.nested(Self::parse_or_expression)?;
                self.expect(Token::Else)?;
                let else_expr = self.nested(Self::parse_expression)?;
                Ok(Expression::conditional(test, expr, else_expr))
            }
            _ => Ok(expr),
        }
    }

    fn parse_or_expression(&mut self) -> Result<Expression, ParseError> {
        let mut operands = vec![self.parse_and_expression()?];

        while matches!(self.current_token, Token::Or) {
            self.advance()?;
            operands.push(self.parse_and_expression()?);
        }

        Ok(collapse(BoolOperator::Or, operands))
    }

    fn parse_and_expression(&mut self) -> Result<Expression, ParseError> {
        let mut operands = vec![self.parse_comparison_expression()?];

        while matches!(self.current_token, Token::And) {
            self.advance()?;
            operands.push(self.parse_comparison_expression()?);
        }

        Ok(collapse(BoolOperator::And, operands))
    }

    fn parse_comparison_expression(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_additive_expression()?;
        let mut depth = first.depth();
        let mut rest = Vec::new();

        loop {
            let op = match self.current_token {
                Token::Equal => CompareOperator::Equal,
                Token::NotEqual => CompareOperator::NotEqual,
                Token::LessThan => CompareOperator::LessThan,
                Token::LessThanEqual => CompareOperator::LessThanOrEqual,
                Token::GreaterThan => CompareOperator::GreaterThan,
                Token::GreaterThanEqual => CompareOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance()?;
            let operand = self.parse_additive_expression()?;
            depth = depth.max(operand.depth());
            self.node_depth(depth)?;
            rest.push((op, operand));
        }

        if rest.is_empty() { Ok(first) } else { Ok(Expression::compare(first, rest)) }
    }

    fn parse_additive_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative_expression()?;
        let mut depth = left.depth();

        loop {
            let op = match self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative_expression()?;
            depth = self.node_depth(depth.max(right.depth()))?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary_expression()?;
        let mut depth = left.depth();

        loop {
            let op = match self.current_token {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary_expression()?;
            depth = self.node_depth(depth.max(right.depth()))?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, ParseError> {
        let op = match self.current_token {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power_expression(),
        };
        self.advance()?;
        let operand = self.nested(Self::parse_unary_expression)?;
        Ok(Expression::unary(op, operand))
    }

    fn parse_power_expression(&mut self) -> Result<Expression, ParseError> {
        let base = self.parse_primary_expression()?;

        // Right-associative, and binds tighter than a unary minus on its left
        if matches!(self.current_token, Token::Power) {
            self.advance()?;
            let exponent = self.nested(Self::parse_unary_expression)?;
            return Ok(Expression::binary(base, BinaryOperator::Power, exponent));
        }

        Ok(base)
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, ParseError> {
        match &self.current_token {
            Token::Integer(value) => {
                let val = *value;
                self.advance()?;
                Ok(Expression::int(val))
            }
            Token::Float(value) => {
                let val = *value;
                self.advance()?;
                Ok(Expression::float(val))
            }
            Token::String(value) => {
                let val = value.clone();
                self.advance()?;
                Ok(Expression::string(val))
            }
            Token::True => {
                self.advance()?;
                Ok(Expression::bool(true))
            }
            Token::False => {
                self.advance()?;
                Ok(Expression::bool(false))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                if matches!(self.current_token, Token::LeftParen) {
                    self.advance()?;
                    let args = self.nested(Self::parse_arguments)?;
                    Ok(Expression::call(&name, args))
                } else {
                    Ok(Expression::Variable(name))
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let expr = self.nested(Self::parse_expression)?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Call arguments after the opening parenthesis, through the closing one
    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();

        if !matches!(self.current_token, Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token, Token::Comma) {
                self.advance()?;
                args.push(self.parse_expression()?);
            }
        }

        self.expect(Token::RightParen)?;
        Ok(args)
    }
}

fn collapse(operator: BoolOperator, mut operands: Vec<Expression>) -> Expression {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        Expression::bool_op(operator, operands)
    }
}

/// Limits applied while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_depth: usize,
    pub max_length: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self { max_depth: limits::MAX_EXPRESSION_DEPTH, max_length: limits::MAX_EXPRESSION_LENGTH }
    }
}

/// Parse an expression string into an AST with the default limits
pub fn parse_expression(input: &str) -> Result<Expression, ParseError> {
    parse_with_limits(input, ParserLimits::default())
}

/// Parse an expression string into an AST
pub fn parse_with_limits(input: &str, limits: ParserLimits) -> Result<Expression, ParseError> {
    if input.len() > limits.max_length {
        return Err(ParseError::TooLong { length: input.len(), max_length: limits.max_length });
    }
    Parser::new(Lexer::new(input), limits.max_depth)?.parse()
}
