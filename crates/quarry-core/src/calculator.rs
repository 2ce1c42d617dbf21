//! Arithmetic expression evaluator for the calculator tool.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := atom ('**' unary)?
//! atom    := number | name | name '(' args ')' | '(' expr ')'
//! ```
//!
//! `**` is right-associative and binds tighter than a unary sign on its
//! left, so `-2 ** 2` is `-4` and `2 ** -1` is `0.5`. `%` takes the sign of
//! the divisor.
//!
//! Only the names listed in [`CONSTANTS`] and [`FUNCTIONS`] resolve. Every
//! other identifier is a parse error; nothing is ever looked up outside
//! those tables.

use thiserror::Error;

pub const CONSTANTS: &[&str] = &["pi", "e"];
pub const FUNCTIONS: &[&str] = &["abs", "round", "min", "max", "sum", "pow", "sqrt"];

/// Deepest nesting of signs and parentheses the parser will follow.
pub const MAX_DEPTH: usize = 256;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("name '{0}' is not allowed")]
    UnknownName(String),

    #[error("unexpected {0}")]
    UnexpectedToken(String),

    #[error("empty expression")]
    Empty,

    #[error("{name}() {message}")]
    BadArguments { name: String, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("math domain error")]
    Domain,

    #[error("result is not a finite number")]
    NotFinite,

    #[error("expression nested more than 256 levels deep")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(n) => format!("number {}", n),
            Token::Ident(s) => format!("name '{}'", s),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::StarStar => "'**'".into(),
            Token::Slash => "'/'".into(),
            Token::Percent => "'%'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent: 1e3, 2.5E-4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::StarStar);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            _ => {
                let tok = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => return Err(CalcError::UnexpectedChar(other)),
                };
                tokens.push(tok);
                i += 1;
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), CalcError> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(CalcError::UnexpectedToken(t.describe())),
            None => Err(CalcError::UnexpectedToken("end of expression".into())),
        }
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                value += self.term()?;
            } else if self.eat(&Token::Minus) {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                value *= self.unary()?;
            } else if self.eat(&Token::Slash) {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err(CalcError::DivisionByZero);
                }
                value /= rhs;
            } else if self.eat(&Token::Percent) {
                let rhs = self.unary()?;
                value = modulo(value, rhs)?;
            } else {
                return Ok(value);
            }
        }
    }

    /// Every recursive path in the grammar passes through here, so this is
    /// where nesting depth is bounded.
    fn unary(&mut self) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        if self.eat(&Token::Minus) {
            return Ok(-self.unary()?);
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if self.eat(&Token::StarStar) {
            let exponent = self.unary()?;
            return power(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    if !FUNCTIONS.contains(&name.as_str()) {
                        return Err(CalcError::UnknownName(name));
                    }
                    let args = self.args()?;
                    call(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(t) => Err(CalcError::UnexpectedToken(t.describe())),
            None => Err(CalcError::UnexpectedToken("end of expression".into())),
        }
    }

    fn args(&mut self) -> Result<Vec<f64>, CalcError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }
}

fn constant(name: &str) -> Result<f64, CalcError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(CalcError::UnknownName(other.to_string())),
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, CalcError> {
    let arity = |n: usize| -> Result<(), CalcError> {
        if args.len() == n {
            Ok(())
        } else {
            Err(CalcError::BadArguments {
                name: name.to_string(),
                message: format!("takes {} argument(s), got {}", n, args.len()),
            })
        }
    };
    let non_empty = || -> Result<(), CalcError> {
        if args.is_empty() {
            Err(CalcError::BadArguments {
                name: name.to_string(),
                message: "needs at least one argument".to_string(),
            })
        } else {
            Ok(())
        }
    };

    match name {
        "abs" => {
            arity(1)?;
            Ok(args[0].abs())
        }
        "sqrt" => {
            arity(1)?;
            if args[0] < 0.0 {
                return Err(CalcError::Domain);
            }
            Ok(args[0].sqrt())
        }
        "pow" => {
            arity(2)?;
            power(args[0], args[1])
        }
        "round" => match args {
            [x] => Ok(x.round_ties_even()),
            [x, digits] => {
                let scale = 10f64.powi(*digits as i32);
                Ok((x * scale).round_ties_even() / scale)
            }
            _ => Err(CalcError::BadArguments {
                name: name.to_string(),
                message: format!("takes 1 or 2 arguments, got {}", args.len()),
            }),
        },
        "min" => {
            non_empty()?;
            Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            non_empty()?;
            Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        "sum" => Ok(args.iter().sum()),
        other => Err(CalcError::UnknownName(other.to_string())),
    }
}

fn power(base: f64, exponent: f64) -> Result<f64, CalcError> {
    if base == 0.0 && exponent < 0.0 {
        return Err(CalcError::DivisionByZero);
    }
    if base < 0.0 && exponent.fract() != 0.0 {
        return Err(CalcError::Domain);
    }
    Ok(base.powf(exponent))
}

fn modulo(lhs: f64, rhs: f64) -> Result<f64, CalcError> {
    if rhs == 0.0 {
        return Err(CalcError::DivisionByZero);
    }
    let r = lhs % rhs;
    if r != 0.0 && (r < 0.0) != (rhs < 0.0) {
        Ok(r + rhs)
    } else {
        Ok(r)
    }
}

/// Parse and evaluate `input`.
pub fn evaluate(input: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(t) = parser.peek() {
        return Err(CalcError::UnexpectedToken(t.describe()));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Render a result, dropping the fractional part of integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
