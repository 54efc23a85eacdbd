//! MSBuild property expansion and `Condition` evaluation
//!
//! Covers the subset that shows up around `UserSecretsId` and imports:
//! `'$(Configuration)' == 'Debug'`, `!=`, `and`, `or`, `!`, parentheses,
//! `Exists('path')`, and the literals `true`/`false`. String comparison is
//! case-insensitive, as in MSBuild.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Deepest run of `!` and `(` a condition may nest
const MAX_NESTING: usize = 64;

#[derive(Error, Debug, PartialEq)]
#[error("{0}")]
pub struct ConditionError(String);

/// Property table used for `$(Name)` expansion. Names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Replace every `$(Name)` in `input`. Unknown names expand to "".
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find(')') {
                Some(end) => {
                    let name = after[..end].trim();
                    out.push_str(self.get(name).unwrap_or(""));
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Word(String),
    LParen,
    RParen,
    Eq,
    Ne,
    Not,
    And,
    Or,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == '\'')
                    .map(|p| start + p)
                    .ok_or_else(|| ConditionError("unterminated string".to_string()))?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '$' if chars.get(i + 1) == Some(&'(') => {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == ')')
                    .map(|p| i + p)
                    .ok_or_else(|| ConditionError("unterminated property".to_string()))?;
                tokens.push(Token::Str(chars[i..=end].iter().collect()));
                i = end + 1;
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Word(word),
                });
            }
            other => return Err(ConditionError(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    props: &'a Properties,
    base_dir: &'a Path,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConditionError> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            other => Err(ConditionError(format!("expected {:?}, found {:?}", expected, other))),
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<bool, ConditionError>) -> Result<bool, ConditionError> {
        if self.depth >= MAX_NESTING {
            return Err(ConditionError(format!("nested deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn or(&mut self) -> Result<bool, ConditionError> {
        let mut value = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<bool, ConditionError> {
        let mut value = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<bool, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return self.nested(|p| p.unary().map(|v| !v));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<bool, ConditionError> {
        match self.next() {
            Some(Token::LParen) => self.nested(|p| {
                let value = p.or()?;
                p.expect(Token::RParen)?;
                Ok(value)
            }),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("exists") => {
                self.expect(Token::LParen)?;
                let arg = match self.next() {
                    Some(Token::Str(s)) => self.props.expand(&s),
                    other => return Err(ConditionError(format!("Exists expects a string, found {:?}", other))),
                };
                self.expect(Token::RParen)?;
                let arg = arg.trim();
                Ok(!arg.is_empty() && self.base_dir.join(arg).exists())
            }
            Some(Token::Str(s)) => self.comparison(self.props.expand(&s)),
            Some(Token::Word(w)) => self.comparison(w),
            other => Err(ConditionError(format!("unexpected {:?}", other))),
        }
    }

    fn comparison(&mut self, lhs: String) -> Result<bool, ConditionError> {
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::Ne) => true,
            _ => return truthy(&lhs),
        };
        self.pos += 1;

        let rhs = match self.next() {
            Some(Token::Str(s)) => self.props.expand(&s),
            Some(Token::Word(w)) => w,
            other => return Err(ConditionError(format!("expected operand, found {:?}", other))),
        };

        Ok(lhs.eq_ignore_ascii_case(&rhs) != negate)
    }
}

fn truthy(value: &str) -> Result<bool, ConditionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Ok(true),
        "false" | "off" | "no" => Ok(false),
        other => Err(ConditionError(format!("'{}' is not a boolean", other))),
    }
}

/// Evaluate an MSBuild condition. An empty condition is true.
///
/// `Exists` paths are resolved against `base_dir`.
pub fn evaluate(condition: &str, props: &Properties, base_dir: &Path) -> Result<bool, ConditionError> {
    if condition.trim().is_empty() {
        return Ok(true);
    }

    let tokens = tokenize(condition)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        props,
        base_dir,
    };

    let value = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return Err(ConditionError(format!(
            "unexpected trailing {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(value)
}
