//! Template expression mini-language
//!
//! Directives and echoes embed small expressions: literals, dot-path lookups
//! into the view data, equality comparisons and negation. Expressions are
//! parsed once at compile time for validation and re-parsed at render time
//! from the stored source text.

use serde_json::{Map, Value as Json};

use super::CompilationError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Json),
    /// A dot-separated lookup into the view data, e.g. `user.name`.
    Path(Vec<String>),
    Not(Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
}

/// Parse an expression, reporting the original source on failure.
pub fn parse(source: &str) -> Result<Expr, CompilationError> {
    let tokens = tokenize(source).map_err(|reason| CompilationError::BadExpression {
        expr: source.to_string(),
        reason,
    })?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression().map_err(|reason| CompilationError::BadExpression {
        expr: source.to_string(),
        reason,
    })?;
    if parser.pos != parser.tokens.len() {
        return Err(CompilationError::BadExpression {
            expr: source.to_string(),
            reason: "trailing input after expression".to_string(),
        });
    }
    Ok(expr)
}

/// Evaluate against the current scope. Missing paths resolve to null rather
/// than failing, matching loosely-typed template semantics.
pub fn eval(expr: &Expr, scope: &Map<String, Json>) -> Json {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Path(segments) => lookup(segments, scope),
        Expr::Not(inner) => Json::Bool(!truthy(&eval(inner, scope))),
        Expr::Eq(a, b) => Json::Bool(loose_eq(&eval(a, scope), &eval(b, scope))),
        Expr::Ne(a, b) => Json::Bool(!loose_eq(&eval(a, scope), &eval(b, scope))),
    }
}

/// Truthiness: null, false, 0, "" and empty collections are false.
pub fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Json::String(s) => !s.is_empty() && s != "0",
        Json::Array(items) => !items.is_empty(),
        Json::Object(map) => !map.is_empty(),
    }
}

/// Render a value as template output. Null disappears; everything else uses
/// its natural text form.
pub fn stringify(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup(segments: &[String], scope: &Map<String, Json>) -> Json {
    let Some((first, rest)) = segments.split_first() else {
        return Json::Null;
    };
    let mut current = match scope.get(first) {
        Some(v) => v.clone(),
        None => return Json::Null,
    };
    for segment in rest {
        current = match &current {
            Json::Object(map) => map.get(segment).cloned().unwrap_or(Json::Null),
            Json::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Json::Null),
            _ => Json::Null,
        };
    }
    current
}

fn loose_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        // Numeric comparison tolerates integer/float representation drift.
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        (Json::String(s), Json::Number(n)) | (Json::Number(n), Json::String(s)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    EqEq,
    NotEq,
    Bang,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err("single '=' is not an operator".to_string());
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Bang);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    return Err("unterminated string literal".to_string());
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| format!("bad number '{}'", text))?;
                tokens.push(Token::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric()
                        || chars[i] == '_'
                        || chars[i] == '.'
                        || chars[i] == '$')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn expression(&mut self) -> Result<Expr, String> {
        let left = self.unary()?;
        match self.tokens.get(self.pos) {
            Some(Token::EqEq) => {
                self.pos += 1;
                let right = self.unary()?;
                Ok(Expr::Eq(Box::new(left), Box::new(right)))
            }
            Some(Token::NotEq) => {
                self.pos += 1;
                let right = self.unary()?;
                Ok(Expr::Ne(Box::new(left), Box::new(right)))
            }
            _ => Ok(left),
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.tokens.get(self.pos) == Some(&Token::Bang) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "empty expression".to_string())?;
        self.pos += 1;
        match token {
            Token::Str(s) => Ok(Expr::Literal(Json::String(s))),
            Token::Num(n) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n)
                    .map(Json::Number)
                    .unwrap_or(Json::Null),
            )),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Json::Bool(true))),
                "false" => Ok(Expr::Literal(Json::Bool(false))),
                "null" => Ok(Expr::Literal(Json::Null)),
                _ => {
                    // A leading '$' sigil is tolerated and stripped.
                    let path = name.trim_start_matches('$');
                    if path.is_empty() {
                        return Err("empty variable name".to_string());
                    }
                    Ok(Expr::Path(path.split('.').map(str::to_string).collect()))
                }
            },
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}
