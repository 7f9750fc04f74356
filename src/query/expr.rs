use std::fmt;

use crate::core::{BreezeError, DataType, Result, Value};

/// Typed constant. Without an explicit type the literal adopts the type of
/// the property it is compared with, or else the type inferred from its value.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub value: Value,
    pub data_type: Option<DataType>,
}

/// A client-side property path such as `customer.companyName`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpr {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<Expr>,
}

impl FunctionExpr {
    /// Result type of the well-known OData functions.
    pub fn return_type(&self) -> Option<DataType> {
        let dt = match self.name.to_ascii_lowercase().as_str() {
            "toupper" | "tolower" | "trim" | "substring" | "concat" | "replace" => DataType::String,
            "length" | "indexof" | "year" | "month" | "day" | "hour" | "minute" | "second" => {
                DataType::Int32
            }
            "round" | "floor" | "ceiling" => DataType::Double,
            "substringof" | "startswith" | "endswith" => DataType::Boolean,
            _ => return None,
        };
        Some(dt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralExpr),
    Property(PropertyExpr),
    Function(FunctionExpr),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(LiteralExpr {
            value: value.into(),
            data_type: None,
        })
    }

    pub fn typed_literal(value: impl Into<Value>, data_type: DataType) -> Self {
        Self::Literal(LiteralExpr {
            value: value.into(),
            data_type: Some(data_type),
        })
    }

    pub fn property(path: impl Into<String>) -> Self {
        Self::Property(PropertyExpr { path: path.into() })
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Function(FunctionExpr {
            name: name.into(),
            args,
        })
    }

    /// Parses a left-hand-side expression: a property path, a literal or a
    /// function call such as `substring(companyName, 1, 3)`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = ExprParser {
            chars: text.chars().collect(),
            pos: 0,
            source: text,
        };
        let expr = parser.parse_expr()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    pub fn as_property(&self) -> Option<&PropertyExpr> {
        match self {
            Self::Property(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => match &lit.value {
                Value::Text(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            Self::Property(p) => write!(f, "{}", p.path),
            Self::Function(func) => {
                let args: Vec<String> = func.args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", func.name, args.join(", "))
            }
        }
    }
}

struct ExprParser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl ExprParser<'_> {
    fn error(&self, message: &str) -> BreezeError {
        BreezeError::InvalidPredicate(format!(
            "{} at position {} in '{}'",
            message, self.pos, self.source
        ))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("expected an expression")),
            Some('\'') | Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => self.parse_identifier_expr(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn parse_string(&mut self) -> Result<Expr> {
        let quote = self.chars[self.pos];
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => {
                    // A doubled quote is an escaped quote.
                    if self.chars.get(self.pos + 1) == Some(&quote) {
                        text.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(Expr::literal(text));
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let start = self.pos;
        self.pos += 1;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Expr::literal(i));
        }
        text.parse::<f64>()
            .map(Expr::literal)
            .map_err(|_| self.error("invalid number"))
    }

    fn parse_identifier_expr(&mut self) -> Result<Expr> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '/'))
        {
            self.pos += 1;
        }
        let ident: String = self.chars[start..self.pos].iter().collect();

        self.skip_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            let mut args = Vec::new();
            self.skip_ws();
            if self.peek() == Some(')') {
                self.pos += 1;
            } else {
                loop {
                    args.push(self.parse_expr()?);
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some(')') => {
                            self.pos += 1;
                            break;
                        }
                        _ => return Err(self.error("expected ',' or ')'")),
                    }
                }
            }
            return Ok(Expr::function(ident, args));
        }

        match ident.as_str() {
            "true" => Ok(Expr::literal(true)),
            "false" => Ok(Expr::literal(false)),
            "null" => Ok(Expr::literal(Value::Null)),
            _ => Ok(Expr::property(ident)),
        }
    }
}
