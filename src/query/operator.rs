use std::fmt;

use crate::core::{BreezeError, Result};

/// Comparison and relational operators of a binary predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    StartsWith,
    EndsWith,
    Contains,
    In,
}

impl BinaryOperator {
    /// Parses an operator from its key, symbol or long name (case-insensitive).
    pub fn parse(text: &str) -> Result<Self> {
        let op = match text.trim().to_ascii_lowercase().as_str() {
            "eq" | "==" | "=" | "equals" => Self::Equals,
            "ne" | "!=" | "~=" | "notequals" => Self::NotEquals,
            "lt" | "<" | "lessthan" => Self::LessThan,
            "le" | "<=" | "lessthanorequal" => Self::LessThanOrEqual,
            "gt" | ">" | "greaterthan" => Self::GreaterThan,
            "ge" | ">=" | "greaterthanorequal" => Self::GreaterThanOrEqual,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "contains" | "substringof" => Self::Contains,
            "in" => Self::In,
            _ => {
                return Err(BreezeError::InvalidPredicate(format!(
                    "Unknown binary operator '{}'",
                    text
                )));
            }
        };
        Ok(op)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::NotEquals => "ne",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "le",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
            Self::In => "in",
        }
    }

    /// Operators rendered as a boolean function call rather than infix.
    pub fn is_function(&self) -> bool {
        matches!(self, Self::StartsWith | Self::EndsWith | Self::Contains)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "and" | "&&" => Ok(Self::And),
            "or" | "||" => Ok(Self::Or),
            _ => Err(BreezeError::InvalidPredicate(format!(
                "Unknown boolean operator '{}'",
                text
            ))),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

impl UnaryOperator {
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "not" | "!" | "~" => Ok(Self::Not),
            _ => Err(BreezeError::InvalidPredicate(format!(
                "Unknown unary operator '{}'",
                text
            ))),
        }
    }

    pub fn key(&self) -> &'static str {
        "not"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierOperator {
    Any,
    All,
}

impl QuantifierOperator {
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "any" | "some" => Ok(Self::Any),
            "all" | "every" => Ok(Self::All),
            _ => Err(BreezeError::InvalidPredicate(format!(
                "Unknown quantifier '{}'",
                text
            ))),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

/// Wire name of an operator key in OData filters.
///
/// `contains` is the only key renamed on the wire; it becomes `substringof`.
pub fn odata_operator(key: &str) -> &str {
    match key {
        "contains" => "substringof",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(BinaryOperator::parse(">").unwrap(), BinaryOperator::GreaterThan);
        assert_eq!(BinaryOperator::parse("GreaterThan").unwrap(), BinaryOperator::GreaterThan);
        assert_eq!(BinaryOperator::parse("==").unwrap(), BinaryOperator::Equals);
        assert_eq!(BinaryOperator::parse("substringof").unwrap(), BinaryOperator::Contains);
        assert!(BinaryOperator::parse("like").is_err());
        assert_eq!(BooleanOperator::parse("&&").unwrap(), BooleanOperator::And);
        assert_eq!(QuantifierOperator::parse("some").unwrap(), QuantifierOperator::Any);
    }

    #[test]
    fn test_odata_mapping_has_one_override() {
        assert_eq!(odata_operator("contains"), "substringof");
        for key in ["eq", "ne", "gt", "ge", "lt", "le", "and", "or", "not", "any", "all", "startswith", "endswith"] {
            assert_eq!(odata_operator(key), key);
        }
    }
}
