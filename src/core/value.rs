use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use uuid::Uuid;

/// A property value held by an entity or carried by a literal expression.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    /// ISO-8601 duration text, e.g. `PT4H30M`
    Duration(String),
    Guid(Uuid),
    Binary(String),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Text(_) => "Text",
            Self::DateTime(_) => "DateTime",
            Self::DateTimeOffset(_) => "DateTimeOffset",
            Self::Duration(_) => "Duration",
            Self::Guid(_) => "Guid",
            Self::Binary(_) => "Binary",
            Self::List(_) => "List",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Duration(s) | Self::Binary(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Canonical text used when this value participates in an entity key.
    ///
    /// Dates collapse to epoch milliseconds so that the same instant expressed
    /// with different offsets produces the same identity.
    pub fn key_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::DateTime(dt) => dt.timestamp_millis().to_string(),
            Self::DateTimeOffset(dt) => dt.timestamp_millis().to_string(),
            Self::Guid(g) => g.hyphenated().to_string(),
            Self::List(items) => items
                .iter()
                .map(Value::key_string)
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }
    }

    fn epoch_millis(&self) -> Option<i64> {
        match self {
            Self::DateTime(dt) => Some(dt.timestamp_millis()),
            Self::DateTimeOffset(dt) => Some(dt.timestamp_millis()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => float_bits(*a) == float_bits(*b),
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                float_bits(*i as f64) == float_bits(*f) && *f as i64 == *i
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Duration(a), Self::Duration(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::Guid(a), Self::Guid(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (a, b) => match (a.epoch_millis(), b.epoch_millis()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

/// Bit pattern floats are compared and hashed by: `-0.0` folds into `0.0`
/// and every NaN into one canonical NaN.
fn float_bits(f: f64) -> u64 {
    if f == 0.0 {
        0.0f64.to_bits()
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            // Integers and floats compare equal across variants, so they hash alike.
            Self::Integer(i) => {
                2u8.hash(state);
                float_bits(*i as f64).hash(state);
            }
            Self::Float(f) => {
                2u8.hash(state);
                float_bits(*f).hash(state);
            }
            Self::DateTime(_) | Self::DateTimeOffset(_) => {
                3u8.hash(state);
                self.epoch_millis().hash(state);
            }
            Self::Text(s) | Self::Duration(s) | Self::Binary(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Self::Guid(g) => {
                5u8.hash(state);
                g.hash(state);
            }
            Self::List(items) => {
                6u8.hash(state);
                items.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) | Self::Duration(s) | Self::Binary(s) => write!(f, "{}", s),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::DateTimeOffset(dt) => {
                write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, false))
            }
            Self::Guid(g) => write!(f, "{}", g.hyphenated()),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    /// Raw wire value; typed coercion happens later through `DataType::parse`.
    fn from(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            Json::Object(_) => Value::Text(json.to_string()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Self::Guid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(dt)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_eq!(Value::Integer(3), Value::Float(3.0));
        assert_ne!(Value::Text("1".into()), Value::Integer(1));
    }

    #[test]
    fn test_equal_values_hash_alike() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(value: &Value) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        }

        let close = 0.1 + 0.2;
        assert_ne!(Value::Float(close), Value::Float(0.3));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(hash_of(&Value::Float(0.0)), hash_of(&Value::Float(-0.0)));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(hash_of(&Value::Integer(7)), hash_of(&Value::Float(7.0)));

        // Past 2^53 an integer and its nearest float are different values
        let big = (1_i64 << 53) + 1;
        assert_ne!(Value::Integer(big), Value::Float(big as f64));
    }

    #[test]
    fn test_dates_compare_by_instant() {
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let offset = utc.with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(Value::DateTime(utc), Value::DateTimeOffset(offset));
        assert_eq!(
            Value::DateTime(utc).key_string(),
            Value::DateTimeOffset(offset).key_string()
        );
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!([1, 2.5, "x", null, true]);
        assert_eq!(
            Value::from(&json),
            Value::List(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::Text("x".into()),
                Value::Null,
                Value::Boolean(true),
            ])
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }
}
