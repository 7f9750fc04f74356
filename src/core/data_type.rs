//! Scalar data type registry.
//!
//! Every entity property carries one of a closed set of `DataType` symbols.
//! A symbol knows its default value, how to leniently coerce raw values coming
//! off the wire, how to render a value as an OData filter literal and how to
//! mint temporary client-side key values.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{BreezeError, KeyGenerator, Result, Value};

lazy_static! {
    static ref ISO_DURATION: Regex = Regex::new(
        r"^-?P(?:\d+Y)?(?:\d+M)?(?:\d+W)?(?:\d+D)?(?:T(?:\d+H)?(?:\d+M)?(?:\d+(?:\.\d+)?S)?)?$"
    )
    .unwrap();
}

/// Returns true if `text` is a well-formed ISO-8601 duration such as `PT4H30M`.
pub fn is_iso_duration(text: &str) -> bool {
    ISO_DURATION.is_match(text) && !text.ends_with('P') && !text.ends_with('T')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Int16,
    Int32,
    Int64,
    Byte,
    Decimal,
    Double,
    Single,
    DateTime,
    DateTimeOffset,
    Time,
    Boolean,
    Guid,
    Binary,
    Undefined,
}

impl DataType {
    pub const ALL: [DataType; 15] = [
        Self::String,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Byte,
        Self::Decimal,
        Self::Double,
        Self::Single,
        Self::DateTime,
        Self::DateTimeOffset,
        Self::Time,
        Self::Boolean,
        Self::Guid,
        Self::Binary,
        Self::Undefined,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Byte => "Byte",
            Self::Decimal => "Decimal",
            Self::Double => "Double",
            Self::Single => "Single",
            Self::DateTime => "DateTime",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::Time => "Time",
            Self::Boolean => "Boolean",
            Self::Guid => "Guid",
            Self::Binary => "Binary",
            Self::Undefined => "Undefined",
        }
    }

    /// Looks a symbol up by name, accepting the `Edm.` prefix used by server schemas.
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = name.strip_prefix("Edm.").unwrap_or(name);
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.name().eq_ignore_ascii_case(bare))
    }

    /// Infers the data type of an untyped value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Boolean(_) => Self::Boolean,
            Value::Integer(_) => Self::Int32,
            Value::Float(_) => Self::Double,
            Value::Text(_) => Self::String,
            Value::DateTime(_) => Self::DateTime,
            Value::DateTimeOffset(_) => Self::DateTimeOffset,
            Value::Duration(_) => Self::Time,
            Value::Guid(_) => Self::Guid,
            Value::Binary(_) => Self::Binary,
            Value::Null | Value::List(_) => Self::Undefined,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Int64 | Self::Byte)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Decimal | Self::Double | Self::Single)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::DateTime | Self::DateTimeOffset)
    }

    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::Text(String::new()),
            Self::Int16 | Self::Int32 | Self::Int64 | Self::Byte => Value::Integer(0),
            Self::Decimal | Self::Double | Self::Single => Value::Float(0.0),
            Self::DateTime => Value::DateTime(min_date()),
            Self::DateTimeOffset => Value::DateTimeOffset(min_date().fixed_offset()),
            Self::Time => Value::Duration("PT0S".to_string()),
            Self::Boolean => Value::Boolean(false),
            Self::Guid => Value::Guid(Uuid::nil()),
            Self::Binary | Self::Undefined => Value::Null,
        }
    }

    /// Best-effort coercion of a raw value into this type.
    ///
    /// The source kind is the variant of `raw`. Coercion never fails: a value
    /// that cannot be converted is handed back unchanged so that a later
    /// validation pass can report it.
    pub fn parse(&self, raw: Value) -> Value {
        if raw.is_null() {
            return raw;
        }
        match self {
            Self::String => match raw {
                Value::Text(_) => raw,
                Value::List(_) => raw,
                other => Value::Text(other.to_string()),
            },
            Self::Int16 | Self::Int32 | Self::Int64 | Self::Byte => match &raw {
                Value::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .unwrap_or(raw),
                Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Value::Integer(*f as i64),
                _ => raw,
            },
            Self::Decimal | Self::Double | Self::Single => match &raw {
                Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(raw),
                Value::Integer(i) => Value::Float(*i as f64),
                _ => raw,
            },
            Self::Boolean => match &raw {
                Value::Text(s) if s.eq_ignore_ascii_case("true") => Value::Boolean(true),
                Value::Text(s) if s.eq_ignore_ascii_case("false") => Value::Boolean(false),
                _ => raw,
            },
            Self::DateTime => match &raw {
                Value::Text(s) => parse_date_time(s).map(Value::DateTime).unwrap_or(raw),
                Value::Integer(ms) => Utc
                    .timestamp_millis_opt(*ms)
                    .single()
                    .map(Value::DateTime)
                    .unwrap_or(raw),
                Value::DateTimeOffset(dt) => Value::DateTime(dt.with_timezone(&Utc)),
                _ => raw,
            },
            Self::DateTimeOffset => match &raw {
                Value::Text(s) => DateTime::parse_from_rfc3339(s)
                    .map(Value::DateTimeOffset)
                    .or_else(|_| parse_date_time(s).map(|dt| Value::DateTimeOffset(dt.fixed_offset())).ok_or(()))
                    .unwrap_or(raw),
                Value::DateTime(dt) => Value::DateTimeOffset(dt.fixed_offset()),
                _ => raw,
            },
            Self::Time => match &raw {
                Value::Text(s) if is_iso_duration(s) => Value::Duration(s.clone()),
                _ => raw,
            },
            Self::Guid => match &raw {
                Value::Text(s) => Uuid::parse_str(s).map(Value::Guid).unwrap_or(raw),
                _ => raw,
            },
            Self::Binary => match raw {
                Value::Text(s) => Value::Binary(s),
                other => other,
            },
            Self::Undefined => raw,
        }
    }

    /// Strict counterpart of [`DataType::parse`] used when constructing
    /// literals and assigning properties: a value that does not coerce is an error.
    pub fn validate_value(&self, raw: Value) -> Result<Value> {
        let parsed = self.parse(raw);
        let ok = match (&parsed, self) {
            (Value::Null, _) | (_, Self::Undefined) => true,
            (Value::Text(_), Self::String) => true,
            (Value::Integer(_), dt) if dt.is_numeric() => true,
            (Value::Float(_), dt) if dt.is_float() => true,
            (Value::Boolean(_), Self::Boolean) => true,
            (Value::DateTime(_), Self::DateTime) => true,
            (Value::DateTimeOffset(_), Self::DateTimeOffset) => true,
            (Value::Duration(_), Self::Time) => true,
            (Value::Guid(_), Self::Guid) => true,
            (Value::Binary(_), Self::Binary) => true,
            _ => false,
        };
        if ok {
            Ok(parsed)
        } else {
            Err(BreezeError::InvalidValue(format!(
                "'{}' is not a valid {} value",
                parsed,
                self.name()
            )))
        }
    }

    /// Renders a value as an OData filter literal.
    pub fn fmt_odata(&self, value: &Value) -> Result<String> {
        if value.is_null() {
            return Ok("null".to_string());
        }
        if let Value::List(_) = value {
            return Err(BreezeError::InvalidValue(format!(
                "A list cannot be formatted as a single {} literal",
                self.name()
            )));
        }

        let data_type = match self {
            Self::Undefined => Self::from_value(value),
            dt => *dt,
        };
        let value = data_type.validate_value(value.clone())?;

        let literal = match data_type {
            Self::String => format!("'{}'", value.to_string().replace('\'', "''")),
            Self::Int16 | Self::Int32 | Self::Byte => value.to_string(),
            Self::Int64 => format!("{}L", value),
            Self::Decimal => format!("{}m", value),
            Self::Double => format!("{}d", value),
            Self::Single => format!("{}f", value),
            Self::DateTime => format!("datetime'{}'", value),
            Self::DateTimeOffset => format!("datetimeoffset'{}'", value),
            Self::Time => format!("time'{}'", value),
            Self::Guid => format!("guid'{}'", value),
            Self::Binary => format!("binary'{}'", value),
            Self::Boolean => value.to_string(),
            Self::Undefined => value.to_string(),
        };
        Ok(literal)
    }

    /// Renders a value for a JSON query document.
    pub fn fmt_json(&self, value: &Value) -> JsonValue {
        let value = self.parse(value.clone());
        match value {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(b),
            Value::Integer(i) => JsonValue::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::List(items) => {
                JsonValue::Array(items.iter().map(|item| self.fmt_json(item)).collect())
            }
            other => JsonValue::String(other.to_string()),
        }
    }

    /// Produces the next temporary key value for a property of this type, if
    /// the type supports client-side key generation.
    pub fn next_key_value(&self, generator: &mut KeyGenerator) -> Option<Value> {
        match self {
            dt if dt.is_numeric() => Some(Value::Integer(generator.next_number())),
            Self::String => Some(Value::Text(Uuid::new_v4().to_string())),
            Self::Guid => Some(Value::Guid(Uuid::new_v4())),
            Self::DateTime => Some(Value::DateTime(generator.next_instant())),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn min_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_default()
}

/// Accepts RFC-3339 text as well as offset-less ISO text, which is read as UTC.
fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_edm_prefix() {
        assert_eq!(DataType::from_name("Edm.Int32"), Some(DataType::Int32));
        assert_eq!(DataType::from_name("datetimeoffset"), Some(DataType::DateTimeOffset));
        assert_eq!(DataType::from_name("Edm.Geography"), None);
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(DataType::Int32.parse("42".into()), Value::Integer(42));
        assert_eq!(DataType::Int32.parse("abc".into()), Value::Text("abc".into()));
        assert_eq!(DataType::Double.parse(Value::Integer(2)), Value::Float(2.0));
        assert_eq!(DataType::Boolean.parse("TRUE".into()), Value::Boolean(true));
        assert_eq!(DataType::String.parse(Value::Integer(7)), Value::Text("7".into()));
        assert_eq!(DataType::Guid.parse("not-a-guid".into()), Value::Text("not-a-guid".into()));
    }

    #[test]
    fn test_parse_dates() {
        let parsed = DataType::DateTime.parse("2024-05-01T12:00:00".into());
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parsed, Value::DateTime(expected));

        let from_millis = DataType::DateTime.parse(Value::Integer(expected.timestamp_millis()));
        assert_eq!(from_millis, Value::DateTime(expected));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(DataType::Guid.validate_value("xyz".into()).is_err());
        assert!(DataType::Time.validate_value("4 hours".into()).is_err());
        assert!(DataType::Time.validate_value("PT4H".into()).is_ok());
        assert!(DataType::Int32.validate_value(Value::Null).is_ok());
    }

    #[test]
    fn test_iso_duration() {
        assert!(is_iso_duration("PT4H30M"));
        assert!(is_iso_duration("P1DT2.5S"));
        assert!(!is_iso_duration("P"));
        assert!(!is_iso_duration("PT"));
        assert!(!is_iso_duration("4H"));
    }

    #[test]
    fn test_fmt_odata_literals() {
        assert_eq!(DataType::String.fmt_odata(&"O'Brien".into()).unwrap(), "'O''Brien'");
        assert_eq!(DataType::Int32.fmt_odata(&Value::Integer(100)).unwrap(), "100");
        assert_eq!(DataType::Int64.fmt_odata(&Value::Integer(5)).unwrap(), "5L");
        assert_eq!(DataType::Decimal.fmt_odata(&Value::Integer(100)).unwrap(), "100m");
        assert_eq!(DataType::Double.fmt_odata(&Value::Float(1.5)).unwrap(), "1.5d");
        assert_eq!(DataType::Single.fmt_odata(&Value::Float(2.25)).unwrap(), "2.25f");
        assert_eq!(DataType::Boolean.fmt_odata(&"true".into()).unwrap(), "true");
        assert_eq!(DataType::Time.fmt_odata(&"PT1H".into()).unwrap(), "time'PT1H'");
        assert_eq!(DataType::Binary.fmt_odata(&"AAEC".into()).unwrap(), "binary'AAEC'");
        assert_eq!(DataType::Undefined.fmt_odata(&Value::Null).unwrap(), "null");

        let guid = "0f8fad5b-d9cb-469f-a165-70867728950e";
        assert_eq!(
            DataType::Guid.fmt_odata(&guid.into()).unwrap(),
            format!("guid'{}'", guid)
        );

        let dt = Utc.with_ymd_and_hms(1998, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            DataType::DateTime.fmt_odata(&Value::DateTime(dt)).unwrap(),
            "datetime'1998-03-01T00:00:00.000Z'"
        );
    }

    #[test]
    fn test_fmt_odata_rejects_invalid_guid() {
        let err = DataType::Guid.fmt_odata(&"nope".into()).unwrap_err();
        assert!(matches!(err, BreezeError::InvalidValue(_)));
    }

    #[test]
    fn test_next_key_value() {
        let mut generator = KeyGenerator::new();
        assert_eq!(DataType::Int32.next_key_value(&mut generator), Some(Value::Integer(-1)));
        assert_eq!(DataType::Int64.next_key_value(&mut generator), Some(Value::Integer(-2)));
        assert!(matches!(DataType::Guid.next_key_value(&mut generator), Some(Value::Guid(_))));
        assert_eq!(DataType::Boolean.next_key_value(&mut generator), None);
    }
}
