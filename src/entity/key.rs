use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::{BreezeError, Result, Value};
use crate::metadata::EntityType;

/// Separates the values of a composite key in its canonical string form.
pub const KEY_DELIMITER: &str = ":::";

/// Identity of one entity instance: its type plus its ordered key values.
#[derive(Debug, Clone)]
pub struct EntityKey {
    type_name: String,
    values: Vec<Value>,
}

impl EntityKey {
    /// Builds a key, normalizing each value through its key property's data type.
    pub fn new(entity_type: &EntityType, values: Vec<Value>) -> Result<Self> {
        let key_props = entity_type.key_properties();
        if key_props.len() != values.len() {
            return Err(BreezeError::MissingKey(format!(
                "'{}' has {} key properties but {} values were supplied",
                entity_type.name(),
                key_props.len(),
                values.len()
            )));
        }

        let values = key_props
            .iter()
            .zip(values)
            .map(|(prop, value)| prop.data_type.parse(value))
            .collect();

        Ok(Self {
            type_name: entity_type.name().to_string(),
            values,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Canonical string used to index the key inside its entity group.
    pub fn key_in_group(&self) -> String {
        self.values
            .iter()
            .map(Value::key_string)
            .collect::<Vec<_>>()
            .join(KEY_DELIMITER)
    }

    /// True when no key value is null.
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| !v.is_null())
    }
}

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.key_in_group() == other.key_in_group()
    }
}

impl Eq for EntityKey {}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.key_in_group().hash(state);
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:({})", self.type_name, self.key_in_group())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::metadata::DataProperty;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn detail_type() -> EntityType {
        EntityType::builder("OrderDetail")
            .data_property(DataProperty::new("orderID", DataType::Int32).key())
            .data_property(DataProperty::new("productID", DataType::Int32).key())
            .build()
            .unwrap()
    }

    #[test]
    fn test_composite_key_string() {
        let key = EntityKey::new(&detail_type(), vec![10.into(), 3.into()]).unwrap();
        assert_eq!(key.key_in_group(), "10:::3");
        assert_eq!(key.to_string(), "OrderDetail:(10:::3)");
    }

    #[test]
    fn test_values_are_normalized() {
        let ty = detail_type();
        let a = EntityKey::new(&ty, vec!["10".into(), 3.into()]).unwrap();
        let b = EntityKey::new(&ty, vec![10.into(), 3.into()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_date_keys_compare_by_epoch() {
        let ty = EntityType::builder("Reading")
            .data_property(DataProperty::new("takenAt", DataType::DateTime).key())
            .build()
            .unwrap();
        let utc = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let shifted = utc.with_timezone(&FixedOffset::west_opt(5 * 3600).unwrap());
        let a = EntityKey::new(&ty, vec![utc.into()]).unwrap();
        let b = EntityKey::new(&ty, vec![shifted.into()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_arity() {
        assert!(EntityKey::new(&detail_type(), vec![1.into()]).is_err());
    }
}
