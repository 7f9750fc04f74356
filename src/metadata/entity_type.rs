use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::{BreezeError, DataType, Result, Value};

#[derive(Debug, Clone)]
pub struct DataProperty {
    pub name: String,
    /// Server-side name; filled in from the naming convention when the type is registered
    pub name_on_server: Option<String>,
    pub data_type: DataType,
    pub is_part_of_key: bool,
    pub is_nullable: bool,
    pub default_value: Option<Value>,
}

impl DataProperty {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            name_on_server: None,
            data_type,
            is_part_of_key: false,
            is_nullable: true,
            default_value: None,
        }
    }

    pub fn key(mut self) -> Self {
        self.is_part_of_key = true;
        self.is_nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.name_on_server = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Value a freshly created entity starts with for this property.
    pub fn initial_value(&self) -> Value {
        match &self.default_value {
            Some(value) => value.clone(),
            None if self.is_nullable || self.is_part_of_key => Value::Null,
            None => self.data_type.default_value(),
        }
    }

    pub fn wire_name(&self) -> &str {
        self.name_on_server.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationProperty {
    pub name: String,
    pub name_on_server: Option<String>,
    /// Name of the related entity type
    pub entity_type_name: String,
    pub is_scalar: bool,
    /// Foreign-key properties on the owning type (scalar navigations)
    pub foreign_key_names: Vec<String>,
    /// Foreign-key properties on the related type (collection navigations)
    pub inverse_foreign_key_names: Vec<String>,
}

impl NavigationProperty {
    pub fn scalar(name: impl Into<String>, entity_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_on_server: None,
            entity_type_name: entity_type_name.into(),
            is_scalar: true,
            foreign_key_names: Vec::new(),
            inverse_foreign_key_names: Vec::new(),
        }
    }

    pub fn collection(name: impl Into<String>, entity_type_name: impl Into<String>) -> Self {
        Self {
            is_scalar: false,
            ..Self::scalar(name, entity_type_name)
        }
    }

    pub fn foreign_keys<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.foreign_key_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn inverse_foreign_keys<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inverse_foreign_key_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.name_on_server = Some(name.into());
        self
    }

    pub fn wire_name(&self) -> &str {
        self.name_on_server.as_deref().unwrap_or(&self.name)
    }
}

/// Ordered data and navigation property lists.
///
/// Shared by value between structural types that need property lookup
/// without being entity types themselves.
#[derive(Debug, Clone, Default)]
pub struct PropertyList {
    pub data_properties: Vec<DataProperty>,
    pub navigation_properties: Vec<NavigationProperty>,
}

impl PropertyList {
    pub fn data_property(&self, name: &str) -> Option<&DataProperty> {
        self.data_properties.iter().find(|p| p.name == name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data_property(name).is_some() || self.navigation_property(name).is_some()
    }
}

#[derive(Debug)]
pub struct EntityType {
    name: String,
    namespace: Option<String>,
    default_resource_name: Option<String>,
    is_abstract: bool,
    properties: PropertyList,
    frozen: AtomicBool,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            namespace: None,
            default_resource_name: None,
            is_abstract: false,
            properties: PropertyList::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `Name:#Namespace` when a namespace is known, otherwise the short name.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:#{}", self.name, ns),
            None => self.name.clone(),
        }
    }

    pub fn default_resource_name(&self) -> Option<&str> {
        self.default_resource_name.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn properties(&self) -> &PropertyList {
        &self.properties
    }

    pub fn data_properties(&self) -> &[DataProperty] {
        &self.properties.data_properties
    }

    pub fn navigation_properties(&self) -> &[NavigationProperty] {
        &self.properties.navigation_properties
    }

    pub fn data_property(&self, name: &str) -> Option<&DataProperty> {
        self.properties.data_property(name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.properties.navigation_property(name)
    }

    /// Key properties in declaration order.
    pub fn key_properties(&self) -> Vec<&DataProperty> {
        self.properties
            .data_properties
            .iter()
            .filter(|p| p.is_part_of_key)
            .collect()
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns a copy of this type with one more data property.
    ///
    /// Fails once any instance of the type has been created or attached.
    pub fn with_data_property(&self, property: DataProperty) -> Result<EntityType> {
        if self.is_frozen() {
            return Err(BreezeError::TypeFrozen(self.name.clone()));
        }
        if self.properties.contains(&property.name) {
            return Err(BreezeError::InvalidValue(format!(
                "Property '{}' already defined on '{}'",
                property.name, self.name
            )));
        }
        let mut properties = self.properties.clone();
        properties.data_properties.push(property);
        Ok(EntityType {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            default_resource_name: self.default_resource_name.clone(),
            is_abstract: self.is_abstract,
            properties,
            frozen: AtomicBool::new(false),
        })
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertyList {
        &mut self.properties
    }
}

pub struct EntityTypeBuilder {
    name: String,
    namespace: Option<String>,
    default_resource_name: Option<String>,
    is_abstract: bool,
    properties: PropertyList,
}

impl EntityTypeBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn resource_name(mut self, resource: impl Into<String>) -> Self {
        self.default_resource_name = Some(resource.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn data_property(mut self, property: DataProperty) -> Self {
        self.properties.data_properties.push(property);
        self
    }

    pub fn navigation_property(mut self, property: NavigationProperty) -> Self {
        self.properties.navigation_properties.push(property);
        self
    }

    pub fn build(self) -> Result<EntityType> {
        let mut seen = std::collections::HashSet::new();
        let names = self
            .properties
            .data_properties
            .iter()
            .map(|p| &p.name)
            .chain(self.properties.navigation_properties.iter().map(|p| &p.name));
        for name in names {
            if !seen.insert(name) {
                return Err(BreezeError::InvalidValue(format!(
                    "Property '{}' defined twice on '{}'",
                    name, self.name
                )));
            }
        }

        if !self.is_abstract && !self.properties.data_properties.iter().any(|p| p.is_part_of_key) {
            return Err(BreezeError::MissingKey(format!(
                "Entity type '{}' declares no key properties",
                self.name
            )));
        }

        Ok(EntityType {
            name: self.name,
            namespace: self.namespace,
            default_resource_name: self.default_resource_name,
            is_abstract: self.is_abstract,
            properties: self.properties,
            frozen: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_type() -> EntityType {
        EntityType::builder("Order")
            .namespace("Northwind")
            .data_property(DataProperty::new("orderID", DataType::Int32).key())
            .data_property(DataProperty::new("freight", DataType::Decimal))
            .navigation_property(
                NavigationProperty::scalar("customer", "Customer").foreign_keys(["customerID"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_full_name() {
        assert_eq!(order_type().full_name(), "Order:#Northwind");
    }

    #[test]
    fn test_key_properties_in_order() {
        let ty = EntityType::builder("OrderDetail")
            .data_property(DataProperty::new("orderID", DataType::Int32).key())
            .data_property(DataProperty::new("quantity", DataType::Int16))
            .data_property(DataProperty::new("productID", DataType::Int32).key())
            .build()
            .unwrap();
        let keys: Vec<&str> = ty.key_properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(keys, vec!["orderID", "productID"]);
    }

    #[test]
    fn test_build_requires_key() {
        let result = EntityType::builder("Loose")
            .data_property(DataProperty::new("name", DataType::String))
            .build();
        assert!(matches!(result, Err(BreezeError::MissingKey(_))));
    }

    #[test]
    fn test_frozen_type_rejects_new_properties() {
        let ty = order_type()
            .with_data_property(DataProperty::new("shipName", DataType::String))
            .unwrap();
        assert!(ty.data_property("shipName").is_some());
        ty.freeze();
        let err = ty
            .with_data_property(DataProperty::new("shipCity", DataType::String))
            .unwrap_err();
        assert!(matches!(err, BreezeError::TypeFrozen(_)));
    }

    #[test]
    fn test_initial_values() {
        let nullable = DataProperty::new("note", DataType::String);
        let required = DataProperty::new("qty", DataType::Int16).not_null();
        let defaulted = DataProperty::new("discount", DataType::Single).default_value(0.5);
        assert_eq!(nullable.initial_value(), Value::Null);
        assert_eq!(required.initial_value(), Value::Integer(0));
        assert_eq!(defaulted.initial_value(), Value::Float(0.5));
    }
}
