use std::collections::HashMap;
use std::sync::Arc;

use super::{DataProperty, EntityType, NamingConvention};
use crate::core::{BreezeError, DataType, Result};

/// The type a query or path is resolved against.
///
/// `Anonymous` stands in for untyped and projection-only queries: it has no
/// properties, so every path segment passes through the naming convention.
#[derive(Debug, Clone)]
pub enum ResolvedType {
    Entity(Arc<EntityType>),
    Anonymous,
}

impl ResolvedType {
    pub fn name(&self) -> &str {
        match self {
            Self::Entity(ty) => ty.name(),
            Self::Anonymous => "(anonymous)",
        }
    }

    pub fn entity_type(&self) -> Option<&Arc<EntityType>> {
        match self {
            Self::Entity(ty) => Some(ty),
            Self::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Result of walking a client-side property path.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// Server-side names, one per segment
    pub server_segments: Vec<String>,
    /// Type of the final segment when it is a data property
    pub data_type: Option<DataType>,
    /// Type reached by the final segment (the related type for navigations)
    pub target: ResolvedType,
    pub is_collection: bool,
}

impl ResolvedPath {
    pub fn join(&self, delimiter: &str) -> String {
        self.server_segments.join(delimiter)
    }
}

/// Catalog of entity types known to the client.
///
/// Registered at startup and shared read-only afterwards; `with_*` methods
/// return a new store instead of mutating in place.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entity_types: Arc<HashMap<String, Arc<EntityType>>>,
    resource_names: Arc<HashMap<String, String>>,
    naming_convention: NamingConvention,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming_convention(mut self, naming_convention: NamingConvention) -> Self {
        self.naming_convention = naming_convention;
        self
    }

    pub fn naming_convention(&self) -> NamingConvention {
        self.naming_convention
    }

    /// Registers an entity type, filling in server names the type left unset.
    pub fn with_entity_type(self, mut entity_type: EntityType) -> Result<Self> {
        let name = entity_type.name().to_string();
        if self.entity_types.contains_key(&name) {
            return Err(BreezeError::EntityTypeExists(name));
        }

        let nc = self.naming_convention;
        let properties = entity_type.properties_mut();
        for dp in properties.data_properties.iter_mut() {
            if dp.name_on_server.is_none() {
                dp.name_on_server = Some(nc.client_to_server(&dp.name));
            }
        }
        for np in properties.navigation_properties.iter_mut() {
            if np.name_on_server.is_none() {
                np.name_on_server = Some(nc.client_to_server(&np.name));
            }
        }

        let mut resource_names = (*self.resource_names).clone();
        if let Some(resource) = entity_type.default_resource_name() {
            resource_names
                .entry(resource.to_string())
                .or_insert_with(|| name.clone());
        }

        let mut entity_types = (*self.entity_types).clone();
        entity_types.insert(name, Arc::new(entity_type));

        Ok(Self {
            entity_types: Arc::new(entity_types),
            resource_names: Arc::new(resource_names),
            naming_convention: self.naming_convention,
        })
    }

    /// Maps a resource name (entity set) to an entity type.
    pub fn with_resource_name(self, resource: impl Into<String>, type_name: &str) -> Result<Self> {
        let ty = self.get_entity_type(type_name)?;
        let mut resource_names = (*self.resource_names).clone();
        resource_names.insert(resource.into(), ty.name().to_string());
        Ok(Self {
            resource_names: Arc::new(resource_names),
            ..self
        })
    }

    /// Adds a data property to a registered type that has no instances yet.
    pub fn with_data_property(self, type_name: &str, mut property: DataProperty) -> Result<Self> {
        let ty = self.get_entity_type(type_name)?;
        if property.name_on_server.is_none() {
            property.name_on_server = Some(self.naming_convention.client_to_server(&property.name));
        }
        let updated = ty.with_data_property(property)?;
        let mut entity_types = (*self.entity_types).clone();
        entity_types.insert(updated.name().to_string(), Arc::new(updated));
        Ok(Self {
            entity_types: Arc::new(entity_types),
            ..self
        })
    }

    /// Finds a type by short name, by `Name:#Namespace` or by `Namespace.Name`.
    pub fn find_entity_type(&self, name: &str) -> Option<Arc<EntityType>> {
        let short = match name.split_once(":#") {
            Some((short, _)) => short,
            None => name.rsplit('.').next().unwrap_or(name),
        };
        self.entity_types.get(short).cloned()
    }

    pub fn get_entity_type(&self, name: &str) -> Result<Arc<EntityType>> {
        self.find_entity_type(name)
            .ok_or_else(|| BreezeError::EntityTypeNotFound(name.to_string()))
    }

    pub fn entity_type_for_resource(&self, resource: &str) -> Option<Arc<EntityType>> {
        self.resource_names
            .get(resource)
            .and_then(|name| self.entity_types.get(name).cloned())
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entity_types.values()
    }

    /// Walks a dotted (or slashed) client path against `ty`.
    pub fn resolve_path(&self, ty: &ResolvedType, path: &str) -> Result<ResolvedPath> {
        let segments: Vec<&str> = path.split(['.', '/']).map(str::trim).collect();

        let mut current = ty.clone();
        let mut resolved = ResolvedPath {
            server_segments: Vec::with_capacity(segments.len()),
            data_type: None,
            target: ty.clone(),
            is_collection: false,
        };

        for (i, segment) in segments.iter().enumerate() {
            let not_found = |type_name: &str| BreezeError::PropertyNotFound {
                segment: segment.to_string(),
                path: path.to_string(),
                type_name: type_name.to_string(),
            };
            if segment.is_empty() {
                return Err(not_found(current.name()));
            }

            let entity_type = match &current {
                ResolvedType::Anonymous => {
                    resolved
                        .server_segments
                        .push(self.naming_convention.client_to_server(segment));
                    continue;
                }
                ResolvedType::Entity(entity_type) => entity_type.clone(),
            };

            let is_last = i + 1 == segments.len();
            if let Some(dp) = entity_type.data_property(segment) {
                // Data properties end a path; complex types are not modelled.
                if !is_last {
                    return Err(BreezeError::PropertyNotFound {
                        segment: segments[i + 1].to_string(),
                        path: path.to_string(),
                        type_name: dp.name.clone(),
                    });
                }
                resolved.server_segments.push(dp.wire_name().to_string());
                resolved.data_type = Some(dp.data_type);
            } else if let Some(np) = entity_type.navigation_property(segment) {
                resolved.server_segments.push(np.wire_name().to_string());
                current = ResolvedType::Entity(self.get_entity_type(&np.entity_type_name)?);
                resolved.target = current.clone();
                resolved.is_collection = !np.is_scalar;
            } else {
                return Err(not_found(entity_type.name()));
            }
        }

        Ok(resolved)
    }

    pub fn client_path_to_server(
        &self,
        ty: &ResolvedType,
        path: &str,
        delimiter: &str,
    ) -> Result<String> {
        Ok(self.resolve_path(ty, path)?.join(delimiter))
    }

    /// Every `(entity type, property)` pair holding a foreign key to `type_name`.
    pub fn foreign_key_refs(&self, type_name: &str) -> Vec<(String, String)> {
        let mut refs: Vec<(String, String)> = Vec::new();
        let mut push = |ty: &str, prop: &str| {
            let pair = (ty.to_string(), prop.to_string());
            if !refs.contains(&pair) {
                refs.push(pair);
            }
        };

        for ty in self.entity_types.values() {
            for np in ty.navigation_properties() {
                if np.is_scalar && np.entity_type_name == type_name {
                    for fk in &np.foreign_key_names {
                        push(ty.name(), fk);
                    }
                }
            }
        }

        if let Some(target) = self.find_entity_type(type_name) {
            for np in target.navigation_properties() {
                for fk in &np.inverse_foreign_key_names {
                    push(&np.entity_type_name, fk);
                }
            }
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NavigationProperty;

    fn store() -> MetadataStore {
        let customer = EntityType::builder("Customer")
            .resource_name("Customers")
            .data_property(DataProperty::new("customerID", DataType::Guid).key())
            .data_property(DataProperty::new("companyName", DataType::String))
            .navigation_property(
                NavigationProperty::collection("orders", "Order").inverse_foreign_keys(["customerID"]),
            )
            .build()
            .unwrap();
        let order = EntityType::builder("Order")
            .resource_name("Orders")
            .data_property(DataProperty::new("orderID", DataType::Int32).key())
            .data_property(DataProperty::new("customerID", DataType::Guid))
            .data_property(DataProperty::new("freight", DataType::Decimal))
            .navigation_property(
                NavigationProperty::scalar("customer", "Customer").foreign_keys(["customerID"]),
            )
            .build()
            .unwrap();

        MetadataStore::new()
            .with_naming_convention(NamingConvention::CamelCase)
            .with_entity_type(customer)
            .unwrap()
            .with_entity_type(order)
            .unwrap()
    }

    #[test]
    fn test_resolve_navigation_path() {
        let store = store();
        let order = ResolvedType::Entity(store.get_entity_type("Order").unwrap());
        let path = store.resolve_path(&order, "customer.companyName").unwrap();
        assert_eq!(path.join("/"), "Customer/CompanyName");
        assert_eq!(path.data_type, Some(DataType::String));
    }

    #[test]
    fn test_collection_navigation() {
        let store = store();
        let customer = ResolvedType::Entity(store.get_entity_type("Customer").unwrap());
        let path = store.resolve_path(&customer, "orders").unwrap();
        assert!(path.is_collection);
        assert_eq!(path.target.name(), "Order");
    }

    #[test]
    fn test_unknown_segment_names_offender() {
        let store = store();
        let order = ResolvedType::Entity(store.get_entity_type("Order").unwrap());
        let err = store.resolve_path(&order, "customer.nope").unwrap_err();
        match err {
            BreezeError::PropertyNotFound { segment, type_name, .. } => {
                assert_eq!(segment, "nope");
                assert_eq!(type_name, "Customer");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_anonymous_uses_naming_convention() {
        let store = store();
        let path = store
            .client_path_to_server(&ResolvedType::Anonymous, "shipAddress.city", "/")
            .unwrap();
        assert_eq!(path, "ShipAddress/City");
    }

    #[test]
    fn test_resource_lookup_and_duplicates() {
        let store = store();
        assert_eq!(store.entity_type_for_resource("Orders").unwrap().name(), "Order");
        assert!(store.find_entity_type("Order:#Northwind").is_some());
        assert!(store.find_entity_type("Northwind.Models.Order").is_some());

        let dup = EntityType::builder("Order")
            .data_property(DataProperty::new("id", DataType::Int32).key())
            .build()
            .unwrap();
        assert!(matches!(
            store.with_entity_type(dup),
            Err(BreezeError::EntityTypeExists(_))
        ));
    }

    #[test]
    fn test_foreign_key_refs() {
        let store = store();
        let refs = store.foreign_key_refs("Customer");
        assert_eq!(refs, vec![("Order".to_string(), "customerID".to_string())]);
    }
}
