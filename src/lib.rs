// ============================================================================
// RustBreeze Library
// ============================================================================
//
// Client-side entity cache with change tracking, plus translation of
// declarative queries into OData or JSON query requests.

pub mod adapter;
pub mod core;
pub mod entity;
pub mod manager;
pub mod metadata;
pub mod query;
pub mod uri_builder;

// Re-export main types for convenience
pub use self::core::{BreezeError, DataType, KeyGenerator, Result, Value};
pub use entity::{Entity, EntityGroup, EntityKey, EntityRef, EntityState, MergeStrategy};
pub use manager::{EntityManager, KeyMapping, ManagerConfig, QueryResult, SaveResult};
pub use metadata::{
    DataProperty, EntityType, MetadataStore, NamingConvention, NavigationProperty, ResolvedType,
};
pub use query::{EntityQuery, Expr, Predicate, PredicateVisitor};
pub use uri_builder::{UriBuilder, UriBuilderRegistry};

// ============================================================================
// Quick start
// ============================================================================

/// Builds the OData wire path for a query against an empty metadata store.
///
/// Useful for untyped queries and quick experiments; typed queries go through
/// [`EntityManager::build_query_uri`].
///
/// # Examples
///
/// ```
/// use rustbreeze::{EntityQuery, Predicate};
///
/// # fn main() -> rustbreeze::Result<()> {
/// let query = EntityQuery::from("Customers")
///     .filter(Predicate::create("CompanyName", "startsWith", "Al")?)
///     .take(5);
/// assert_eq!(
///     rustbreeze::odata_uri(&query)?,
///     "Customers?$filter=startswith(CompanyName%2C'Al')%20eq%20true&$top=5"
/// );
/// # Ok(())
/// # }
/// ```
pub fn odata_uri(query: &EntityQuery) -> Result<String> {
    uri_builder::ODataUriBuilder.build_uri(query, &MetadataStore::new())
}
