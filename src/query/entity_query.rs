use super::Predicate;
use crate::core::{BreezeError, Result};
use crate::entity::MergeStrategy;
use crate::metadata::{MetadataStore, ResolvedType};

/// One `$orderby` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByClause {
    pub path: String,
    pub descending: bool,
}

impl OrderByClause {
    /// Parses `"companyName"` or `"companyName desc"`.
    fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let path = parts.next()?.to_string();
        let descending = parts
            .next()
            .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
        Some(Self { path, descending })
    }
}

/// Declarative description of a query against one resource.
///
/// Built fluently and handed to a [`crate::uri_builder::UriBuilder`]:
///
/// ```
/// use rustbreeze::query::{EntityQuery, Predicate};
///
/// let query = EntityQuery::from("Orders")
///     .filter(Predicate::create("Freight", ">", 100).unwrap())
///     .order_by("OrderDate desc")
///     .take(10);
/// assert_eq!(query.take_count(), Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    resource_name: Option<String>,
    result_type_name: Option<String>,
    predicate: Option<Predicate>,
    order_by: Vec<OrderByClause>,
    skip: Option<usize>,
    take: Option<usize>,
    expand: Vec<String>,
    select: Vec<String>,
    inline_count: bool,
    parameters: Vec<(String, String)>,
    merge_strategy: Option<MergeStrategy>,
}

impl EntityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: Some(resource_name.into()),
            ..Self::default()
        }
    }

    /// Sets the entity type results are materialized as, overriding the
    /// type mapped to the resource name.
    pub fn to_type(mut self, type_name: impl Into<String>) -> Self {
        self.result_type_name = Some(type_name.into());
        self
    }

    /// Adds a predicate; repeated calls are and-ed together.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and_also(predicate),
            None => predicate,
        });
        self
    }

    /// Appends comma-separated ordering terms such as `"country, city desc"`.
    pub fn order_by(mut self, terms: &str) -> Self {
        self.order_by
            .extend(terms.split(',').filter_map(OrderByClause::parse));
        self
    }

    pub fn order_by_desc(mut self, path: &str) -> Self {
        self.order_by.push(OrderByClause {
            path: path.trim().to_string(),
            descending: true,
        });
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.skip = Some(count);
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.take = Some(count);
        self
    }

    /// Alias of [`EntityQuery::take`].
    pub fn top(self, count: usize) -> Self {
        self.take(count)
    }

    pub fn expand(mut self, paths: &str) -> Self {
        self.expand.extend(split_paths(paths));
        self
    }

    pub fn select(mut self, paths: &str) -> Self {
        self.select.extend(split_paths(paths));
        self
    }

    pub fn inline_count(mut self, enabled: bool) -> Self {
        self.inline_count = enabled;
        self
    }

    /// Adds a custom query-string parameter passed through to the server.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn using(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = Some(strategy);
        self
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    pub fn result_type_name(&self) -> Option<&str> {
        self.result_type_name.as_deref()
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn order_by_clauses(&self) -> &[OrderByClause] {
        &self.order_by
    }

    pub fn skip_count(&self) -> Option<usize> {
        self.skip
    }

    pub fn take_count(&self) -> Option<usize> {
        self.take
    }

    pub fn expand_paths(&self) -> &[String] {
        &self.expand
    }

    pub fn select_paths(&self) -> &[String] {
        &self.select
    }

    pub fn is_inline_count(&self) -> bool {
        self.inline_count
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    pub fn merge_strategy(&self) -> Option<MergeStrategy> {
        self.merge_strategy
    }

    /// Resolves the type paths are validated against.
    ///
    /// An explicit result type must exist; an unmapped resource yields the
    /// anonymous type so untyped projections still build.
    pub fn resolve_type(&self, metadata: &MetadataStore) -> Result<ResolvedType> {
        if let Some(type_name) = &self.result_type_name {
            return metadata.get_entity_type(type_name).map(ResolvedType::Entity);
        }
        Ok(self
            .resource_name
            .as_deref()
            .and_then(|resource| metadata.entity_type_for_resource(resource))
            .map(ResolvedType::Entity)
            .unwrap_or(ResolvedType::Anonymous))
    }

    /// The resource to query, falling back to the result type's default resource.
    pub fn resolve_resource_name(&self, metadata: &MetadataStore) -> Result<String> {
        if let Some(resource) = &self.resource_name {
            return Ok(resource.clone());
        }
        self.result_type_name
            .as_deref()
            .and_then(|name| metadata.find_entity_type(name))
            .and_then(|ty| ty.default_resource_name().map(str::to_string))
            .ok_or_else(|| BreezeError::InvalidQuery("query has no resource name".to_string()))
    }
}

fn split_paths(paths: &str) -> impl Iterator<Item = String> + '_ {
    paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}
