use super::{UriBuilder, encode_uri_component};
use crate::core::Result;
use crate::metadata::MetadataStore;
use crate::query::{EntityQuery, ODataVisitor, VisitContext};

/// Builds OData v3 style query strings (`$filter`, `$orderby`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct ODataUriBuilder;

impl UriBuilder for ODataUriBuilder {
    fn name(&self) -> &'static str {
        "odata"
    }

    fn build_uri(&self, query: &EntityQuery, metadata: &MetadataStore) -> Result<String> {
        let entity_type = query.resolve_type(metadata)?;
        let resource = query.resolve_resource_name(metadata)?;
        let ctx = VisitContext::new(metadata, entity_type.clone());

        let mut options: Vec<(String, String)> = Vec::new();

        if let Some(predicate) = query.predicate() {
            let filter = predicate.visit(&ctx, &ODataVisitor)?;
            if !filter.is_empty() {
                options.push(("$filter".into(), filter));
            }
        }

        if !query.order_by_clauses().is_empty() {
            let terms = query
                .order_by_clauses()
                .iter()
                .map(|clause| {
                    let path = metadata.client_path_to_server(&entity_type, &clause.path, "/")?;
                    Ok(if clause.descending {
                        format!("{} desc", path)
                    } else {
                        path
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            options.push(("$orderby".into(), terms.join(",")));
        }

        if let Some(skip) = query.skip_count() {
            options.push(("$skip".into(), skip.to_string()));
        }
        if let Some(take) = query.take_count() {
            options.push(("$top".into(), take.to_string()));
        }

        for (name, paths) in [
            ("$expand", query.expand_paths()),
            ("$select", query.select_paths()),
        ] {
            if paths.is_empty() {
                continue;
            }
            let resolved = paths
                .iter()
                .map(|p| metadata.client_path_to_server(&entity_type, p, "/"))
                .collect::<Result<Vec<_>>>()?;
            options.push((name.into(), resolved.join(",")));
        }

        if query.is_inline_count() {
            options.push(("$inlinecount".into(), "allpages".into()));
        }

        options.extend(query.parameters().iter().cloned());

        if options.is_empty() {
            return Ok(resource);
        }
        let query_string = options
            .iter()
            .map(|(name, value)| format!("{}={}", name, encode_uri_component(value)))
            .collect::<Vec<_>>()
            .join("&");
        Ok(format!("{}?{}", resource, query_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;

    #[test]
    fn test_untyped_query() {
        let query = EntityQuery::from("Orders")
            .filter(Predicate::create("Freight", ">", 100).unwrap())
            .order_by("OrderDate desc")
            .skip(20)
            .take(10)
            .inline_count(true);
        let uri = ODataUriBuilder.build_uri(&query, &MetadataStore::new()).unwrap();
        assert_eq!(
            uri,
            "Orders?$filter=Freight%20gt%20100&$orderby=OrderDate%20desc&$skip=20&$top=10&$inlinecount=allpages"
        );
    }

    #[test]
    fn test_no_options_means_no_question_mark() {
        let uri = ODataUriBuilder
            .build_uri(&EntityQuery::from("Customers"), &MetadataStore::new())
            .unwrap();
        assert_eq!(uri, "Customers");
    }

    #[test]
    fn test_zero_skip_is_emitted() {
        let uri = ODataUriBuilder
            .build_uri(&EntityQuery::from("Customers").skip(0), &MetadataStore::new())
            .unwrap();
        assert_eq!(uri, "Customers?$skip=0");
    }

    #[test]
    fn test_custom_parameters() {
        let query = EntityQuery::from("CustomersInCountry").with_parameter("country", "New Zealand");
        let uri = ODataUriBuilder.build_uri(&query, &MetadataStore::new()).unwrap();
        assert_eq!(uri, "CustomersInCountry?country=New%20Zealand");
    }
}
