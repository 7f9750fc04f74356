//! Entity type metadata consumed by the cache and the query translators.
//!
//! Parsing server schema documents is out of scope; types are declared with
//! [`EntityType::builder`] and registered in a [`MetadataStore`].

mod entity_type;
mod naming;
mod store;

pub use entity_type::{DataProperty, EntityType, EntityTypeBuilder, NavigationProperty, PropertyList};
pub use naming::NamingConvention;
pub use store::{MetadataStore, ResolvedPath, ResolvedType};
