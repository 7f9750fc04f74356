//! Boundary with the remote service.
//!
//! The cache never performs I/O itself. It builds [`RequestDescriptor`]s,
//! hands them to an injected [`Transport`] and reads the responses back
//! through a [`JsonResultsAdapter`].

mod data_service;
mod results;
mod transport;

pub use data_service::DataService;
pub use results::{ExtractedResults, JsonResultsAdapter, ODataResultsAdapter, WebApiResultsAdapter};
pub use transport::{HttpMethod, RequestDescriptor, Transport};
