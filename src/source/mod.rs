//! Collaborators that talk to the remote catalog
//!
//! The orchestrator and the download pipeline only see the traits in
//! [`traits`]; the HTTP implementations live alongside them.

mod http;
mod listing;
mod traits;

pub use http::{build_http_client, HttpBlobFetcher};
pub use listing::{
    extract_documents, extract_record_links, HttpPageLister, HttpRecordProcessor, UNKNOWN_NAME,
};
pub use traits::{BlobFetcher, FoundItem, PageLister, RecordProcessor};
