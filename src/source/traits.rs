use crate::{AttemptResult, Fault};
use async_trait::async_trait;

/// An attachment discovered on a record page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundItem {
    /// Display name as shown on the page
    pub name: String,

    /// Absolute locator of the attachment
    pub href: String,
}

impl FoundItem {
    pub fn new(name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            href: href.into(),
        }
    }
}

/// Lists the record locators on one catalog page
///
/// `Ok(None)` means the page was not ready and the attempt should be retried;
/// `Ok(Some(vec![]))` means the page is confirmed empty.
#[async_trait]
pub trait PageLister: Send + Sync {
    async fn list(&self, page: u32) -> AttemptResult<Vec<String>>;

    /// Resets whatever session state the lister keeps between attempts
    async fn refresh(&self) -> Result<(), Fault> {
        Ok(())
    }
}

/// Extracts the attachments of one record
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    async fn process(&self, locator: &str) -> AttemptResult<Vec<FoundItem>>;

    async fn refresh(&self) -> Result<(), Fault> {
        Ok(())
    }
}

/// Fetches the raw bytes behind an attachment locator
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, Fault>;
}
