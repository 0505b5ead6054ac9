//! HTTP plumbing shared by the listing, record and blob collaborators

use crate::config::UserAgentConfig;
use crate::source::BlobFetcher;
use crate::Fault;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout_secs` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use catalog_harvester::config::UserAgentConfig;
/// use catalog_harvester::source::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "CatalogHarvester".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, 30).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// GETs a page body as text, mapping every failure to a [`Fault`]
pub(crate) async fn fetch_text(client: &Client, url: &str) -> Result<String, Fault> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Fault::transient(format!("HTTP {} from {}", status.as_u16(), url)));
    }
    Ok(response.text().await?)
}

/// Downloads attachments over plain HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpBlobFetcher {
    client: Client,
}

impl HttpBlobFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobFetcher for HttpBlobFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, Fault> {
        let response = self.client.get(locator).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Fault::transient(format!(
                "HTTP {} from {}",
                status.as_u16(),
                locator
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
