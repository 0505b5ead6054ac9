//! HTML scraping of catalog listing pages and record pages
//!
//! Both collaborators treat a missing readiness marker as "not ready yet"
//! (`Ok(None)`), so the retry loop keeps polling until the page has rendered.

use crate::config::SourceConfig;
use crate::source::http::fetch_text;
use crate::source::{FoundItem, PageLister, RecordProcessor};
use crate::{AttemptResult, ConfigError, Fault};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Name used for an attachment whose link carries no text
pub const UNKNOWN_NAME: &str = "unknown";

/// Lists record links on a paginated search page
pub struct HttpPageLister {
    client: Client,
    template: String,
    record_selector: Selector,
    ready_selector: Option<Selector>,
}

impl HttpPageLister {
    pub fn new(client: Client, config: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            template: config.listing_url.clone(),
            record_selector: parse_selector(&config.record_selector)?,
            ready_selector: config
                .listing_ready_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
        })
    }

    /// Listing URL for one page index
    pub fn page_url(&self, page: u32) -> String {
        self.template.replace("{page}", &page.to_string())
    }
}

#[async_trait]
impl PageLister for HttpPageLister {
    async fn list(&self, page: u32) -> AttemptResult<Vec<String>> {
        let url = self.page_url(page);
        let body = fetch_text(&self.client, &url).await?;

        let base = Url::parse(&url).map_err(|e| Fault::transient(e.to_string()))?;
        Ok(extract_record_links(
            &body,
            &base,
            &self.record_selector,
            self.ready_selector.as_ref(),
        ))
    }
}

/// Collects the attachments listed on a record page
pub struct HttpRecordProcessor {
    client: Client,
    ready_selector: Option<Selector>,
    document_selector: Selector,
    name_selector: Option<Selector>,
}

impl HttpRecordProcessor {
    pub fn new(client: Client, config: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            ready_selector: config
                .record_ready_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            document_selector: parse_selector(&config.document_selector)?,
            name_selector: config
                .document_name_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
        })
    }
}

#[async_trait]
impl RecordProcessor for HttpRecordProcessor {
    async fn process(&self, locator: &str) -> AttemptResult<Vec<FoundItem>> {
        let body = fetch_text(&self.client, locator).await?;

        let base = Url::parse(locator).map_err(|e| Fault::transient(e.to_string()))?;
        Ok(extract_documents(
            &body,
            &base,
            self.ready_selector.as_ref(),
            &self.document_selector,
            self.name_selector.as_ref(),
        ))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Extracts absolute record links, or `None` if the page has not rendered
pub fn extract_record_links(
    html: &str,
    base_url: &Url,
    record_selector: &Selector,
    ready_selector: Option<&Selector>,
) -> Option<Vec<String>> {
    let document = Html::parse_document(html);

    if let Some(ready) = ready_selector {
        document.select(ready).next()?;
    }

    let links = document
        .select(record_selector)
        .filter_map(link_target)
        .filter_map(|href| resolve_link(href, base_url))
        .collect();

    Some(links)
}

/// Extracts `(name, href)` pairs, or `None` if the page has not rendered
pub fn extract_documents(
    html: &str,
    base_url: &Url,
    ready_selector: Option<&Selector>,
    document_selector: &Selector,
    name_selector: Option<&Selector>,
) -> Option<Vec<FoundItem>> {
    let document = Html::parse_document(html);

    if let Some(ready) = ready_selector {
        document.select(ready).next()?;
    }

    let mut items = Vec::new();
    for element in document.select(document_selector) {
        let Some(href) = link_target(element).and_then(|h| resolve_link(h, base_url)) else {
            tracing::debug!("Skipping document link without usable href on {}", base_url);
            continue;
        };

        let name_source = match name_selector {
            Some(selector) => element.select(selector).next(),
            None => Some(element),
        };
        let name = name_source
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        items.push(FoundItem { name, href });
    }

    Some(items)
}

/// The `href` of the element itself, or of its first descendant link
fn link_target(element: ElementRef<'_>) -> Option<&str> {
    if let Some(href) = element.value().attr("href") {
        return Some(href);
    }

    let anchor = Selector::parse("a[href]").ok()?;
    element
        .select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
}

/// Resolves a link against the page it was found on
///
/// Returns `None` for:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://catalog.example.com/search?page=1").unwrap()
    }

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
          <ul class="search-result__list">
            <li><a class="item-title__title" href="/tender/UA-1">One</a></li>
            <li><a class="item-title__title" href="https://catalog.example.com/tender/UA-2">Two</a></li>
            <li><a class="item-title__title" href="javascript:void(0)">Broken</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_extract_record_links_resolves_relative() {
        let links =
            extract_record_links(LISTING, &base(), &sel("a.item-title__title"), None).unwrap();
        assert_eq!(
            links,
            vec![
                "https://catalog.example.com/tender/UA-1".to_string(),
                "https://catalog.example.com/tender/UA-2".to_string(),
            ]
        );
    }

    #[test]
    fn test_listing_not_ready_without_marker() {
        let result = extract_record_links(
            LISTING,
            &base(),
            &sel("a.item-title__title"),
            Some(&sel("div.search-summary")),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_listing_confirmed_empty() {
        let html = r#"<div class="search-summary">0 results</div>"#;
        let links = extract_record_links(
            html,
            &base(),
            &sel("a.item-title__title"),
            Some(&sel("div.search-summary")),
        )
        .unwrap();
        assert!(links.is_empty());
    }

    const RECORD: &str = r#"
        <html><body>
          <h2 class="title title--large">Tender UA-1</h2>
          <div class="documents">
            <li class="documents__item">
              <a class="documents__link" href="/files/passport.pdf"><span class="link-blank__text"> Паспорт.pdf </span></a>
            </li>
            <li class="documents__item">
              <a class="documents__link" href="https://cdn.example.com/x"></a>
            </li>
            <li class="documents__item">
              <a class="documents__link">no href</a>
            </li>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_documents_with_names() {
        let items = extract_documents(
            RECORD,
            &base(),
            Some(&sel("h2.title--large")),
            &sel("a.documents__link"),
            Some(&sel("span.link-blank__text")),
        )
        .unwrap();

        assert_eq!(
            items,
            vec![
                FoundItem::new("Паспорт.pdf", "https://catalog.example.com/files/passport.pdf"),
                FoundItem::new(UNKNOWN_NAME, "https://cdn.example.com/x"),
            ]
        );
    }

    #[test]
    fn test_extract_documents_not_ready() {
        let result = extract_documents(
            "<html><body>loading…</body></html>",
            &base(),
            Some(&sel("h2.title--large")),
            &sel("a.documents__link"),
            None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_extract_documents_from_container() {
        // Selector matching a wrapper instead of the link itself
        let items =
            extract_documents(RECORD, &base(), None, &sel("li.documents__item"), None).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Паспорт.pdf");
    }

    #[test]
    fn test_resolve_link_skips_special_schemes() {
        assert!(resolve_link("mailto:a@b.c", &base()).is_none());
        assert!(resolve_link("#top", &base()).is_none());
        assert!(resolve_link("data:text/plain,hi", &base()).is_none());
        assert!(resolve_link("ftp://example.com/x", &base()).is_none());
        assert_eq!(
            resolve_link(" /a/b ", &base()),
            Some("https://catalog.example.com/a/b".to_string())
        );
    }
}
