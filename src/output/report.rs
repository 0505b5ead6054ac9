//! Append-only HTML report of processed records
//!
//! Each record becomes one block:
//!
//! ```html
//! <p><strong>Page:</strong> <a href='URL'>URL</a></p>
//! <ul>
//!   <li><a href='HREF'>NAME</a></li>
//! </ul>
//! <hr>
//! ```
//!
//! The same file can be read back with [`read_report_links`] to replay its
//! downloads without crawling again.

use crate::output::traits::{OutputError, OutputResult, ReportSink};
use crate::source::FoundItem;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct HtmlReport {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HtmlReport {
    /// Opens a report, creating its parent directory if needed
    pub fn new(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSink for HtmlReport {
    async fn append(&self, source_url: &str, items: &[FoundItem]) -> OutputResult<()> {
        let block = format_block(source_url, items);

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!("Recorded {} documents for {}", items.len(), source_url);
        Ok(())
    }
}

/// Renders one record block
pub fn format_block(source_url: &str, items: &[FoundItem]) -> String {
    let url = escape_html(source_url);
    let mut block = format!(
        "<p><strong>Page:</strong> <a href='{}'>{}</a></p>\n<ul>\n",
        url, url
    );
    for item in items {
        block.push_str(&format!(
            "  <li><a href='{}'>{}</a></li>\n",
            escape_html(&item.href),
            escape_html(&item.name)
        ));
    }
    block.push_str("</ul>\n<hr>\n");
    block
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Reads every attachment link back out of a report
pub async fn read_report_links(path: &Path) -> OutputResult<Vec<FoundItem>> {
    let html = tokio::fs::read_to_string(path).await?;
    parse_report(&html)
}

fn parse_report(html: &str) -> OutputResult<Vec<FoundItem>> {
    let selector =
        Selector::parse("li > a[href]").map_err(|e| OutputError::Parse(format!("{:?}", e)))?;
    let document = Html::parse_document(html);

    let items = document
        .select(&selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let name = a.text().collect::<String>().trim().to_string();
            Some(FoundItem::new(name, href))
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_format_block() {
        let block = format_block(
            "https://catalog.example.com/tender/UA-1",
            &[FoundItem::new("plan.pdf", "https://cdn.example.com/1")],
        );
        assert_eq!(
            block,
            "<p><strong>Page:</strong> <a href='https://catalog.example.com/tender/UA-1'>https://catalog.example.com/tender/UA-1</a></p>\n\
             <ul>\n  <li><a href='https://cdn.example.com/1'>plan.pdf</a></li>\n</ul>\n<hr>\n"
        );
    }

    #[test]
    fn test_names_are_escaped() {
        let block = format_block("u", &[FoundItem::new("a <b> & 'c'", "h?x=1&y=2")]);
        assert!(block.contains("a &lt;b&gt; &amp; &#39;c&#39;"));
        assert!(block.contains("h?x=1&amp;y=2"));
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/output.html");
        let report = HtmlReport::new(&path).unwrap();

        report
            .append(
                "https://catalog.example.com/tender/UA-1",
                &[
                    FoundItem::new("Паспорт.pdf", "https://cdn.example.com/1"),
                    FoundItem::new("a & b", "https://cdn.example.com/2?x=1&y=2"),
                ],
            )
            .await
            .unwrap();
        report
            .append("https://catalog.example.com/tender/UA-2", &[])
            .await
            .unwrap();

        let items = read_report_links(&path).await.unwrap();
        assert_eq!(
            items,
            vec![
                FoundItem::new("Паспорт.pdf", "https://cdn.example.com/1"),
                FoundItem::new("a & b", "https://cdn.example.com/2?x=1&y=2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.html");
        let report = Arc::new(HtmlReport::new(&path).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let report = Arc::clone(&report);
                tokio::spawn(async move {
                    let items: Vec<FoundItem> = (0..5)
                        .map(|j| FoundItem::new(format!("r{}-d{}", i, j), format!("https://x/{}/{}", i, j)))
                        .collect();
                    report
                        .append(&format!("https://catalog.example.com/{}", i), &items)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let blocks: Vec<&str> = content.split("<hr>\n").filter(|b| !b.is_empty()).collect();
        assert_eq!(blocks.len(), 16);
        for block in blocks {
            assert_eq!(block.matches("<li>").count(), 5);
            let prefix = block
                .split("catalog.example.com/")
                .nth(1)
                .and_then(|rest| rest.split('\'').next())
                .unwrap();
            assert_eq!(block.matches(&format!("'>r{}-d", prefix)).count(), 5);
        }
    }
}
