use url::Url;

/// A discovered record waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    /// Stable identifier used for deduplication
    pub id: String,

    /// Where the record can be fetched
    pub locator: String,
}

impl WorkItem {
    /// Builds an item whose id is derived from the locator
    ///
    /// Returns `None` when no identifier can be derived, e.g. a bare host.
    pub fn from_locator(locator: &str) -> Option<Self> {
        let id = record_id_from_locator(locator)?;
        Some(Self {
            id,
            locator: locator.to_string(),
        })
    }
}

/// Derives a record id from the last non-empty path segment of a locator
///
/// `https://catalog.example.com/tender/UA-2024-01-01-000001-a/` and
/// `.../UA-2024-01-01-000001-a?tab=docs` both yield `UA-2024-01-01-000001-a`.
pub fn record_id_from_locator(locator: &str) -> Option<String> {
    match Url::parse(locator) {
        Ok(url) => url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
            .map(str::to_string),
        Err(_) => {
            // Relative or otherwise unparseable locators
            let path = locator.split(['?', '#']).next().unwrap_or_default();
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .last()
                .map(str::to_string)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_from_absolute_url() {
        assert_eq!(
            record_id_from_locator("https://catalog.example.com/tender/UA-2024-000001"),
            Some("UA-2024-000001".to_string())
        );
    }

    #[test]
    fn test_record_id_ignores_trailing_slash_and_query() {
        assert_eq!(
            record_id_from_locator("https://catalog.example.com/tender/UA-7/"),
            Some("UA-7".to_string())
        );
        assert_eq!(
            record_id_from_locator("https://catalog.example.com/tender/UA-7?tab=docs#top"),
            Some("UA-7".to_string())
        );
    }

    #[test]
    fn test_record_id_from_relative_locator() {
        assert_eq!(
            record_id_from_locator("/tender/UA-9/?x=1"),
            Some("UA-9".to_string())
        );
    }

    #[test]
    fn test_record_id_missing() {
        assert_eq!(record_id_from_locator("https://catalog.example.com/"), None);
        assert_eq!(record_id_from_locator(""), None);
        assert!(WorkItem::from_locator("https://catalog.example.com").is_none());
    }

    #[test]
    fn test_from_locator_keeps_locator() {
        let item = WorkItem::from_locator("https://catalog.example.com/tender/42").unwrap();
        assert_eq!(item.id, "42");
        assert_eq!(item.locator, "https://catalog.example.com/tender/42");
    }
}
