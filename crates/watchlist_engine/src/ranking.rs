use scraper::{Html, Selector};
use thiserror::Error;

/// Anchors holding usernames on the public ranking page.
pub const RANKING_USERNAME_SELECTOR: &str =
    "div#content table tbody tr td table tbody tr td div:first-child > a";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid username selector {selector:?}: {message}")]
pub struct InvalidSelector {
    pub selector: String,
    pub message: String,
}

pub trait UsernameExtractor: Send + Sync {
    /// Raw anchor texts in document order. Empty entries are kept; callers skip them.
    fn extract(&self, html: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    selector: Selector,
}

impl SelectorExtractor {
    pub fn new(selector: &str) -> Result<Self, InvalidSelector> {
        let parsed = Selector::parse(selector).map_err(|err| InvalidSelector {
            selector: selector.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self { selector: parsed })
    }

    pub fn ranking_page() -> Result<Self, InvalidSelector> {
        Self::new(RANKING_USERNAME_SELECTOR)
    }
}

impl UsernameExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        doc.select(&self.selector)
            .map(|anchor| anchor.text().collect::<String>().trim().to_string())
            .collect()
    }
}
