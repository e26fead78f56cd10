use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{Browser, ElementHandle, PageDom};
use crate::error::{Result, ScrapeError};

/// Offline browser serving saved pages from a URL → markup map.
///
/// Used to re-run extraction over captured snapshots; unknown URLs fail
/// navigation like an unreachable page would.
#[derive(Debug, Default, Clone)]
pub struct ReplayBrowser {
    pages: HashMap<String, String>,
    dom: PageDom,
    visited: Vec<String>,
}

impl ReplayBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, markup: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), markup.into());
        self
    }

    pub fn with_file(self, url: &str, path: &Path) -> Result<Self> {
        let markup = std::fs::read_to_string(path)?;
        Ok(self.with_page(url, markup))
    }

    /// Every URL passed to `navigate`, in call order.
    #[cfg(test)]
    pub fn visited(&self) -> &[String] {
        &self.visited
    }
}

#[async_trait]
impl Browser for ReplayBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.visited.push(url.to_string());
        let markup = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::navigation(url, "no saved page"))?;
        debug!("Replaying {}", url);
        self.dom.load(markup);
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.dom.markup().to_string())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        self.dom.query_all(selector)
    }

    async fn query(
        &mut self,
        selector: &str,
        within: ElementHandle,
    ) -> Result<Option<ElementHandle>> {
        self.dom.query(selector, within)
    }

    async fn inner_text(&mut self, element: ElementHandle) -> Result<String> {
        self.dom.inner_text(element)
    }

    async fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        self.dom.attribute(element, name)
    }

    async fn outer_html(&mut self, element: ElementHandle) -> Result<String> {
        self.dom.outer_html(element)
    }

    async fn screenshot(&mut self, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_known_pages_only() {
        let mut browser =
            ReplayBrowser::new().with_page("https://x.test/a", "<p class=\"t\">A</p>");
        browser.navigate("https://x.test/a").await.unwrap();
        let found = browser.query_all(".t").await.unwrap();
        assert_eq!(browser.inner_text(found[0]).await.unwrap(), "A");

        let err = browser.navigate("https://x.test/missing").await.unwrap_err();
        assert!(err.is_navigation());
        assert_eq!(browser.visited().len(), 2);
    }
}
