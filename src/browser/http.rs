use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::{Browser, ElementHandle, PageDom};
use crate::error::{Result, ScrapeError};

const BASE_BACKOFF_MS: u64 = 2000;
const MAX_BACKOFF_MS: u64 = 120_000;

/// Markers of login walls and bot checks, matched against the final URL and body.
const BLOCKED_URL_MARKERS: &[&str] = &["/authwall", "/checkpoint", "/login", "/uas/login"];
const BLOCKED_BODY_MARKERS: &[&str] = &["captcha-internal", "challenge-form", "g-recaptcha"];

/// Non-rendering browser: plain HTTP fetches parsed into a `PageDom`.
pub struct HttpBrowser {
    client: Client,
    dom: PageDom,
    max_retries: u32,
}

impl HttpBrowser {
    pub fn new(user_agent: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(HttpBrowser {
            client,
            dom: PageDom::default(),
            max_retries,
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<(String, String), FetchFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchFailure::Transient(e.to_string()))?;
        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchFailure::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(FetchFailure::Fatal(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::Transient(e.to_string()))?;
        Ok((final_url, body))
    }
}

enum FetchFailure {
    Transient(String),
    Fatal(String),
}

fn blocked_marker(final_url: &str, body: &str) -> Option<&'static str> {
    BLOCKED_URL_MARKERS
        .iter()
        .find(|m| final_url.contains(*m))
        .or_else(|| BLOCKED_BODY_MARKERS.iter().find(|m| body.contains(*m)))
        .copied()
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok((final_url, body)) => {
                    if let Some(marker) = blocked_marker(&final_url, &body) {
                        return Err(ScrapeError::Blocked {
                            url: url.to_string(),
                            marker: marker.to_string(),
                        });
                    }
                    debug!("Loaded {} ({} bytes)", final_url, body.len());
                    self.dom.load(body);
                    return Ok(());
                }
                Err(FetchFailure::Fatal(reason)) => {
                    return Err(ScrapeError::navigation(url, reason));
                }
                Err(FetchFailure::Transient(reason)) if attempt >= self.max_retries => {
                    return Err(ScrapeError::navigation(url, reason));
                }
                Err(FetchFailure::Transient(reason)) => {
                    let backoff = backoff_for(attempt);
                    warn!(
                        "Fetch of {} failed: {} (attempt {}/{}), backing off {:.1}s",
                        url,
                        reason,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
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

    /// Without a renderer the capture is the page markup, written as `.html`.
    async fn screenshot(&mut self, path: &Path) -> Result<PathBuf> {
        let target = path.with_extension("html");
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&target, self.dom.markup()).await?;
        info!("Snapshot saved to {}", target.display());
        Ok(target)
    }
}

/// Exponential backoff from `BASE_BACKOFF_MS`, capped at `MAX_BACKOFF_MS`.
fn backoff_for(attempt: u32) -> Duration {
    let ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| factor.checked_mul(BASE_BACKOFF_MS))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS));
    Duration::from_millis(ms)
}
