//! Browser and input capabilities consumed by the pipeline.
//!
//! The orchestrator owns exactly one `Browser` per listing job; nothing here is
//! shared between concurrent jobs.

pub mod dom;
pub mod http;
pub mod pacing;
pub mod replay;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

pub use dom::PageDom;
pub use http::HttpBrowser;
pub use pacing::PacedInput;
pub use replay::ReplayBrowser;

/// Opaque reference to an element of the page the browser currently shows.
///
/// Handles are invalidated by the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub usize);

#[async_trait]
pub trait Browser: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Serialized markup of the current page.
    async fn content(&mut self) -> Result<String>;

    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// First descendant of `within` matching `selector`.
    async fn query(&mut self, selector: &str, within: ElementHandle)
        -> Result<Option<ElementHandle>>;

    async fn inner_text(&mut self, element: ElementHandle) -> Result<String>;

    async fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>>;

    async fn outer_html(&mut self, element: ElementHandle) -> Result<String>;

    /// Capture the current page; returns the path actually written.
    async fn screenshot(&mut self, path: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait InputSimulator: Send {
    async fn scroll(&mut self);

    async fn click(&mut self, selector: &str) -> bool;

    async fn type_text(&mut self, selector: &str, text: &str);

    async fn delay(&mut self, min_secs: f64, max_secs: f64);
}
