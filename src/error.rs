use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Failures raised by the browser, completion and storage layers.
///
/// Extraction itself never fails: an unresolved field is an empty string and an
/// unrecognized page is an empty result set.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("blocked page at {url} ({marker})")]
    Blocked { url: String, marker: String },

    #[error("DOM access failed: {0}")]
    Dom(String),

    #[error("text completion failed: {0}")]
    Completion(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl ScrapeError {
    pub fn navigation(url: &str, reason: impl Into<String>) -> Self {
        ScrapeError::Navigation {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure belongs to a page visit rather than the job's resources.
    pub fn is_navigation(&self) -> bool {
        matches!(self, ScrapeError::Navigation { .. } | ScrapeError::Blocked { .. })
    }
}
