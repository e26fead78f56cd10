use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::parser::excerpt::ExcerptLimits;
use crate::parser::selectors::SelectorRegistry;
use crate::parser::urls::UrlNormalizer;

pub const DEFAULT_CONFIG_FILE: &str = "scout.toml";
const ENV_PREFIX: &str = "SCOUT";

/// Job settings: optional TOML file overlaid by `SCOUT__*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub origin: String,
    pub user_agent: String,
    pub target_urls: Vec<String>,
    pub output_csv: PathBuf,
    pub output_json: PathBuf,
    /// Listing and profile captures are written here when set.
    pub snapshot_dir: Option<PathBuf>,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub settle_secs: f64,
    pub scroll_probability: f64,
    pub scroll_passes: u32,
    pub max_profile_visits: usize,
    pub navigation_retries: u32,
    pub request_timeout_secs: u64,
    pub show_progress: bool,
    pub ai: AiSettings,
    pub selectors: SelectorRegistry,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            origin: "https://www.linkedin.com".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .into(),
            target_urls: Vec::new(),
            output_csv: "linkedin_data.csv".into(),
            output_json: "linkedin_data.json".into(),
            snapshot_dir: None,
            min_delay_secs: 1.0,
            max_delay_secs: 3.0,
            settle_secs: 2.0,
            scroll_probability: 0.7,
            scroll_passes: 3,
            max_profile_visits: 20,
            navigation_retries: 3,
            request_timeout_secs: 30,
            show_progress: true,
            ai: AiSettings::default(),
            selectors: SelectorRegistry::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub enabled: bool,
    /// OpenAI-compatible API root, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_excerpt_chars: usize,
    pub max_attribute_len: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AiSettings {
    fn default() -> Self {
        AiSettings {
            enabled: true,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_excerpt_chars: 12_000,
            max_attribute_len: 80,
            temperature: 0.0,
            max_tokens: 200,
        }
    }
}

impl AiSettings {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn excerpt_limits(&self) -> ExcerptLimits {
        ExcerptLimits {
            max_chars: self.max_excerpt_chars,
            max_attribute_len: self.max_attribute_len,
        }
    }
}

impl Settings {
    /// Load `path` (missing file is fine) and the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_sources(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(path: &Path, env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(env.separator("__").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn urls(&self) -> UrlNormalizer {
        UrlNormalizer::new(&self.origin)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn environment_from(vars: HashMap<String, String>) -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(vars))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::from_sources(
            Path::new("/nonexistent/scout.toml"),
            environment_from(HashMap::new()),
        )
        .unwrap();
        assert_eq!(settings.max_profile_visits, 20);
        assert_eq!(settings.output_csv, PathBuf::from("linkedin_data.csv"));
        assert_eq!(settings.ai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(settings.selectors, SelectorRegistry::default());
    }

    #[test]
    fn file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
max_profile_visits = 5
target_urls = ["https://www.linkedin.com/school/x/people/"]

[ai]
enabled = false

[selectors]
container = [".people-card"]
"#
        )
        .unwrap();

        let vars = HashMap::from([
            ("SCOUT__MAX_PROFILE_VISITS".to_string(), "7".to_string()),
            ("SCOUT__ORIGIN".to_string(), "https://staging.example.test".to_string()),
        ]);
        let settings = Settings::from_sources(file.path(), environment_from(vars)).unwrap();

        assert_eq!(settings.max_profile_visits, 7);
        assert_eq!(settings.origin, "https://staging.example.test");
        assert_eq!(settings.target_urls.len(), 1);
        assert!(!settings.ai.enabled);
        assert_eq!(settings.selectors.container, vec![".people-card".to_string()]);
        assert_eq!(settings.selectors.name, SelectorRegistry::default().name);
    }
}
