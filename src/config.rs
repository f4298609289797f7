//! Configuration for the watcher and the classification pipeline.
//!
//! Every knob lives in [`RenamerConfig`]. It is usually loaded from a YAML
//! file ([`RenamerConfig::from_yaml_file`]), adjusted by CLI overrides through
//! its [`RenamerConfigBuilder`], and validated once by
//! [`RenamerConfigBuilder::build`] before the watcher starts.
//!
//! ```yaml
//! watch_folder: /home/me/Downloads
//! api_key: sk-...
//! model: gpt-4o-mini
//! api_timeout_secs: 60
//! ```

use crate::error::RenamerError;
use crate::prompts::DEFAULT_CLASSIFY_PROMPT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable consulted when `api_key` is absent from the file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for a watch session.
///
/// # Example
/// ```rust,no_run
/// use paper_renamer::RenamerConfig;
///
/// let config = RenamerConfig::builder()
///     .watch_folder("/home/me/Downloads")
///     .model("gpt-4o-mini")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenamerConfig {
    /// Directory to watch (non-recursive). Required.
    pub watch_folder: PathBuf,

    /// Credential for the classification service.
    /// If None, `OPENAI_API_KEY` is read at startup.
    pub api_key: Option<String>,

    /// Instruction text sent with every first-page image.
    pub prompt: String,

    /// Provider name. `openai` talks to the chat-completions endpoint
    /// directly with a strict JSON schema; anything else is created through
    /// the edgequake-llm provider factory. Default: `openai`.
    pub provider: String,

    /// Vision model identifier. Default: `gpt-4o-mini`.
    pub model: String,

    /// Base URL of the OpenAI-compatible API. Default: `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// Upper bound on one classification call, in seconds. Default: 60.
    ///
    /// A hung request would otherwise stall the single worker and every
    /// file queued behind it.
    pub api_timeout_secs: u64,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 300.
    ///
    /// The answer is a three-field JSON object; 300 leaves room for long
    /// titles without letting a confused model ramble.
    pub max_tokens: usize,

    /// Longest edge of the rendered first page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Delay between readiness polls, in milliseconds. Default: 500.
    pub ready_poll_interval_ms: u64,

    /// Number of readiness polls before giving up. Default: 10.
    pub ready_max_attempts: u32,

    /// Maximum number of characters of the title kept in the new filename. Default: 180.
    pub max_title_chars: usize,

    /// Directory containing the pdfium shared library.
    /// If None, the system library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            watch_folder: PathBuf::new(),
            api_key: None,
            prompt: DEFAULT_CLASSIFY_PROMPT.to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_timeout_secs: 60,
            temperature: 0.0,
            max_tokens: 300,
            max_rendered_pixels: 2000,
            ready_poll_interval_ms: 500,
            ready_max_attempts: 10,
            max_title_chars: 180,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for RenamerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenamerConfig")
            .field("watch_folder", &self.watch_folder)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ready_poll_interval_ms", &self.ready_poll_interval_ms)
            .field("ready_max_attempts", &self.ready_max_attempts)
            .field("max_title_chars", &self.max_title_chars)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl RenamerConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> RenamerConfigBuilder {
        RenamerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Turn a loaded config back into a builder, e.g. to apply CLI overrides.
    pub fn into_builder(self) -> RenamerConfigBuilder {
        RenamerConfigBuilder { config: self }
    }

    /// Parse a YAML document. Missing keys take their defaults.
    ///
    /// `origin` is only used in error messages.
    pub fn from_yaml_str(yaml: &str, origin: &Path) -> Result<Self, RenamerError> {
        serde_yaml::from_str(yaml).map_err(|e| RenamerError::ConfigParse {
            path: origin.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Read and parse a YAML config file. The result is not validated yet.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RenamerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RenamerError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_yaml_str(&text, path)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// The API key from the file, falling back to `OPENAI_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }
}

/// Builder for [`RenamerConfig`].
#[derive(Debug)]
pub struct RenamerConfigBuilder {
    config: RenamerConfig,
}

impl RenamerConfigBuilder {
    pub fn watch_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watch_folder = dir.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.provider = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px;
        self
    }

    pub fn ready_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.ready_poll_interval_ms = ms;
        self
    }

    pub fn ready_max_attempts(mut self, n: u32) -> Self {
        self.config.ready_max_attempts = n;
        self
    }

    pub fn max_title_chars(mut self, n: usize) -> Self {
        self.config.max_title_chars = n;
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing watch folder is reported as
    /// [`RenamerError::WatchFolderMissing`] since it is the one condition
    /// that must stop the process before any event is served.
    pub fn build(self) -> Result<RenamerConfig, RenamerError> {
        let c = &self.config;
        if c.watch_folder.as_os_str().is_empty() {
            return Err(RenamerError::InvalidConfig(
                "watch_folder is required".into(),
            ));
        }
        if !c.watch_folder.is_dir() {
            return Err(RenamerError::WatchFolderMissing {
                path: c.watch_folder.clone(),
            });
        }
        if c.prompt.trim().is_empty() {
            return Err(RenamerError::InvalidConfig("prompt must not be empty".into()));
        }
        if c.provider.trim().is_empty() || c.model.trim().is_empty() {
            return Err(RenamerError::InvalidConfig(
                "provider and model must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(RenamerError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        // readiness needs two equal polls
        if c.ready_max_attempts < 2 {
            return Err(RenamerError::InvalidConfig(format!(
                "ready_max_attempts must be ≥ 2, got {}",
                c.ready_max_attempts
            )));
        }
        if c.ready_poll_interval_ms < 10 {
            return Err(RenamerError::InvalidConfig(format!(
                "ready_poll_interval_ms must be ≥ 10, got {}",
                c.ready_poll_interval_ms
            )));
        }
        if c.max_rendered_pixels < 100 {
            return Err(RenamerError::InvalidConfig(format!(
                "max_rendered_pixels must be ≥ 100, got {}",
                c.max_rendered_pixels
            )));
        }
        if c.max_title_chars < 8 {
            return Err(RenamerError::InvalidConfig(format!(
                "max_title_chars must be ≥ 8, got {}",
                c.max_title_chars
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let c = RenamerConfig::default();
        assert_eq!(c.provider, "openai");
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.api_timeout(), Duration::from_secs(60));
        assert_eq!(c.ready_poll_interval(), Duration::from_millis(500));
        assert_eq!(c.prompt, DEFAULT_CLASSIFY_PROMPT);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = "watch_folder: /tmp/papers\napi_key: sk-test\nprompt: Is this a paper?\napi_timeout_secs: 15\n";
        let c = RenamerConfig::from_yaml_str(yaml, Path::new("config.yaml")).unwrap();
        assert_eq!(c.watch_folder, PathBuf::from("/tmp/papers"));
        assert_eq!(c.api_key.as_deref(), Some("sk-test"));
        assert_eq!(c.prompt, "Is this a paper?");
        assert_eq!(c.api_timeout_secs, 15);
        // untouched keys keep their defaults
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.ready_max_attempts, 10);
    }

    #[test]
    fn yaml_type_error_is_config_parse() {
        let err = RenamerConfig::from_yaml_str("api_timeout_secs: soon\n", Path::new("c.yaml"))
            .unwrap_err();
        assert!(matches!(err, RenamerError::ConfigParse { .. }), "got {err:?}");
    }

    #[test]
    fn missing_file_is_config_read() {
        let err = RenamerConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, RenamerError::ConfigRead { .. }));
    }

    #[test]
    fn build_requires_existing_folder() {
        let err = RenamerConfig::builder()
            .watch_folder("/definitely/not/a/dir")
            .build()
            .unwrap_err();
        assert!(matches!(err, RenamerError::WatchFolderMissing { .. }));

        let err = RenamerConfig::builder().build().unwrap_err();
        assert!(matches!(err, RenamerError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_zero_timeout_and_attempts() {
        let dir = TempDir::new().unwrap();
        let err = RenamerConfig::builder()
            .watch_folder(dir.path())
            .api_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RenamerError::InvalidConfig(_)));

        let err = RenamerConfig::builder()
            .watch_folder(dir.path())
            .ready_max_attempts(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, RenamerError::InvalidConfig(_)));
    }

    #[test]
    fn build_accepts_existing_folder() {
        let dir = TempDir::new().unwrap();
        let c = RenamerConfig::builder()
            .watch_folder(dir.path())
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = RenamerConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn explicit_api_key_wins() {
        let c = RenamerConfig {
            api_key: Some("sk-file".into()),
            ..Default::default()
        };
        assert_eq!(c.resolved_api_key().as_deref(), Some("sk-file"));
    }
}
