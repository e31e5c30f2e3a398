//! Configuration (layered: defaults < config file < environment < CLI flags).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::mcp::ServerTarget;
use crate::provider::google::DEFAULT_GEMINI_MODEL;

/// Settings for the bridge binary.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Gemini model id.
    pub model: String,
    /// Gemini API key. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model_base_url: Option<String>,
    pub slides_base_url: Option<String>,
    pub request_timeout_ms: u64,
    pub model_timeout_ms: u64,
    pub max_tool_iterations: usize,
    pub system_prompt: Option<String>,
    /// Tool servers `chat` connects to when none are given on the command line.
    pub servers: Vec<ServerTarget>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key: None,
            model_base_url: None,
            slides_base_url: None,
            request_timeout_ms: 30_000,
            model_timeout_ms: 120_000,
            max_tool_iterations: 10,
            system_prompt: None,
            servers: Vec::new(),
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("model_base_url", &self.model_base_url)
            .field("slides_base_url", &self.slides_base_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("model_timeout_ms", &self.model_timeout_ms)
            .field("max_tool_iterations", &self.max_tool_iterations)
            .field("system_prompt", &self.system_prompt)
            .field("servers", &self.servers)
            .finish()
    }
}

impl BridgeConfig {
    /// Defaults overlaid with environment variables (and `.env`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Load the config file (explicit path, or the default location when it
    /// exists) and overlay the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        let config = base.with_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config file");
        let text = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BridgeError::Configuration(format!("invalid config: {e}")))
    }

    /// `~/.deckbridge/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".deckbridge").join("config.toml"))
    }

    /// Overlay variables from `lookup` onto this config.
    ///
    /// `GEMINI_API_KEY` wins over `GOOGLE_API_KEY`. Unparseable numbers are
    /// ignored with a warning.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.model = model;
        }
        if let Some(url) = non_empty("GEMINI_BASE_URL") {
            self.model_base_url = Some(url);
        }
        if let Some(url) = non_empty("SLIDES_BASE_URL") {
            self.slides_base_url = Some(url);
        }
        if let Some(ms) = parse_env(&non_empty, "DECKBRIDGE_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = parse_env(&non_empty, "DECKBRIDGE_MODEL_TIMEOUT_MS") {
            self.model_timeout_ms = ms;
        }
        if let Some(n) = parse_env(&non_empty, "DECKBRIDGE_MAX_TOOL_ITERATIONS") {
            self.max_tool_iterations = n;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 || self.model_timeout_ms == 0 {
            return Err(BridgeError::Configuration("timeouts must be greater than zero".into()));
        }
        if self.model.trim().is_empty() {
            return Err(BridgeError::Configuration("model must not be empty".into()));
        }
        if let Some(server) = self.servers.iter().find(|s| s.command.trim().is_empty()) {
            return Err(BridgeError::Configuration(format!(
                "server entry has an empty command: {server:?}"
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    /// The API key, or an authentication error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| BridgeError::Authentication("Missing GEMINI_API_KEY".into()))
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn gemini_key_wins_over_google_key() {
        let config = BridgeConfig::default().with_env(env(&[
            ("GOOGLE_API_KEY", "google"),
            ("GEMINI_API_KEY", "gemini"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("gemini"));
    }

    #[test]
    fn blank_and_bad_values_are_ignored() {
        let config = BridgeConfig::default().with_env(env(&[
            ("GEMINI_API_KEY", "  "),
            ("DECKBRIDGE_REQUEST_TIMEOUT_MS", "soon"),
            ("DECKBRIDGE_MAX_TOOL_ITERATIONS", "3"),
        ]));
        assert!(config.api_key.is_none());
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.max_tool_iterations, 3);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = BridgeConfig {
            api_key: Some("sekrit".into()),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("sekrit"));
        assert!(matches!(
            BridgeConfig::default().require_api_key(),
            Err(BridgeError::Authentication(_))
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = BridgeConfig {
            model_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Configuration(_))));
    }
}
