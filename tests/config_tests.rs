//! Tests for configuration loading.

use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use deckbridge::config::BridgeConfig;
use deckbridge::error::BridgeError;
use deckbridge::mcp::ServerTarget;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 8] = [
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "GEMINI_MODEL",
    "GEMINI_BASE_URL",
    "SLIDES_BASE_URL",
    "DECKBRIDGE_REQUEST_TIMEOUT_MS",
    "DECKBRIDGE_MODEL_TIMEOUT_MS",
    "DECKBRIDGE_MAX_TOOL_ITERATIONS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clean_env() -> EnvGuard {
    let guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    guard
}

const SAMPLE: &str = r#"
model = "gemini-1.5-pro"
request_timeout_ms = 5000
system_prompt = "You build slide decks."

[[servers]]
command = "node"
args = ["build/index.js"]

[[servers]]
command = "deckbridge"
args = ["serve", "--backend", "memory"]
"#;

#[test]
fn toml_file_lists_servers_in_order() {
    let config = BridgeConfig::from_toml_str(SAMPLE).unwrap();
    assert_eq!(config.model, "gemini-1.5-pro");
    assert_eq!(config.request_timeout(), Duration::from_millis(5000));
    assert_eq!(config.model_timeout(), Duration::from_secs(120));
    assert_eq!(config.max_tool_iterations, 10);
    assert_eq!(
        config.servers,
        vec![
            ServerTarget::new("node", vec!["build/index.js".into()]),
            ServerTarget::new(
                "deckbridge",
                vec!["serve".into(), "--backend".into(), "memory".into()]
            ),
        ]
    );
}

#[test]
fn load_overlays_environment_on_the_file() {
    let _lock = env_lock_guard();
    let _env = clean_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();

    std::env::set_var("GOOGLE_API_KEY", "google-key");
    std::env::set_var("GEMINI_API_KEY", "gemini-key");
    std::env::set_var("DECKBRIDGE_MAX_TOOL_ITERATIONS", "3");
    std::env::set_var("DECKBRIDGE_MODEL_TIMEOUT_MS", "not-a-number");

    let config = BridgeConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.require_api_key().unwrap(), "gemini-key");
    assert_eq!(config.model, "gemini-1.5-pro");
    assert_eq!(config.max_tool_iterations, 3);
    assert_eq!(config.model_timeout_ms, 120_000);
    assert_eq!(config.servers.len(), 2);
}

#[test]
fn missing_file_is_a_configuration_error() {
    let _lock = env_lock_guard();
    let _env = clean_env();

    let dir = tempfile::tempdir().unwrap();
    let err = BridgeConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, BridgeError::Configuration(_)));
}

#[test]
fn zero_timeout_fails_validation() {
    let _lock = env_lock_guard();
    let _env = clean_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"request_timeout_ms = 0\n").unwrap();
    let err = BridgeConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("timeouts"));
}

#[test]
fn missing_key_names_the_variable() {
    let config = BridgeConfig::default().with_env(|_| None);
    let err = config.require_api_key().unwrap_err();
    assert!(matches!(err, BridgeError::Authentication(ref m) if m.contains("GEMINI_API_KEY")));
}

#[test]
fn debug_output_hides_the_api_key() {
    let config = BridgeConfig::default().with_env(|key| {
        (key == "GEMINI_API_KEY").then(|| "super-secret".to_string())
    });
    let printed = format!("{config:?}");
    assert!(!printed.contains("super-secret"));
    assert!(printed.contains("api_key"));
}
