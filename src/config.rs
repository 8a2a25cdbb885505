//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or an explicit `-f` path), then applies `CASE_PORTAL_API_BASE_URL` and
//! `CASE_PORTAL_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::logger;

/// Base URL of the portal API when neither config nor env set one.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
/// Model name sent with every RAG query unless configured otherwise.
pub const DEFAULT_RAG_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_RAG_TOP_K: u32 = 3;
pub const DEFAULT_RAG_TEMPERATURE: f32 = 0.3;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Remote API configuration (`[api]`).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Prefix for every endpoint path, e.g. `http://host:8000/api/v1`.
    pub base_url: String,
    /// Per-request timeout. `None` leaves the transport default in place.
    pub timeout_seconds: Option<u64>,
}

/// Initial RAG query parameters (`[rag]`).
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub model: String,
    pub top_k: u32,
    pub temperature: f32,
}

/// Fully-resolved portal configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Append-mode log file (already expanded, no `~`). `None` logs to stderr.
    pub log_file: Option<PathBuf>,
    pub api: ApiConfig,
    pub rag: RagConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
            api: ApiConfig {
                base_url: DEFAULT_API_BASE_URL.to_string(),
                timeout_seconds: None,
            },
            rag: RagConfig {
                model: DEFAULT_RAG_MODEL.to_string(),
                top_k: DEFAULT_RAG_TOP_K,
                temperature: DEFAULT_RAG_TEMPERATURE,
            },
        }
    }
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    portal: RawPortal,
    #[serde(default)]
    api: RawApi,
    #[serde(default)]
    rag: RawRag,
}

#[derive(Deserialize)]
struct RawPortal {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

impl Default for RawPortal {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_file: None }
    }
}

#[derive(Deserialize)]
struct RawApi {
    #[serde(default = "default_api_base_url")]
    base_url: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl Default for RawApi {
    fn default() -> Self {
        Self { base_url: default_api_base_url(), timeout_seconds: None }
    }
}

#[derive(Deserialize)]
struct RawRag {
    #[serde(default = "default_rag_model")]
    model: String,
    #[serde(default = "default_rag_top_k")]
    top_k: u32,
    #[serde(default = "default_rag_temperature")]
    temperature: f32,
}

impl Default for RawRag {
    fn default() -> Self {
        Self {
            model: default_rag_model(),
            top_k: default_rag_top_k(),
            temperature: default_rag_temperature(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_api_base_url() -> String { DEFAULT_API_BASE_URL.to_string() }
fn default_rag_model() -> String { DEFAULT_RAG_MODEL.to_string() }
fn default_rag_top_k() -> u32 { DEFAULT_RAG_TOP_K }
fn default_rag_temperature() -> f32 { DEFAULT_RAG_TEMPERATURE }

/// Load config, then apply env-var overrides.
///
/// With `path == None` the default file is optional: when it is missing the
/// built-in defaults are used. An explicit path must exist.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let base_url_override = env::var("CASE_PORTAL_API_BASE_URL").ok();
    let log_level_override = env::var("CASE_PORTAL_LOG_LEVEL").ok();

    match path {
        Some(p) => load_from(
            Path::new(p),
            base_url_override.as_deref(),
            log_level_override.as_deref(),
        ),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from(
            Path::new(DEFAULT_CONFIG_PATH),
            base_url_override.as_deref(),
            log_level_override.as_deref(),
        ),
        None => {
            debug!(path = DEFAULT_CONFIG_PATH, "no config file, using built-in defaults");
            resolve(
                RawConfig::default(),
                base_url_override.as_deref(),
                log_level_override.as_deref(),
            )
        }
    }
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    base_url_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, base_url_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    base_url_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let base_url = base_url_override
        .unwrap_or(&parsed.api.base_url)
        .trim_end_matches('/')
        .to_string();
    if base_url.is_empty() {
        return Err(AppError::Config("api.base_url must not be empty".into()));
    }

    let rag = parsed.rag;
    if rag.top_k == 0 {
        return Err(AppError::Config("rag.top_k must be at least 1".into()));
    }
    if !(0.0..=1.0).contains(&rag.temperature) {
        return Err(AppError::Config(format!(
            "rag.temperature must be within [0, 1], got {}",
            rag.temperature
        )));
    }

    let log_level = log_level_override.unwrap_or(&parsed.portal.log_level).to_string();
    logger::parse_level(&log_level)
        .map_err(|_| AppError::Config(format!("portal.log_level is not a log level: '{log_level}'")))?;

    Ok(Config {
        log_level,
        log_file: parsed.portal.log_file.as_deref().map(expand_home),
        api: ApiConfig { base_url, timeout_seconds: parsed.api.timeout_seconds },
        rag: RagConfig { model: rag.model, top_k: rag.top_k, temperature: rag.temperature },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_TOML: &str = r#"
[portal]
log_level = "debug"
log_file = "/tmp/portal.log"

[api]
base_url = "http://portal.local:9000/api/v1/"
timeout_seconds = 15

[rag]
model = "test-model"
top_k = 5
temperature = 0.7
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_full_config() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/portal.log")));
        assert_eq!(cfg.api.base_url, "http://portal.local:9000/api/v1");
        assert_eq!(cfg.api.timeout_seconds, Some(15));
        assert_eq!(cfg.rag.model, "test-model");
        assert_eq!(cfg.rag.top_k, 5);
        assert!((cfg.rag.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.api.timeout_seconds, None);
        assert_eq!(cfg.rag.model, DEFAULT_RAG_MODEL);
        assert_eq!(cfg.rag.top_k, 3);
    }

    #[test]
    fn env_overrides_win() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), Some("http://other:1/api"), Some("trace")).unwrap();
        assert_eq!(cfg.api.base_url, "http://other:1/api");
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn unknown_log_level_rejected() {
        let f = write_toml("[portal]\nlog_level = \"verbose\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("log_level"));

        let f = write_toml("");
        let err = load_from(f.path(), None, Some("loud")).unwrap_err();
        assert!(err.to_string().contains("'loud'"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let f = write_toml("[rag]\ntop_k = 0\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let f = write_toml("[rag]\ntemperature = 1.5\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn missing_explicit_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.case-portal/portal.log");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with("portal.log"));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("logs/portal.log"), PathBuf::from("logs/portal.log"));
    }
}
