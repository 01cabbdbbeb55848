//! Application configuration for lakeexport.
//!
//! The config lives in `config.json` in the working directory (overridable on
//! the command line). Only `token` is required; every other key has a default.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LakeExportError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default knowledge-base host.
pub const DEFAULT_HOST: &str = "https://www.yuque.com";

// ---------------------------------------------------------------------------
// Config struct (matching config.json schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from JSON.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API token sent as `X-Auth-Token`.
    pub token: String,

    /// Base URL of the knowledge-base service.
    #[serde(default = "default_host")]
    pub host: String,

    /// User-Agent header for API requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Root directory for crawled raw documents.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Root directory for converted Markdown.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_user_agent() -> String {
    concat!("lakeexport/", env!("CARGO_PKG_VERSION")).into()
}
fn default_storage_dir() -> String {
    "storage".into()
}
fn default_output_dir() -> String {
    "output".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Build a config with defaults for everything but the token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            host: default_host(),
            user_agent: default_user_agent(),
            storage_dir: default_storage_dir(),
            output_dir: default_output_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// A copy safe to print: the token is masked.
    pub fn redacted(&self) -> Self {
        Self {
            token: mask_token(&self.token),
            ..self.clone()
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("token", &mask_token(&self.token))
            .field("host", &self.host)
            .field("user_agent", &self.user_agent)
            .field("storage_dir", &self.storage_dir)
            .field("output_dir", &self.output_dir)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Keep the first four characters, hide the rest.
fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        "****".into()
    } else {
        format!("{visible}****")
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load and validate the config at `path`.
///
/// A missing file, a missing/empty/non-string `token`, or an ill-typed field
/// is a config error; text that is not JSON at all is a parse error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LakeExportError::config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        Err(e) => return Err(LakeExportError::io(path, e)),
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        LakeExportError::parse(format!("failed to parse {}: {e}", path.display()))
    })?;

    let Value::Object(map) = &value else {
        return Err(LakeExportError::config(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    };

    match map.get("token") {
        Some(Value::String(token)) if !token.trim().is_empty() => {}
        Some(Value::String(_)) => {
            return Err(LakeExportError::config("`token` must not be empty"));
        }
        Some(_) => return Err(LakeExportError::config("`token` must be a string")),
        None => return Err(LakeExportError::config("missing required field `token`")),
    }

    let config: AppConfig = serde_json::from_value(value).map_err(|e| {
        LakeExportError::config(format!("invalid config in {}: {e}", path.display()))
    })?;

    tracing::debug!(?path, host = %config.host, "config loaded");
    Ok(config)
}

/// Load only the API token from the config at `path`.
pub fn load_token(path: &Path) -> Result<String> {
    load_config_from(path).map(|config| config.token)
}

/// Write a new config file holding `token` and the defaults.
/// Refuses to overwrite an existing file.
pub fn init_config(path: &Path, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(LakeExportError::config("`token` must not be empty"));
    }
    if path.exists() {
        return Err(LakeExportError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = serde_json::to_string_pretty(&AppConfig::with_token(token))
        .map_err(|e| LakeExportError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| LakeExportError::io(path, e))?;
    tracing::info!(?path, "created config file");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn token_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"token": "abc123"}"#);
        assert_eq!(load_token(&path).unwrap(), "abc123");
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"token": "abc123", "storage_dir": "/tmp/raw"}"#);
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.storage_dir, "/tmp/raw");
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn empty_object_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "{}");
        let err = load_token(&path).unwrap_err();
        assert!(matches!(err, LakeExportError::Config { .. }), "{err}");
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "{ token: abc123");
        let err = load_token(&path).unwrap_err();
        assert!(matches!(err, LakeExportError::Parse { .. }), "{err}");
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_token(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, LakeExportError::Config { .. }), "{err}");
    }

    #[test]
    fn empty_or_non_string_token_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(&dir, r#"{"token": ""}"#);
        assert!(matches!(
            load_token(&path).unwrap_err(),
            LakeExportError::Config { .. }
        ));

        let path = write_config(&dir, r#"{"token": 42}"#);
        assert!(matches!(
            load_token(&path).unwrap_err(),
            LakeExportError::Config { .. }
        ));

        let path = write_config(&dir, r#"["abc123"]"#);
        assert!(matches!(
            load_token(&path).unwrap_err(),
            LakeExportError::Config { .. }
        ));
    }

    #[test]
    fn debug_and_redacted_hide_token() {
        let config = AppConfig::with_token("supersecret");
        assert!(!format!("{config:?}").contains("supersecret"));
        assert_eq!(config.redacted().token, "supe****");
        assert_eq!(AppConfig::with_token("abc").redacted().token, "****");
    }

    #[test]
    fn init_writes_loadable_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        init_config(&path, "tok-1").unwrap();
        assert_eq!(load_token(&path).unwrap(), "tok-1");

        let err = init_config(&path, "tok-2").unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(load_token(&path).unwrap(), "tok-1");
    }
}
