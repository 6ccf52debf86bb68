//! Session configuration.
//!
//! Programmatic construction via [`JvLinkConfig::new`] is the primary path;
//! a TOML loader exists for tooling. TOML is the sole config-file source --
//! no environment variable overrides.
//!
//! # Required fields
//! - `sid` (up to 64 bytes of restricted ASCII and spaces)
//!
//! # Optional fields
//! - `service_key` (exactly 17 alphanumeric characters)
//! - `save_path` (created lazily by the native layer, not validated here)
//! - `save_flag` (persist downloaded files; default false)
//! - `use_gets_fast_path` (use the read primitive that skips one internal
//!   re-encoding; default false)

use serde::Deserialize;
use std::path::Path;

/// Maximum byte length of a software id.
const SID_MAX_BYTES: usize = 64;

const SERVICE_KEY_LEN: usize = 17;

// ---------------------------------------------------------------------------
// Config type
// ---------------------------------------------------------------------------

/// Validated session configuration. The orchestrator caches one of these and
/// keeps it in sync when property setters succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JvLinkConfig {
    pub sid: String,
    pub service_key: Option<String>,
    pub save_path: Option<String>,
    pub save_flag: bool,
    pub use_gets_fast_path: bool,
}

impl JvLinkConfig {
    /// Build a config with just a software id; optional fields come in via
    /// the `with_*` methods.
    pub fn new(sid: impl Into<String>) -> Result<JvLinkConfig, ConfigError> {
        let sid = sid.into().trim().to_owned();
        validate_sid(&sid)?;
        Ok(JvLinkConfig {
            sid,
            service_key: None,
            save_path: None,
            save_flag: false,
            use_gets_fast_path: false,
        })
    }

    pub fn with_service_key(mut self, key: impl Into<String>) -> Result<JvLinkConfig, ConfigError> {
        let key = key.into().trim().to_owned();
        validate_service_key(&key)?;
        self.service_key = Some(key);
        Ok(self)
    }

    pub fn with_save_path(mut self, path: impl Into<String>) -> Result<JvLinkConfig, ConfigError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "save_path must name a path".to_owned(),
            ));
        }
        self.save_path = Some(path);
        Ok(self)
    }

    pub fn with_save_flag(mut self, save: bool) -> JvLinkConfig {
        self.save_flag = save;
        self
    }

    pub fn with_gets_fast_path(mut self, fast: bool) -> JvLinkConfig {
        self.use_gets_fast_path = fast;
        self
    }
}

fn validate_sid(sid: &str) -> Result<(), ConfigError> {
    if sid.is_empty() {
        return Err(ConfigError::MissingField("sid".to_owned()));
    }
    if sid.len() > SID_MAX_BYTES {
        return Err(ConfigError::InvalidValue(format!(
            "sid exceeds {SID_MAX_BYTES} bytes"
        )));
    }
    let ok = sid
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b' ' || matches!(b, b'-' | b'_' | b'.' | b'/'));
    if !ok {
        return Err(ConfigError::InvalidValue(
            "sid may only contain ASCII letters, digits, spaces, and -_./".to_owned(),
        ));
    }
    Ok(())
}

fn validate_service_key(key: &str) -> Result<(), ConfigError> {
    if key.len() != SERVICE_KEY_LEN || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidValue(format!(
            "service key must be exactly {SERVICE_KEY_LEN} alphanumeric characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization type (Options for optional fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    sid: Option<String>,
    service_key: Option<String>,
    save_path: Option<String>,
    save_flag: Option<bool>,
    use_gets_fast_path: Option<bool>,
}

// ---------------------------------------------------------------------------
// Public loaders
// ---------------------------------------------------------------------------

/// Load config from a TOML file.
pub fn load_config_from_path(path: &Path) -> Result<JvLinkConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<JvLinkConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let sid = raw
        .sid
        .ok_or_else(|| ConfigError::MissingField("sid".to_owned()))?;
    let mut config = JvLinkConfig::new(sid)?;
    if let Some(key) = raw.service_key {
        config = config.with_service_key(key)?;
    }
    if let Some(path) = raw.save_path {
        config = config.with_save_path(path)?;
    }
    config.save_flag = raw.save_flag.unwrap_or(false);
    config.use_gets_fast_path = raw.use_gets_fast_path.unwrap_or(false);
    Ok(config)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::JvLinkError {
    fn from(err: ConfigError) -> Self {
        crate::error::JvLinkError::Validation {
            reason: err.to_string(),
        }
    }
}
