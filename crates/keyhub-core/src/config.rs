//! Configuration loaded from `config.toml` plus environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KeyHubError, Result};

/// Top-level KeyHub configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyHubConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub licensing: LicensingConfig,
    pub auth: AuthConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 5000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: KeyHubConfig::data_dir().join("licenses.db") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensingConfig {
    /// Device slots given to licenses created by client provisioning.
    pub default_max_devices: u32,
    /// How many generated keys to try before giving up on a collision streak.
    pub key_generation_attempts: u32,
    /// Product name used in outgoing emails.
    pub product_name: String,
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            default_max_devices: 1,
            key_generation_attempts: 5,
            product_name: "KeyHub".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for login tokens. Empty means "generate at startup".
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            bcrypt_cost: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; falls back to `username` when empty.
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
        }
    }
}

impl SmtpConfig {
    /// SMTP is used only when host and credentials are all present.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn sender(&self) -> &str {
        if self.from.is_empty() { &self.username } else { &self.from }
    }
}

impl KeyHubConfig {
    /// `<config dir>/keyhub`, or `./.keyhub` when the platform has none.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("keyhub"))
            .unwrap_or_else(|| PathBuf::from(".keyhub"))
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("keyhub"))
            .unwrap_or_else(|| PathBuf::from(".keyhub"))
    }

    /// Default config file location, overridable with `KEYHUB_CONFIG`.
    pub fn default_path() -> PathBuf {
        std::env::var("KEYHUB_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"))
    }

    /// Parse a TOML config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KeyHubError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KeyHubError::Config(format!("parse: {e}")))
    }

    /// Load from `path` when it exists, defaults otherwise, then apply env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            Self::load_from(path)?
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Self::default()
        };
        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Overlay environment variables using the supplied lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SMTP_HOST") {
            self.smtp.host = v;
        }
        if let Some(port) = lookup("SMTP_PORT").and_then(|v| v.parse().ok()) {
            self.smtp.port = port;
        }
        if let Some(v) = lookup("SMTP_USER") {
            self.smtp.username = v;
        }
        if let Some(v) = lookup("SMTP_PASS") {
            self.smtp.password = v;
        }
        if let Some(v) = lookup("SMTP_FROM") {
            self.smtp.from = v;
        }
        if let Some(v) = lookup("KEYHUB_DB_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KEYHUB_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
    }
}
