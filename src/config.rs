//! Configuration module for megagate.

use serde::Deserialize;
use std::path::Path;

use crate::{GateError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins (empty = allow any).
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Key the login rate limit on `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            trust_forwarded_headers: false,
        }
    }
}

/// MEGA account configuration.
#[derive(Clone, Default, Deserialize)]
pub struct MegaConfig {
    /// Account e-mail.
    #[serde(default)]
    pub email: String,
    /// Account password.
    #[serde(default)]
    pub password: String,
    /// Directory containing the MEGAcmd tools (defaults to `PATH` lookup).
    #[serde(default)]
    pub command_dir: Option<String>,
}

impl std::fmt::Debug for MegaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MegaConfig")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("command_dir", &self.command_dir)
            .finish()
    }
}

/// API authentication configuration.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign access tokens.
    #[serde(default)]
    pub jwt_secret: String,
    /// Username accepted by `POST /login`.
    #[serde(default)]
    pub username: String,
    /// Password accepted by `POST /login`.
    #[serde(default)]
    pub password: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
    /// Login attempts allowed per client per minute.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

fn default_token_expiry() -> u64 {
    8 * 60 * 60 // 8 hours
}

fn default_login_rate_limit() -> u32 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            username: String::new(),
            password: String::new(),
            token_expiry_secs: default_token_expiry(),
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("token_expiry_secs", &self.token_expiry_secs)
            .field("login_rate_limit", &self.login_rate_limit)
            .finish()
    }
}

/// Upload staging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory where uploads are staged before the remote transfer.
    #[serde(default = "default_staging_path")]
    pub staging_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_staging_path() -> String {
    "data/uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    100
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            staging_path: default_staging_path(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file mirrored alongside the console.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// MEGA account configuration.
    #[serde(default)]
    pub mega: MegaConfig,
    /// API authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upload staging configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    ///
    /// A missing file is not an error: defaults plus the environment are used.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GateError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MEGAGATE_HOST`, `MEGAGATE_PORT`: listen address
    /// - `MEGAGATE_MEGA_EMAIL`, `MEGAGATE_MEGA_PASSWORD`: MEGA account
    /// - `MEGAGATE_MEGA_COMMAND_DIR`: MEGAcmd install directory
    /// - `MEGAGATE_JWT_SECRET`: token signing secret
    /// - `MEGAGATE_LOGIN_USERNAME`, `MEGAGATE_LOGIN_PASSWORD`: login pair
    /// - `MEGAGATE_UPLOAD_FOLDER`: upload staging directory
    /// - `MEGAGATE_LOG_LEVEL`: log level
    ///
    /// Fails on a value that cannot be parsed, such as a non-numeric port.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = var("MEGAGATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("MEGAGATE_PORT") {
            self.server.port = port.parse().map_err(|_| {
                GateError::Config(format!("MEGAGATE_PORT is not a port number: {port}"))
            })?;
        }
        if let Some(email) = var("MEGAGATE_MEGA_EMAIL") {
            self.mega.email = email;
        }
        if let Some(password) = var("MEGAGATE_MEGA_PASSWORD") {
            self.mega.password = password;
        }
        if let Some(dir) = var("MEGAGATE_MEGA_COMMAND_DIR") {
            self.mega.command_dir = Some(dir);
        }
        if let Some(secret) = var("MEGAGATE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(username) = var("MEGAGATE_LOGIN_USERNAME") {
            self.auth.username = username;
        }
        if let Some(password) = var("MEGAGATE_LOGIN_PASSWORD") {
            self.auth.password = password;
        }
        if let Some(folder) = var("MEGAGATE_UPLOAD_FOLDER") {
            self.upload.staging_path = folder;
        }
        if let Some(level) = var("MEGAGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the JWT secret, the login pair or the MEGA
    /// e-mail is missing.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(GateError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via MEGAGATE_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.auth.username.is_empty() || self.auth.password.is_empty() {
            return Err(GateError::Config(
                "login username/password are not set. \
                 Set them in config.toml or via MEGAGATE_LOGIN_USERNAME / MEGAGATE_LOGIN_PASSWORD."
                    .to_string(),
            ));
        }
        if self.mega.email.is_empty() {
            return Err(GateError::Config(
                "MEGA account e-mail is not set. \
                 Set it in config.toml or via MEGAGATE_MEGA_EMAIL."
                    .to_string(),
            ));
        }
        Ok(())
    }
}
