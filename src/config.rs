//! Service configuration.
//!
//! Loaded from a TOML file; every section and field has a default except
//! `auth.jwt_secret`, which must be supplied by the file or by the
//! `BOOKSTORE_JWT_SECRET` environment variable.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:3000"
//!
//! [auth]
//! jwt_secret = "change-me-change-me"
//! token_ttl_secs = 3600
//! admin_emails = ["admin@example.com"]
//!
//! [catalog]
//! path = "catalog.json"
//!
//! [logging]
//! filter = "bookstore=info"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const ENV_JWT_SECRET: &str = "BOOKSTORE_JWT_SECRET";
pub const ENV_BIND_ADDRESS: &str = "BOOKSTORE_BIND_ADDRESS";

const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:3000".to_owned() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for access tokens.
    pub jwt_secret: String,

    /// Access-token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Accounts registered with one of these emails get the admin role.
    pub admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: 3600,
            admin_emails: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON array of books. Without it the catalogue starts empty.
    ///
    /// A relative path in a config file is resolved against that file's
    /// directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "bookstore=info".to_owned() }
    }
}

impl Config {
    /// Reads `path` (or starts from defaults), applies environment
    /// overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        let mut config: Self = toml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Anchors relative file paths at `base`.
    fn resolve_paths(&mut self, base: &Path) {
        if let Some(catalog) = self.catalog.path.as_mut().filter(|p| p.is_relative()) {
            *catalog = base.join(&*catalog);
        }
    }

    /// Overrides fields from environment variables looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(ENV_JWT_SECRET) {
            self.auth.jwt_secret = secret;
        }
        if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
            self.server.bind_address = addr;
        }
    }

    /// Reports every problem at once rather than the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            problems.push(format!("server.bind_address `{}` is not host:port", self.server.bind_address));
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            problems.push(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes (set it or {ENV_JWT_SECRET})"
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            problems.push("auth.token_ttl_secs must be positive".to_owned());
        }
        for email in self.auth.admin_emails.iter().filter(|e| !e.contains('@')) {
            problems.push(format!("auth.admin_emails entry `{email}` is not an email address"));
        }

        if problems.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(problems)) }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, crate::Error> {
        self.server.bind_address
            .parse()
            .map_err(|_| crate::Error::InvalidAddress(self.server.bind_address.clone()))
    }
}
