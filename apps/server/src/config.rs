//! # Server Configuration
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`STOCKYARD_*`)
//! 2. Config file (`stockyard.toml`, explicit path or platform config dir)
//! 3. Defaults (this file)
//!
//! ## File Layout
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! cors_origins = ["http://localhost:5173"]
//!
//! [database]
//! path = "./stockyard.db"
//! max_connections = 5
//!
//! [auth]
//! jwt_secret = "..."
//! ```
//!
//! Configuration is read-only after startup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Secret used when none is configured. Rejected outside debug builds.
const DEV_JWT_SECRET: &str = "stockyard-dev-secret-change-in-production";

const CONFIG_FILE: &str = "stockyard.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpSection,
    pub database: DatabaseSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Listen address.
    pub bind: String,
    /// Allowed browser origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        HttpSection {
            bind: "127.0.0.1:8080".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to the platform data dir.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// HS256 secret shared with the token issuer.
    pub jwt_secret: String,
    /// Accepted clock skew in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        AuthSection {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            leeway_secs: 30,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Could not determine the platform data directory")]
    NoDataDir,
}

impl ServerConfig {
    /// Loads the file (if any), applies `STOCKYARD_*` overrides and
    /// validates the result.
    ///
    /// An explicit `path` must exist. Without one, the platform config
    /// dir is tried and a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match project_dirs().map(|d| d.config_dir().join(CONFIG_FILE)) {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => ServerConfig::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading config file");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies overrides from `lookup`, normally the process environment.
    ///
    /// ## Environment Variables
    /// - `STOCKYARD_BIND`: listen address
    /// - `STOCKYARD_DB_PATH`: SQLite file
    /// - `STOCKYARD_DB_MAX_CONNECTIONS`: pool size
    /// - `STOCKYARD_JWT_SECRET`: token secret
    /// - `STOCKYARD_CORS_ORIGINS`: comma-separated origins
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(bind) = lookup("STOCKYARD_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = lookup("STOCKYARD_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(max) = lookup("STOCKYARD_DB_MAX_CONNECTIONS") {
            self.database.max_connections = max
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKYARD_DB_MAX_CONNECTIONS".to_string()))?;
        }
        if let Some(secret) = lookup("STOCKYARD_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(origins) = lookup("STOCKYARD_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".to_string()));
        }

        if self.auth.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue("auth.jwt_secret".to_string()));
        }
        if self.auth.jwt_secret == DEV_JWT_SECRET {
            if cfg!(debug_assertions) {
                warn!("Using the development JWT secret; set STOCKYARD_JWT_SECRET in production");
            } else {
                return Err(ConfigError::InvalidValue("auth.jwt_secret".to_string()));
            }
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind".to_string()))
    }

    /// Configured database file, or `stockyard.db` in the platform data dir.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/com.stockyard.server/`
    /// - **Windows**: `%APPDATA%\stockyard\server\data\`
    /// - **Linux**: `~/.local/share/server/`
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = project_dirs().ok_or(ConfigError::NoDataDir)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|source| ConfigError::Read {
            path: data_dir.to_path_buf(),
            source,
        })?;
        Ok(data_dir.join("stockyard.db"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "stockyard", "server")
}
