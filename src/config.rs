//! Application configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, a YAML
//! file, and `APP_*` environment variables (`APP_HTTP_PORT`,
//! `APP_DATABASE_PATH`, ...).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const ENV_PREFIX: &str = "APP_";

/// Files tried, in order, when no explicit config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["config.yaml", "config/config.yaml"];

const VALID_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/app.db"),
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".into(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Base file name for `output: file`; rotated daily next to this path.
    pub file: PathBuf,
    /// Rotated files kept on disk.
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            file: PathBuf::from("logs/app.log"),
            max_files: 7,
        }
    }
}

impl AppConfig {
    /// Load configuration for startup.
    ///
    /// An explicit `path` must exist. Without one, the default locations are
    /// tried and a missing file just means defaults. Returns the file that was
    /// used, if any, so it can be logged once logging is up.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>), AppError> {
        let source = match path {
            Some(p) => {
                if !p.is_file() {
                    return Err(AppError::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Some(p.to_path_buf())
            }
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_file()),
        };

        let mut config = match &source {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok((config, source))
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        // An empty file is valid and means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("failed to parse config: {e}")))
    }

    /// Apply `APP_<SECTION>_<KEY>` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        if let Some(v) = get("ENVIRONMENT") {
            self.environment = v;
        }

        if let Some(v) = get("DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("DATABASE_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = parse_env("DATABASE_BUSY_TIMEOUT_MS", &v)?;
        }

        if let Some(v) = get("CACHE_MAX_CAPACITY") {
            self.cache.max_capacity = parse_env("CACHE_MAX_CAPACITY", &v)?;
        }
        if let Some(v) = get("CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env("CACHE_TTL_SECS", &v)?;
        }

        if let Some(v) = get("HTTP_LISTEN") {
            self.http.listen = v;
        }
        if let Some(v) = get("HTTP_PORT") {
            self.http.port = parse_env("HTTP_PORT", &v)?;
        }
        if let Some(v) = get("HTTP_REQUEST_TIMEOUT_SECS") {
            self.http.request_timeout_secs = parse_env("HTTP_REQUEST_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = get("LOG_LEVEL") {
            self.log.level = v.to_lowercase();
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.log.format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(AppError::Config(format!(
                        "{ENV_PREFIX}LOG_FORMAT must be json or text, got '{other}'"
                    )))
                }
            };
        }
        if let Some(v) = get("LOG_OUTPUT") {
            self.log.output = match v.to_lowercase().as_str() {
                "stdout" => LogOutput::Stdout,
                "file" => LogOutput::File,
                other => {
                    return Err(AppError::Config(format!(
                        "{ENV_PREFIX}LOG_OUTPUT must be stdout or file, got '{other}'"
                    )))
                }
            };
        }
        if let Some(v) = get("LOG_FILE") {
            self.log.file = PathBuf::from(v);
        }
        if let Some(v) = get("LOG_MAX_FILES") {
            self.log.max_files = parse_env("LOG_MAX_FILES", &v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.http.port == 0 {
            return Err(AppError::Config("http.port cannot be 0".into()));
        }
        if self.http.listen.trim().is_empty() {
            return Err(AppError::Config("http.listen cannot be empty".into()));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(AppError::Config("database.path cannot be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.cache.max_capacity == 0 {
            return Err(AppError::Config(
                "cache.max_capacity must be at least 1".into(),
            ));
        }
        if !VALID_LEVELS.contains(&self.log.level.as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log.level,
                VALID_LEVELS.join(", ")
            )));
        }
        if self.log.output == LogOutput::File && self.log.file.as_os_str().is_empty() {
            return Err(AppError::Config(
                "log.file is required when log.output is file".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value.trim().parse().map_err(|_| {
        AppError::Config(format!("{ENV_PREFIX}{key} has an invalid value '{value}'"))
    })
}
