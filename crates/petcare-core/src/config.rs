//! Core runtime configuration.
//!
//! Resolved once at process startup and then passed into the services, so that
//! environment variables are never read during request handling.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub const BASE_URL_VAR: &str = "PETCARE_BASE_URL";
pub const DATABASE_PATH_VAR: &str = "PETCARE_DATABASE_PATH";
pub const FILES_DIR_VAR: &str = "PETCARE_FILES_DIR";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("base_url must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    base_url: String,
    database_path: PathBuf,
    files_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// A trailing `/` on `base_url` is dropped so extension URLs never contain `//`.
    pub fn new(
        base_url: impl Into<String>,
        database_path: PathBuf,
        files_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConfigError::Empty("base_url"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        if database_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("database_path"));
        }
        if files_dir.as_os_str().is_empty() {
            return Err(ConfigError::Empty("files_dir"));
        }

        Ok(Self {
            base_url,
            database_path,
            files_dir,
        })
    }

    /// Read `PETCARE_BASE_URL`, `PETCARE_DATABASE_PATH` and `PETCARE_FILES_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        Self::new(
            read(BASE_URL_VAR)?,
            PathBuf::from(read(DATABASE_PATH_VAR)?),
            PathBuf::from(read(FILES_DIR_VAR)?),
        )
    }

    /// Root of every published extension URL and stored-file URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }
}
