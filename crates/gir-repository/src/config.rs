//! Repository configuration
//!
//! Search paths and load behavior, read from TOML or from the
//! `GI_TYPELIB_PATH` environment variable.

use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding extra typelib directories
pub const TYPELIB_PATH_VAR: &str = "GI_TYPELIB_PATH";

/// Conventional system typelib directories, searched last
pub const SYSTEM_SEARCH_PATHS: &[&str] = &[
    "/usr/lib/girepository-1.0",
    "/usr/local/lib/girepository-1.0",
];

/// Errors that can occur while reading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How a [`crate::Repository`] finds and loads typelibs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Directories searched in order by `require`
    pub search_paths: Vec<PathBuf>,

    /// Run the structural verifier on every loaded typelib
    pub verify_on_load: bool,

    /// Load the typelibs a typelib declares as dependencies
    pub load_dependencies: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            verify_on_load: true,
            load_dependencies: true,
        }
    }
}

impl RepositoryConfig {
    /// Parse a configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `GI_TYPELIB_PATH` entries followed by the system directories
    pub fn from_env() -> Self {
        Self::from_path_var(std::env::var_os(TYPELIB_PATH_VAR).as_deref())
    }

    /// Same as [`Self::from_env`] with an explicit variable value
    pub fn from_path_var(value: Option<&OsStr>) -> Self {
        let mut config = Self::default();
        if let Some(value) = value {
            config.search_paths.extend(
                std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()),
            );
        }
        config
            .search_paths
            .extend(SYSTEM_SEARCH_PATHS.iter().map(PathBuf::from));
        config
    }

    /// Put `path` in front of the search order
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.insert(0, path.into());
        self
    }
}
