//! Module repository
//!
//! Holds every loaded typelib by namespace, finds typelib files on the
//! configured search path, loads declared dependencies and serves as the
//! [`ModuleRegistry`] for cross-module directory entries. A repository is an
//! ordinary value: create as many as needed, there is no process-wide one.

use crate::config::RepositoryConfig;
use crate::info::{BaseInfo, InfoType, RegisteredType, RegisteredTypeInfo};
use crate::loader::{LibrarySet, LoadError};
use crate::resolve::{resolve_entry, ModuleRegistry};
use crate::InfoError;
use gir_typelib::{verify_typelib, ReadError, Typelib, TypelibError, VerifyError};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// File extension of typelib files
pub const TYPELIB_EXTENSION: &str = "typelib";

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Malformed typelib or unreadable file
    #[error(transparent)]
    Typelib(#[from] TypelibError),

    /// Typelib failed structural verification
    #[error("Typelib for {namespace} failed verification: {source}")]
    Verify {
        /// Namespace of the rejected typelib
        namespace: String,
        /// Verifier error
        source: VerifyError,
    },

    /// Navigation error
    #[error(transparent)]
    Info(#[from] InfoError),

    /// Shared library error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Out-of-bounds or malformed read
    #[error(transparent)]
    Read(#[from] ReadError),

    /// No typelib file for the namespace on the search path
    #[error("Typelib file for namespace '{namespace}'{} not found", version_suffix(.version))]
    NotFound {
        /// Requested namespace
        namespace: String,
        /// Requested version, if any
        version: Option<String>,
    },

    /// Namespace already loaded with another version
    #[error("Requiring namespace '{namespace}' version '{requested}', but '{loaded}' is already loaded")]
    VersionConflict {
        /// Namespace
        namespace: String,
        /// Version asked for
        requested: String,
        /// Version already loaded
        loaded: String,
    },

    /// Namespace not loaded
    #[error("Namespace '{0}' is not loaded")]
    NotLoaded(String),

    /// Namespace declares no shared library
    #[error("Namespace '{0}' has no shared library")]
    NoSharedLibrary(String),
}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_ref()
        .map(|v| format!(" with version '{}'", v))
        .unwrap_or_default()
}

/// Registry of loaded typelibs
#[derive(Debug, Default)]
pub struct Repository {
    config: RwLock<RepositoryConfig>,
    typelibs: RwLock<FxHashMap<String, Typelib>>,
    libraries: RwLock<FxHashMap<String, Arc<LibrarySet>>>,
}

impl Repository {
    /// Empty repository with the default configuration (no search path)
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty repository with the given configuration
    pub fn with_config(config: RepositoryConfig) -> Self {
        Repository {
            config: RwLock::new(config),
            ..Default::default()
        }
    }

    /// Put `path` in front of the search order
    pub fn prepend_search_path(&self, path: impl Into<PathBuf>) {
        self.config.write().search_paths.insert(0, path.into());
    }

    /// Current search order
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.config.read().search_paths.clone()
    }

    // ===== Loading =====

    /// Register `typelib` and, if configured, its dependencies
    ///
    /// Loading the same namespace and version again is a no-op returning the
    /// typelib already registered.
    pub fn load_typelib(&self, typelib: Typelib) -> Result<Typelib, RepositoryError> {
        self.load_with_stack(typelib, &mut Vec::new())
    }

    /// Load a typelib file and register it
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Typelib, RepositoryError> {
        let typelib = Typelib::from_file(path)?;
        self.load_typelib(typelib)
    }

    /// Load `namespace` from the search path unless already loaded
    ///
    /// Without a version the highest version found on the search path wins.
    pub fn require(
        &self,
        namespace: &str,
        version: Option<&str>,
    ) -> Result<Typelib, RepositoryError> {
        self.require_with_stack(namespace, version, &mut Vec::new())
    }

    fn require_with_stack(
        &self,
        namespace: &str,
        version: Option<&str>,
        stack: &mut Vec<String>,
    ) -> Result<Typelib, RepositoryError> {
        if let Some(loaded) = self.typelib(namespace) {
            return match version {
                Some(requested) if requested != loaded.nsversion() => {
                    Err(RepositoryError::VersionConflict {
                        namespace: namespace.to_string(),
                        requested: requested.to_string(),
                        loaded: loaded.nsversion().to_string(),
                    })
                }
                _ => Ok(loaded),
            };
        }

        let path = self
            .locate(namespace, version)
            .ok_or_else(|| RepositoryError::NotFound {
                namespace: namespace.to_string(),
                version: version.map(str::to_string),
            })?;
        debug!(%namespace, path = %path.display(), "Loading typelib");

        let typelib = Typelib::from_file(&path)?;
        if typelib.namespace() != namespace {
            return Err(RepositoryError::NotFound {
                namespace: namespace.to_string(),
                version: version.map(str::to_string),
            });
        }
        self.load_with_stack(typelib, stack)
    }

    fn load_with_stack(
        &self,
        typelib: Typelib,
        stack: &mut Vec<String>,
    ) -> Result<Typelib, RepositoryError> {
        let namespace = typelib.namespace().to_string();
        if let Some(loaded) = self.typelib(&namespace) {
            if loaded.nsversion() != typelib.nsversion() {
                return Err(RepositoryError::VersionConflict {
                    namespace,
                    requested: typelib.nsversion().to_string(),
                    loaded: loaded.nsversion().to_string(),
                });
            }
            return Ok(loaded);
        }

        let (verify, load_dependencies) = {
            let config = self.config.read();
            (config.verify_on_load, config.load_dependencies)
        };
        if verify {
            verify_typelib(&typelib).map_err(|source| RepositoryError::Verify {
                namespace: namespace.clone(),
                source,
            })?;
        }

        if load_dependencies {
            stack.push(namespace.clone());
            for dependency in typelib.dependencies()? {
                let Some((dep_namespace, dep_version)) = dependency.rsplit_once('-') else {
                    warn!(%namespace, %dependency, "Malformed dependency");
                    continue;
                };
                if stack.iter().any(|ns| ns == dep_namespace) {
                    continue;
                }
                if let Err(error) = self.require_with_stack(dep_namespace, Some(dep_version), stack)
                {
                    warn!(%namespace, %dependency, %error, "Failed to load dependency");
                }
            }
            stack.pop();
        }

        let mut typelibs = self.typelibs.write();
        let loaded = typelibs
            .entry(namespace.clone())
            .or_insert_with(|| typelib.clone())
            .clone();
        debug!(%namespace, version = %loaded.nsversion(), "Typelib loaded");
        Ok(loaded)
    }

    fn locate(&self, namespace: &str, version: Option<&str>) -> Option<PathBuf> {
        let config = self.config.read();
        for dir in &config.search_paths {
            match version {
                Some(version) => {
                    let path = dir.join(format!("{}-{}.{}", namespace, version, TYPELIB_EXTENSION));
                    if path.is_file() {
                        return Some(path);
                    }
                }
                None => {
                    if let Some(path) = latest_in_dir(dir, namespace) {
                        return Some(path);
                    }
                }
            }
            debug!(%namespace, dir = %dir.display(), "Typelib not in search directory");
        }
        None
    }

    // ===== Queries =====

    /// Whether `namespace` is loaded, optionally at `version`
    pub fn is_registered(&self, namespace: &str, version: Option<&str>) -> bool {
        self.typelibs
            .read()
            .get(namespace)
            .is_some_and(|t| version.map_or(true, |v| t.nsversion() == v))
    }

    /// Namespaces currently loaded, sorted
    pub fn loaded_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.typelibs.read().keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    /// Typelib of a loaded namespace
    pub fn typelib(&self, namespace: &str) -> Option<Typelib> {
        self.typelibs.read().get(namespace).cloned()
    }

    fn loaded(&self, namespace: &str) -> Result<Typelib, RepositoryError> {
        self.typelib(namespace)
            .ok_or_else(|| RepositoryError::NotLoaded(namespace.to_string()))
    }

    /// Loaded version of `namespace`
    pub fn version(&self, namespace: &str) -> Result<String, RepositoryError> {
        Ok(self.loaded(namespace)?.nsversion().to_string())
    }

    /// `Namespace-Version` dependencies declared by `namespace`
    pub fn dependencies(&self, namespace: &str) -> Result<Vec<String>, RepositoryError> {
        let typelib = self.loaded(namespace)?;
        let dependencies = typelib.dependencies()?;
        Ok(dependencies.into_iter().map(str::to_string).collect())
    }

    /// Comma-separated shared libraries implementing `namespace`
    pub fn shared_library(&self, namespace: &str) -> Result<Option<String>, RepositoryError> {
        let typelib = self.loaded(namespace)?;
        let library = typelib.shared_library()?;
        Ok(library.map(str::to_string))
    }

    /// Number of entities defined by `namespace`
    pub fn n_infos(&self, namespace: &str) -> Result<u16, RepositoryError> {
        Ok(self.loaded(namespace)?.n_local_entries())
    }

    /// Entity `index` (0-based) of `namespace`
    pub fn info(&self, namespace: &str, index: u16) -> Result<BaseInfo, RepositoryError> {
        let typelib = self.loaded(namespace)?;
        let count = typelib.n_local_entries();
        if index >= count {
            return Err(InfoError::IndexOutOfRange {
                what: "infos",
                index: u32::from(index),
                count: u32::from(count),
            }
            .into());
        }
        Ok(resolve_entry(self, &typelib, index + 1)?)
    }

    /// Entity of `namespace` named `name`
    pub fn find_by_name(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BaseInfo>, RepositoryError> {
        let typelib = self.loaded(namespace)?;
        match typelib.find_entry(name)? {
            Some(entry) => Ok(Some(resolve_entry(self, &typelib, entry.index)?)),
            None => Ok(None),
        }
    }

    /// Registered type named `type_name` in any loaded namespace
    pub fn find_by_type_name(&self, type_name: &str) -> Result<Option<BaseInfo>, RepositoryError> {
        for namespace in self.loaded_namespaces() {
            let typelib = self.loaded(&namespace)?;
            for index in 1..=typelib.n_local_entries() {
                let entry = typelib.dir_entry(index)?;
                if !entry.blob_type.is_registered_type() {
                    continue;
                }
                let info = BaseInfo::new(
                    InfoType::from_blob_type(entry.blob_type),
                    None,
                    typelib.clone(),
                    entry.offset,
                );
                let registered = RegisteredTypeInfo::try_from(info)?;
                if registered.type_name()? == Some(type_name) {
                    return Ok(Some(registered.into_base()));
                }
            }
        }
        Ok(None)
    }

    // ===== Shared libraries =====

    /// Open the shared libraries of `namespace`, once
    pub fn load_library(&self, namespace: &str) -> Result<Arc<LibrarySet>, RepositoryError> {
        if let Some(libraries) = self.libraries.read().get(namespace) {
            return Ok(libraries.clone());
        }

        let names = self
            .shared_library(namespace)?
            .ok_or_else(|| RepositoryError::NoSharedLibrary(namespace.to_string()))?;
        let libraries = Arc::new(LibrarySet::open(names.split(',').map(str::trim))?);
        debug!(%namespace, libraries = %names, "Shared libraries opened");

        let mut cache = self.libraries.write();
        Ok(cache
            .entry(namespace.to_string())
            .or_insert(libraries)
            .clone())
    }
}

impl ModuleRegistry for Repository {
    fn lookup(&self, namespace: &str, name: &str) -> Option<BaseInfo> {
        let typelib = self.typelib(namespace)?;
        let entry = typelib.find_entry(name).ok()??;
        Some(BaseInfo::new(
            InfoType::from_blob_type(entry.blob_type),
            None,
            typelib,
            entry.offset,
        ))
    }
}

/// Highest-versioned `{namespace}-*.typelib` in `dir`
fn latest_in_dir(dir: &Path, namespace: &str) -> Option<PathBuf> {
    let prefix = format!("{}-", namespace);
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension()? != TYPELIB_EXTENSION {
                return None;
            }
            let version = path.file_stem()?.to_str()?.strip_prefix(&prefix)?.to_string();
            Some((version_key(&version), path))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

/// Numeric ordering key of a dotted version
fn version_key(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_key_orders_numerically() {
        assert!(version_key("3.10") > version_key("3.9"));
        assert!(version_key("2.0") > version_key("1.99"));
        assert_eq!(version_key("1.x"), vec![1, 0]);
    }

    #[test]
    fn test_not_loaded() {
        let repo = Repository::new();
        assert!(matches!(repo.n_infos("Gtk"), Err(RepositoryError::NotLoaded(_))));
        assert!(repo.lookup("Gtk", "Widget").is_none());
        assert!(repo.loaded_namespaces().is_empty());
    }

    #[test]
    fn test_not_found_message() {
        let repo = Repository::new();
        let err = repo.require("Gtk", Some("3.0")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Typelib file for namespace 'Gtk' with version '3.0' not found"
        );
        let err = repo.require("Gtk", None).unwrap_err();
        assert_eq!(err.to_string(), "Typelib file for namespace 'Gtk' not found");
    }
}
