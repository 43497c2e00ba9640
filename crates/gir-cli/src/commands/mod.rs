//! Subcommand implementations

pub mod dump;
pub mod find;
pub mod verify;

use anyhow::Context;
use gir_repository::RepositoryConfig;
use std::path::{Path, PathBuf};

/// Configuration from `file` (or the environment), with `paths` searched first
pub fn load_config(file: Option<&Path>, paths: &[PathBuf]) -> anyhow::Result<RepositoryConfig> {
    let mut config = match file {
        Some(file) => RepositoryConfig::from_file(file)
            .with_context(|| format!("Failed to load {}", file.display()))?,
        None => RepositoryConfig::from_env(),
    };
    for path in paths.iter().rev() {
        config = config.with_search_path(path);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_keep_command_line_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("gir.toml");
        std::fs::write(&file, "search_paths = [\"/opt/gir\"]\n").unwrap();

        let paths = vec![PathBuf::from("first"), PathBuf::from("second")];
        let config = load_config(Some(&file), &paths).unwrap();
        assert_eq!(
            config.search_paths,
            vec![
                PathBuf::from("first"),
                PathBuf::from("second"),
                PathBuf::from("/opt/gir")
            ]
        );
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(Path::new("/nonexistent/gir.toml")), &[]).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gir.toml"));
    }
}
