//! Configuration file handling.
//!
//! Looks for `.config/ddlsync.styx` in a directory or any of its parents. A
//! missing file is not an error for callers that use [`load_or_default`].

pub use ddlsync_config::Config;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = ".config/ddlsync.styx";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.config/ddlsync.styx` found in any parent directory
    #[error("no {CONFIG_FILE} found in current directory or any parent")]
    NotFound,

    /// The working directory is not valid UTF-8 or can't be read
    #[error("failed to determine current directory: {0}")]
    CurrentDir(String),

    /// I/O error reading the file
    #[error("failed to read {path}: {message}")]
    Io { path: Utf8PathBuf, message: String },

    /// Parse error in the Styx file
    #[error("failed to parse {path}: {message}")]
    Parse { path: Utf8PathBuf, message: String },
}

/// Load configuration from `.config/ddlsync.styx`, searching up from the
/// current directory.
pub fn load() -> Result<(Config, Utf8PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::CurrentDir(e.to_string()))?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|p| ConfigError::CurrentDir(format!("{} is not UTF-8", p.display())))?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Utf8Path) -> Result<(Config, Utf8PathBuf), ConfigError> {
    let path = find_config_file(start)?;
    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;
    let config = parse(&content).map_err(|message| ConfigError::Parse {
        path: path.clone(),
        message,
    })?;
    Ok((config, path))
}

/// Like [`load_from`], but falls back to the defaults when no file exists.
pub fn load_or_default(start: &Utf8Path) -> Result<Config, ConfigError> {
    match load_from(start) {
        Ok((config, path)) => {
            tracing::debug!(%path, "loaded configuration");
            Ok(config)
        }
        Err(ConfigError::NotFound) => Ok(Config::default()),
        Err(e) => Err(e),
    }
}

/// Parse the contents of a configuration file.
pub fn parse(content: &str) -> Result<Config, String> {
    facet_styx::from_str(content).map_err(|e| e.to_string())
}

fn find_config_file(start: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A temp dir holding `.config/ddlsync.styx` with `content`.
    fn project(content: &str) -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(root.join(CONFIG_FILE), content).unwrap();
        (dir, root)
    }

    #[test]
    fn test_finds_config_in_parent() {
        let (_dir, root) = project("metadata_table shadow_meta\nprovision_attempts 3\n");
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = load_from(&nested).unwrap();
        assert_eq!(path, root.join(CONFIG_FILE));
        assert_eq!(config.metadata_table(), "shadow_meta");
        assert_eq!(config.provision_attempts(), 3);
        assert_eq!(config.provision_max_delay_ms, None);
    }

    #[test]
    fn test_parse_error_names_file() {
        let (_dir, root) = project("provision_attempts {{{");

        let err = load_or_default(&root).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("ddlsync.styx"));
    }
}
