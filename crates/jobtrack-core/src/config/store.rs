//! File-backed configuration store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::AppConfig;
use crate::{Error, Result};

/// Holds the current configuration and persists updates to a JSON file.
///
/// Readers get an immutable [`Arc<AppConfig>`] snapshot, so a concurrent
/// update never changes a configuration that is already in use.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<AppConfig>>,
}

impl ConfigStore {
    /// Opens the store at `path`.
    ///
    /// A missing or unreadable file yields the defaults; the file is only
    /// written by [`ConfigStore::update`].
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_or_default(&path);
        Self {
            path,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative paths in the configuration resolve against.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// The current configuration.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AppConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Re-reads the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn reload(&self) -> Result<Arc<AppConfig>> {
        let config = Arc::new(read_file(&self.path)?.unwrap_or_default());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&config);
        debug!(path = %self.path.display(), "Reloaded configuration");
        Ok(config)
    }

    /// Merges `patch` section by section and persists the result.
    ///
    /// The file is replaced atomically; the in-memory snapshot only changes
    /// once the write succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a malformed patch, or an I/O error
    /// if the file cannot be written.
    pub fn update(&self, patch: &Value) -> Result<Arc<AppConfig>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let merged = current.merged(patch)?;
        write_atomic(&self.path, &merged)?;
        let merged = Arc::new(merged);
        *current = Arc::clone(&merged);
        info!(path = %self.path.display(), "Saved configuration");
        Ok(merged)
    }
}

fn read_file(path: &Path) -> Result<Option<AppConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    Ok(Some(config))
}

fn load_or_default(path: &Path) -> AppConfig {
    match read_file(path) {
        Ok(Some(config)) => {
            debug!(path = %path.display(), "Loaded configuration");
            config
        }
        Ok(None) => {
            warn!(path = %path.display(), "Configuration file not found, using defaults");
            AppConfig::default()
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration, using defaults");
            AppConfig::default()
        }
    }
}

fn write_atomic(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
