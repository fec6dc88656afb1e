//! State file storage with XDG path support.
//!
//! Saved filters and computed memberships are persisted as pretty JSON at
//! `~/.local/share/sc/state.json` (or the platform equivalent).
//!
//! Both synchronous and asynchronous I/O methods are provided:
//! - `save()`, `load()` - synchronous, using `std::fs`
//! - `save_async()`, `load_async()` - asynchronous, using `tokio::fs`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definitions::SavedFilter;
use crate::membership::PersistedMembership;

/// Default state filename.
const STATE_FILENAME: &str = "state.json";

/// Application qualifier (for XDG paths).
const QUALIFIER: &str = "";

/// Application organization (for XDG paths).
const ORGANIZATION: &str = "";

/// Application name (for XDG paths).
const APPLICATION: &str = "sc";

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

/// Errors that can occur during state storage operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Failed to determine the XDG data directory.
    #[error("failed to determine data directory: no valid home directory found")]
    NoDataDir,

    /// I/O error during file read.
    #[error("failed to read state file '{path}': {source}")]
    ReadError {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error during file write.
    #[error("failed to write state file '{path}': {source}")]
    WriteError {
        /// The path that failed to write.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error during directory creation.
    #[error("failed to create data directory '{path}': {source}")]
    CreateDirError {
        /// The directory path that failed to create.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error during file delete.
    #[error("failed to delete state file '{path}': {source}")]
    DeleteError {
        /// The path that failed to delete.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file was written by a newer format.
    #[error("unsupported state file version {found} (expected at most {})", STATE_VERSION)]
    UnsupportedVersion {
        /// The version found in the file.
        found: u32,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for state store operations.
pub type Result<T> = std::result::Result<T, StateStoreError>;

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Format version.
    pub version: u32,

    /// When the state was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    /// Saved filters.
    #[serde(default)]
    pub filters: Vec<SavedFilter>,

    /// Computed memberships.
    #[serde(default)]
    pub memberships: Vec<PersistedMembership>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl PersistedState {
    /// Creates a state at the current format version.
    pub fn new(filters: Vec<SavedFilter>, memberships: Vec<PersistedMembership>) -> Self {
        Self {
            version: STATE_VERSION,
            saved_at: None,
            filters,
            memberships,
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        let state: PersistedState = serde_json::from_str(contents)?;
        if state.version > STATE_VERSION {
            return Err(StateStoreError::UnsupportedVersion {
                found: state.version,
            });
        }
        Ok(state)
    }

    fn render(&self) -> Result<String> {
        let stamped = PersistedState {
            saved_at: Some(Utc::now()),
            ..self.clone()
        };
        Ok(serde_json::to_string_pretty(&stamped)?)
    }
}

/// Persistent storage for engine state.
///
/// # Example
///
/// ```no_run
/// use collection_engine_rs::{PersistedState, StateStore};
///
/// let store = StateStore::new()?;
///
/// // Load existing state or start empty
/// let state = store.load_or_default()?;
///
/// // Save state to disk
/// store.save(&state)?;
/// # Ok::<(), collection_engine_rs::StateStoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StateStore {
    /// Path to the state file.
    path: PathBuf,
}

impl StateStore {
    /// Creates a store at the default XDG data path.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::NoDataDir` if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let path = Self::default_path()?;
        Ok(Self { path })
    }

    /// Creates a store at a custom path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the default XDG path for the state file.
    ///
    /// On Unix: `~/.local/share/sc/state.json`
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::NoDataDir` if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or(StateStoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join(STATE_FILENAME))
    }

    /// Returns the path to the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the state file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn read_error(&self, source: io::Error) -> StateStoreError {
        StateStoreError::ReadError {
            path: self.path.clone(),
            source,
        }
    }

    /// Loads the state from disk.
    ///
    /// # Errors
    ///
    /// - `ReadError` if the file cannot be read (including when it is missing).
    /// - `Json` if the file is not a valid state file.
    /// - `UnsupportedVersion` if the file was written by a newer format.
    pub fn load(&self) -> Result<PersistedState> {
        let contents = fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        PersistedState::parse(&contents)
    }

    /// Loads the state, returning an empty state if the file doesn't exist.
    pub fn load_or_default(&self) -> Result<PersistedState> {
        match self.load() {
            Ok(state) => Ok(state),
            Err(StateStoreError::ReadError { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Ok(PersistedState::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Saves the state atomically (temp file + rename).
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StateStoreError::CreateDirError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = state.render()?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, &json).map_err(|e| StateStoreError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| StateStoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Deletes the state file. A missing file is not an error.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateStoreError::DeleteError {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    // =========================================================================
    // Async I/O Methods
    // =========================================================================

    /// Async equivalent of [`load()`](Self::load).
    pub async fn load_async(&self) -> Result<PersistedState> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.read_error(e))?;
        PersistedState::parse(&contents)
    }

    /// Async equivalent of [`load_or_default()`](Self::load_or_default).
    pub async fn load_or_default_async(&self) -> Result<PersistedState> {
        match self.load_async().await {
            Ok(state) => Ok(state),
            Err(StateStoreError::ReadError { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Ok(PersistedState::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Async equivalent of [`save()`](Self::save).
    pub async fn save_async(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StateStoreError::CreateDirError {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let json = state.render()?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| StateStoreError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StateStoreError::WriteError {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Async equivalent of [`delete()`](Self::delete).
    pub async fn delete_async(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateStoreError::DeleteError {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_path_returns_xdg_path() {
        let path = StateStore::default_path().expect("should get default path");
        let path_str = path.to_string_lossy();
        assert!(
            path_str.ends_with("state.json") && path_str.contains("sc"),
            "path should contain sc and state.json: {}",
            path_str
        );
        assert!(path.is_absolute(), "path should be absolute: {:?}", path);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let store = StateStore::with_path(dir.path().join("state.json"));

        let state = store.load_or_default().unwrap();
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.filters.is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_stamps() {
        let dir = tempdir().unwrap();
        let store = StateStore::with_path(dir.path().join("nested").join("state.json"));

        store.save(&PersistedState::default()).unwrap();
        assert!(store.exists());
        assert!(!store.temp_path().exists());
        assert!(store.load().unwrap().saved_at.is_some());
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"version": 99}"#).unwrap();

        let err = StateStore::with_path(path).load().unwrap_err();
        assert!(matches!(
            err,
            StateStoreError::UnsupportedVersion { found: 99 }
        ));
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = StateStore::with_path(dir.path().join("state.json"));
        assert!(store.delete().is_ok());
    }
}
