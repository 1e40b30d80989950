use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

use crate::app_state::{AppState, AppStateError};
use crate::profiles::{default_config_dir, ProfilesError};

pub const SAVED_QUERIES_DIR_NAME: &str = "saved_queries";
const SNAPSHOT_EXTENSION: &str = "json";
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum SavedQueriesError {
    #[error("config directory is unavailable: {0}")]
    ConfigDir(#[source] ProfilesError),
    #[error("failed to create saved queries directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list saved queries in {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read saved query at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse saved query at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: AppStateError,
    },
    #[error("failed to serialize saved query: {0}")]
    Serialize(#[source] AppStateError),
    #[error("failed to write saved query at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid saved query name `{name}`")]
    InvalidName { name: String },
}

/// Directory of pretty-printed session snapshots, one JSON file each.
#[derive(Debug, Clone)]
pub struct SavedQueryStore {
    dir: PathBuf,
}

impl SavedQueryStore {
    pub fn open_default() -> Result<Self, SavedQueriesError> {
        let dir = default_config_dir()
            .map_err(SavedQueriesError::ConfigDir)?
            .join(SAVED_QUERIES_DIR_NAME);
        Ok(Self::new(dir))
    }

    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file names, sorted. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>, SavedQueriesError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| SavedQueriesError::List {
            path: self.dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SavedQueriesError::List {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_snapshot = path.is_file()
                && path
                    .extension()
                    .is_some_and(|extension| extension == SNAPSHOT_EXTENSION);
            if !is_snapshot {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Saves under `name`, appending `.json` when missing. Returns the written path.
    pub fn save(&self, name: &str, state: &AppState) -> Result<PathBuf, SavedQueriesError> {
        let path = self.path_for(name)?;
        self.save_to_path(&path, state)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path, state: &AppState) -> Result<(), SavedQueriesError> {
        if let Some(parent_dir) = path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SavedQueriesError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let rendered = state
            .to_json_pretty()
            .map_err(SavedQueriesError::Serialize)?;
        fs::write(path, rendered).map_err(|source| SavedQueriesError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "saved query configuration");
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<AppState, SavedQueriesError> {
        let path = self.path_for(name)?;
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<AppState, SavedQueriesError> {
        let raw = fs::read_to_string(path).map_err(|source| SavedQueriesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        AppState::from_json(&raw).map_err(|source| SavedQueriesError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, SavedQueriesError> {
        let trimmed = name.trim();
        let is_plain_file_name = !trimmed.is_empty()
            && !trimmed.contains(['/', '\\'])
            && trimmed != "."
            && trimmed != "..";
        if !is_plain_file_name {
            return Err(SavedQueriesError::InvalidName {
                name: name.to_string(),
            });
        }

        let suffix = format!(".{SNAPSHOT_EXTENSION}");
        let file_name = if trimmed.ends_with(&suffix) {
            trimmed.to_string()
        } else {
            format!("{trimmed}{suffix}")
        };
        Ok(self.dir.join(file_name))
    }
}

/// `<table>_<stamp>.json`, or `query_save_<stamp>.json` without a table.
#[must_use]
pub fn default_file_name(state: &AppState, now: NaiveDateTime) -> String {
    let stamp = now.format(FILE_STAMP_FORMAT);
    match state.table.as_deref().filter(|table| !table.is_empty()) {
        Some(table) => format!("{table}_{stamp}.{SNAPSHOT_EXTENSION}"),
        None => format!("query_save_{stamp}.{SNAPSHOT_EXTENSION}"),
    }
}
