use crate::model::{FieldsPatch, NewNote, Note, Position};
use crate::sync::{MemoryStore, NoteStore, SyncError, SyncResult};
use chrono::{DateTime, FixedOffset, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("could not locate a data directory")]
    NoDataDir,
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid note file {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct NoteFile {
    #[serde(default)]
    notes: Vec<Note>,
}

/// Offline backend of record: the whole note set in one YAML file, rewritten
/// after every successful mutation.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>, offset: FixedOffset) -> Result<Self, StorageError> {
        let path = path.into();
        let notes = if path.exists() {
            let data = fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            let file: NoteFile = serde_yaml::from_str(&data).map_err(|source| StorageError::Yaml {
                path: path.clone(),
                source,
            })?;
            file.notes
        } else {
            Vec::new()
        };
        let store = FileStore {
            path,
            inner: MemoryStore::with_notes(notes, offset),
        };
        if !store.path.exists() {
            store.save()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn notes(&self) -> &[Note] {
        self.inner.notes()
    }

    fn save(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = NoteFile {
            notes: self.inner.notes().to_vec(),
        };
        let serialized = serde_yaml::to_string(&file).map_err(|source| StorageError::Yaml {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, serialized).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn persist<T>(&self, value: T) -> SyncResult<T> {
        self.save()
            .map_err(|err| SyncError::Storage(err.to_string()))?;
        Ok(value)
    }
}

impl NoteStore for FileStore {
    fn list(&mut self) -> SyncResult<Vec<Note>> {
        self.inner.list()
    }

    fn get(&mut self, id: &str) -> SyncResult<Note> {
        self.inner.get(id)
    }

    fn create(&mut self, draft: &NewNote) -> SyncResult<Note> {
        let note = self.inner.create(draft)?;
        self.persist(note)
    }

    fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note> {
        let note = self.inner.patch_position(id, position)?;
        self.persist(note)
    }

    fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        let note = self.inner.patch_date(id, date)?;
        self.persist(note)
    }

    fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        let note = self.inner.patch_fields(id, patch)?;
        self.persist(note)
    }

    fn delete(&mut self, id: &str) -> SyncResult<()> {
        self.inner.delete(id)?;
        self.persist(())
    }
}

pub fn project_dirs() -> Result<ProjectDirs, StorageError> {
    ProjectDirs::from("", "", "notecanvas").ok_or(StorageError::NoDataDir)
}

pub fn default_board_path() -> Result<PathBuf, StorageError> {
    Ok(project_dirs()?.data_dir().join("notes.yml"))
}

pub fn default_log_dir() -> Result<PathBuf, StorageError> {
    Ok(project_dirs()?.data_dir().join("logs"))
}
