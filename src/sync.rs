//! The only path to the backend of record.
//!
//! [`NoteStore`] is the raw backend (HTTP, YAML file, memory). [`SyncClient`]
//! wraps it so every failure is logged once and reaches callers as a typed
//! [`SyncError`], never as a panic or a transport-specific error.

use crate::layout::{ColumnOccupancy, DateColumnMap, ROW_HEIGHT};
use crate::model::{FieldsPatch, NewNote, Note, NoteId, Position};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use log::{debug, warn};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("could not decode backend response: {0}")]
    Decode(String),
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Backend of record operations, one call each, no batching.
pub trait NoteStore {
    fn list(&mut self) -> SyncResult<Vec<Note>>;
    fn get(&mut self, id: &str) -> SyncResult<Note>;
    fn create(&mut self, draft: &NewNote) -> SyncResult<Note>;
    fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note>;
    fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note>;
    fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note>;
    fn delete(&mut self, id: &str) -> SyncResult<()>;
}

impl<S: NoteStore + ?Sized> NoteStore for Box<S> {
    fn list(&mut self) -> SyncResult<Vec<Note>> {
        (**self).list()
    }

    fn get(&mut self, id: &str) -> SyncResult<Note> {
        (**self).get(id)
    }

    fn create(&mut self, draft: &NewNote) -> SyncResult<Note> {
        (**self).create(draft)
    }

    fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note> {
        (**self).patch_position(id, position)
    }

    fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        (**self).patch_date(id, date)
    }

    fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        (**self).patch_fields(id, patch)
    }

    fn delete(&mut self, id: &str) -> SyncResult<()> {
        (**self).delete(id)
    }
}

/// Notes plus the column map derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteListing {
    pub notes: Vec<Note>,
    pub columns: DateColumnMap,
}

pub struct SyncClient<S: NoteStore> {
    store: S,
}

impl<S: NoteStore> SyncClient<S> {
    pub fn new(store: S) -> Self {
        SyncClient { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn list_notes(
        &mut self,
        today: NaiveDate,
        offset: &FixedOffset,
    ) -> SyncResult<NoteListing> {
        let notes = self.store.list().map_err(|err| failed("list", "-", err))?;
        let columns = DateColumnMap::from_notes(&notes, today, offset);
        debug!(
            "event=notes_listed module=sync status=ok notes={} columns={}",
            notes.len(),
            columns.len()
        );
        Ok(NoteListing { notes, columns })
    }

    pub fn get_note(&mut self, id: &str) -> SyncResult<Note> {
        self.store.get(id).map_err(|err| failed("get", id, err))
    }

    pub fn create_note(&mut self, draft: &NewNote) -> SyncResult<Note> {
        let note = self
            .store
            .create(draft)
            .map_err(|err| failed("create", "-", err))?;
        debug!("event=note_created module=sync status=ok note_id={}", note.id);
        Ok(note)
    }

    pub fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note> {
        self.store
            .patch_position(id, position)
            .map_err(|err| failed("patch_position", id, err))
    }

    pub fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        self.store
            .patch_date(id, date)
            .map_err(|err| failed("patch_date", id, err))
    }

    pub fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        self.store
            .patch_fields(id, patch)
            .map_err(|err| failed("patch_fields", id, err))
    }

    pub fn delete_note(&mut self, id: &str) -> SyncResult<()> {
        self.store
            .delete(id)
            .map_err(|err| failed("delete", id, err))?;
        debug!("event=note_deleted module=sync status=ok note_id={}", id);
        Ok(())
    }
}

fn failed(op: &str, id: &str, err: SyncError) -> SyncError {
    warn!(
        "event=sync_failed module=sync op={} note_id={} status=error error={}",
        op, id, err
    );
    err
}

/// In-process backend with the same semantics as the REST server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(skip, default = "utc_offset")]
    offset: FixedOffset,
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            notes: Vec::new(),
            offset: utc_offset(),
        }
    }
}

impl MemoryStore {
    pub fn new(offset: FixedOffset) -> Self {
        MemoryStore {
            notes: Vec::new(),
            offset,
        }
    }

    pub fn with_notes(notes: Vec<Note>, offset: FixedOffset) -> Self {
        MemoryStore { notes, offset }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    fn find_mut(&mut self, id: &str) -> SyncResult<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    /// Server-side row for a note that is not manually positioned: its hour
    /// band, pushed below other notes of the same date.
    fn free_y_for(&self, id: &str, date: DateTime<Utc>) -> f64 {
        let day = date.with_timezone(&self.offset).date_naive();
        let mut occupancy = ColumnOccupancy::default();
        for other in &self.notes {
            if other.id != id
                && !other.manually_positioned
                && other.local_date(&self.offset) == day
            {
                occupancy.reserve(other.y, ROW_HEIGHT);
            }
        }
        let hour = date.with_timezone(&self.offset).hour();
        occupancy.claim(crate::layout::preferred_y(hour), ROW_HEIGHT)
    }

    fn next_id(&self) -> NoteId {
        loop {
            let id: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect();
            if !self.notes.iter().any(|n| n.id == id) {
                return id;
            }
        }
    }
}

impl NoteStore for MemoryStore {
    fn list(&mut self) -> SyncResult<Vec<Note>> {
        Ok(self.notes.clone())
    }

    fn get(&mut self, id: &str) -> SyncResult<Note> {
        self.notes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    fn create(&mut self, draft: &NewNote) -> SyncResult<Note> {
        let id = self.next_id();
        let manually_positioned = draft.manually_positioned.unwrap_or(false);
        let y = if manually_positioned {
            draft.y.unwrap_or_default()
        } else {
            self.free_y_for(&id, draft.date)
        };
        let note = Note {
            id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            kind: draft.kind,
            date: draft.date,
            x: draft.x.unwrap_or_default(),
            y,
            manually_positioned,
            tags: crate::model::union_tags(&draft.tags, &[]),
            ai_suggested_tags: Vec::new(),
            voice_duration: None,
        };
        self.notes.push(note.clone());
        Ok(note)
    }

    fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note> {
        let note = self.find_mut(id)?;
        note.x = position.x;
        note.y = position.y;
        note.manually_positioned = true;
        Ok(note.clone())
    }

    fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        let manual = self.find_mut(id)?.manually_positioned;
        let y = if manual { None } else { Some(self.free_y_for(id, date)) };
        let note = self.find_mut(id)?;
        note.date = date;
        if let Some(y) = y {
            note.y = y;
        }
        Ok(note.clone())
    }

    fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        let note = self.find_mut(id)?;
        if let Some(title) = &patch.title {
            note.title = title.clone();
        }
        if let Some(content) = &patch.content {
            note.content = content.clone();
        }
        Ok(note.clone())
    }

    fn delete(&mut self, id: &str) -> SyncResult<()> {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() == before {
            return Err(SyncError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
