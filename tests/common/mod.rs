#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use notecanvas::board::BoardController;
use notecanvas::canvas::MemoryCanvas;
use notecanvas::model::{FieldsPatch, NewNote, Note, NoteType, Position};
use notecanvas::sync::{MemoryStore, NoteStore, SyncClient, SyncError, SyncResult};

pub type TestBoard = BoardController<MemoryCanvas, FlakyStore>;

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub id: Option<String>,
}

/// Memory backend that records every call and fails the ones it is told to.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    calls: Vec<Call>,
    failures: Vec<(&'static str, Option<String>)>,
}

impl FlakyStore {
    pub fn new(notes: Vec<Note>) -> Self {
        FlakyStore {
            inner: MemoryStore::with_notes(notes, utc()),
            calls: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Fails every later `op` call, or only the ones naming `id`.
    pub fn fail(&mut self, op: &'static str, id: Option<&str>) {
        self.failures.push((op, id.map(str::to_string)));
    }

    pub fn heal(&mut self) {
        self.failures.clear();
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn notes(&self) -> &[Note] {
        self.inner.notes()
    }

    pub fn find(&self, id: &str) -> Option<&Note> {
        self.inner.notes().iter().find(|n| n.id == id)
    }

    fn enter(&mut self, op: &'static str, id: Option<&str>) -> SyncResult<()> {
        self.calls.push(Call {
            op,
            id: id.map(str::to_string),
        });
        let failing = self
            .failures
            .iter()
            .any(|(f_op, f_id)| *f_op == op && (f_id.is_none() || f_id.as_deref() == id));
        if failing {
            return Err(SyncError::Status {
                code: 503,
                body: format!("{op} unavailable"),
            });
        }
        Ok(())
    }
}

impl NoteStore for FlakyStore {
    fn list(&mut self) -> SyncResult<Vec<Note>> {
        self.enter("list", None)?;
        self.inner.list()
    }

    fn get(&mut self, id: &str) -> SyncResult<Note> {
        self.enter("get", Some(id))?;
        self.inner.get(id)
    }

    fn create(&mut self, draft: &NewNote) -> SyncResult<Note> {
        self.enter("create", None)?;
        self.inner.create(draft)
    }

    fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note> {
        self.enter("patch_position", Some(id))?;
        self.inner.patch_position(id, position)
    }

    fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        self.enter("patch_date", Some(id))?;
        self.inner.patch_date(id, date)
    }

    fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        self.enter("patch_fields", Some(id))?;
        self.inner.patch_fields(id, patch)
    }

    fn delete(&mut self, id: &str) -> SyncResult<()> {
        self.enter("delete", Some(id))?;
        self.inner.delete(id)
    }
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 7, 12, 0, 0).unwrap()
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, day, hour, minute, 0).unwrap()
}

pub fn note(id: &str, title: &str, date: DateTime<Utc>) -> Note {
    Note {
        id: id.into(),
        title: title.into(),
        content: format!("{title} body"),
        kind: NoteType::Text,
        date,
        x: 0.0,
        y: 0.0,
        manually_positioned: false,
        tags: Vec::new(),
        ai_suggested_tags: Vec::new(),
        voice_duration: None,
    }
}

pub fn pinned(id: &str, title: &str, x: f64, y: f64) -> Note {
    Note {
        x,
        y,
        manually_positioned: true,
        ..note(id, title, at(7, 9, 0))
    }
}

pub fn board(notes: Vec<Note>) -> TestBoard {
    BoardController::new(
        MemoryCanvas::new(1600.0, 900.0),
        SyncClient::new(FlakyStore::new(notes)),
        utc(),
    )
    .with_clock(fixed_now)
}

pub fn mounted(notes: Vec<Note>) -> TestBoard {
    let mut board = board(notes);
    board.mount().expect("initial load");
    board.process_canvas_events();
    board.sync_mut().store_mut().clear_calls();
    board
}

pub fn store(board: &TestBoard) -> &FlakyStore {
    board.sync().store()
}

pub fn store_mut(board: &mut TestBoard) -> &mut FlakyStore {
    board.sync_mut().store_mut()
}
