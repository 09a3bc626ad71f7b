//! Date-column note canvas: layout, drag tracking, drag-to-merge and
//! reconciliation against a backend of record.

pub mod board;
pub mod canvas;
pub mod config;
pub mod drag;
pub mod http;
pub mod index;
pub mod layout;
pub mod logging;
pub mod merge;
pub mod model;
pub mod storage;
pub mod sync;

pub use board::{BoardController, ReconcileReport, ReleaseReport};
pub use canvas::{Canvas, MemoryCanvas, NoteShape, Origin, ShapeMark, StoreChange};
pub use drag::GestureSource;
pub use merge::{MergeAbort, MergeOutcome};
pub use model::{BoardError, FieldsPatch, NewNote, Note, NoteId, NoteType, Position};
pub use sync::{MemoryStore, NoteStore, SyncClient, SyncError, SyncResult};
