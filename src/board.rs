//! Board controller: keeps the canvas in step with the backend of record.
//!
//! The controller owns the canvas handle and the sync client it is given, the
//! shape index, the cached note records and the drag state. Every canvas write
//! it issues is tagged [`Origin::System`], so the drag tracker only ever sees
//! the user's own gestures.

use crate::canvas::{Canvas, NoteShape, Origin, ShapeId, ShapeMark, StoreChange};
use crate::drag::{DragTracker, GestureSource, Tracked};
use crate::index::ShapeIndex;
use crate::layout::{
    column_at_x, preferred_y, ColumnLayout, DateColumnMap, Placement, NOTE_HEIGHT, NOTE_WIDTH,
    TODAY_X,
};
use crate::merge::{self, MergeHighlight, MergeOutcome, MergePlan};
use crate::model::{BoardError, FieldsPatch, NewNote, Note, NoteId, Position};
use crate::sync::{NoteStore, SyncClient, SyncResult};
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const SHAPE_PREFIX: &str = "note:";
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_secs(3);

pub type Clock = fn() -> DateTime<Utc>;

pub fn shape_id_for(note_id: &str) -> ShapeId {
    format!("{SHAPE_PREFIX}{note_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub notes: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseReport {
    pub patched: usize,
    pub failed: usize,
    pub merge: Option<MergeOutcome>,
}

pub struct BoardController<C: Canvas, S: NoteStore> {
    canvas: C,
    sync: SyncClient<S>,
    index: ShapeIndex,
    layout: ColumnLayout,
    notes: HashMap<NoteId, Note>,
    tracker: DragTracker,
    highlight: MergeHighlight,
    clock: Clock,
    offset: FixedOffset,
    reconcile_delay: Duration,
    pending_reconcile: Option<Instant>,
    next_z: i64,
}

impl<C: Canvas, S: NoteStore> BoardController<C, S> {
    pub fn new(canvas: C, sync: SyncClient<S>, offset: FixedOffset) -> Self {
        let clock: Clock = Utc::now;
        let today = clock().with_timezone(&offset).date_naive();
        BoardController {
            canvas,
            sync,
            index: ShapeIndex::new(),
            layout: ColumnLayout::new(DateColumnMap::default(), today, offset),
            notes: HashMap::new(),
            tracker: DragTracker::new(),
            highlight: MergeHighlight::default(),
            clock,
            offset,
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            pending_reconcile: None,
            next_z: 1,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.layout = ColumnLayout::new(self.layout.columns().clone(), self.today(), self.offset);
        self
    }

    pub fn with_reconcile_delay(mut self, delay: Duration) -> Self {
        self.reconcile_delay = delay;
        self
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn sync(&self) -> &SyncClient<S> {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncClient<S> {
        &mut self.sync
    }

    pub fn index(&self) -> &ShapeIndex {
        &self.index
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    pub fn note(&self, note_id: &str) -> Option<&Note> {
        self.notes.get(note_id)
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn shape_for_note(&self, note_id: &str) -> Option<NoteShape> {
        self.index.get(note_id).and_then(|id| self.canvas.shape(id))
    }

    pub fn is_dragging(&self) -> bool {
        self.tracker.is_dragging()
    }

    pub fn highlighted(&self) -> Option<&ShapeId> {
        self.highlight.current()
    }

    pub fn pending_reconcile(&self) -> Option<Instant> {
        self.pending_reconcile
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)().with_timezone(&self.offset).date_naive()
    }

    /// Initial load, then centers the camera on today's column.
    pub fn mount(&mut self) -> Option<ReconcileReport> {
        let report = self.reconcile();
        self.center_on_today();
        report
    }

    pub fn center_on_today(&mut self) {
        let hour = (self.clock)().with_timezone(&self.offset).hour();
        self.canvas
            .center_on(TODAY_X + NOTE_WIDTH / 2.0, preferred_y(hour) + NOTE_HEIGHT / 2.0);
    }

    /// Full reload: delete every note shape, then recreate them from the
    /// backend's list. A failed list leaves the canvas untouched.
    pub fn reconcile(&mut self) -> Option<ReconcileReport> {
        let today = self.today();
        let listing = match self.sync.list_notes(today, &self.offset) {
            Ok(listing) => listing,
            Err(err) => {
                warn!(
                    "event=reconcile_skipped module=board status=error error={}",
                    err
                );
                return None;
            }
        };

        let stale: Vec<ShapeId> = self
            .canvas
            .shapes()
            .into_iter()
            .map(|s| s.id)
            .filter(|id| id.starts_with(SHAPE_PREFIX) || self.index.note_for_shape(id).is_some())
            .collect();
        for id in &stale {
            self.canvas.delete_shape(id, Origin::System);
        }
        self.index.clear();
        self.notes.clear();
        self.highlight = MergeHighlight::default();

        self.layout = ColumnLayout::new(listing.columns, today, self.offset);
        let placements = self.layout.layout_all(&listing.notes);
        for (note, placement) in listing.notes.iter().zip(placements) {
            let shape = self.build_shape(note, placement);
            self.index.put(note.id.clone(), shape.id.clone());
            self.canvas.create_shape(shape, Origin::System);
            self.notes.insert(note.id.clone(), note.clone());
        }
        self.pending_reconcile = None;

        let report = ReconcileReport {
            notes: listing.notes.len(),
            columns: self.layout.columns().len(),
        };
        info!(
            "event=reconciled module=board status=ok notes={} columns={} removed={}",
            report.notes,
            report.columns,
            stale.len()
        );
        Some(report)
    }

    /// Runs the deferred reconcile once it is due and no drag is in flight.
    pub fn poll(&mut self, now: Instant) -> Option<ReconcileReport> {
        match self.pending_reconcile {
            Some(due) if now >= due && !self.tracker.is_dragging() => self.reconcile(),
            _ => None,
        }
    }

    fn schedule_reconcile(&mut self) {
        self.pending_reconcile = Some(Instant::now() + self.reconcile_delay);
    }

    /// Creates a note through the backend and adds its shape incrementally.
    pub fn create_note(&mut self, draft: &NewNote) -> SyncResult<Note> {
        let note = self.sync.create_note(draft)?;
        self.note_added(note.clone());
        Ok(note)
    }

    /// Adds one shape without a full reload, keeping camera and selection.
    pub fn note_added(&mut self, note: Note) {
        if self.index.get(&note.id).is_some() {
            self.note_edited(note);
            return;
        }
        let opens_column = self.opens_column(&note);
        self.notes.insert(note.id.clone(), note.clone());
        if opens_column {
            self.relayout_columns();
        } else {
            let placement = self.place_incremental(&note, None);
            let shape = self.build_shape(&note, placement);
            self.index.put(note.id.clone(), shape.id.clone());
            self.canvas.create_shape(shape, Origin::System);
        }
        debug!(
            "event=note_added module=board note_id={} new_column={}",
            note.id, opens_column
        );
        self.schedule_reconcile();
    }

    /// Applies an edit made outside the canvas to the note's shape.
    pub fn note_edited(&mut self, note: Note) {
        let previous = self.notes.insert(note.id.clone(), note.clone());
        let shape = self.shape_for_note(&note.id);
        let Some(mut shape) = shape else {
            self.index.remove_note(&note.id);
            self.notes.remove(&note.id);
            self.note_added(note);
            return;
        };

        shape.title = note.title.clone();
        shape.content = note.content.clone();
        shape.time = note.local_time_label(&self.offset);
        shape.tags = note.tags.clone();

        let slot = |n: &Note| {
            let local = n.date.with_timezone(&self.offset);
            (local.date_naive(), local.hour())
        };
        let after = slot(&note);
        let before = previous.as_ref().map(slot);
        if note.manually_positioned || before == Some(after) {
            self.canvas.update_shape(shape, Origin::System);
        } else if before.map(|(day, _)| day) != Some(after.0) {
            self.canvas.update_shape(shape, Origin::System);
            self.relayout_columns();
        } else {
            let placement = self.place_incremental(&note, Some(&shape.id));
            shape.x = placement.x;
            shape.y = placement.y;
            debug!(
                "event=note_moved_row module=board note_id={} y={}",
                note.id, shape.y
            );
            self.canvas.animate_shape(shape, Origin::System);
        }
    }

    pub fn change_date(&mut self, note_id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        let note = self.sync.patch_date(note_id, date)?;
        self.note_edited(note.clone());
        Ok(note)
    }

    pub fn edit_fields(&mut self, note_id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        let note = self.sync.patch_fields(note_id, patch)?;
        self.note_edited(note.clone());
        Ok(note)
    }

    pub fn delete_note(&mut self, note_id: &str) -> SyncResult<()> {
        self.sync.delete_note(note_id)?;
        if let Some(shape_id) = self.index.remove_note(note_id) {
            self.canvas.delete_shape(&shape_id, Origin::System);
        }
        self.notes.remove(note_id);
        Ok(())
    }

    /// Drains the canvas change feed into the drag tracker.
    pub fn process_canvas_events(&mut self) {
        for change in self.canvas.drain_changes() {
            let shape_id = match &change {
                StoreChange::Added { shape, .. } | StoreChange::Removed { shape, .. } => {
                    shape.id.clone()
                }
                StoreChange::Updated { after, .. } => after.id.clone(),
            };
            let note_id = self.index.note_for_shape(&shape_id).cloned();
            if let Tracked::Picked(_) = self.tracker.observe(&change, note_id.as_deref()) {
                self.elevate(&shape_id);
            }
        }
        self.refresh_highlight();
    }

    fn elevate(&mut self, shape_id: &str) {
        if let Some(mut shape) = self.canvas.shape(shape_id) {
            shape.z = self.next_z;
            self.next_z += 1;
            self.canvas.update_shape(shape, Origin::System);
        }
    }

    fn single_drag(&self) -> Option<ShapeId> {
        let session = self.tracker.session()?;
        match session.moves() {
            [only] if self.canvas.selected_ids().len() <= 1 => Some(only.shape_id.clone()),
            _ => None,
        }
    }

    fn note_shapes(&self) -> Vec<NoteShape> {
        self.canvas
            .shapes()
            .into_iter()
            .filter(|s| self.index.note_for_shape(&s.id).is_some())
            .collect()
    }

    fn merge_candidate(&self, dragged_shape_id: &str) -> Option<merge::Candidate> {
        let dragged = self.canvas.shape(dragged_shape_id)?;
        let shapes = self.note_shapes();
        merge::evaluate(&dragged, shapes.iter())
    }

    fn refresh_highlight(&mut self) {
        let best = self
            .single_drag()
            .and_then(|id| self.merge_candidate(&id))
            .map(|c| c.shape_id);
        self.highlight.show(&mut self.canvas, best.as_ref());
    }

    /// Pointer-up from either source. Persists every buffered position once,
    /// then merges when a single dragged note overlaps a target enough.
    pub fn gesture_end(&mut self, source: GestureSource) -> Option<ReleaseReport> {
        self.process_canvas_events();
        let single = self.single_drag();
        let released = self.tracker.gesture_end(source)?;

        let mut report = ReleaseReport {
            patched: 0,
            failed: 0,
            merge: None,
        };
        for moved in &released.moves {
            let position = Position {
                x: moved.x,
                y: moved.y,
            };
            match self.sync.patch_position(&moved.note_id, position) {
                Ok(note) => {
                    self.notes.insert(note.id.clone(), note);
                    report.patched += 1;
                }
                Err(_) => report.failed += 1,
            }
        }

        let target = single.and_then(|id| self.merge_candidate(&id));
        self.highlight.clear(&mut self.canvas);
        if let (Some(dragged), Some(target)) = (released.single(), target) {
            if let Some(target_note) = self.index.note_for_shape(&target.shape_id).cloned() {
                info!(
                    "event=merge_requested module=board dragged={} target={} ratio={:.3}",
                    dragged.note_id, target_note, target.ratio
                );
                report.merge = self.merge_notes(&dragged.note_id, &target_note).ok();
            }
        }
        Some(report)
    }

    /// Merges `dragged_id` into `target_id` and reconciles the canvas.
    pub fn merge_notes(
        &mut self,
        dragged_id: &str,
        target_id: &str,
    ) -> Result<MergeOutcome, BoardError> {
        if dragged_id == target_id {
            return Err(BoardError::SelfMerge(dragged_id.to_string()));
        }
        let removed = self
            .index
            .remove_note(dragged_id)
            .and_then(|id| self.canvas.delete_shape(&id, Origin::System));
        let target_shape_id = self.index.get(target_id).cloned();
        let target_shape = target_shape_id.as_deref().and_then(|id| self.canvas.shape(id));
        if let Some(id) = &target_shape_id {
            merge::set_mark(&mut self.canvas, id, ShapeMark::Busy);
        }

        let cached_target = self.notes.get(target_id);
        let target_position = match (&target_shape, cached_target) {
            (Some(shape), _) => Position {
                x: shape.x,
                y: shape.y,
            },
            (None, Some(note)) => Position {
                x: note.x,
                y: note.y,
            },
            (None, None) => Position { x: 0.0, y: 0.0 },
        };
        let plan = MergePlan {
            dragged_id: dragged_id.to_string(),
            target_id: target_id.to_string(),
            dragged_fallback: merge::degraded_source(self.notes.get(dragged_id), removed.as_ref()),
            target_fallback: merge::degraded_source(cached_target, target_shape.as_ref()),
            target_position,
        };
        let outcome = merge::run_merge(&mut self.sync, plan);

        if let Some(id) = &target_shape_id {
            merge::set_mark(&mut self.canvas, id, ShapeMark::Plain);
        }
        let reconciled = outcome.touched_backend() && self.reconcile().is_some();
        if !reconciled {
            if let MergeOutcome::Merged { note, .. } = &outcome {
                self.notes.remove(dragged_id);
                self.notes.remove(target_id);
                if let Some(id) = self.index.remove_note(target_id) {
                    self.canvas.delete_shape(&id, Origin::System);
                }
                self.note_added(note.clone());
            } else if let Some(shape) = removed {
                self.index.put(dragged_id.to_string(), shape.id.clone());
                self.canvas.create_shape(shape, Origin::System);
            }
        }
        Ok(outcome)
    }

    /// Whether `note` lands on a date the column map does not know yet.
    fn opens_column(&self, note: &Note) -> bool {
        !note.manually_positioned
            && self
                .layout
                .columns()
                .index_of(note.local_date(&self.offset))
                .is_none()
    }

    /// Renumbers the columns from the cached notes and moves every shape
    /// whose slot changed. Notes without a shape get one.
    fn relayout_columns(&mut self) {
        let today = self.today();
        let notes: Vec<Note> = self.notes.values().cloned().collect();
        let columns = DateColumnMap::from_notes(&notes, today, &self.offset);
        self.layout = ColumnLayout::new(columns, today, self.offset);
        let placements = self.layout.layout_all(&notes);
        for (note, placement) in notes.iter().zip(placements) {
            match self.shape_for_note(&note.id) {
                Some(_) if note.manually_positioned => {}
                Some(mut shape) => {
                    if shape.x != placement.x || shape.y != placement.y {
                        shape.x = placement.x;
                        shape.y = placement.y;
                        self.canvas.animate_shape(shape, Origin::System);
                    }
                }
                None => {
                    let shape = self.build_shape(note, placement);
                    self.index.put(note.id.clone(), shape.id.clone());
                    self.canvas.create_shape(shape, Origin::System);
                }
            }
        }
        info!(
            "event=columns_relaid module=board status=ok notes={} columns={}",
            notes.len(),
            self.layout.columns().len()
        );
    }

    fn place_incremental(&mut self, note: &Note, exclude: Option<&str>) -> Placement {
        if note.manually_positioned {
            return self.layout.place(note);
        }
        let column = self.layout.column_index(note.local_date(&self.offset));
        self.layout.begin_pass();
        for shape in self.note_shapes() {
            if Some(shape.id.as_str()) == exclude {
                continue;
            }
            let manual = self
                .index
                .note_for_shape(&shape.id)
                .and_then(|id| self.notes.get(id))
                .map_or(false, |n| n.manually_positioned);
            if !manual && column_at_x(shape.x) == Some(column) {
                self.layout.reserve(column, shape.y);
            }
        }
        self.layout.place(note)
    }

    fn build_shape(&self, note: &Note, placement: Placement) -> NoteShape {
        NoteShape {
            id: shape_id_for(&note.id),
            x: placement.x,
            y: placement.y,
            w: NOTE_WIDTH,
            h: NOTE_HEIGHT,
            z: 0,
            title: note.title.clone(),
            content: note.content.clone(),
            time: note.local_time_label(&self.offset),
            tags: note.tags.clone(),
            mark: ShapeMark::Plain,
        }
    }
}
