//! Drag-to-merge.
//!
//! Overlap is measured against the dragged note's own area, so a small note
//! dropped mostly inside a large one qualifies even though it covers little of
//! the large one. The merge itself runs as a saga: create the merged note, then
//! delete the dragged note, then the target, undoing earlier steps when a later
//! one fails.

use crate::canvas::{Bounds, Canvas, NoteShape, Origin, ShapeId, ShapeMark};
use crate::model::{union_tags, NewNote, Note, NoteId, NoteType, Position};
use crate::sync::{NoteStore, SyncClient, SyncError, SyncResult};
use log::{info, warn};

pub const MERGE_THRESHOLD: f64 = 0.30;
pub const TITLE_SEPARATOR: &str = " / ";
pub const CONTENT_SEPARATOR: &str = "\n\n//////\n\n";

/// Intersection area over the area of `dragged`. Zero when they only touch.
pub fn overlap_ratio(dragged: &Bounds, candidate: &Bounds) -> f64 {
    let area = dragged.area();
    if area <= 0.0 {
        return 0.0;
    }
    match dragged.intersection(candidate) {
        Some(hit) => hit.area() / area,
        None => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub shape_id: ShapeId,
    pub ratio: f64,
}

/// Best merge target for `dragged`: highest ratio at or above the threshold.
/// Ties keep the first candidate in enumeration order.
pub fn evaluate<'a, I>(dragged: &NoteShape, shapes: I) -> Option<Candidate>
where
    I: IntoIterator<Item = &'a NoteShape>,
{
    let bounds = dragged.bounds();
    let mut best: Option<Candidate> = None;
    for shape in shapes {
        if shape.id == dragged.id {
            continue;
        }
        let ratio = overlap_ratio(&bounds, &shape.bounds());
        if ratio < MERGE_THRESHOLD {
            continue;
        }
        if best.as_ref().map_or(true, |b| ratio > b.ratio) {
            best = Some(Candidate {
                shape_id: shape.id.clone(),
                ratio,
            });
        }
    }
    best
}

/// Keeps at most one shape marked as the live merge candidate.
#[derive(Debug, Default)]
pub struct MergeHighlight {
    current: Option<ShapeId>,
}

impl MergeHighlight {
    pub fn current(&self) -> Option<&ShapeId> {
        self.current.as_ref()
    }

    pub fn show<C: Canvas>(&mut self, canvas: &mut C, best: Option<&ShapeId>) {
        if self.current.as_ref() == best {
            return;
        }
        self.clear(canvas);
        if let Some(id) = best {
            if set_mark(canvas, id, ShapeMark::MergeCandidate) {
                self.current = Some(id.clone());
            }
        }
    }

    pub fn clear<C: Canvas>(&mut self, canvas: &mut C) {
        if let Some(id) = self.current.take() {
            if canvas
                .shape(&id)
                .map_or(false, |s| s.mark == ShapeMark::MergeCandidate)
            {
                set_mark(canvas, &id, ShapeMark::Plain);
            }
        }
    }
}

pub fn set_mark<C: Canvas>(canvas: &mut C, id: &str, mark: ShapeMark) -> bool {
    match canvas.shape(id) {
        Some(mut shape) if shape.mark != mark => {
            shape.mark = mark;
            canvas.update_shape(shape, Origin::System)
        }
        Some(_) => true,
        None => false,
    }
}

/// A merge input, either fetched from the backend or rebuilt from local state.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeSource {
    Fetched(Note),
    Degraded(Note),
}

impl MergeSource {
    pub fn note(&self) -> &Note {
        match self {
            MergeSource::Fetched(note) | MergeSource::Degraded(note) => note,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MergeSource::Degraded(_))
    }
}

/// Rebuilds a note from the cached record, patched with whatever the shape
/// currently shows.
pub fn degraded_source(cached: Option<&Note>, shape: Option<&NoteShape>) -> Option<Note> {
    let mut note = cached?.clone();
    if let Some(shape) = shape {
        note.title = shape.title.clone();
        note.content = shape.content.clone();
        note.tags = shape.tags.clone();
    }
    Some(note)
}

pub fn compose_merged(target: &Note, dragged: &Note, position: Position) -> NewNote {
    NewNote {
        title: format!("{}{}{}", target.title, TITLE_SEPARATOR, dragged.title),
        content: format!("{}{}{}", target.content, CONTENT_SEPARATOR, dragged.content),
        kind: NoteType::Collection,
        date: target.date,
        x: Some(position.x),
        y: Some(position.y),
        manually_positioned: Some(target.manually_positioned),
        tags: union_tags(&target.tags, &dragged.tags),
    }
}

fn recreate_draft(note: &Note) -> NewNote {
    NewNote {
        title: note.title.clone(),
        content: note.content.clone(),
        kind: note.kind,
        date: note.date,
        x: Some(note.x),
        y: Some(note.y),
        manually_positioned: Some(note.manually_positioned),
        tags: note.tags.clone(),
    }
}

/// Everything the saga needs. Fallbacks are used when a fetch fails.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub dragged_id: NoteId,
    pub target_id: NoteId,
    pub dragged_fallback: Option<Note>,
    pub target_fallback: Option<Note>,
    pub target_position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeAbort {
    /// Neither record could be fetched, or a failed fetch had no local copy.
    SourcesUnavailable,
    CreateFailed(SyncError),
    DeleteFailed {
        note_id: NoteId,
        error: SyncError,
        /// The merged note was removed again.
        compensated: bool,
        /// Id of the dragged note re-created after it had already been deleted.
        restored: Option<NoteId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged { note: Note, degraded: bool },
    Aborted(MergeAbort),
}

impl MergeOutcome {
    /// Whether any write reached the backend.
    pub fn touched_backend(&self) -> bool {
        !matches!(
            self,
            MergeOutcome::Aborted(MergeAbort::SourcesUnavailable)
                | MergeOutcome::Aborted(MergeAbort::CreateFailed(_))
        )
    }
}

fn resolve(fetched: SyncResult<Note>, fallback: Option<Note>) -> Option<MergeSource> {
    match fetched {
        Ok(note) => Some(MergeSource::Fetched(note)),
        Err(_) => fallback.map(MergeSource::Degraded),
    }
}

/// create merged -> delete dragged -> delete target, compensating on failure.
pub fn run_merge<S: NoteStore>(sync: &mut SyncClient<S>, plan: MergePlan) -> MergeOutcome {
    let dragged = resolve(sync.get_note(&plan.dragged_id), plan.dragged_fallback);
    let target = resolve(sync.get_note(&plan.target_id), plan.target_fallback);
    let (dragged, target) = match (dragged, target) {
        (Some(d), Some(t)) if !(d.is_degraded() && t.is_degraded()) => (d, t),
        _ => {
            warn!(
                "event=merge_aborted module=merge dragged={} target={} status=sources_unavailable",
                plan.dragged_id, plan.target_id
            );
            return MergeOutcome::Aborted(MergeAbort::SourcesUnavailable);
        }
    };
    let degraded = dragged.is_degraded() || target.is_degraded();
    if degraded {
        warn!(
            "event=merge_degraded module=merge dragged={} target={}",
            plan.dragged_id, plan.target_id
        );
    }

    let draft = compose_merged(target.note(), dragged.note(), plan.target_position);
    let merged = match sync.create_note(&draft) {
        Ok(note) => note,
        Err(error) => {
            warn!(
                "event=merge_aborted module=merge step=create status=error error={}",
                error
            );
            return MergeOutcome::Aborted(MergeAbort::CreateFailed(error));
        }
    };

    if let Err(error) = sync.delete_note(&plan.dragged_id) {
        let compensated = sync.delete_note(&merged.id).is_ok();
        warn!(
            "event=merge_aborted module=merge step=delete_dragged compensated={} error={}",
            compensated, error
        );
        return MergeOutcome::Aborted(MergeAbort::DeleteFailed {
            note_id: plan.dragged_id,
            error,
            compensated,
            restored: None,
        });
    }

    if let Err(error) = sync.delete_note(&plan.target_id) {
        let compensated = sync.delete_note(&merged.id).is_ok();
        let restored = sync
            .create_note(&recreate_draft(dragged.note()))
            .ok()
            .map(|n| n.id);
        warn!(
            "event=merge_aborted module=merge step=delete_target compensated={} restored={:?} error={}",
            compensated, restored, error
        );
        return MergeOutcome::Aborted(MergeAbort::DeleteFailed {
            note_id: plan.target_id,
            error,
            compensated,
            restored,
        });
    }

    info!(
        "event=merge_committed module=merge dragged={} target={} merged={} degraded={}",
        plan.dragged_id, plan.target_id, merged.id, degraded
    );
    MergeOutcome::Merged {
        note: merged,
        degraded,
    }
}
