use crate::canvas::ShapeId;
use crate::model::NoteId;
use std::collections::HashMap;

/// Bidirectional note id <-> shape id map. At most one shape per note.
#[derive(Debug, Default, Clone)]
pub struct ShapeIndex {
    by_note: HashMap<NoteId, ShapeId>,
    by_shape: HashMap<ShapeId, NoteId>,
}

impl ShapeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `note_id` to `shape_id`, returning the shape it replaced, if any.
    pub fn put(
        &mut self,
        note_id: impl Into<NoteId>,
        shape_id: impl Into<ShapeId>,
    ) -> Option<ShapeId> {
        let note_id = note_id.into();
        let shape_id = shape_id.into();
        if let Some(previous_note) = self.by_shape.remove(&shape_id) {
            self.by_note.remove(&previous_note);
        }
        let replaced = self.by_note.insert(note_id.clone(), shape_id.clone());
        if let Some(old_shape) = &replaced {
            self.by_shape.remove(old_shape);
        }
        self.by_shape.insert(shape_id, note_id);
        replaced
    }

    pub fn get(&self, note_id: &str) -> Option<&ShapeId> {
        self.by_note.get(note_id)
    }

    pub fn note_for_shape(&self, shape_id: &str) -> Option<&NoteId> {
        self.by_shape.get(shape_id)
    }

    pub fn remove_note(&mut self, note_id: &str) -> Option<ShapeId> {
        let shape_id = self.by_note.remove(note_id)?;
        self.by_shape.remove(&shape_id);
        Some(shape_id)
    }

    pub fn clear(&mut self) {
        self.by_note.clear();
        self.by_shape.clear();
    }

    pub fn len(&self) -> usize {
        self.by_note.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_note.is_empty()
    }
}
