//! Drag lifecycle: `Idle -> Dragging -> Released -> Idle`.
//!
//! Only user-originated position changes start or feed a drag. Positions are
//! buffered per note and handed back exactly once, when the gesture ends.

use crate::canvas::{Origin, ShapeId, StoreChange};
use crate::model::NoteId;
use log::debug;

/// Where a pointer-up was observed. Either one ends the gesture; the later one
/// finds the tracker idle and is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureSource {
    Document,
    Engine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferedMove {
    pub note_id: NoteId,
    pub shape_id: ShapeId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DragSession {
    moves: Vec<BufferedMove>,
}

impl DragSession {
    pub fn moves(&self) -> &[BufferedMove] {
        &self.moves
    }

    fn buffer(&mut self, note_id: &str, shape_id: &str, x: f64, y: f64) -> bool {
        if let Some(existing) = self.moves.iter_mut().find(|m| m.note_id == note_id) {
            existing.x = x;
            existing.y = y;
            return false;
        }
        self.moves.push(BufferedMove {
            note_id: note_id.to_string(),
            shape_id: shape_id.to_string(),
            x,
            y,
        });
        true
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// The gesture that just ended, with the last buffered position of every note.
#[derive(Debug, Clone, PartialEq)]
pub struct Released {
    pub moves: Vec<BufferedMove>,
    pub source: GestureSource,
}

impl Released {
    /// The dragged note when exactly one note moved.
    pub fn single(&self) -> Option<&BufferedMove> {
        match self.moves.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tracked {
    Ignored,
    /// First move of this note in the current gesture.
    Picked(NoteId),
    Moved(NoteId),
}

#[derive(Debug, Default)]
pub struct DragTracker {
    state: DragState,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    /// Feeds one change from the canvas store. `note_id` is the note bound to
    /// the changed shape, if any.
    pub fn observe(&mut self, change: &StoreChange, note_id: Option<&str>) -> Tracked {
        match change {
            StoreChange::Updated {
                before,
                after,
                origin: Origin::User,
            } if before.position_differs(after) => match note_id {
                Some(note_id) => self.track(note_id, &after.id, after.x, after.y),
                None => Tracked::Ignored,
            },
            StoreChange::Removed { shape, .. } => {
                if let DragState::Dragging(session) = &mut self.state {
                    session.moves.retain(|m| m.shape_id != shape.id);
                    if session.moves.is_empty() {
                        self.state = DragState::Idle;
                    }
                }
                Tracked::Ignored
            }
            _ => Tracked::Ignored,
        }
    }

    pub fn track(&mut self, note_id: &str, shape_id: &str, x: f64, y: f64) -> Tracked {
        if self.state == DragState::Idle {
            debug!("event=drag_start module=drag note_id={}", note_id);
            self.state = DragState::Dragging(DragSession::default());
        }
        let DragState::Dragging(session) = &mut self.state else {
            return Tracked::Ignored;
        };
        if session.buffer(note_id, shape_id, x, y) {
            Tracked::Picked(note_id.to_string())
        } else {
            Tracked::Moved(note_id.to_string())
        }
    }

    /// Ends the gesture. Returns `None` when nothing was being dragged, which
    /// is also what a second pointer-up for the same gesture sees.
    pub fn gesture_end(&mut self, source: GestureSource) -> Option<Released> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => {
                debug!(
                    "event=drag_release module=drag source={:?} notes={}",
                    source,
                    session.moves.len()
                );
                Some(Released {
                    moves: session.moves,
                    source,
                })
            }
            DragState::Idle => {
                debug!(
                    "event=gesture_end_ignored module=drag source={:?} status=idle",
                    source
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{NoteShape, ShapeMark};

    fn shape(id: &str, x: f64, y: f64) -> NoteShape {
        NoteShape {
            id: id.into(),
            x,
            y,
            w: 180.0,
            h: 50.0,
            z: 0,
            title: String::new(),
            content: String::new(),
            time: String::new(),
            tags: Vec::new(),
            mark: ShapeMark::Plain,
        }
    }

    fn moved(id: &str, from: (f64, f64), to: (f64, f64), origin: Origin) -> StoreChange {
        StoreChange::Updated {
            before: shape(id, from.0, from.1),
            after: shape(id, to.0, to.1),
            origin,
        }
    }

    #[test]
    fn system_writes_never_start_a_drag() {
        let mut tracker = DragTracker::new();
        let change = moved("s1", (0.0, 0.0), (10.0, 0.0), Origin::System);
        assert_eq!(tracker.observe(&change, Some("n1")), Tracked::Ignored);
        assert!(!tracker.is_dragging());
    }

    #[test]
    fn non_positional_updates_are_ignored() {
        let mut tracker = DragTracker::new();
        let change = moved("s1", (5.0, 5.0), (5.0, 5.0), Origin::User);
        assert_eq!(tracker.observe(&change, Some("n1")), Tracked::Ignored);
        assert!(!tracker.is_dragging());
    }

    #[test]
    fn buffers_last_position_per_note() {
        let mut tracker = DragTracker::new();
        let first = moved("s1", (0.0, 0.0), (10.0, 0.0), Origin::User);
        let second = moved("s1", (10.0, 0.0), (25.0, 4.0), Origin::User);
        assert_eq!(tracker.observe(&first, Some("n1")), Tracked::Picked("n1".into()));
        assert_eq!(tracker.observe(&second, Some("n1")), Tracked::Moved("n1".into()));
        let released = tracker.gesture_end(GestureSource::Document).unwrap();
        let only = released.single().unwrap();
        assert_eq!((only.x, only.y), (25.0, 4.0));
    }

    #[test]
    fn second_pointer_up_is_deduplicated() {
        let mut tracker = DragTracker::new();
        tracker.track("n1", "s1", 1.0, 2.0);
        assert!(tracker.gesture_end(GestureSource::Engine).is_some());
        assert!(tracker.gesture_end(GestureSource::Document).is_none());
    }

    #[test]
    fn multi_note_drag_has_no_single_target() {
        let mut tracker = DragTracker::new();
        tracker.track("n1", "s1", 1.0, 2.0);
        tracker.track("n2", "s2", 3.0, 4.0);
        let released = tracker.gesture_end(GestureSource::Document).unwrap();
        assert_eq!(released.moves.len(), 2);
        assert!(released.single().is_none());
    }

    #[test]
    fn removing_the_only_dragged_shape_returns_to_idle() {
        let mut tracker = DragTracker::new();
        tracker.track("n1", "s1", 1.0, 2.0);
        let removed = StoreChange::Removed {
            shape: shape("s1", 1.0, 2.0),
            origin: Origin::System,
        };
        tracker.observe(&removed, Some("n1"));
        assert!(!tracker.is_dragging());
    }
}
