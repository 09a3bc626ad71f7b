//! Canvas engine capability consumed by the board.
//!
//! The board never draws anything. It creates, updates and deletes shapes by id,
//! reads the camera and selection, and consumes a change feed in which every
//! mutation carries its [`Origin`]. [`MemoryCanvas`] is an in-process engine
//! used by the terminal board and the tests.

use serde::{Deserialize, Serialize};

pub type ShapeId = String;

/// Who caused a store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeMark {
    #[default]
    Plain,
    MergeCandidate,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Bounds {
    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection rectangle, only when it has positive width and height.
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        if right > left && bottom > top {
            Some(Bounds {
                x: left,
                y: top,
                w: right - left,
                h: bottom - top,
            })
        } else {
            None
        }
    }
}

/// Visual projection of one note, with a denormalized copy of what it shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteShape {
    pub id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub z: i64,
    pub title: String,
    pub content: String,
    pub time: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub mark: ShapeMark,
}

impl NoteShape {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }

    pub fn position_differs(&self, other: &NoteShape) -> bool {
        self.x != other.x || self.y != other.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Added {
        shape: NoteShape,
        origin: Origin,
    },
    Updated {
        before: NoteShape,
        after: NoteShape,
        origin: Origin,
    },
    Removed {
        shape: NoteShape,
        origin: Origin,
    },
}

impl StoreChange {
    pub fn origin(&self) -> Origin {
        match self {
            StoreChange::Added { origin, .. }
            | StoreChange::Updated { origin, .. }
            | StoreChange::Removed { origin, .. } => *origin,
        }
    }
}

pub trait Canvas {
    fn create_shape(&mut self, shape: NoteShape, origin: Origin);
    /// Replaces the shape with the same id. Returns false when it does not exist.
    fn update_shape(&mut self, shape: NoteShape, origin: Origin) -> bool;
    fn animate_shape(&mut self, shape: NoteShape, origin: Origin) -> bool {
        self.update_shape(shape, origin)
    }
    fn delete_shape(&mut self, id: &str, origin: Origin) -> Option<NoteShape>;
    fn shape(&self, id: &str) -> Option<NoteShape>;
    /// Shapes in the engine's enumeration order.
    fn shapes(&self) -> Vec<NoteShape>;
    fn camera(&self) -> Camera;
    fn set_camera(&mut self, camera: Camera);
    fn center_on(&mut self, x: f64, y: f64);
    fn selected_ids(&self) -> Vec<ShapeId>;
    /// Store-change feed since the previous drain.
    fn drain_changes(&mut self) -> Vec<StoreChange>;
}

#[derive(Debug, Clone)]
pub struct MemoryCanvas {
    shapes: Vec<NoteShape>,
    camera: Camera,
    viewport: (f64, f64),
    selection: Vec<ShapeId>,
    changes: Vec<StoreChange>,
}

impl MemoryCanvas {
    pub fn new(viewport_w: f64, viewport_h: f64) -> Self {
        MemoryCanvas {
            shapes: Vec::new(),
            camera: Camera::default(),
            viewport: (viewport_w, viewport_h),
            selection: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn set_viewport(&mut self, w: f64, h: f64) {
        self.viewport = (w, h);
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn select(&mut self, ids: &[&str]) {
        self.selection = ids.iter().map(|id| id.to_string()).collect();
    }

    /// A user gesture moving `id` to `(x, y)`.
    pub fn drag_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        let Some(mut shape) = self.shape(id) else {
            return false;
        };
        shape.x = x;
        shape.y = y;
        self.update_shape(shape, Origin::User)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.shapes.iter().position(|s| s.id == id)
    }
}

impl Canvas for MemoryCanvas {
    fn create_shape(&mut self, shape: NoteShape, origin: Origin) {
        if let Some(idx) = self.position(&shape.id) {
            let before = std::mem::replace(&mut self.shapes[idx], shape.clone());
            self.changes.push(StoreChange::Updated {
                before,
                after: shape,
                origin,
            });
            return;
        }
        self.shapes.push(shape.clone());
        self.changes.push(StoreChange::Added { shape, origin });
    }

    fn update_shape(&mut self, shape: NoteShape, origin: Origin) -> bool {
        let Some(idx) = self.position(&shape.id) else {
            return false;
        };
        let before = std::mem::replace(&mut self.shapes[idx], shape.clone());
        self.changes.push(StoreChange::Updated {
            before,
            after: shape,
            origin,
        });
        true
    }

    fn delete_shape(&mut self, id: &str, origin: Origin) -> Option<NoteShape> {
        let idx = self.position(id)?;
        let shape = self.shapes.remove(idx);
        self.selection.retain(|s| s != id);
        self.changes.push(StoreChange::Removed {
            shape: shape.clone(),
            origin,
        });
        Some(shape)
    }

    fn shape(&self, id: &str) -> Option<NoteShape> {
        self.shapes.iter().find(|s| s.id == id).cloned()
    }

    fn shapes(&self) -> Vec<NoteShape> {
        self.shapes.clone()
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    fn center_on(&mut self, x: f64, y: f64) {
        let zoom = if self.camera.zoom > 0.0 { self.camera.zoom } else { 1.0 };
        self.camera.x = x - self.viewport.0 / 2.0 / zoom;
        self.camera.y = y - self.viewport.1 / 2.0 / zoom;
    }

    fn selected_ids(&self) -> Vec<ShapeId> {
        self.selection.clone()
    }

    fn drain_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(id: &str, x: f64, y: f64) -> NoteShape {
        NoteShape {
            id: id.into(),
            x,
            y,
            w: 180.0,
            h: 50.0,
            z: 0,
            title: id.into(),
            content: String::new(),
            time: "09:00".into(),
            tags: Vec::new(),
            mark: ShapeMark::Plain,
        }
    }

    #[test]
    fn intersection_requires_positive_extent() {
        let a = shape("a", 0.0, 0.0).bounds();
        let touching = shape("b", 180.0, 0.0).bounds();
        assert!(a.intersection(&touching).is_none());
        let inside = shape("c", 100.0, 10.0).bounds();
        let hit = a.intersection(&inside).unwrap();
        assert_eq!((hit.w, hit.h), (80.0, 40.0));
    }

    #[test]
    fn feed_tags_each_mutation_with_its_origin() {
        let mut canvas = MemoryCanvas::new(800.0, 600.0);
        canvas.create_shape(shape("a", 0.0, 0.0), Origin::System);
        assert!(canvas.drag_to("a", 10.0, 5.0));
        canvas.delete_shape("a", Origin::System);
        let feed = canvas.drain_changes();
        let origins: Vec<Origin> = feed.iter().map(StoreChange::origin).collect();
        assert_eq!(origins, vec![Origin::System, Origin::User, Origin::System]);
        assert!(canvas.drain_changes().is_empty());
    }

    #[test]
    fn center_on_places_point_mid_viewport() {
        let mut canvas = MemoryCanvas::new(800.0, 600.0);
        canvas.center_on(400.0, 300.0);
        assert_eq!(canvas.camera(), Camera { x: 0.0, y: 0.0, zoom: 1.0 });
    }
}
