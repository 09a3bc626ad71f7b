mod common;

use common::{at, board, mounted, note, pinned, store, store_mut};
use notecanvas::board::shape_id_for;
use notecanvas::canvas::{Camera, Canvas, NoteShape};
use notecanvas::drag::GestureSource;
use notecanvas::layout::{
    column_x, preferred_y, NOTE_HEIGHT, NOTE_WIDTH, ROW_HEIGHT, TODAY_X,
};
use notecanvas::model::{FieldsPatch, NewNote};
use std::time::{Duration, Instant};

fn positions(shapes: Vec<NoteShape>) -> Vec<(String, f64, f64)> {
    let mut out: Vec<(String, f64, f64)> = shapes.into_iter().map(|s| (s.id, s.x, s.y)).collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[test]
fn mount_lays_out_columns_around_today() {
    let board = mounted(vec![
        note("a", "Standup", at(7, 9, 0)),
        note("b", "Review", at(7, 9, 30)),
        note("c", "Retro", at(6, 10, 0)),
        note("d", "Planning", at(9, 8, 0)),
    ]);

    let shape = |id: &str| board.shape_for_note(id).unwrap();
    assert_eq!((shape("a").x, shape("a").y), (column_x(0), preferred_y(9)));
    assert_eq!(
        (shape("b").x, shape("b").y),
        (column_x(0), preferred_y(9) + ROW_HEIGHT)
    );
    assert_eq!((shape("c").x, shape("c").y), (column_x(-1), preferred_y(10)));
    assert_eq!((shape("d").x, shape("d").y), (column_x(1), preferred_y(8)));
    assert_eq!(shape("a").id, shape_id_for("a"));
    assert_eq!(shape("b").time, "09:30");
    assert_eq!(board.layout().columns().len(), 3);
}

#[test]
fn empty_board_still_centers_on_today() {
    let mut board = board(Vec::new());
    let report = board.mount().unwrap();
    assert_eq!(report.notes, 0);

    // 12:00 on a 1600x900 viewport.
    let center_x = TODAY_X + NOTE_WIDTH / 2.0;
    let center_y = preferred_y(12) + NOTE_HEIGHT / 2.0;
    assert_eq!(
        board.canvas().camera(),
        Camera {
            x: center_x - 800.0,
            y: center_y - 450.0,
            zoom: 1.0,
        }
    );
}

#[test]
fn reconcile_is_idempotent() {
    let mut board = mounted(vec![
        note("a", "Standup", at(7, 9, 0)),
        note("b", "Review", at(7, 9, 30)),
        pinned("p", "Pinned", 20.0, 30.0),
    ]);
    let first = positions(board.canvas().shapes());
    board.reconcile().unwrap();
    board.reconcile().unwrap();
    assert_eq!(positions(board.canvas().shapes()), first);
    assert_eq!(board.canvas().len(), 3);
    assert_eq!(board.index().len(), 3);
}

#[test]
fn failed_list_leaves_canvas_untouched() {
    let mut board = mounted(vec![note("a", "Standup", at(7, 9, 0))]);
    let before = board.canvas().shapes();
    store_mut(&mut board).fail("list", None);
    assert!(board.reconcile().is_none());
    assert_eq!(board.canvas().shapes(), before);
    assert!(board.note("a").is_some());
}

#[test]
fn small_drag_is_saved_once_on_release() {
    let mut board = mounted(vec![note("a", "Standup", at(7, 9, 0))]);
    let id = shape_id_for("a");
    let start = board.canvas().shape(&id).unwrap();

    for step in 1..=5 {
        board
            .canvas_mut()
            .drag_to(&id, start.x + step as f64, start.y);
        board.process_canvas_events();
        assert!(board.is_dragging());
    }
    assert_eq!(store(&board).count("patch_position"), 0);

    let report = board.gesture_end(GestureSource::Document).unwrap();
    assert_eq!(report.patched, 1);
    assert!(report.merge.is_none());
    assert_eq!(store(&board).count("patch_position"), 1);

    let saved = store(&board).find("a").unwrap();
    assert_eq!((saved.x, saved.y), (start.x + 5.0, start.y));
    assert!(saved.manually_positioned);
}

#[test]
fn second_pointer_up_is_ignored() {
    let mut board = mounted(vec![note("a", "Standup", at(7, 9, 0))]);
    let id = shape_id_for("a");
    board.canvas_mut().drag_to(&id, 10.0, 10.0);

    assert!(board.gesture_end(GestureSource::Engine).is_some());
    assert!(board.gesture_end(GestureSource::Document).is_none());
    assert_eq!(store(&board).count("patch_position"), 1);
}

#[test]
fn system_writes_never_start_a_drag() {
    let mut board = mounted(vec![note("a", "Standup", at(7, 9, 0))]);
    board.reconcile().unwrap();
    board
        .edit_fields(
            "a",
            &FieldsPatch {
                title: Some("Daily".into()),
                content: None,
            },
        )
        .unwrap();
    board.process_canvas_events();

    assert!(!board.is_dragging());
    assert!(board.gesture_end(GestureSource::Document).is_none());
    assert_eq!(store(&board).count("patch_position"), 0);
    assert_eq!(board.shape_for_note("a").unwrap().title, "Daily");
}

#[test]
fn failed_position_save_is_reported() {
    let mut board = mounted(vec![note("a", "Standup", at(7, 9, 0))]);
    store_mut(&mut board).fail("patch_position", Some("a"));
    board.canvas_mut().drag_to(&shape_id_for("a"), 10.0, 10.0);

    let report = board.gesture_end(GestureSource::Document).unwrap();
    assert_eq!((report.patched, report.failed), (0, 1));
    assert!(!board.is_dragging());
}

#[test]
fn created_note_is_added_without_full_reload() {
    let mut board = mounted(vec![note("a", "Standup", at(7, 9, 0))]);
    let note = board
        .create_note(&NewNote::new("Coffee", "", at(7, 9, 15)))
        .unwrap();

    let shape = board.shape_for_note(&note.id).unwrap();
    assert_eq!((shape.x, shape.y), (column_x(0), preferred_y(9) + ROW_HEIGHT));
    assert_eq!(store(&board).count("list"), 0);
    assert!(board.pending_reconcile().is_some());
}

#[test]
fn note_on_an_unseen_date_opens_its_own_column() {
    // Today has no notes yet, so the 9th starts out as column 0.
    let mut board = mounted(vec![note("d", "Planning", at(9, 8, 0))]);
    assert_eq!(board.shape_for_note("d").unwrap().x, column_x(0));

    let note = board
        .create_note(&NewNote::new("Lunch", "", at(7, 12, 0)))
        .unwrap();

    let added = board.shape_for_note(&note.id).unwrap();
    let future = board.shape_for_note("d").unwrap();
    assert_eq!((added.x, added.y), (column_x(0), preferred_y(12)));
    assert_eq!((future.x, future.y), (column_x(1), preferred_y(8)));
    assert_eq!(board.layout().columns().len(), 2);
    assert_eq!(store(&board).count("list"), 0);
}

#[test]
fn deferred_reconcile_waits_for_drag_to_finish() {
    let mut board = board(vec![note("a", "Standup", at(7, 9, 0))])
        .with_reconcile_delay(Duration::ZERO);
    board.mount().unwrap();
    board.process_canvas_events();
    board
        .create_note(&NewNote::new("Coffee", "", at(7, 10, 0)))
        .unwrap();

    board.canvas_mut().drag_to(&shape_id_for("a"), 50.0, 50.0);
    board.process_canvas_events();
    assert!(board.poll(Instant::now()).is_none());

    board.gesture_end(GestureSource::Document).unwrap();
    let report = board.poll(Instant::now()).unwrap();
    assert_eq!(report.notes, 2);
    assert!(board.pending_reconcile().is_none());
}

#[test]
fn poll_before_due_does_nothing() {
    let mut board = board(Vec::new()).with_reconcile_delay(Duration::from_secs(3600));
    board.mount().unwrap();
    board
        .create_note(&NewNote::new("Coffee", "", at(7, 10, 0)))
        .unwrap();
    assert!(board.poll(Instant::now()).is_none());
    assert!(board.pending_reconcile().is_some());
}

#[test]
fn date_change_moves_note_to_its_new_column() {
    let mut board = mounted(vec![
        note("a", "Standup", at(7, 9, 0)),
        pinned("p", "Pinned", 20.0, 30.0),
    ]);
    board.change_date("a", at(8, 10, 0)).unwrap();

    let shape = board.shape_for_note("a").unwrap();
    assert_eq!((shape.x, shape.y), (column_x(1), preferred_y(10)));
    assert_eq!(shape.time, "10:00");

    board.change_date("p", at(9, 15, 0)).unwrap();
    let pinned = board.shape_for_note("p").unwrap();
    assert_eq!((pinned.x, pinned.y), (20.0, 30.0));
    assert_eq!(pinned.time, "15:00");
}

#[test]
fn same_day_time_change_moves_to_the_new_hour_band() {
    let mut board = mounted(vec![
        note("a", "Standup", at(7, 9, 0)),
        note("b", "Review", at(7, 9, 30)),
    ]);
    let saved = board.change_date("a", at(7, 15, 0)).unwrap();

    let shape = board.shape_for_note("a").unwrap();
    assert_eq!((shape.x, shape.y), (column_x(0), preferred_y(15)));
    assert_eq!(shape.y, saved.y);
    assert_eq!(shape.time, "15:00");
    let other = board.shape_for_note("b").unwrap();
    assert_eq!(other.y, preferred_y(9) + ROW_HEIGHT);
}

#[test]
fn deleting_a_note_removes_its_shape() {
    let mut board = mounted(vec![
        note("a", "Standup", at(7, 9, 0)),
        note("b", "Review", at(7, 9, 30)),
    ]);
    board.delete_note("a").unwrap();
    assert!(board.shape_for_note("a").is_none());
    assert!(board.index().get("a").is_none());
    assert_eq!(board.canvas().len(), 1);

    store_mut(&mut board).fail("delete", None);
    assert!(board.delete_note("b").is_err());
    assert!(board.shape_for_note("b").is_some());
}

#[test]
fn dragged_shape_is_raised_above_others() {
    let mut board = mounted(vec![
        note("a", "Standup", at(7, 9, 0)),
        note("b", "Review", at(7, 9, 30)),
    ]);
    let id = shape_id_for("b");
    board.canvas_mut().drag_to(&id, 400.0, 1000.0);
    board.process_canvas_events();

    let raised = board.canvas().shape(&id).unwrap();
    let other = board.shape_for_note("a").unwrap();
    assert!(raised.z > other.z);
}
