use crate::cli::GlobalArgs;
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use notecanvas::board::BoardController;
use notecanvas::canvas::{Canvas, MemoryCanvas};
use notecanvas::config::{default_config_path, load_config, BackendConfig, Config, Overrides};
use notecanvas::http::HttpStore;
use notecanvas::logging::init_logging;
use notecanvas::merge::{MergeAbort, MergeOutcome};
use notecanvas::model::{parse_local_datetime, BoardError, FieldsPatch, NewNote, NoteType, Position};
use notecanvas::storage::{default_board_path, default_log_dir, FileStore};
use notecanvas::sync::{NoteStore, SyncClient};
use std::collections::BTreeMap;

pub type Board = BoardController<MemoryCanvas, Box<dyn NoteStore>>;

pub fn load_runtime(global: &GlobalArgs) -> Result<Config> {
    let path = match &global.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = load_config(&path).with_context(|| format!("loading {:?}", path))?;
    config.apply(Overrides {
        url: global.url.clone(),
        board: global.board.clone(),
        user: global.user.clone(),
    });
    let log_dir = default_log_dir()?;
    init_logging(&config.log_level, &log_dir).context("starting file logger")?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<Box<dyn NoteStore>> {
    let offset = config.offset()?;
    match &config.backend {
        BackendConfig::Http { base_url } => Ok(Box::new(HttpStore::new(
            base_url.clone(),
            config.user_id.clone(),
        ))),
        BackendConfig::File { path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => default_board_path()?,
            };
            let store = FileStore::open(&path, offset)
                .with_context(|| format!("opening note file {:?}", path))?;
            Ok(Box::new(store))
        }
    }
}

pub fn open_board(config: &Config) -> Result<Board> {
    let store = open_store(config)?;
    let board = BoardController::new(
        MemoryCanvas::new(1600.0, 900.0),
        SyncClient::new(store),
        config.offset()?,
    )
    .with_reconcile_delay(config.reconcile_delay());
    Ok(board)
}

fn mounted_board(config: &Config) -> Result<Board> {
    let mut board = open_board(config)?;
    board
        .mount()
        .ok_or_else(|| anyhow!("could not load notes from the backend"))?;
    Ok(board)
}

pub fn list(config: &Config) -> Result<()> {
    let board = mounted_board(config)?;
    let mut by_column: BTreeMap<String, Vec<(f64, String)>> = BTreeMap::new();
    for note in board.notes() {
        let Some(shape) = board.shape_for_note(&note.id) else {
            continue;
        };
        let key = if note.manually_positioned {
            "pinned".to_string()
        } else {
            note.local_date(board.offset()).format("%Y-%m-%d").to_string()
        };
        let mut line = format!(
            "  - {}: {} [{}] @ ({:.0}, {:.0})",
            note.id,
            note.title,
            note.kind.label(),
            shape.x,
            shape.y
        );
        if !note.tags.is_empty() {
            line.push_str(&format!("\n    tags: {}", note.tags.join(", ")));
        }
        by_column.entry(key).or_default().push((shape.y, line));
    }
    let columns = board.layout().columns().labels();
    println!("Today: {}", board.today());
    if by_column.is_empty() {
        println!("  (no notes)");
    }
    for (label, mut lines) in by_column {
        let column = columns
            .iter()
            .find(|(date, _)| *date == label)
            .map(|(_, idx)| format!("column {}", idx))
            .unwrap_or_else(|| "free".to_string());
        println!("{} ({})", label, column);
        lines.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, line) in lines {
            println!("{}", line);
        }
        println!();
    }
    Ok(())
}

pub fn add(
    config: &Config,
    title: String,
    content: String,
    kind: String,
    date: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let offset = config.offset()?;
    let kind = NoteType::parse(&kind).ok_or(BoardError::InvalidType(kind))?;
    let date = match date {
        Some(raw) => parse_local_datetime(&raw, &offset)?,
        None => Utc::now(),
    };
    let mut draft = NewNote::new(title, content, date);
    draft.kind = kind;
    draft.tags = tags;
    let mut board = mounted_board(config)?;
    let note = board.create_note(&draft).context("creating note")?;
    println!("Added note {}", note.id);
    Ok(())
}

pub fn move_note(config: &Config, note_id: String, x: f64, y: f64) -> Result<()> {
    let mut board = open_board(config)?;
    board
        .sync_mut()
        .patch_position(&note_id, Position { x, y })
        .with_context(|| format!("moving note {}", note_id))?;
    println!("Pinned note {} at ({}, {})", note_id, x, y);
    Ok(())
}

pub fn change_date(config: &Config, note_id: String, date: String) -> Result<()> {
    let offset = config.offset()?;
    let date = parse_local_datetime(&date, &offset)?;
    let mut board = mounted_board(config)?;
    board
        .change_date(&note_id, date)
        .with_context(|| format!("changing date of {}", note_id))?;
    println!("Moved note {} to {}", note_id, date.with_timezone(&offset).format("%Y-%m-%d %H:%M"));
    Ok(())
}

pub fn edit(
    config: &Config,
    note_id: String,
    title: Option<String>,
    content: Option<String>,
) -> Result<()> {
    let patch = FieldsPatch { title, content };
    if patch.is_empty() {
        bail!("nothing to edit: pass --title and/or --content");
    }
    let mut board = mounted_board(config)?;
    board
        .edit_fields(&note_id, &patch)
        .with_context(|| format!("editing note {}", note_id))?;
    println!("Updated note {}", note_id);
    Ok(())
}

pub fn delete(config: &Config, note_id: String) -> Result<()> {
    let mut board = mounted_board(config)?;
    board
        .delete_note(&note_id)
        .with_context(|| format!("deleting note {}", note_id))?;
    println!("Deleted note {}", note_id);
    Ok(())
}

pub fn merge(config: &Config, dragged: String, target: String) -> Result<()> {
    let mut board = mounted_board(config)?;
    match board.merge_notes(&dragged, &target)? {
        MergeOutcome::Merged { note, degraded } => {
            println!("Merged {} into {} as {}", dragged, target, note.id);
            if degraded {
                println!("  (built partly from cached data)");
            }
            Ok(())
        }
        MergeOutcome::Aborted(reason) => Err(anyhow!(describe_abort(&reason))),
    }
}

pub fn describe_abort(reason: &MergeAbort) -> String {
    match reason {
        MergeAbort::SourcesUnavailable => "merge aborted: notes could not be loaded".into(),
        MergeAbort::CreateFailed(err) => format!("merge aborted: {}", err),
        MergeAbort::DeleteFailed {
            note_id,
            error,
            compensated,
            restored,
        } => {
            let mut msg = format!("merge aborted deleting {}: {}", note_id, error);
            if !compensated {
                msg.push_str(" (merged note left behind)");
            }
            if let Some(id) = restored {
                msg.push_str(&format!(" (dragged note restored as {})", id));
            }
            msg
        }
    }
}

pub fn tui(config: &Config) -> Result<()> {
    let mut board = open_board(config)?;
    if board.mount().is_none() {
        board.center_on_today();
    }
    board.canvas_mut().drain_changes();
    ui::run(board)
}
