use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notecanvas", version, about = "Date-column note canvas")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Use the REST backend at this base URL
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// Use this YAML note file as the backend
    #[arg(long, global = true)]
    pub board: Option<PathBuf>,
    /// Caller identity sent with every backend request
    #[arg(long, global = true)]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List notes by date column with their canvas position
    List,
    /// Add a new note
    Add {
        /// Title of the note
        title: String,
        /// Note body
        #[arg(long, default_value = "")]
        content: String,
        /// voice, text or collection
        #[arg(long = "type", default_value = "text")]
        kind: String,
        /// Date in YYYY-MM-DD HH:MM format (defaults to now)
        #[arg(long)]
        date: Option<String>,
        /// Tags for the note (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },
    /// Pin a note at a canvas position
    Move {
        note_id: String,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
    /// Move a note to another date
    Date {
        note_id: String,
        /// New date (YYYY-MM-DD HH:MM)
        date: String,
    },
    /// Edit a note's title or content
    Edit {
        note_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    Delete { note_id: String },
    /// Merge one note into another
    Merge {
        /// Note that disappears into the target
        dragged: String,
        /// Note that keeps its position and date
        target: String,
    },
    /// Launch the interactive canvas
    Tui,
}
