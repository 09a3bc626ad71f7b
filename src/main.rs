mod cli;
mod commands;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = commands::load_runtime(&args.global)?;
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::List => commands::list(&config),
        cli::Command::Add {
            title,
            content,
            kind,
            date,
            tags,
        } => commands::add(&config, title, content, kind, date, tags),
        cli::Command::Move { note_id, x, y } => commands::move_note(&config, note_id, x, y),
        cli::Command::Date { note_id, date } => commands::change_date(&config, note_id, date),
        cli::Command::Edit {
            note_id,
            title,
            content,
        } => commands::edit(&config, note_id, title, content),
        cli::Command::Delete { note_id } => commands::delete(&config, note_id),
        cli::Command::Merge { dragged, target } => commands::merge(&config, dragged, target),
        cli::Command::Tui => commands::tui(&config),
    }
}
