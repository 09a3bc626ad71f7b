use crate::commands::{describe_abort, Board};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notecanvas::canvas::{Canvas, NoteShape, ShapeMark};
use notecanvas::drag::GestureSource;
use notecanvas::layout::{column_at_x, column_x, COLUMN_SPACING, ROW_HEIGHT};
use notecanvas::merge::MergeOutcome;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

/// Canvas units per terminal cell.
const SCALE_X: f64 = 10.0;
const SCALE_Y: f64 = 10.0;
const STEP_X: f64 = COLUMN_SPACING / 4.0;
const STEP_Y: f64 = ROW_HEIGHT / 2.0;

pub fn run(board: Board) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(board);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    board: Board,
    selected: Option<String>,
    grabbed: bool,
    status: String,
}

impl App {
    fn new(board: Board) -> Self {
        let selected = ordered_shapes(&board).first().map(|s| s.id.clone());
        App {
            board,
            selected,
            grabbed: false,
            status: "Space picks a note up and drops it".into(),
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
            if let Some(report) = self.board.poll(Instant::now()) {
                self.status = format!("Reconciled {} notes", report.notes);
                self.ensure_selection();
            }
        }
        if self.grabbed {
            self.drop_note();
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char(' ') | KeyCode::Enter => {
                if self.grabbed {
                    self.drop_note();
                } else {
                    self.grab_note();
                }
            }
            KeyCode::Esc if self.grabbed => self.drop_note(),
            KeyCode::Left | KeyCode::Char('h') => self.arrow(-1.0, 0.0),
            KeyCode::Right | KeyCode::Char('l') => self.arrow(1.0, 0.0),
            KeyCode::Up | KeyCode::Char('k') => self.arrow(0.0, -1.0),
            KeyCode::Down | KeyCode::Char('j') => self.arrow(0.0, 1.0),
            KeyCode::Tab if !self.grabbed => self.cycle(1),
            KeyCode::BackTab if !self.grabbed => self.cycle(-1),
            KeyCode::Char('r') if !self.grabbed => {
                self.status = match self.board.reconcile() {
                    Some(report) => format!(
                        "Reloaded {} notes in {} columns",
                        report.notes, report.columns
                    ),
                    None => "Reload failed, showing last known notes".into(),
                };
                self.ensure_selection();
            }
            KeyCode::Char('c') => {
                self.board.center_on_today();
                self.status = format!("Centered on {}", self.board.today());
            }
            _ => {}
        }
        false
    }

    fn arrow(&mut self, dx: f64, dy: f64) {
        if self.grabbed {
            self.nudge(dx * STEP_X, dy * STEP_Y);
        } else if dx != 0.0 {
            self.cycle_column(dx as i32);
        } else {
            self.cycle(dy as i32);
        }
    }

    fn grab_note(&mut self) {
        let Some(id) = self.selected.clone() else {
            self.status = "No note selected".into();
            return;
        };
        self.board.canvas_mut().select(&[id.as_str()]);
        self.grabbed = true;
        self.status = "Dragging: arrows move, space drops".into();
    }

    fn nudge(&mut self, dx: f64, dy: f64) {
        let Some(id) = self.selected.clone() else {
            return;
        };
        let Some(shape) = self.board.canvas().shape(&id) else {
            return;
        };
        self.board
            .canvas_mut()
            .drag_to(&id, shape.x + dx, shape.y + dy);
        self.board.process_canvas_events();
        self.follow(&id);
    }

    fn drop_note(&mut self) {
        self.grabbed = false;
        let report = self.board.gesture_end(GestureSource::Document);
        self.board.canvas_mut().select(&[]);
        self.status = match report {
            None => "Dropped without moving".into(),
            Some(report) => match report.merge {
                Some(MergeOutcome::Merged { note, .. }) => {
                    self.selected = self.board.index().get(&note.id).cloned();
                    format!("Merged into \"{}\"", note.title)
                }
                Some(MergeOutcome::Aborted(reason)) => describe_abort(&reason),
                None if report.failed > 0 => {
                    "Position not saved, it will be restored on reload".into()
                }
                None => "Position saved".into(),
            },
        };
        self.ensure_selection();
    }

    fn cycle(&mut self, delta: i32) {
        let shapes = ordered_shapes(&self.board);
        if shapes.is_empty() {
            self.selected = None;
            return;
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|id| shapes.iter().position(|s| &s.id == id))
            .unwrap_or(0) as i32;
        let next = (current + delta).rem_euclid(shapes.len() as i32) as usize;
        let id = shapes[next].id.clone();
        self.follow(&id);
        self.selected = Some(id);
    }

    fn cycle_column(&mut self, delta: i32) {
        let shapes = ordered_shapes(&self.board);
        let current_x = self
            .selected
            .as_ref()
            .and_then(|id| self.board.canvas().shape(id))
            .map(|s| s.x);
        let Some(current_x) = current_x else {
            self.cycle(delta);
            return;
        };
        let found = if delta > 0 {
            shapes.iter().find(|s| s.x > current_x)
        } else {
            shapes.iter().rev().find(|s| s.x < current_x)
        };
        if let Some(shape) = found {
            let id = shape.id.clone();
            self.follow(&id);
            self.selected = Some(id);
        }
    }

    fn ensure_selection(&mut self) {
        let exists = self
            .selected
            .as_ref()
            .map_or(false, |id| self.board.canvas().shape(id).is_some());
        if !exists {
            self.selected = ordered_shapes(&self.board).first().map(|s| s.id.clone());
        }
    }

    /// Pans only when the shape leaves the viewport.
    fn follow(&mut self, id: &str) {
        let Some(shape) = self.board.canvas().shape(id) else {
            return;
        };
        let camera = self.board.canvas().camera();
        let (w, h) = self.board.canvas().viewport();
        let visible = shape.x >= camera.x
            && shape.y >= camera.y
            && shape.x + shape.w <= camera.x + w
            && shape.y + shape.h <= camera.y + h;
        if !visible {
            self.board
                .canvas_mut()
                .center_on(shape.x + shape.w / 2.0, shape.y + shape.h / 2.0);
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_canvas(f, layout[1]);
        self.draw_footer(f, layout[2]);
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let count = self.board.index().len();
        let mut spans = vec![
            Span::styled(
                "notecanvas ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("today {}", self.board.today()),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(format!("{} notes", count), Style::default().fg(Color::Gray)),
        ];
        if self.board.pending_reconcile().is_some() {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled("sync pending", Style::default().fg(Color::Yellow)));
        }
        if self.grabbed {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled(
                "dragging",
                Style::default()
                    .fg(Color::LightMagenta)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_canvas(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        self.board.canvas_mut().set_viewport(
            area.width as f64 * SCALE_X,
            area.height.saturating_sub(1) as f64 * SCALE_Y,
        );
        let camera = self.board.canvas().camera();
        let body = Rect {
            y: area.y + 1,
            height: area.height.saturating_sub(1),
            ..area
        };
        f.render_widget(
            Block::default().style(Style::default().bg(Color::Rgb(16, 18, 24))),
            area,
        );

        for (label, idx) in self.board.layout().columns().labels() {
            let cell_x = ((column_x(idx) - camera.x) / SCALE_X).floor();
            if cell_x < 0.0 || cell_x >= area.width as f64 {
                continue;
            }
            let width = (area.width as f64 - cell_x).min(COLUMN_SPACING / SCALE_X) as u16;
            let rect = Rect::new(area.x + cell_x as u16, area.y, width, 1);
            let style = if idx == 0 {
                Style::default()
                    .fg(Color::LightGreen)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(color_for_index(idx))
            };
            f.render_widget(Paragraph::new(Span::styled(label, style)), rect);
        }

        let mut shapes = self.board.canvas().shapes();
        shapes.sort_by_key(|s| s.z);
        for shape in &shapes {
            let Some(rect) = project(shape, camera.x, camera.y, body) else {
                continue;
            };
            let selected = self.selected.as_deref() == Some(shape.id.as_str());
            f.render_widget(Clear, rect);
            f.render_widget(self.shape_widget(shape, selected, rect.width), rect);
        }

        if shapes.is_empty() {
            let msg = Paragraph::new("No notes yet")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(msg, body);
        }
    }

    fn shape_widget(&self, shape: &NoteShape, selected: bool, width: u16) -> Paragraph<'static> {
        let accent = match shape.mark {
            ShapeMark::Busy => Color::Yellow,
            ShapeMark::MergeCandidate => Color::LightMagenta,
            ShapeMark::Plain if selected => Color::Rgb(252, 214, 112),
            ShapeMark::Plain => column_at_x(shape.x)
                .map(color_for_index)
                .unwrap_or(Color::Gray),
        };
        let inner = width.saturating_sub(2) as usize;
        let mut lines = vec![Line::from(Span::styled(
            truncate_text(&shape.title, inner),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if !shape.tags.is_empty() {
            lines.push(Line::from(Span::styled(
                truncate_text(&format!("#{}", shape.tags.join(" #")), inner),
                Style::default().fg(Color::DarkGray),
            )));
        }
        let title = match shape.mark {
            ShapeMark::Busy => format!("{} merging", shape.time),
            ShapeMark::MergeCandidate => format!("{} merge?", shape.time),
            ShapeMark::Plain => shape.time.clone(),
        };
        let border = if selected {
            Style::default().fg(accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(accent)
        };
        Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Span::styled(title, Style::default().fg(accent))),
        )
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let key = Style::default().fg(Color::LightCyan);
        let help = Line::from(vec![
            Span::styled("←↑↓→ / h j k l", key),
            Span::raw(if self.grabbed { " drag  " } else { " select  " }),
            Span::styled("space", key),
            Span::raw(if self.grabbed { " drop  " } else { " pick up  " }),
            Span::styled("r", key),
            Span::raw(" reload  "),
            Span::styled("c", key),
            Span::raw(" today  "),
            Span::styled("q", key),
            Span::raw(" quit"),
        ]);
        let help_bar = Paragraph::new(help).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(help_bar, rows[0]);

        let detail = self
            .selected
            .as_ref()
            .and_then(|id| self.board.index().note_for_shape(id))
            .and_then(|note_id| self.board.note(note_id))
            .map(|note| {
                format!(
                    "{} [{}] {}",
                    note.id,
                    note.kind.label(),
                    truncate_text(&note.content.replace('\n', " "), 60)
                )
            })
            .unwrap_or_default();
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(rows[1]);
        f.render_widget(
            Paragraph::new(self.status.clone()).wrap(Wrap { trim: true }),
            bottom[0],
        );
        f.render_widget(
            Paragraph::new(detail).style(Style::default().fg(Color::Gray)),
            bottom[1],
        );
    }
}

fn ordered_shapes(board: &Board) -> Vec<NoteShape> {
    let mut shapes: Vec<NoteShape> = board
        .canvas()
        .shapes()
        .into_iter()
        .filter(|s| board.index().note_for_shape(&s.id).is_some())
        .collect();
    shapes.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    shapes
}

/// Terminal cells covered by `shape`, clipped to `area`.
fn project(shape: &NoteShape, cam_x: f64, cam_y: f64, area: Rect) -> Option<Rect> {
    let left = ((shape.x - cam_x) / SCALE_X).round() as i64;
    let top = ((shape.y - cam_y) / SCALE_Y).round() as i64;
    let right = left + (shape.w / SCALE_X).round().max(3.0) as i64;
    let bottom = top + (shape.h / SCALE_Y).round().max(3.0) as i64;
    let clip_left = left.max(0);
    let clip_top = top.max(0);
    let clip_right = right.min(area.width as i64);
    let clip_bottom = bottom.min(area.height as i64);
    if clip_right - clip_left < 3 || clip_bottom - clip_top < 2 {
        return None;
    }
    Some(Rect::new(
        area.x + clip_left as u16,
        area.y + clip_top as u16,
        (clip_right - clip_left) as u16,
        (clip_bottom - clip_top) as u16,
    ))
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn color_for_index(idx: i32) -> Color {
    let palette = [
        Color::Cyan,
        Color::LightGreen,
        Color::LightMagenta,
        Color::LightBlue,
        Color::LightYellow,
        Color::LightRed,
    ];
    palette[idx.rem_euclid(palette.len() as i32) as usize]
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out.chars().take(max).collect()
}
