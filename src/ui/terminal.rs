use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use std::{
    collections::HashSet,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::audio::{AudioEvent, StudioCommand};
use crate::studio::catalog::{Sound, SoundLibrary};
use crate::studio::effects::{ControlSpec, EffectKind, descriptor};
use crate::studio::session::Session;
use crate::studio::{MAX_BPM, MIN_BPM, NUM_STEPS, NUM_TRACKS, project};

const BPM_NUDGE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Library,
    Grid,
    Effects,
}

/// A sound currently being carried by the cursor. `origin` is set when the
/// grab came from a grid cell (a move) and `None` when it came from the
/// library (a fresh copy).
#[derive(Debug, Clone)]
struct Grab {
    sound: Sound,
    origin: Option<(usize, usize)>,
}

/// One flattened row of the library list.
#[derive(Debug, Clone, Copy)]
enum LibraryRow {
    Category(usize),
    Sound(usize, usize),
}

/// One row of the effects panel: an on/off line per effect, followed by a
/// control line per parameter while that effect is enabled.
#[derive(Debug, Clone, Copy)]
enum EffectRow {
    Toggle(EffectKind),
    Control(EffectKind, &'static ControlSpec),
}

#[derive(Debug, Clone, PartialEq)]
enum HeaderStatus {
    Success(String),
    Error(String),
}

pub struct TerminalUI {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    session: Arc<Mutex<Session>>,
    library: SoundLibrary,
    project_dir: PathBuf,
    command_sender: crossbeam::channel::Sender<StudioCommand>,
    event_receiver: crossbeam::channel::Receiver<AudioEvent>,
    is_running: bool,
    last_update: Instant,
    pane: Pane,
    // Library pane state
    library_index: usize,
    collapsed: HashSet<usize>,
    // Grid pane state
    cursor: (usize, usize),
    grab: Option<Grab>,
    // Effects pane state
    effect_index: usize,
    // Transport mirror, fed by engine events
    playing: bool,
    playhead: Option<usize>,
    bpm: u32,
    // Header status system
    header_status: Option<HeaderStatus>,
    status_timer: Option<Instant>,
    confirm_clear: bool,
}

impl TerminalUI {
    pub fn new(
        session: Arc<Mutex<Session>>,
        library: SoundLibrary,
        project_dir: PathBuf,
        command_sender: crossbeam::channel::Sender<StudioCommand>,
        event_receiver: crossbeam::channel::Receiver<AudioEvent>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        let bpm = session
            .lock()
            .map(|s| s.bpm())
            .unwrap_or(crate::studio::DEFAULT_BPM);

        Ok(Self {
            terminal,
            session,
            library,
            project_dir,
            command_sender,
            event_receiver,
            is_running: true,
            last_update: Instant::now(),
            pane: Pane::Library,
            library_index: 0,
            collapsed: HashSet::new(),
            cursor: (0, 0),
            grab: None,
            effect_index: 0,
            playing: false,
            playhead: None,
            bpm,
            header_status: None,
            status_timer: None,
            confirm_clear: false,
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while self.is_running {
            self.process_events()?;
            self.check_status_timer();

            if self.last_update.elapsed() >= Duration::from_millis(50) {
                self.draw()?;
                self.last_update = Instant::now();
            }

            // Small sleep to prevent excessive CPU usage
            std::thread::sleep(Duration::from_millis(1));
        }

        Ok(())
    }

    fn process_events(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if event::poll(Duration::from_millis(0))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key_event(key);
        }

        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_audio_event(event);
        }

        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if self.confirm_clear {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    let _ = self.command_sender.send(StudioCommand::ClearAll);
                    self.grab = None;
                    self.show_success("Cleared");
                }
                _ => self.show_error("Cancelled"),
            }
            self.confirm_clear = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') => {
                self.is_running = false;
            }
            KeyCode::Tab => {
                self.pane = match self.pane {
                    Pane::Library => Pane::Grid,
                    Pane::Grid => Pane::Effects,
                    Pane::Effects => Pane::Library,
                };
            }
            KeyCode::Char(' ') => {
                if self.playing {
                    let _ = self.command_sender.send(StudioCommand::Stop);
                    self.playing = false;
                    self.playhead = None;
                } else {
                    let _ = self.command_sender.send(StudioCommand::Play);
                    self.playing = true;
                }
            }
            KeyCode::Char('u') => {
                let _ = self.command_sender.send(StudioCommand::Undo);
            }
            KeyCode::Char('c') => {
                self.confirm_clear = true;
            }
            KeyCode::Char('s') => {
                self.save_project();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.nudge_bpm(BPM_NUDGE as i32);
            }
            KeyCode::Char('-') => {
                self.nudge_bpm(-(BPM_NUDGE as i32));
            }
            KeyCode::Esc => {
                if self.grab.take().is_some() {
                    self.show_error("Grab cancelled");
                }
            }
            _ => match self.pane {
                Pane::Library => self.handle_library_key(key),
                Pane::Grid => self.handle_grid_key(key),
                Pane::Effects => self.handle_effects_key(key),
            },
        }
    }

    fn handle_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::Playhead(pos) => {
                self.playhead = pos;
                if pos.is_none() {
                    self.playing = false;
                }
            }
            AudioEvent::Error(msg) => {
                self.show_error(&msg);
            }
            AudioEvent::CellTriggered { .. } => {}
        }
    }

    // ── Tempo ─────────────────────────────────────────────────────────

    /// Tempo is locked while the transport runs; the scheduled step would
    /// drift against what the user hears otherwise.
    fn nudge_bpm(&mut self, delta: i32) {
        if self.playing {
            self.show_error("Stop playback to change BPM");
            return;
        }
        let bpm = (self.bpm as i32 + delta).clamp(MIN_BPM as i32, MAX_BPM as i32) as u32;
        if bpm != self.bpm {
            self.bpm = bpm;
            let _ = self.command_sender.send(StudioCommand::SetBpm(bpm));
        }
    }

    fn save_project(&mut self) {
        let result = match self.session.lock() {
            Ok(session) => project::save(&self.project_dir, &session),
            Err(_) => return,
        };
        match result {
            Ok(()) => self.show_success("Project saved"),
            Err(e) => self.show_error(&format!("Save failed: {}", e)),
        }
    }

    // ── Library pane ──────────────────────────────────────────────────

    fn library_rows(&self) -> Vec<LibraryRow> {
        let mut rows = Vec::new();
        for (ci, category) in self.library.categories.iter().enumerate() {
            rows.push(LibraryRow::Category(ci));
            if !self.collapsed.contains(&ci) {
                for si in 0..category.sounds.len() {
                    rows.push(LibraryRow::Sound(ci, si));
                }
            }
        }
        rows
    }

    fn handle_library_key(&mut self, key: KeyEvent) {
        let rows = self.library_rows();
        if rows.is_empty() {
            return;
        }
        self.library_index = self.library_index.min(rows.len() - 1);
        match key.code {
            KeyCode::Up => {
                self.library_index = self.library_index.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.library_index + 1 < rows.len() {
                    self.library_index += 1;
                }
            }
            KeyCode::Enter => match rows[self.library_index] {
                LibraryRow::Category(ci) => {
                    if !self.collapsed.remove(&ci) {
                        self.collapsed.insert(ci);
                    }
                    // Collapsing can shorten the list under the cursor.
                    let len = self.library_rows().len();
                    self.library_index = self.library_index.min(len.saturating_sub(1));
                }
                LibraryRow::Sound(ci, si) => {
                    let sound = self.library.categories[ci].sounds[si].clone();
                    self.show_success(&format!("Carrying {}", sound.name));
                    self.grab = Some(Grab {
                        sound,
                        origin: None,
                    });
                    self.pane = Pane::Grid;
                }
            },
            KeyCode::Char('p') => {
                if let LibraryRow::Sound(ci, si) = rows[self.library_index] {
                    let sound = self.library.categories[ci].sounds[si].clone();
                    let _ = self.command_sender.send(StudioCommand::Preview(sound));
                }
            }
            _ => {}
        }
    }

    // ── Grid pane ─────────────────────────────────────────────────────

    fn handle_grid_key(&mut self, key: KeyEvent) {
        let (track, step) = self.cursor;
        match key.code {
            KeyCode::Up => self.cursor.0 = track.saturating_sub(1),
            KeyCode::Down => self.cursor.0 = (track + 1).min(NUM_TRACKS - 1),
            KeyCode::Left => self.cursor.1 = step.saturating_sub(1),
            KeyCode::Right => self.cursor.1 = (step + 1).min(NUM_STEPS - 1),
            KeyCode::Enter => {
                if let Some(grab) = self.grab.take() {
                    let _ = self.command_sender.send(StudioCommand::Place {
                        track,
                        step,
                        sound: grab.sound,
                        origin: grab.origin,
                    });
                } else {
                    let _ = self.command_sender.send(StudioCommand::Select { track, step });
                    self.effect_index = 0;
                }
            }
            KeyCode::Char('g') => {
                // Pick the occupant up for a move; the origin cell clears
                // when it lands.
                let occupant = self
                    .session
                    .lock()
                    .ok()
                    .and_then(|s| s.grid().get(track, step).cloned());
                if let Some(sound) = occupant {
                    self.show_success(&format!("Moving {}", sound.name));
                    self.grab = Some(Grab {
                        sound,
                        origin: Some((track, step)),
                    });
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                let _ = self.command_sender.send(StudioCommand::Remove { track, step });
            }
            _ => {}
        }
    }

    // ── Effects pane ──────────────────────────────────────────────────

    fn effect_rows(&self, cell: (usize, usize)) -> Vec<EffectRow> {
        let Ok(session) = self.session.lock() else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for kind in EffectKind::ALL {
            rows.push(EffectRow::Toggle(kind));
            if session.effect_chain(cell.0, cell.1).contains(&kind) {
                for control in descriptor(kind).controls {
                    rows.push(EffectRow::Control(kind, control));
                }
            }
        }
        rows
    }

    fn handle_effects_key(&mut self, key: KeyEvent) {
        let Some(cell) = self.session.lock().ok().and_then(|s| s.selected_cell()) else {
            self.show_error("Select a cell first");
            return;
        };
        let rows = self.effect_rows(cell);
        if rows.is_empty() {
            return;
        }
        self.effect_index = self.effect_index.min(rows.len() - 1);

        match key.code {
            KeyCode::Up => self.effect_index = self.effect_index.saturating_sub(1),
            KeyCode::Down => {
                if self.effect_index + 1 < rows.len() {
                    self.effect_index += 1;
                }
            }
            KeyCode::Enter => {
                if let EffectRow::Toggle(kind) = rows[self.effect_index] {
                    let _ = self.command_sender.send(StudioCommand::ToggleEffect {
                        track: cell.0,
                        step: cell.1,
                        kind,
                    });
                }
            }
            KeyCode::Left => self.adjust_control(cell, rows[self.effect_index], -1.0),
            KeyCode::Right => self.adjust_control(cell, rows[self.effect_index], 1.0),
            _ => {}
        }
    }

    /// Step a control by its schema increment, clamped to its range, and
    /// push the new value to the engine.
    fn adjust_control(&mut self, cell: (usize, usize), row: EffectRow, direction: f32) {
        let EffectRow::Control(kind, control) = row else {
            return;
        };
        let current = self
            .session
            .lock()
            .ok()
            .and_then(|s| {
                s.effect_params(cell.0, cell.1, kind)
                    .and_then(|p| p.get(control.param).copied())
            })
            .unwrap_or(control.default);
        let value = (current + direction * control.step).clamp(control.min, control.max);
        if value != current {
            let _ = self.command_sender.send(StudioCommand::SetEffectParam {
                track: cell.0,
                step: cell.1,
                kind,
                param: control.param.to_string(),
                value,
            });
        }
    }

    // ── Header status ─────────────────────────────────────────────────

    fn show_success(&mut self, message: &str) {
        self.header_status = Some(HeaderStatus::Success(message.to_string()));
        self.status_timer = Some(Instant::now());
    }

    fn show_error(&mut self, message: &str) {
        self.header_status = Some(HeaderStatus::Error(message.to_string()));
        self.status_timer = Some(Instant::now());
    }

    fn check_status_timer(&mut self) {
        if let Some(timer) = self.status_timer
            && timer.elapsed() >= Duration::from_secs(3)
        {
            self.header_status = None;
            self.status_timer = None;
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────

    fn draw(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Extract values to avoid borrow checker issues
        let header_status = self.header_status.clone();
        let library = self.library.clone();
        let collapsed = self.collapsed.clone();
        let library_rows = self.library_rows();
        let library_index = self.library_index;
        let pane = self.pane;
        let cursor = self.cursor;
        let grab = self.grab.clone();
        let playhead = self.playhead;
        let playing = self.playing;
        let bpm = self.bpm;
        let effect_index = self.effect_index;
        let confirm_clear = self.confirm_clear;

        let snapshot = match self.session.lock() {
            Ok(session) => SessionView::capture(&session),
            Err(_) => return Ok(()),
        };

        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3), // Header
                    Constraint::Min(0),    // Panels
                    Constraint::Length(4), // Footer
                ])
                .split(f.area());

            Self::draw_header_static(f, chunks[0], &header_status, playing, bpm);

            let panels = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(22),
                    Constraint::Percentage(52),
                    Constraint::Percentage(26),
                ])
                .split(chunks[1]);

            Self::draw_library_static(
                f,
                panels[0],
                &library,
                &collapsed,
                &library_rows,
                library_index,
                pane == Pane::Library,
            );
            Self::draw_grid_static(
                f,
                panels[1],
                &snapshot,
                cursor,
                playhead,
                &grab,
                pane == Pane::Grid,
            );
            Self::draw_effects_static(f, panels[2], &snapshot, effect_index, pane == Pane::Effects);
            Self::draw_footer_static(f, chunks[2]);

            if confirm_clear {
                Self::draw_confirm_overlay_static(f, f.area());
            }
        })?;
        Ok(())
    }

    fn draw_header_static(
        f: &mut Frame,
        area: Rect,
        header_status: &Option<HeaderStatus>,
        playing: bool,
        bpm: u32,
    ) {
        let (header_text, color) = match header_status {
            Some(HeaderStatus::Success(message)) => (format!("✓ {}", message), Color::Green),
            Some(HeaderStatus::Error(message)) => (format!("✗ {}", message), Color::Red),
            None => (
                format!(
                    "{} | {} BPM",
                    if playing { "▶ Playing" } else { "■ Stopped" },
                    bpm
                ),
                Color::White,
            ),
        };

        let header = Paragraph::new(header_text)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Stepstudio"));
        f.render_widget(header, area);
    }

    fn draw_library_static(
        f: &mut Frame,
        area: Rect,
        library: &SoundLibrary,
        collapsed: &HashSet<usize>,
        rows: &[LibraryRow],
        selected: usize,
        active: bool,
    ) {
        let items: Vec<ListItem> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let (text, base_color) = match row {
                    LibraryRow::Category(ci) => {
                        let marker = if collapsed.contains(ci) { "▸" } else { "▾" };
                        (
                            format!("{} {}", marker, library.categories[*ci].name),
                            Color::Yellow,
                        )
                    }
                    LibraryRow::Sound(ci, si) => (
                        format!("  {}", library.categories[*ci].sounds[*si].name),
                        Color::White,
                    ),
                };
                let style = if active && i == selected {
                    Style::default().bg(Color::Blue).fg(Color::White)
                } else {
                    Style::default().fg(base_color)
                };
                ListItem::new(text).style(style)
            })
            .collect();

        let border_style = if active {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title("Library"),
        );
        f.render_widget(list, area);
    }

    fn draw_grid_static(
        f: &mut Frame,
        area: Rect,
        snapshot: &SessionView,
        cursor: (usize, usize),
        playhead: Option<usize>,
        grab: &Option<Grab>,
        active: bool,
    ) {
        let mut lines = Vec::new();

        // Step ruler, beats marked every fourth step.
        let mut ruler = vec![Span::raw("     ")];
        for step in 0..NUM_STEPS {
            let style = if playhead == Some(step) {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if step % 4 == 0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ruler.push(Span::styled(format!("{:>3} ", step + 1), style));
        }
        lines.push(Line::from(ruler));

        for track in 0..NUM_TRACKS {
            let mut spans = vec![Span::styled(
                format!(" T{}  ", track + 1),
                Style::default().fg(Color::Cyan),
            )];
            for step in 0..NUM_STEPS {
                let cell = &snapshot.cells[track][step];
                let mut label = match cell {
                    Some(view) => {
                        let mut tag: String = view.name.chars().take(2).collect();
                        if view.has_effects {
                            tag.push('*');
                        }
                        format!("{:<3}", tag)
                    }
                    None => " · ".to_string(),
                };
                label.push(' ');

                let mut style = match cell {
                    Some(_) => Style::default().fg(Color::White),
                    None => Style::default().fg(Color::DarkGray),
                };
                if playhead == Some(step) {
                    style = style.bg(Color::Rgb(0, 60, 0));
                }
                if snapshot.selected == Some((track, step)) {
                    style = Style::default().bg(Color::Magenta).fg(Color::White);
                }
                if active && cursor == (track, step) {
                    style = Style::default().bg(Color::Blue).fg(Color::White);
                }
                spans.push(Span::styled(label, style));
            }
            lines.push(Line::from(spans));
        }

        let title = match grab {
            Some(grab) => format!("Timeline (carrying {})", grab.sound.name),
            None => "Timeline".to_string(),
        };
        let border_style = if active {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let grid = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        );
        f.render_widget(grid, area);
    }

    fn draw_effects_static(
        f: &mut Frame,
        area: Rect,
        snapshot: &SessionView,
        selected: usize,
        active: bool,
    ) {
        let mut items: Vec<ListItem> = Vec::new();

        match snapshot.selected {
            None => {
                items.push(ListItem::new("No cell selected").style(Style::default().fg(Color::DarkGray)));
            }
            Some((track, step)) => {
                let chain = &snapshot.selected_chain;
                let mut row_index = 0;
                items.push(
                    ListItem::new(format!("Cell T{} · step {}", track + 1, step + 1))
                        .style(Style::default().fg(Color::Cyan)),
                );
                for kind in EffectKind::ALL {
                    let enabled = chain.contains(&kind);
                    let desc = descriptor(kind);
                    let text = format!("[{}] {}", if enabled { "x" } else { " " }, desc.name);
                    let style = if active && row_index == selected {
                        Style::default().bg(Color::Blue).fg(Color::White)
                    } else if enabled {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default().fg(Color::White)
                    };
                    items.push(ListItem::new(text).style(style));
                    row_index += 1;

                    if enabled {
                        for control in desc.controls {
                            let value = snapshot
                                .selected_params
                                .get(&(kind, control.param))
                                .copied()
                                .unwrap_or(control.default);
                            let text =
                                format!("    {}: {:.2}", control.label, value);
                            let style = if active && row_index == selected {
                                Style::default().bg(Color::Blue).fg(Color::White)
                            } else {
                                Style::default().fg(Color::Gray)
                            };
                            items.push(ListItem::new(text).style(style));
                            row_index += 1;
                        }
                    }
                }
            }
        }

        let border_style = if active {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title("Effects"),
        );
        f.render_widget(list, area);
    }

    fn draw_footer_static(f: &mut Frame, area: Rect) {
        let key_desc = |key: &str, desc: &str| {
            vec![
                Span::styled(
                    key.to_string(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" {}", desc), Style::default().fg(Color::White)),
            ]
        };
        let separator = || Span::styled(" | ".to_string(), Style::default().fg(Color::DarkGray));

        let mut line1 = Vec::new();
        line1.extend(key_desc("Tab", "Pane"));
        line1.push(separator());
        line1.extend(key_desc("↑↓←→", "Navigate"));
        line1.push(separator());
        line1.extend(key_desc("Enter", "Grab/Drop/Select"));
        line1.push(separator());
        line1.extend(key_desc("G", "Move"));
        line1.push(separator());
        line1.extend(key_desc("X", "Remove"));
        line1.push(separator());
        line1.extend(key_desc("Esc", "Cancel"));

        let mut line2 = Vec::new();
        line2.extend(key_desc("Space", "Play/Stop"));
        line2.push(separator());
        line2.extend(key_desc("+/-", "BPM"));
        line2.push(separator());
        line2.extend(key_desc("P", "Preview"));
        line2.push(separator());
        line2.extend(key_desc("U", "Undo"));
        line2.push(separator());
        line2.extend(key_desc("C", "Clear All"));
        line2.push(separator());
        line2.extend(key_desc("S", "Save"));
        line2.push(separator());
        line2.extend(key_desc("Q", "Quit"));

        let footer = Paragraph::new(vec![Line::from(line1), Line::from(line2)])
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(footer, area);
    }

    fn draw_confirm_overlay_static(f: &mut Frame, area: Rect) {
        let overlay_width = 44u16;
        let overlay_height = 5u16;
        let x = (area.width.saturating_sub(overlay_width)) / 2;
        let y = (area.height.saturating_sub(overlay_height)) / 2;
        let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

        for row in y..y + overlay_height {
            let bg_line = Paragraph::new(" ".repeat(overlay_width as usize))
                .style(Style::default().bg(Color::Black));
            f.render_widget(bg_line, Rect::new(x, row, overlay_width, 1));
        }

        let prompt = Paragraph::new("\nClear the whole timeline? (y/n)")
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Confirm"));
        f.render_widget(prompt, overlay_area);
    }
}

/// Cheap per-frame copy of what the draw pass needs, taken under one short
/// lock so drawing never holds the session while the audio callback wants it.
struct SessionView {
    cells: Vec<Vec<Option<CellView>>>,
    selected: Option<(usize, usize)>,
    selected_chain: Vec<EffectKind>,
    selected_params: std::collections::HashMap<(EffectKind, &'static str), f32>,
}

struct CellView {
    name: String,
    has_effects: bool,
}

impl SessionView {
    fn capture(session: &Session) -> Self {
        let mut cells = Vec::with_capacity(NUM_TRACKS);
        for track in 0..NUM_TRACKS {
            let mut row = Vec::with_capacity(NUM_STEPS);
            for step in 0..NUM_STEPS {
                row.push(session.grid().get(track, step).map(|sound| CellView {
                    name: sound.name.clone(),
                    has_effects: session.has_effects(track, step),
                }));
            }
            cells.push(row);
        }

        let selected = session.selected_cell();
        let mut selected_chain = Vec::new();
        let mut selected_params = std::collections::HashMap::new();
        if let Some((track, step)) = selected {
            selected_chain = session.effect_chain(track, step).to_vec();
            for &kind in &selected_chain {
                if let Some(params) = session.effect_params(track, step, kind) {
                    for control in descriptor(kind).controls {
                        if let Some(&value) = params.get(control.param) {
                            selected_params.insert((kind, control.param), value);
                        }
                    }
                }
            }
        }

        Self {
            cells,
            selected,
            selected_chain,
            selected_params,
        }
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
    }
}
