use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::config::{Preferences, Theme};
use crate::controller::{Controller, DeleteOutcome, Phase};
use crate::models::{status_label, Application, ApplicationDraft, Status};
use crate::query::{Direction as SortDirection, ListQuery, SortKey, Stats};
use crate::store::ApplicationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Search,
    ConfirmDelete(i64),
}

struct Palette {
    accent: Color,
    highlight: Color,
    muted: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette { accent: Color::Blue, highlight: Color::Gray, muted: Color::DarkGray },
        Theme::Dark => Palette { accent: Color::White, highlight: Color::DarkGray, muted: Color::Gray },
        Theme::Emerald => Palette { accent: Color::Green, highlight: Color::DarkGray, muted: Color::Gray },
        Theme::Rose => Palette { accent: Color::LightRed, highlight: Color::DarkGray, muted: Color::Gray },
    }
}

fn status_style(raw: &str) -> Style {
    match Status::parse(raw) {
        Some(Status::Applied) => Style::default().fg(Color::Cyan),
        Some(Status::Interview) => Style::default().fg(Color::Magenta),
        Some(Status::Offer) => Style::default().fg(Color::Green),
        Some(Status::Rejected) => Style::default().fg(Color::Red),
        None => Style::default().fg(Color::DarkGray),
    }
}

fn status_icon(raw: &str) -> &'static str {
    match Status::parse(raw) {
        Some(Status::Applied) => "+",
        Some(Status::Interview) => "*",
        Some(Status::Offer) => "$",
        Some(Status::Rejected) => "x",
        None => "?",
    }
}

struct AppState<S> {
    controller: Controller<S>,
    query: ListQuery,
    selected: usize,
    scroll_offset: u16,
    mode: Mode,
    message: Option<String>,
}

impl<S: ApplicationStore> AppState<S> {
    fn new(controller: Controller<S>) -> Self {
        Self {
            controller,
            query: ListQuery::default(),
            selected: 0,
            scroll_offset: 0,
            mode: Mode::Normal,
            message: None,
        }
    }

    fn visible(&self) -> Vec<&Application> {
        self.query.apply(self.controller.snapshot())
    }

    fn current(&self) -> Option<&Application> {
        self.visible().get(self.selected).copied()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        self.scroll_offset = 0;
    }

    fn next(&mut self) {
        let len = self.visible().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn reload(&mut self) {
        match self.controller.refresh(SortKey::DateApplied, SortDirection::Desc) {
            Ok(records) => self.message = Some(format!("Loaded {} applications", records.len())),
            Err(_) => self.message = self.controller.last_error().map(str::to_string),
        }
        self.clamp_selection();
    }

    fn set_status(&mut self, status: Status) {
        let Some(app) = self.current().cloned() else { return };
        let mut draft = ApplicationDraft::from(&app);
        draft.status = status.as_str().to_string();
        self.message = match self.controller.update(app.id, draft) {
            Ok(Some(_)) => Some(format!("#{} marked {}", app.id, status_label(status.as_str()))),
            Ok(None) => None,
            Err(_) => self.controller.last_error().map(str::to_string),
        };
        self.clamp_selection();
    }

    fn confirm_delete(&mut self, id: i64, confirmed: bool) {
        self.message = match self.controller.delete(id, |_| confirmed) {
            Ok(DeleteOutcome::Deleted(_)) => Some(format!("Deleted #{}", id)),
            Ok(DeleteOutcome::Cancelled) => Some("Delete cancelled".to_string()),
            Err(_) => self.controller.last_error().map(str::to_string),
        };
        self.clamp_selection();
    }

    /// Returns true when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode, prefs: &mut Preferences) -> bool {
        match self.mode {
            Mode::Search => {
                match code {
                    KeyCode::Enter | KeyCode::Esc => self.mode = Mode::Normal,
                    KeyCode::Backspace => {
                        self.query.search.pop();
                    }
                    KeyCode::Char(c) => self.query.search.push(c),
                    _ => {}
                }
                self.clamp_selection();
                false
            }
            Mode::ConfirmDelete(id) => {
                self.mode = Mode::Normal;
                self.confirm_delete(id, matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')));
                false
            }
            Mode::Normal => {
                match code {
                    KeyCode::Char('q') | KeyCode::Esc => return true,
                    KeyCode::Down | KeyCode::Char('j') => self.next(),
                    KeyCode::Up | KeyCode::Char('k') => self.prev(),
                    KeyCode::Char('J') | KeyCode::PageDown => self.scroll_down(),
                    KeyCode::Char('K') | KeyCode::PageUp => self.scroll_up(),
                    KeyCode::Char('/') => {
                        self.mode = Mode::Search;
                        self.message = None;
                    }
                    KeyCode::Char('s') => {
                        self.query.status = self.query.status.next();
                        self.clamp_selection();
                    }
                    KeyCode::Char('1') => self.query.sort.toggle(SortKey::DateApplied),
                    KeyCode::Char('2') => self.query.sort.toggle(SortKey::FollowUpDate),
                    KeyCode::Char('3') => self.query.sort.toggle(SortKey::CreatedAt),
                    KeyCode::Char('a') => self.set_status(Status::Applied),
                    KeyCode::Char('i') => self.set_status(Status::Interview),
                    KeyCode::Char('o') => self.set_status(Status::Offer),
                    KeyCode::Char('x') => self.set_status(Status::Rejected),
                    KeyCode::Char('d') => {
                        if let Some(id) = self.current().map(|app| app.id) {
                            self.mode = Mode::ConfirmDelete(id);
                        }
                    }
                    KeyCode::Char('R') => self.reload(),
                    KeyCode::Char('t') => {
                        self.message = match prefs.set_theme(prefs.theme.next()) {
                            Ok(()) => Some(format!("Theme: {}", prefs.theme)),
                            Err(e) => Some(format!("Could not save theme: {}", e)),
                        };
                    }
                    _ => {}
                }
                false
            }
        }
    }
}

pub fn run_browse<S: ApplicationStore>(controller: Controller<S>, prefs: &mut Preferences) -> Result<()> {
    let mut state = AppState::new(controller);
    state.controller.refresh(SortKey::DateApplied, SortDirection::Desc)?;
    if state.controller.snapshot().is_empty() {
        println!("No applications yet. Add one with 'suivi add'.");
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, prefs);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop<S: ApplicationStore>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState<S>,
    prefs: &mut Preferences,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        list_state.select(if state.visible().is_empty() { None } else { Some(state.selected) });
        terminal.draw(|frame| draw(frame, state, prefs.theme, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if state.handle_key(key.code, prefs) {
                break;
            }
        }
    }
    Ok(())
}

fn draw<S: ApplicationStore>(frame: &mut Frame, state: &AppState<S>, theme: Theme, list_state: &mut ListState) {
    let colors = palette(theme);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    // Header: dashboard counts and active criteria
    let stats = Stats::compute(state.controller.snapshot());
    let direction = match state.query.sort.direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    };
    let header = format!(
        " Total {}  Active {}  Interviews {}  Offers {}  | status: {}  sort: {} {}  search: {}",
        stats.total,
        stats.active,
        stats.interview,
        stats.offer,
        state.query.status,
        state.query.sort.key.column(),
        direction,
        if state.query.search.is_empty() { "-" } else { state.query.search.as_str() },
    );
    frame.render_widget(
        Paragraph::new(header).style(Style::default().fg(colors.accent).add_modifier(Modifier::BOLD)),
        rows[0],
    );

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    // Left panel: application list
    let visible = state.visible();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|app| {
            let reminder = if app.has_follow_up() { "!" } else { " " };
            let position = if app.position.chars().count() > 30 {
                format!("{}...", app.position.chars().take(27).collect::<String>())
            } else {
                app.position.clone()
            };
            ListItem::new(Line::from(vec![
                Span::styled(status_icon(&app.status), status_style(&app.status)),
                Span::raw(format!("{} #{:<4} {} | {}", reminder, app.id, position, app.company)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.accent))
                .title(format!(" Applications ({}) ", visible.len())),
        )
        .highlight_style(Style::default().bg(colors.highlight).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: detail
    let detail = Paragraph::new(build_detail(state.current(), &colors))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.accent))
                .title(" Detail "),
        )
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    // Footer: prompt, last message or help
    let footer = match state.mode {
        Mode::Search => format!(" Search: {}_", state.query.search),
        Mode::ConfirmDelete(id) => format!(" Delete application #{}? This cannot be undone. [y/N]", id),
        Mode::Normal if state.controller.phase() == Phase::Loading => " Loading...".to_string(),
        Mode::Normal => match &state.message {
            Some(msg) => format!(" {}", msg),
            None => " j/k:move /:search s:status 1/2/3:sort a/i/o/x:set status d:delete R:reload t:theme q:quit"
                .to_string(),
        },
    };
    frame.render_widget(Paragraph::new(footer).style(Style::default().fg(colors.muted)), rows[2]);
}

fn build_detail<'a>(app: Option<&'a Application>, colors: &Palette) -> Text<'a> {
    let Some(app) = app else {
        return Text::raw("No application selected");
    };

    let muted = Style::default().fg(colors.muted);
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        app.position.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", app.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", status_label(&app.status)),
        status_style(&app.status),
    )));
    lines.push(Line::from(""));

    lines.push(Line::from(format!("Applied: {}", app.date_applied)));
    lines.push(Line::from(format!("Added:   {}", app.created_at)));
    if let Some(follow_up) = app.follow_up_date.as_deref().filter(|_| app.has_follow_up()) {
        lines.push(Line::from(Span::styled(
            format!("Follow up on {}", follow_up),
            Style::default().fg(colors.accent).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));

    match &app.url {
        Some(url) => lines.push(Line::from(format!("Posting: {}", url))),
        None => lines.push(Line::from(Span::styled("Posting: not specified", muted))),
    }
    match &app.cv_url {
        Some(cv) => lines.push(Line::from(format!("CV: {}", cv))),
        None => lines.push(Line::from(Span::styled("CV: none", muted))),
    }
    match &app.cover_letter_url {
        Some(letter) => lines.push(Line::from(format!("Cover letter: {}", letter))),
        None => lines.push(Line::from(Span::styled("Cover letter: none", muted))),
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled("Notes", Style::default().add_modifier(Modifier::BOLD))));
    match &app.notes {
        Some(notes) => {
            for line in textwrap::fill(notes, 60).lines() {
                lines.push(Line::from(format!("  {}", line)));
            }
        }
        None => lines.push(Line::from(Span::styled("  No notes for this application.", muted))),
    }

    Text::from(lines)
}
