use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::api::SoundrawApi;
use crate::app::App;
use crate::automation::{Clipboard, ScriptRunner};
use crate::domain::{GenreOptions, Sample, SampleId, SearchQuery};
use crate::download::Fetcher;
use crate::error::SoundrawError;
use crate::playback::{Pending, PlaybackCoordinator};

const LOGS_MAX: usize = 4;
const HELP: &str =
    "↑/↓ select  space play/stop  s stop  e export+copy  c copy link  p prepare  g/G genre  n/b page  a autoplay  q quit";

struct BrowserState {
    query: SearchQuery,
    genres: GenreOptions,
    genre_index: Option<usize>,
    samples: Vec<Sample>,
    total_count: Option<u64>,
    list: ListState,
    autoplay: bool,
    status: String,
    logs: VecDeque<String>,
    now_playing: Arc<Mutex<Option<SampleId>>>,
    requested: Option<Pending>,
    passive: Option<Pending>,
}

impl BrowserState {
    fn selected(&self) -> Option<&Sample> {
        self.list.selected().and_then(|index| self.samples.get(index))
    }

    fn push_log(&mut self, line: String) {
        self.logs.push_back(line);
        while self.logs.len() > LOGS_MAX {
            self.logs.pop_front();
        }
    }

    fn genre_label(&self) -> String {
        self.genre_index
            .and_then(|index| self.genres.genres.get(index))
            .map(|genre| genre.name.clone())
            .unwrap_or_else(|| "All".to_string())
    }
}

pub fn run_browser<A, F, R>(
    app: &App<A, F>,
    playback: &PlaybackCoordinator,
    clipboard: &Clipboard<R>,
    query: SearchQuery,
) -> miette::Result<()>
where
    A: SoundrawApi,
    F: Fetcher + 'static,
    R: ScriptRunner,
{
    let genres = app.genres().into_diagnostic()?;
    let now_playing = Arc::new(Mutex::new(None));
    let subscription = {
        let now_playing = Arc::clone(&now_playing);
        playback.subscribe(move |active| {
            if let Ok(mut slot) = now_playing.lock() {
                *slot = active.cloned();
            }
        })
    };

    let genre_index = query
        .genres
        .first()
        .and_then(|key| genres.genres.iter().position(|genre| &genre.key == key));
    let mut state = BrowserState {
        query,
        genres,
        genre_index,
        samples: Vec::new(),
        total_count: None,
        list: ListState::default(),
        autoplay: false,
        status: "ready".to_string(),
        logs: VecDeque::new(),
        now_playing,
        requested: None,
        passive: None,
    };
    refresh(app, &mut state);

    let mut stdout = io::stdout();
    enable_raw_mode().into_diagnostic()?;
    stdout.execute(EnterAlternateScreen).into_diagnostic()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;
    terminal.clear().into_diagnostic()?;

    let outcome = event_loop(&mut terminal, app, playback, clipboard, &mut state);

    disable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
    playback.unsubscribe(subscription);
    outcome
}

fn event_loop<A, F, R>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &App<A, F>,
    playback: &PlaybackCoordinator,
    clipboard: &Clipboard<R>,
    state: &mut BrowserState,
) -> miette::Result<()>
where
    A: SoundrawApi,
    F: Fetcher + 'static,
    R: ScriptRunner,
{
    loop {
        collect_playback_results(state);
        terminal
            .draw(|frame| draw_browser(frame, state))
            .into_diagnostic()?;

        if event::poll(Duration::from_millis(120)).into_diagnostic()? {
            if let Event::Key(key) = event::read().into_diagnostic()? {
                if handle_key(key, app, playback, clipboard, state) {
                    return Ok(());
                }
            }
        }
    }
}

fn collect_playback_results(state: &mut BrowserState) {
    if let Some(result) = state.requested.as_ref().and_then(|pending| pending.poll()) {
        state.requested = None;
        if let Err(err) = result {
            state.status = format!("Playback failed: {err}");
        }
    }
    if let Some(result) = state.passive.as_ref().and_then(|pending| pending.poll()) {
        state.passive = None;
        if let Err(err) = result {
            tracing::warn!(error = %err, "auto-play failed");
            state.push_log(format!("auto-play failed: {err}"));
        }
    }
}

fn handle_key<A, F, R>(
    key: KeyEvent,
    app: &App<A, F>,
    playback: &PlaybackCoordinator,
    clipboard: &Clipboard<R>,
    state: &mut BrowserState,
) -> bool
where
    A: SoundrawApi,
    F: Fetcher + 'static,
    R: ScriptRunner,
{
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Up | KeyCode::Char('k') => move_selection(state, -1, playback),
        KeyCode::Down | KeyCode::Char('j') => move_selection(state, 1, playback),
        KeyCode::Char(' ') | KeyCode::Enter => {
            if let Some(sample) = state.selected().cloned() {
                state.status = format!("Loading {}", sample.name);
                state.requested = Some(playback.toggle(&sample));
            }
        }
        KeyCode::Char('s') => {
            let _ = playback.stop();
            state.status = "stopped".to_string();
        }
        KeyCode::Char('a') => {
            state.autoplay = !state.autoplay;
            state.status = format!("auto-play {}", if state.autoplay { "on" } else { "off" });
        }
        KeyCode::Char('e') => {
            if let Some(sample) = state.selected().cloned() {
                state.status = match app.export_to_clipboard(&sample, clipboard) {
                    Ok(file) => format!("Exported to {} (copied to clipboard)", file.path),
                    Err(err) => format!("Export failed: {err}"),
                };
            }
        }
        KeyCode::Char('c') => {
            if let Some(sample) = state.selected().cloned() {
                state.status = match app.share_to_clipboard(&sample, clipboard) {
                    Ok(url) => format!("Copied link {url}"),
                    Err(err) => format!("Copy link failed: {err}"),
                };
            }
        }
        KeyCode::Char('p') => {
            if let Some(sample) = state.selected().cloned() {
                state.status = match app.prepare_sample(&sample) {
                    Ok(file) => format!("Ready at {}", file.path),
                    Err(err) => format!("Prepare failed: {err}"),
                };
            }
        }
        KeyCode::Char('g') => cycle_genre(app, state, 1),
        KeyCode::Char('G') => cycle_genre(app, state, -1),
        KeyCode::Char('n') => {
            state.query.page = state.query.page.saturating_add(1);
            refresh(app, state);
        }
        KeyCode::Char('b') => {
            if state.query.page > 1 {
                state.query.page -= 1;
                refresh(app, state);
            }
        }
        _ => {}
    }
    false
}

fn move_selection(state: &mut BrowserState, delta: i32, playback: &PlaybackCoordinator) {
    if state.samples.is_empty() {
        return;
    }
    let last = state.samples.len() as i32 - 1;
    let current = state.list.selected().map(|index| index as i32).unwrap_or(0);
    let next = (current + delta).clamp(0, last) as usize;
    if Some(next) == state.list.selected() {
        return;
    }
    state.list.select(Some(next));
    if state.autoplay {
        if let Some(sample) = state.samples.get(next) {
            state.passive = Some(playback.play(sample));
        }
    }
}

fn cycle_genre<A, F>(app: &App<A, F>, state: &mut BrowserState, step: i32)
where
    A: SoundrawApi,
    F: Fetcher + 'static,
{
    let count = state.genres.genres.len() as i32;
    if count == 0 {
        return;
    }
    // -1 stands for "all genres".
    let current = state.genre_index.map(|index| index as i32).unwrap_or(-1);
    let mut next = current + step;
    if next >= count {
        next = -1;
    } else if next < -1 {
        next = count - 1;
    }
    state.genre_index = (next >= 0).then_some(next as usize);
    state.query.genres = state
        .genre_index
        .and_then(|index| state.genres.genres.get(index))
        .map(|genre| vec![genre.key.clone()])
        .unwrap_or_default();
    state.query.page = 1;
    refresh(app, state);
}

fn refresh<A, F>(app: &App<A, F>, state: &mut BrowserState)
where
    A: SoundrawApi,
    F: Fetcher + 'static,
{
    match app.search(state.query.clone()) {
        Ok(result) => {
            state.status = format!(
                "{} samples on page {}",
                result.samples.len(),
                result.page
            );
            state.samples = result.samples;
            state.total_count = result.total_count;
            state
                .list
                .select((!state.samples.is_empty()).then_some(0));
        }
        Err(err) => {
            state.status = search_failure(&err);
            state.samples.clear();
            state.list.select(None);
        }
    }
}

fn search_failure(err: &SoundrawError) -> String {
    if err.is_configuration() {
        format!("Setup required: {err}")
    } else {
        format!("Search failed: {err}")
    }
}

fn draw_browser(frame: &mut ratatui::Frame, state: &mut BrowserState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3 + LOGS_MAX as u16),
        ])
        .split(frame.area());

    let autoplay = if state.autoplay { "on" } else { "off" };
    let total = state
        .total_count
        .map(|count| format!(" of {count}"))
        .unwrap_or_default();
    let header = Paragraph::new(vec![Line::from(vec![
        Span::styled(
            "SOUNDRAW",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!(
            "   Genre: {}   Page: {}{total}   Auto-play: {autoplay}",
            state.genre_label(),
            state.query.page
        )),
    ])])
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let playing = state
        .now_playing
        .lock()
        .ok()
        .and_then(|slot| slot.clone());
    let items = state
        .samples
        .iter()
        .map(|sample| {
            let active = playing.as_ref() == Some(&sample.id);
            let marker = if active { "▶ " } else { "  " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::raw(sample.name.clone()),
            ];
            if let Some(bpm) = sample.bpm_label() {
                spans.push(Span::styled(
                    format!("  {bpm}"),
                    Style::default().fg(Color::Gray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Samples"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[1], &mut state.list);

    let mut lines = vec![
        Line::from(Span::styled(
            state.status.clone(),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(Span::styled(HELP, Style::default().fg(Color::Gray))),
    ];
    lines.extend(
        state
            .logs
            .iter()
            .map(|line| Line::from(Span::styled(line.clone(), Style::default().fg(Color::Red)))),
    );
    let footer = Paragraph::new(lines)
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_failure_flags_setup() {
        assert!(search_failure(&SoundrawError::MissingToken).starts_with("Setup required"));
        assert!(
            search_failure(&SoundrawError::Network("timeout".to_string()))
                .starts_with("Search failed")
        );
    }
}
