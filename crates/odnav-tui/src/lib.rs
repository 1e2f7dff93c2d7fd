// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod dispatch;

pub use dispatch::Dispatcher;

use anyhow::{Context, Result};
use crossterm::event::{
    self, Event as TerminalEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use odnav_app::layout::{self, Allocation, Viewport};
use odnav_app::record::is_placeholder;
use odnav_app::{
    AppState, Column, Command, Completion, EditMode, EditSession, Event, LogLevel, Motion,
    RemoteService,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const LOADING_SUFFIX: &str = " (Loading...)";

pub fn run_app(state: &mut AppState, remote: Arc<dyn RemoteService>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (tx, rx) = mpsc::channel();
    let dispatcher = Dispatcher::new(remote, tx);

    let mut result = Ok(());
    match terminal.size() {
        Ok(size) => {
            state.dispatch(Event::Input(Command::Resize {
                width: size.width,
                height: size.height,
            }));
            dispatcher.submit_all(state.start());
        }
        Err(error) => result = Err(error).context("read terminal size"),
    }

    while result.is_ok() {
        process_completions(state, &dispatcher, &rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(POLL_INTERVAL) {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error).context("poll event");
                break;
            }
        };
        if !has_event {
            continue;
        }
        match event::read() {
            Ok(TerminalEvent::Key(key)) => {
                if handle_key_event(state, &dispatcher, key) {
                    break;
                }
            }
            Ok(TerminalEvent::Resize(width, height)) => {
                dispatcher.submit_all(
                    state.dispatch(Event::Input(Command::Resize { width, height })),
                );
            }
            Ok(_) => {}
            Err(error) => result = Err(error).context("read event"),
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

/// Feeds every completion that has arrived so far through the reducer and
/// dispatches whatever follow-up work it asks for.
fn process_completions(state: &mut AppState, dispatcher: &Dispatcher, rx: &Receiver<Completion>) {
    while let Ok(completion) = rx.try_recv() {
        dispatcher.submit_all(state.dispatch(Event::Completed(completion)));
    }
}

fn handle_key_event(state: &mut AppState, dispatcher: &Dispatcher, key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    if let Some(command) = command_for_key(state.editor.is_some(), key) {
        dispatcher.submit_all(state.dispatch(Event::Input(command)));
    }
    state.should_quit()
}

pub fn command_for_key(editing: bool, key: KeyEvent) -> Option<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }
    match key.code {
        KeyCode::F(10) => return Some(Command::Quit),
        KeyCode::F(9) => return Some(Command::ToggleLogs),
        KeyCode::PageUp => return Some(Command::Move(Motion::PageUp)),
        KeyCode::PageDown => return Some(Command::Move(Motion::PageDown)),
        _ => {}
    }

    if editing {
        return editor_command_for_key(key, ctrl);
    }

    let command = match key.code {
        KeyCode::Char('q') => Command::Quit,
        KeyCode::Up | KeyCode::Char('k') => Command::Move(Motion::Up),
        KeyCode::Down | KeyCode::Char('j') => Command::Move(Motion::Down),
        KeyCode::Home => Command::Move(Motion::Home),
        KeyCode::End => Command::Move(Motion::End),
        KeyCode::Right | KeyCode::Enter | KeyCode::Char('l') => Command::DrillIn,
        KeyCode::Left | KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') => Command::Back,
        KeyCode::F(2) => Command::OpenEditor(EditMode::Create),
        KeyCode::F(3) => Command::Read,
        KeyCode::F(4) => Command::OpenEditor(EditMode::Update),
        KeyCode::F(5) => Command::OpenEditor(EditMode::Copy),
        _ => return None,
    };
    Some(command)
}

fn editor_command_for_key(key: KeyEvent, ctrl: bool) -> Option<Command> {
    let command = match key.code {
        KeyCode::F(2) => Command::Commit,
        KeyCode::Esc => Command::Cancel,
        KeyCode::Enter => Command::SplitLine,
        KeyCode::Backspace => Command::Backspace,
        KeyCode::Delete => Command::DeleteForward,
        KeyCode::Up => Command::Move(Motion::Up),
        KeyCode::Down => Command::Move(Motion::Down),
        KeyCode::Left => Command::Move(Motion::Left),
        KeyCode::Right => Command::Move(Motion::Right),
        KeyCode::Home if ctrl => Command::Move(Motion::BufferStart),
        KeyCode::End if ctrl => Command::Move(Motion::BufferEnd),
        KeyCode::Home => Command::Move(Motion::Home),
        KeyCode::End => Command::Move(Motion::End),
        KeyCode::Tab => Command::InsertChar(' '),
        KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
            Command::InsertChar(ch)
        }
        _ => return None,
    };
    Some(command)
}

fn cells(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState) {
    let area = frame.area();
    let allocation = layout::allocate(
        Viewport::new(area.width, area.height),
        state.stack.len(),
        state.stack.active_index(),
        state.show_logs,
    );
    let log_rows = if state.show_logs {
        allocation.log_height + 1
    } else {
        0
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(allocation.body_height),
            Constraint::Length(log_rows),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(Paragraph::new(header_line(state)), rows[0]);
    render_body(frame, rows[2], state, &allocation);
    if state.show_logs {
        render_log(frame, rows[3], state);
    }
    let footer = Paragraph::new(footer_text(state.editor.is_some()))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, rows[5]);

    if let Some(session) = &state.editor {
        render_editor(frame, session);
    }
}

fn header_line(state: &AppState) -> Line<'static> {
    let mut spans = vec![Span::styled(
        "odnav",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];
    match state.connection() {
        Some(service) => spans.push(Span::raw(format!(" | {}", service.name))),
        None => spans.push(Span::styled(
            " | no service",
            Style::default().fg(Color::DarkGray),
        )),
    }
    if state.loading() {
        spans.push(Span::styled(
            " | Loading...",
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn footer_text(editing: bool) -> &'static str {
    if editing {
        "F2 save | Esc cancel | Ctrl+Home/Ctrl+End top/bottom | F9 log | F10 quit"
    } else {
        "↑↓ move | →/Enter open | ←/Esc back | F2 new | F3 read | F4 edit | F5 copy | F9 log | q quit"
    }
}

/// Index of the leftmost column that still fits in `room` cells when
/// columns are laid out right to left. The last column always shows.
fn first_visible_column(widths: &[u16], room: u16) -> usize {
    let mut total = 0_u32;
    let mut first = widths.len();
    for (index, width) in widths.iter().enumerate().rev() {
        total += u32::from(*width);
        if total > u32::from(room) && first < widths.len() {
            break;
        }
        first = index;
    }
    first
}

fn render_body(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, allocation: &Allocation) {
    let preview_width = allocation.preview_width.min(area.width);
    let room = area.width - preview_width;
    let first = first_visible_column(&allocation.column_widths, room);

    let mut x = area.x;
    for (column, width) in state
        .stack
        .columns()
        .iter()
        .zip(&allocation.column_widths)
        .skip(first)
    {
        let width = (*width).min(area.x + room - x);
        if width == 0 {
            break;
        }
        render_column(frame, Rect::new(x, area.y, width, area.height), column);
        x += width;
    }

    render_preview(
        frame,
        Rect::new(area.x + room, area.y, preview_width, area.height),
        state,
    );
}

/// Column title, annotated with the visible range once the rows overflow.
fn title_with_range(title: &str, scroll: usize, rows: usize, total: usize) -> String {
    if rows == 0 || total <= rows {
        return title.to_owned();
    }
    let last = (scroll + rows).min(total);
    format!("{title} ({}-{last}/{total})", scroll + 1)
}

fn render_column(frame: &mut ratatui::Frame<'_>, area: Rect, column: &Column) {
    let rows = usize::from(area.height.saturating_sub(2));
    let title = title_with_range(&column.title, column.scroll_offset, rows, column.items.len());
    let border = if column.focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let lines = column
        .items
        .iter()
        .enumerate()
        .skip(column.scroll_offset)
        .take(rows)
        .map(|(index, item)| {
            let style = if index == column.cursor && column.focused {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else if index == column.cursor {
                Style::default().add_modifier(Modifier::REVERSED)
            } else if is_placeholder(item) {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            Line::styled(item.clone(), style)
        })
        .collect::<Vec<_>>();

    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(widget, area);
}

fn render_preview(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    if area.width == 0 {
        return;
    }
    let preview = &state.preview;
    let mut title = preview.title.clone();
    if preview.loading {
        title.push_str(LOADING_SUFFIX);
    }
    let rows = usize::from(area.height.saturating_sub(2));
    let lines = preview
        .items
        .iter()
        .take(rows)
        .map(|item| Line::raw(item.clone()))
        .collect::<Vec<_>>();
    let widget = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        );
    frame.render_widget(widget, area);
}

fn render_log(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let rows = usize::from(area.height.saturating_sub(1));
    let title = if state.loading() {
        "Log [Loading...]"
    } else {
        "Log"
    };
    let lines = state
        .log
        .tail(rows)
        .map(|entry| {
            let style = match entry.level {
                LogLevel::Info => Style::default(),
                LogLevel::Warn => Style::default().fg(Color::Yellow),
                LogLevel::Error => Style::default().fg(Color::Red),
            };
            Line::styled(entry.render(), style)
        })
        .collect::<Vec<_>>();
    let widget = Paragraph::new(lines).block(Block::default().title(title).borders(Borders::TOP));
    frame.render_widget(widget, area);
}

fn editor_title(session: &EditSession) -> String {
    let verb = match session.mode {
        EditMode::Create => "Create",
        EditMode::Update => "Update",
        EditMode::Copy => "Copy",
    };
    let saving = if session.pending.is_some() {
        " (saving...)"
    } else {
        ""
    };
    format!("{verb} record in {}{saving}", session.collection)
}

/// First character column shown so the cursor stays inside `width`.
fn horizontal_offset(cursor_col: usize, width: u16) -> usize {
    let width = usize::from(width.max(1));
    (cursor_col + 1).saturating_sub(width)
}

fn render_editor(frame: &mut ratatui::Frame<'_>, session: &EditSession) {
    let area = frame.area();
    let (width, height) = layout::editor_size(Viewport::new(area.width, area.height));
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .title(editor_title(session))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);
    let text_area = parts[0];

    let buffer = &session.buffer;
    let (cursor_line, cursor_col) = buffer.cursor();
    let scroll = buffer.scroll_line();
    let offset = horizontal_offset(cursor_col, text_area.width);
    let lines = buffer
        .lines()
        .iter()
        .skip(scroll)
        .take(usize::from(text_area.height))
        .map(|line| Line::raw(line.chars().skip(offset).collect::<String>()))
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines), text_area);

    let hint = format!(
        "F2 save | Esc cancel | Ln {}, Col {}",
        cursor_line + 1,
        cursor_col + 1
    );
    frame.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
        parts[2],
    );

    if cursor_line >= scroll && cursor_line < scroll + usize::from(text_area.height) {
        frame.set_cursor_position((
            text_area.x + cells(cursor_col - offset),
            text_area.y + cells(cursor_line - scroll),
        ));
    }
}
