// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Line-oriented edit buffer behind the full-screen record editor.
//!
//! Columns are counted in characters, not bytes, so multi-byte text edits
//! cleanly. Every transition keeps `cursor_line < lines.len()` (unless the
//! buffer is empty), `cursor_col <= chars(lines[cursor_line])`, and the
//! cursor line inside the visible window.

use crate::{ColumnId, Motion, Record, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Create,
    Update,
    Copy,
}

impl EditMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Copy => "copy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    lines: Vec<String>,
    cursor_line: usize,
    cursor_col: usize,
    scroll_line: usize,
    view_rows: usize,
}

impl EditBuffer {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            cursor_line: 0,
            cursor_col: 0,
            scroll_line: 0,
            view_rows: 1,
        }
    }

    /// An empty JSON object with the cursor on the indented middle line.
    pub fn create_template() -> Self {
        let mut buffer = Self::new(vec!["{".to_owned(), "  ".to_owned(), "}".to_owned()]);
        buffer.cursor_line = 1;
        buffer.cursor_col = 2;
        buffer
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub const fn cursor(&self) -> (usize, usize) {
        (self.cursor_line, self.cursor_col)
    }

    pub const fn scroll_line(&self) -> usize {
        self.scroll_line
    }

    pub const fn view_rows(&self) -> usize {
        self.view_rows
    }

    pub fn set_view_rows(&mut self, rows: usize) {
        self.view_rows = rows.max(1);
        self.ensure_visible();
    }

    pub fn insert_char(&mut self, ch: char) {
        while self.cursor_line >= self.lines.len() {
            self.lines.push(String::new());
        }
        let line = &mut self.lines[self.cursor_line];
        let at = byte_offset(line, self.cursor_col);
        line.insert(at, ch);
        self.cursor_col += 1;
        self.ensure_visible();
    }

    /// Splits the current line at the cursor; the cursor moves to the start
    /// of the new second half.
    pub fn split_line(&mut self) {
        if self.cursor_line >= self.lines.len() {
            self.lines.push(String::new());
            self.cursor_line = self.lines.len() - 1;
            self.cursor_col = 0;
            self.ensure_visible();
            return;
        }
        let line = &mut self.lines[self.cursor_line];
        let at = byte_offset(line, self.cursor_col);
        let tail = line.split_off(at);
        self.lines.insert(self.cursor_line + 1, tail);
        self.cursor_line += 1;
        self.cursor_col = 0;
        self.ensure_visible();
    }

    pub fn backspace(&mut self) {
        if self.cursor_line >= self.lines.len() {
            return;
        }
        if self.cursor_col > 0 {
            let line = &mut self.lines[self.cursor_line];
            let at = byte_offset(line, self.cursor_col - 1);
            line.remove(at);
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            let current = self.lines.remove(self.cursor_line);
            self.cursor_line -= 1;
            let previous = &mut self.lines[self.cursor_line];
            self.cursor_col = char_len(previous);
            previous.push_str(&current);
        }
        self.ensure_visible();
    }

    pub fn delete_forward(&mut self) {
        if self.cursor_line >= self.lines.len() {
            return;
        }
        let len = char_len(&self.lines[self.cursor_line]);
        if self.cursor_col < len {
            let line = &mut self.lines[self.cursor_line];
            let at = byte_offset(line, self.cursor_col);
            line.remove(at);
        } else if self.cursor_line + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_line + 1);
            self.lines[self.cursor_line].push_str(&next);
        }
    }

    pub fn apply_motion(&mut self, motion: Motion) {
        if self.lines.is_empty() {
            return;
        }
        let last = self.lines.len() - 1;
        self.cursor_line = self.cursor_line.min(last);

        match motion {
            Motion::Up => self.move_to_line(self.cursor_line.saturating_sub(1)),
            Motion::Down => self.move_to_line((self.cursor_line + 1).min(last)),
            Motion::PageUp => self.move_to_line(self.cursor_line.saturating_sub(self.view_rows)),
            Motion::PageDown => self.move_to_line((self.cursor_line + self.view_rows).min(last)),
            Motion::Left => {
                if self.cursor_col > 0 {
                    self.cursor_col -= 1;
                } else if self.cursor_line > 0 {
                    self.cursor_line -= 1;
                    self.cursor_col = self.current_len();
                }
            }
            Motion::Right => {
                if self.cursor_col < self.current_len() {
                    self.cursor_col += 1;
                } else if self.cursor_line < last {
                    self.cursor_line += 1;
                    self.cursor_col = 0;
                }
            }
            Motion::Home => self.cursor_col = 0,
            Motion::End => self.cursor_col = self.current_len(),
            Motion::BufferStart => {
                self.cursor_line = 0;
                self.cursor_col = 0;
            }
            Motion::BufferEnd => {
                self.cursor_line = last;
                self.cursor_col = self.current_len();
            }
        }
        self.ensure_visible();
    }

    fn move_to_line(&mut self, line: usize) {
        self.cursor_line = line;
        self.cursor_col = self.cursor_col.min(self.current_len());
    }

    fn current_len(&self) -> usize {
        self.lines
            .get(self.cursor_line)
            .map(|line| char_len(line))
            .unwrap_or(0)
    }

    fn ensure_visible(&mut self) {
        if self.cursor_line < self.scroll_line {
            self.scroll_line = self.cursor_line;
        } else if self.cursor_line >= self.scroll_line + self.view_rows {
            self.scroll_line = self.cursor_line + 1 - self.view_rows;
        }
    }
}

fn char_len(line: &str) -> usize {
    line.chars().count()
}

fn byte_offset(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map_or(line.len(), |(index, _)| index)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub ticket: Ticket,
    pub record: Record,
}

/// An open editor: the buffer plus what a commit writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub mode: EditMode,
    pub buffer: EditBuffer,
    pub collection: String,
    /// The record as it was before editing (update and copy).
    pub original: Option<Record>,
    /// Detail column the editor was opened from, refreshed on success.
    pub origin: Option<ColumnId>,
    pub pending: Option<PendingSave>,
}
