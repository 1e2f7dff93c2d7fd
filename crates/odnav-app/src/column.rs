// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ColumnId, Motion, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Service,
    Collection,
    RecordList,
    RecordDetail,
    Metadata,
}

impl ColumnKind {
    /// Terminal columns end the drill path.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RecordDetail | Self::Metadata)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Service => "services",
            Self::Collection => "collections",
            Self::RecordList => "records",
            Self::RecordDetail => "detail",
            Self::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    id: ColumnId,
    level: usize,
    pub kind: ColumnKind,
    pub title: String,
    pub items: Vec<String>,
    /// Aligned by index with `items`; trailing items may be status markers.
    pub records: Vec<Record>,
    pub cursor: usize,
    pub scroll_offset: usize,
    pub focused: bool,
    /// Collection the rows belong to (record lists and details).
    pub collection: Option<String>,
    /// Rows requested for a record list; grows with "load more".
    pub limit: usize,
}

impl Column {
    fn new(id: ColumnId, level: usize, kind: ColumnKind, title: String, items: Vec<String>) -> Self {
        Self {
            id,
            level,
            kind,
            title,
            items,
            records: Vec::new(),
            cursor: 0,
            scroll_offset: 0,
            focused: false,
            collection: None,
            limit: 0,
        }
    }

    pub const fn id(&self) -> ColumnId {
        self.id
    }

    pub const fn level(&self) -> usize {
        self.level
    }

    pub fn selected(&self) -> Option<&str> {
        self.items.get(self.cursor).map(String::as_str)
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.records.get(self.cursor)
    }

    /// Replaces rows wholesale, keeping the cursor where it was when the new
    /// rows still reach it.
    pub fn replace_items(&mut self, items: Vec<String>, records: Vec<Record>) {
        self.items = items;
        self.records = records;
        self.clamp();
    }

    pub fn reset_position(&mut self) {
        self.cursor = 0;
        self.scroll_offset = 0;
    }

    fn clamp(&mut self) {
        let last = self.items.len().saturating_sub(1);
        self.cursor = self.cursor.min(last);
        self.scroll_offset = self.scroll_offset.min(self.cursor);
    }

    /// Applies a cursor motion. `visible_rows` is the list height used for
    /// paging and for keeping the cursor on screen. Returns whether the
    /// cursor moved.
    pub fn apply_motion(&mut self, motion: Motion, visible_rows: usize) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let rows = visible_rows.max(1);
        let last = self.items.len() - 1;
        let before = self.cursor;

        match motion {
            Motion::Up => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            Motion::Down => {
                self.cursor = (self.cursor + 1).min(last);
            }
            Motion::PageUp => {
                self.cursor = self.cursor.saturating_sub(rows);
            }
            Motion::PageDown => {
                self.cursor = (self.cursor + rows).min(last);
            }
            Motion::Home | Motion::BufferStart => {
                self.cursor = 0;
            }
            Motion::End | Motion::BufferEnd => {
                self.cursor = last;
            }
            Motion::Left | Motion::Right => {}
        }

        self.keep_visible(rows);
        self.cursor != before
    }

    /// Scrolls just enough that the cursor sits inside `visible_rows`.
    pub fn keep_visible(&mut self, visible_rows: usize) {
        let rows = visible_rows.max(1);
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + rows {
            self.scroll_offset = self.cursor + 1 - rows;
        }
    }
}

/// The drill path from the service list to the current depth.
///
/// Columns beyond the active one are dropped whenever a new level is
/// appended or the user backs out, so the stack is always a single path.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStack {
    columns: Vec<Column>,
    active: usize,
    next_id: ColumnId,
}

impl ColumnStack {
    pub fn new(title: impl Into<String>, items: Vec<String>) -> Self {
        let mut next_id = ColumnId::new(1);
        let mut root = Column::new(next_id.bump(), 0, ColumnKind::Service, title.into(), items);
        root.focused = true;
        Self {
            columns: vec![root],
            active: 0,
            next_id,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub const fn active_index(&self) -> usize {
        self.active
    }

    pub fn keep_cursors_visible(&mut self, visible_rows: usize) {
        for column in &mut self.columns {
            column.keep_visible(visible_rows);
        }
    }

    pub fn active(&self) -> &Column {
        &self.columns[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Column {
        &mut self.columns[self.active]
    }

    pub fn get(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == id)
    }

    pub fn get_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.id == id)
    }

    /// Nearest column of `kind` at or before the active one.
    pub fn nearest(&self, kind: ColumnKind) -> Option<&Column> {
        self.columns[..=self.active]
            .iter()
            .rev()
            .find(|column| column.kind == kind)
    }

    /// Drops everything after the active column, appends a new level and
    /// focuses it.
    pub fn push(&mut self, kind: ColumnKind, title: impl Into<String>, items: Vec<String>) -> ColumnId {
        self.columns.truncate(self.active + 1);
        let id = self.next_id.bump();
        let level = self.columns.len();
        self.columns
            .push(Column::new(id, level, kind, title.into(), items));
        self.active = level;
        self.refocus();
        id
    }

    /// Drops the active column and focuses its parent. No-op at the root.
    pub fn pop(&mut self) -> bool {
        if self.active == 0 {
            return false;
        }
        self.columns.truncate(self.active);
        self.active -= 1;
        self.refocus();
        true
    }

    fn refocus(&mut self) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.focused = index == self.active;
        }
    }
}
