// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Screen geometry. Pure arithmetic on terminal cells so the reducer can
//! page by the real list height and the shell can place widgets without
//! recomputing anything.

const PREVIEW_PERCENT: u16 = 30;
const MIN_COLUMN_WIDTH: u16 = 20;
const MAX_LOG_ROWS: u16 = 10;
/// Header, footer and the blank rows around them.
const CHROME_ROWS: u16 = 5;
/// Column title and the blank row under it.
const COLUMN_CHROME_ROWS: u16 = 2;
const EDITOR_PERCENT: u16 = 95;
const EDITOR_CHROME_ROWS: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Width of each stack column, in stack order.
    pub column_widths: Vec<u16>,
    pub preview_width: u16,
    /// Rows shared by the columns and the preview.
    pub body_height: u16,
    /// Rows of the log panel; zero when hidden.
    pub log_height: u16,
    /// Item rows visible inside one column.
    pub list_rows: u16,
}

fn percent(value: u16, pct: u16) -> u16 {
    // Never larger than `value`, so the narrowing cannot truncate.
    (u32::from(value) * u32::from(pct) / 100) as u16
}

/// Splits the screen between the stack columns, the preview and the log.
///
/// Widths follow the focus: the active column gets 40% of the non-preview
/// width, its parent 30%, and every other column an equal share of the
/// remaining 30%, never narrower than 20 cells. Deep stacks can therefore
/// ask for more than the screen has; the shell clips from the right.
pub fn allocate(viewport: Viewport, columns: usize, active: usize, show_logs: bool) -> Allocation {
    let preview_width = percent(viewport.width, PREVIEW_PERCENT);
    let total = viewport.width - preview_width;

    let column_widths = match columns {
        0 => Vec::new(),
        1 => vec![total],
        2 => {
            let first = percent(total, 40);
            vec![first, total - first]
        }
        _ => {
            let others = if active == 0 { columns - 1 } else { columns - 2 };
            let shared = (u32::from(percent(total, 30)) / others.max(1) as u32) as u16;
            (0..columns)
                .map(|index| {
                    let width = if index == active {
                        percent(total, 40)
                    } else if index + 1 == active {
                        percent(total, 30)
                    } else {
                        shared
                    };
                    width.max(MIN_COLUMN_WIDTH)
                })
                .collect()
        }
    };

    let mut body_height = viewport.height.saturating_sub(CHROME_ROWS);
    let mut log_height = 0;
    if show_logs {
        log_height = MAX_LOG_ROWS.min(body_height / 3);
        body_height = body_height.saturating_sub(log_height + 1);
    }

    Allocation {
        column_widths,
        preview_width,
        body_height,
        log_height,
        list_rows: body_height.saturating_sub(COLUMN_CHROME_ROWS),
    }
}

/// Visible item rows per column; at least one so paging always moves.
pub fn list_rows(viewport: Viewport, show_logs: bool) -> usize {
    usize::from(allocate(viewport, 1, 0, show_logs).list_rows.max(1))
}

/// Outer size of the editor overlay.
pub fn editor_size(viewport: Viewport) -> (u16, u16) {
    (
        percent(viewport.width, EDITOR_PERCENT),
        percent(viewport.height, EDITOR_PERCENT),
    )
}

/// Text rows inside the editor overlay.
pub fn editor_rows(viewport: Viewport) -> usize {
    let (_, height) = editor_size(viewport);
    usize::from(height.saturating_sub(EDITOR_CHROME_ROWS).max(1))
}
