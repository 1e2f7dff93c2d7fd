// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Reflows a service metadata document for the read-only metadata column.

const MIN_WIDTH: usize = 20;
const FALLBACK_WIDTH: usize = 80;
/// How far back from the width limit a wrap may look for a break.
const BREAK_WINDOW: usize = 20;

/// Puts adjacent tags on their own lines, drops blank lines and wraps
/// anything longer than `max_width` characters.
pub fn format_metadata(document: &str, max_width: usize) -> Vec<String> {
    let width = if max_width < MIN_WIDTH {
        FALLBACK_WIDTH
    } else {
        max_width
    };
    document
        .replace("><", ">\n<")
        .replace("/>", "/>\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut rest = line;
    while rest.chars().count() > width {
        let window = rest.char_indices().take(width).collect::<Vec<_>>();
        let split = window[width.saturating_sub(BREAK_WINDOW)..]
            .iter()
            .rev()
            .find_map(|&(index, ch)| match ch {
                ' ' | '>' => Some(index + ch.len_utf8()),
                '<' if index > 0 => Some(index),
                _ => None,
            })
            .unwrap_or_else(|| {
                rest.char_indices()
                    .nth(width)
                    .map_or(rest.len(), |(index, _)| index)
            });
        wrapped.push(rest[..split].trim_end().to_owned());
        rest = rest[split..].trim_start();
    }
    if !rest.is_empty() {
        wrapped.push(rest.to_owned());
    }
    wrapped
}
