// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Records and their textual forms.
//!
//! A record is a JSON object as returned by the remote service. The browser
//! shows it as a one-line label in record lists and as pretty-printed JSON
//! lines in detail columns and the editor.

use serde_json::{Map, Value};

use crate::BrowseError;

pub type Record = Map<String, Value>;

pub const LOADING: &str = "Loading...";
pub const MORE_ITEMS: &str = "[...more items]";
pub const NO_ITEMS: &str = "(No items)";
pub const NO_COLLECTIONS: &str = "(No entity sets)";
pub const FUNCTION_PREFIX: &str = "[FUNC] ";
pub const METADATA_ENTRY: &str = "$metadata";

const BOOKKEEPING_PREFIX: &str = "__";

const KEY_FIELDS: [&str; 15] = [
    "Program",
    "Class",
    "Interface",
    "Package",
    "Function",
    "ID",
    "Id",
    "Key",
    "Code",
    "Number",
    "ProductID",
    "CategoryID",
    "CustomerID",
    "OrderID",
    "EmployeeID",
];

const DESCRIPTION_FIELDS: [&str; 4] = ["Title", "Name", "Description", "Text"];

/// Status markers that occupy a row without standing for a selectable item.
pub fn is_placeholder(item: &str) -> bool {
    matches!(item, LOADING | MORE_ITEMS | NO_ITEMS | NO_COLLECTIONS)
}

/// Recovers the raw collection name from a possibly decorated list item
/// such as `Products [SFCU]`.
pub fn collection_name(item: &str) -> &str {
    match item.find(" [") {
        Some(index) => &item[..index],
        None => item,
    }
}

/// Name of a callable operation, when the item is flagged as one.
pub fn function_name(item: &str) -> Option<&str> {
    item.strip_prefix(FUNCTION_PREFIX)
}

pub fn is_metadata_entry(item: &str) -> bool {
    collection_name(item) == METADATA_ENTRY
}

/// One-line label for a record in a list column.
pub fn display_label(record: &Record) -> String {
    for field in KEY_FIELDS {
        let Some(value) = record.get(field).filter(|value| !value.is_null()) else {
            continue;
        };
        let key = scalar_text(value);
        let description = DESCRIPTION_FIELDS.iter().find_map(|name| {
            record
                .get(*name)
                .filter(|value| !value.is_null() && value.as_str() != Some(""))
                .map(scalar_text)
        });
        return match description {
            Some(description) => format!("{key} | {description}"),
            None => key,
        };
    }

    record
        .iter()
        .find(|(name, value)| !value.is_null() && !name.starts_with(BOOKKEEPING_PREFIX))
        .map(|(name, value)| format!("{name}: {}", scalar_text(value)))
        .unwrap_or_else(|| format!("Entity ({} fields)", record.len()))
}

/// Pretty-printed JSON lines of a record.
pub fn record_lines(record: &Record) -> Result<Vec<String>, BrowseError> {
    let text = serde_json::to_string_pretty(record)
        .map_err(|error| BrowseError::Format(error.to_string()))?;
    Ok(text.lines().map(str::to_owned).collect())
}

/// Parses edited lines back into one record. The text must be a JSON object.
pub fn parse_record(lines: &[String]) -> Result<Record, BrowseError> {
    let text = lines.join("\n");
    let value: Value =
        serde_json::from_str(&text).map_err(|error| BrowseError::Format(error.to_string()))?;
    match value {
        Value::Object(record) => Ok(record),
        other => Err(BrowseError::Format(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Derives the server-addressable key of a record, best effort.
///
/// Self-describing metadata (`__metadata.id`, then `__metadata.uri`) wins;
/// otherwise the conventional key fields are tried, then the first plain
/// scalar that does not look like a date.
pub fn resolve_key(record: &Record) -> Result<String, BrowseError> {
    if let Some(metadata) = record.get("__metadata").and_then(Value::as_object) {
        for field in ["id", "uri"] {
            if let Some(key) = metadata
                .get(field)
                .and_then(Value::as_str)
                .and_then(key_from_uri)
            {
                return Ok(key.to_owned());
            }
        }
    }

    for field in KEY_FIELDS {
        if let Some(key) = record.get(field).and_then(key_literal) {
            return Ok(key);
        }
    }

    record
        .iter()
        .filter(|(name, _)| {
            !name.starts_with(BOOKKEEPING_PREFIX) && !name.to_ascii_lowercase().contains("date")
        })
        .find_map(|(_, value)| key_literal(value))
        .ok_or(BrowseError::KeyResolution)
}

/// Extracts the target of a deferred navigation link when the line at
/// `index` belongs to one.
///
/// Compact JSON carries `__deferred` and the URI on one line; pretty JSON
/// splits them, so the `"__deferred": {` opener and the `"uri"` member
/// under it both count.
pub fn cross_reference(lines: &[String], index: usize) -> Option<String> {
    let line = lines.get(index)?;
    if line.contains("__deferred") {
        if let Some(uri) = extract_uri(line) {
            return Some(uri.to_owned());
        }
        return lines
            .get(index + 1)
            .filter(|next| next.contains("\"uri\""))
            .and_then(|next| extract_uri(next))
            .map(str::to_owned);
    }
    if line.contains("\"uri\"") && index > 0 && lines[index - 1].contains("__deferred") {
        return extract_uri(line).map(str::to_owned);
    }
    None
}

fn extract_uri(line: &str) -> Option<&str> {
    let start = line.find("https://").or_else(|| line.find("http://"))?;
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn key_from_uri(uri: &str) -> Option<&str> {
    let open = uri.rfind('(')?;
    let close = uri[open..].find(')')?;
    let key = &uri[open + 1..open + close];
    (!key.is_empty()).then_some(key)
}

fn key_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(format!("'{}'", text.replace('\'', "''"))),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
