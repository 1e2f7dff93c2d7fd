// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Preview pane: what the hovered (not drilled) item looks like one level down.

use crate::record::{
    self, MORE_ITEMS, NO_COLLECTIONS, NO_ITEMS, cross_reference, display_label, function_name,
    is_metadata_entry, is_placeholder, record_lines,
};
use crate::{
    BrowseError, Column, ColumnKind, PreviewPayload, PreviewQuery, PreviewSerial, Record,
    RecordPage, ServiceConfig,
};

const PREVIEW_TITLE: &str = "Preview";
const NO_PREVIEW: &str = "No preview available at this level";

/// What the preview pane should do for the current cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewPlan {
    Fetch {
        service: ServiceConfig,
        query: PreviewQuery,
    },
    Show {
        title: String,
        items: Vec<String>,
        records: Vec<Record>,
    },
}

impl PreviewPlan {
    fn text(title: &str, items: Vec<String>) -> Self {
        Self::Show {
            title: title.to_owned(),
            items,
            records: Vec::new(),
        }
    }

    fn nothing() -> Self {
        Self::text(PREVIEW_TITLE, vec![NO_PREVIEW.to_owned()])
    }
}

/// Decides the preview for `column` at its cursor.
///
/// `services` resolves service names at the root level (with their own
/// connection, since nothing is bound yet); `connection` is the service
/// bound by the last drill from the root.
pub fn plan_preview(
    column: &Column,
    services: &[ServiceConfig],
    connection: Option<&ServiceConfig>,
    page_size: usize,
) -> PreviewPlan {
    let Some(selected) = column.selected() else {
        return PreviewPlan::nothing();
    };

    match column.kind {
        ColumnKind::Service => match services.iter().find(|service| service.name == selected) {
            Some(service) => PreviewPlan::Fetch {
                service: service.clone(),
                query: PreviewQuery::Collections,
            },
            None => PreviewPlan::text(PREVIEW_TITLE, vec![format!("Error: service {selected:?} not found")]),
        },
        ColumnKind::Collection => {
            if is_placeholder(selected) {
                return PreviewPlan::nothing();
            }
            if is_metadata_entry(selected) {
                let url = connection
                    .map(|service| format!("{}/$metadata", service.url.trim_end_matches('/')))
                    .unwrap_or_default();
                return PreviewPlan::text("Metadata Preview", metadata_overview(&url));
            }
            if let Some(name) = function_name(selected) {
                return PreviewPlan::text("Function Preview", function_overview(name));
            }
            match connection {
                Some(service) => PreviewPlan::Fetch {
                    service: service.clone(),
                    query: PreviewQuery::Records {
                        collection: record::collection_name(selected).to_owned(),
                        limit: page_size,
                    },
                },
                None => PreviewPlan::nothing(),
            }
        }
        ColumnKind::RecordList => match column.selected_record() {
            Some(record) => {
                let items = record_lines(record)
                    .unwrap_or_else(|error| vec![format!("Error formatting JSON: {error}")]);
                PreviewPlan::text("JSON Preview", items)
            }
            None => PreviewPlan::nothing(),
        },
        ColumnKind::RecordDetail => match cross_reference(&column.items, column.cursor) {
            Some(uri) => PreviewPlan::text("Navigation", navigation_overview(&uri)),
            None => PreviewPlan::nothing(),
        },
        ColumnKind::Metadata => PreviewPlan::nothing(),
    }
}

fn metadata_overview(url: &str) -> Vec<String> {
    [
        "Type: OData Service Metadata",
        "",
        &format!("URL: {url}"),
        "",
        "Service Metadata - press Enter to view the full metadata document",
        "",
        "Contains:",
        "• Entity Types and Sets",
        "• Function Imports",
        "• Complex Types",
        "• Associations",
        "• Service Operations",
    ]
    .iter()
    .map(|line| (*line).to_owned())
    .collect()
}

fn function_overview(name: &str) -> Vec<String> {
    vec![
        format!("Name: {name}"),
        "Type: Function Import".to_owned(),
        String::new(),
        format!("Description: OData Function Import: {name}"),
        String::new(),
        "Parameters: listed in the service metadata".to_owned(),
        String::new(),
        "Function imports are shown for reference and cannot be executed here".to_owned(),
    ]
}

fn navigation_overview(uri: &str) -> Vec<String> {
    vec![
        format!("URI: {uri}"),
        String::new(),
        "Navigation property - related records are not fetched".to_owned(),
    ]
}

/// Display rows for a page of records: one label per record, then a
/// "more" marker when the page was truncated.
pub fn page_items(page: &RecordPage) -> Vec<String> {
    let mut items = page.records.iter().map(display_label).collect::<Vec<_>>();
    if page.has_more {
        items.push(MORE_ITEMS.to_owned());
    }
    if items.is_empty() {
        items.push(NO_ITEMS.to_owned());
    }
    items
}

/// The always-present preview pane.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewState {
    pub title: String,
    pub items: Vec<String>,
    pub records: Vec<Record>,
    pub loading: bool,
    latest: PreviewSerial,
    next: PreviewSerial,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self {
            title: PREVIEW_TITLE.to_owned(),
            items: vec!["Select a service to preview its collections".to_owned()],
            records: Vec::new(),
            loading: false,
            latest: PreviewSerial::new(0),
            next: PreviewSerial::new(1),
        }
    }
}

impl PreviewState {
    /// Marks the pane loading and returns the serial the response must carry.
    /// Current rows stay until that response arrives.
    pub fn begin(&mut self) -> PreviewSerial {
        self.latest = self.next.bump();
        self.loading = true;
        self.latest
    }

    /// Shows synchronous content. Anything still in flight becomes stale.
    pub fn show(&mut self, title: String, items: Vec<String>, records: Vec<Record>) {
        self.latest = self.next.bump();
        self.loading = false;
        self.title = title;
        self.items = items;
        self.records = records;
    }

    pub const fn latest(&self) -> PreviewSerial {
        self.latest
    }

    /// Applies a fetched preview if it answers the latest request. Returns
    /// whether the pane changed.
    pub fn accept(&mut self, serial: PreviewSerial, result: Result<PreviewPayload, BrowseError>) -> bool {
        if serial != self.latest {
            return false;
        }
        self.loading = false;
        match result {
            Ok(PreviewPayload::Collections(names)) => {
                self.title = "Collections Preview".to_owned();
                self.items = if names.is_empty() {
                    vec![NO_COLLECTIONS.to_owned()]
                } else {
                    names
                };
                self.records = Vec::new();
            }
            Ok(PreviewPayload::Records(page)) => {
                self.title = "Records Preview".to_owned();
                self.items = page_items(&page);
                self.records = page.records;
            }
            Err(error) => {
                self.title = PREVIEW_TITLE.to_owned();
                self.items = vec![format!("Error: {error}")];
                self.records = Vec::new();
            }
        }
        true
    }
}
