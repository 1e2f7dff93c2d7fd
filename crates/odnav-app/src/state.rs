// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::layout::{self, Viewport};
use crate::metadata::format_metadata;
use crate::preview::{PreviewPlan, PreviewState, page_items, plan_preview};
use crate::record::{
    LOADING, MORE_ITEMS, NO_COLLECTIONS, NO_ITEMS, collection_name, cross_reference, display_label,
    function_name, is_metadata_entry, is_placeholder, parse_record, record_lines, resolve_key,
};
use crate::{
    BrowseError, ColumnId, ColumnKind, ColumnStack, Completion, EditBuffer, EditMode, EditSession,
    EventLog, PendingSave, Record, Request, ServiceConfig, Ticket,
};

/// Padding and borders inside a column, subtracted before reflowing text.
const COLUMN_PADDING: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    BufferStart,
    BufferEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Motion),
    DrillIn,
    Back,
    Read,
    OpenEditor(EditMode),
    Commit,
    Cancel,
    InsertChar(char),
    SplitLine,
    Backspace,
    DeleteForward,
    ToggleLogs,
    Resize { width: u16, height: u16 },
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Input(Command),
    Completed(Completion),
}

/// Everything the browser knows. Input and completions both go through
/// [`AppState::dispatch`], one at a time; the returned requests are the
/// only way work leaves the reducer.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    services: Vec<ServiceConfig>,
    connection: Option<ServiceConfig>,
    page_size: usize,
    pub stack: ColumnStack,
    pub preview: PreviewState,
    pub editor: Option<EditSession>,
    pub log: EventLog,
    pub show_logs: bool,
    viewport: Viewport,
    in_flight: BTreeSet<Ticket>,
    next_ticket: Ticket,
    should_quit: bool,
}

impl AppState {
    pub fn new(services: Vec<ServiceConfig>, page_size: usize) -> Self {
        let names = services.iter().map(|service| service.name.clone()).collect();
        Self {
            services,
            connection: None,
            page_size: page_size.max(1),
            stack: ColumnStack::new("Services", names),
            preview: PreviewState::default(),
            editor: None,
            log: EventLog::default(),
            show_logs: false,
            viewport: Viewport::default(),
            in_flight: BTreeSet::new(),
            next_ticket: Ticket::new(1),
            should_quit: false,
        }
    }

    /// Logs the configured services and previews the first one.
    pub fn start(&mut self) -> Vec<Request> {
        self.log
            .info(format!("Loaded {} services", self.services.len()));
        self.refresh_preview()
    }

    pub fn services(&self) -> &[ServiceConfig] {
        &self.services
    }

    /// The service bound by the last drill from the service list.
    pub fn connection(&self) -> Option<&ServiceConfig> {
        self.connection.as_ref()
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// True while any column load or save is outstanding.
    pub fn loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub const fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Request> {
        match event {
            Event::Input(command) => self.handle_command(command),
            Event::Completed(completion) => self.handle_completion(completion),
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<Request> {
        match command {
            Command::Quit => {
                self.should_quit = true;
                return Vec::new();
            }
            Command::Resize { width, height } => {
                self.viewport = Viewport::new(width, height);
                let rows = layout::editor_rows(self.viewport);
                if let Some(session) = self.editor.as_mut() {
                    session.buffer.set_view_rows(rows);
                }
                self.stack
                    .keep_cursors_visible(layout::list_rows(self.viewport, self.show_logs));
                return Vec::new();
            }
            Command::ToggleLogs => {
                self.show_logs = !self.show_logs;
                self.stack
                    .keep_cursors_visible(layout::list_rows(self.viewport, self.show_logs));
                return Vec::new();
            }
            _ => {}
        }

        if self.editor.is_some() {
            return self.handle_editor_command(command);
        }

        match command {
            Command::Move(motion) => {
                let rows = layout::list_rows(self.viewport, self.show_logs);
                if self.stack.active_mut().apply_motion(motion, rows) {
                    self.refresh_preview()
                } else {
                    Vec::new()
                }
            }
            Command::DrillIn => self.drill_in(),
            Command::Back => self.back(),
            Command::Read => self.read(),
            Command::OpenEditor(mode) => self.open_editor(mode),
            _ => Vec::new(),
        }
    }

    fn handle_editor_command(&mut self, command: Command) -> Vec<Request> {
        if let Command::Commit = command {
            return self.commit();
        }
        if let Command::Cancel = command {
            if let Some(session) = self.editor.take() {
                self.log
                    .info(format!("Cancelled {} in {}", session.mode.label(), session.collection));
            }
            return Vec::new();
        }
        let Some(session) = self.editor.as_mut() else {
            return Vec::new();
        };
        let buffer = &mut session.buffer;
        match command {
            Command::Move(motion) => buffer.apply_motion(motion),
            Command::InsertChar(ch) => buffer.insert_char(ch),
            Command::SplitLine => buffer.split_line(),
            Command::Backspace => buffer.backspace(),
            Command::DeleteForward => buffer.delete_forward(),
            _ => {}
        }
        Vec::new()
    }

    fn refuse(&mut self, error: BrowseError) -> Vec<Request> {
        self.log.warn(error.to_string());
        Vec::new()
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket.bump();
        self.in_flight.insert(ticket);
        ticket
    }

    fn refresh_preview(&mut self) -> Vec<Request> {
        let plan = plan_preview(
            self.stack.active(),
            &self.services,
            self.connection.as_ref(),
            self.page_size,
        );
        match plan {
            PreviewPlan::Fetch { service, query } => {
                let serial = self.preview.begin();
                vec![Request::Preview {
                    serial,
                    service,
                    query,
                }]
            }
            PreviewPlan::Show {
                title,
                items,
                records,
            } => {
                self.preview.show(title, items, records);
                Vec::new()
            }
        }
    }

    fn with_preview(&mut self, mut requests: Vec<Request>) -> Vec<Request> {
        requests.extend(self.refresh_preview());
        requests
    }

    fn drill_in(&mut self) -> Vec<Request> {
        let column = self.stack.active();
        let kind = column.kind;
        let Some(selected) = column.selected().map(str::to_owned) else {
            return self.refuse(BrowseError::precondition("Nothing selected"));
        };

        if kind == ColumnKind::RecordList && selected == MORE_ITEMS {
            return self.load_more();
        }
        if is_placeholder(&selected) {
            return self.refuse(BrowseError::precondition(format!(
                "Nothing to open at {selected}"
            )));
        }

        match kind {
            ColumnKind::Service => self.open_service(&selected),
            ColumnKind::Collection => self.open_collection(&selected),
            ColumnKind::RecordList => {
                let Some(record) = self.stack.active().selected_record().cloned() else {
                    return self.refuse(BrowseError::precondition(format!(
                        "{selected} is not a loaded record"
                    )));
                };
                let collection = self.stack.active().collection.clone().unwrap_or_default();
                match self.push_detail(record, collection) {
                    Ok(_) => self.refresh_preview(),
                    Err(error) => {
                        self.log.error(format!("Cannot show record: {error}"));
                        Vec::new()
                    }
                }
            }
            ColumnKind::RecordDetail => {
                let active = self.stack.active();
                match cross_reference(&active.items, active.cursor) {
                    Some(uri) => {
                        self.log
                            .info(format!("Cross reference {uri} is shown in the preview only"));
                        Vec::new()
                    }
                    None => self.refuse(BrowseError::precondition("Already at record detail")),
                }
            }
            ColumnKind::Metadata => {
                self.refuse(BrowseError::precondition("Metadata has nothing to open"))
            }
        }
    }

    fn open_service(&mut self, name: &str) -> Vec<Request> {
        let Some(service) = self
            .services
            .iter()
            .find(|service| service.name == name)
            .cloned()
        else {
            return self.refuse(BrowseError::precondition(format!("Unknown service {name}")));
        };

        self.connection = Some(service.clone());
        let target = self
            .stack
            .push(ColumnKind::Collection, "Collections", vec![LOADING.to_owned()]);
        let ticket = self.issue_ticket();
        self.log
            .info(format!("Connecting to {} at {}", service.name, service.url));
        self.with_preview(vec![Request::ListCollections {
            ticket,
            target,
            service,
        }])
    }

    fn open_collection(&mut self, item: &str) -> Vec<Request> {
        if let Some(name) = function_name(item) {
            return self.refuse(BrowseError::precondition(format!(
                "{name} is a function import and cannot be opened"
            )));
        }
        let Some(service) = self.connection.clone() else {
            return self.refuse(BrowseError::precondition("No service connected"));
        };

        if is_metadata_entry(item) {
            let target = self
                .stack
                .push(ColumnKind::Metadata, item, vec![LOADING.to_owned()]);
            let ticket = self.issue_ticket();
            self.log
                .info(format!("Loading metadata of {}", service.name));
            return self.with_preview(vec![Request::FetchMetadata {
                ticket,
                target,
                service,
            }]);
        }

        let collection = collection_name(item).to_owned();
        let limit = self.page_size;
        let target = self.stack.push(
            ColumnKind::RecordList,
            collection.clone(),
            vec![LOADING.to_owned()],
        );
        if let Some(column) = self.stack.get_mut(target) {
            column.collection = Some(collection.clone());
            column.limit = limit;
        }
        let ticket = self.issue_ticket();
        self.log.info(format!("Loading {collection}"));
        self.with_preview(vec![Request::ListRecords {
            ticket,
            target,
            service,
            collection,
            limit,
        }])
    }

    fn load_more(&mut self) -> Vec<Request> {
        let Some(service) = self.connection.clone() else {
            return self.refuse(BrowseError::precondition("No service connected"));
        };
        let page_size = self.page_size;
        let column = self.stack.active_mut();
        let Some(collection) = column.collection.clone() else {
            return self.refuse(BrowseError::precondition("Record list has no collection"));
        };
        let target = column.id();
        let limit = column.limit + page_size;
        let ticket = self.issue_ticket();
        self.log
            .info(format!("Loading up to {limit} records of {collection}"));
        vec![Request::ListRecords {
            ticket,
            target,
            service,
            collection,
            limit,
        }]
    }

    /// Appends a detail column for `record`, rendered synchronously.
    fn push_detail(&mut self, record: Record, collection: String) -> Result<ColumnId, BrowseError> {
        let lines = record_lines(&record)?;
        let title = display_label(&record);
        let id = self.stack.push(ColumnKind::RecordDetail, title, lines);
        if let Some(column) = self.stack.get_mut(id) {
            column.records = vec![record];
            column.collection = Some(collection);
        }
        Ok(id)
    }

    fn back(&mut self) -> Vec<Request> {
        if !self.stack.pop() {
            return Vec::new();
        }
        if self.stack.active_index() == 0 {
            self.connection = None;
        }
        self.refresh_preview()
    }

    /// Re-fetches the record under the cursor (record lists) or the record
    /// being shown (details) by its key.
    fn read(&mut self) -> Vec<Request> {
        let Some(service) = self.connection.clone() else {
            return self.refuse(BrowseError::precondition("No service connected"));
        };
        let column = self.stack.active();
        let collection = column.collection.clone().unwrap_or_default();
        let record = match column.kind {
            ColumnKind::RecordList => column.selected_record(),
            ColumnKind::RecordDetail => column.records.first(),
            _ => None,
        };
        let Some(record) = record.cloned() else {
            return self.refuse(BrowseError::precondition("Select a record to read"));
        };
        let key = match resolve_key(&record) {
            Ok(key) => key,
            Err(error) => {
                self.log.error(format!("Cannot read record: {error}"));
                return Vec::new();
            }
        };

        let target = if self.stack.active().kind == ColumnKind::RecordList {
            match self.push_detail(record, collection.clone()) {
                Ok(id) => id,
                Err(error) => {
                    self.log.error(format!("Cannot show record: {error}"));
                    return Vec::new();
                }
            }
        } else {
            self.stack.active().id()
        };

        let ticket = self.issue_ticket();
        self.log.info(format!("Reading {collection}({key})"));
        self.with_preview(vec![Request::FetchRecord {
            ticket,
            target,
            service,
            collection,
            key,
        }])
    }

    fn open_editor(&mut self, mode: EditMode) -> Vec<Request> {
        let session = match mode {
            EditMode::Create => {
                let collection = self
                    .stack
                    .nearest(ColumnKind::RecordList)
                    .and_then(|column| column.collection.clone());
                let Some(collection) = collection else {
                    return self.refuse(BrowseError::precondition(
                        "Open a collection before creating a record",
                    ));
                };
                EditSession {
                    mode,
                    buffer: EditBuffer::create_template(),
                    collection,
                    original: None,
                    origin: None,
                    pending: None,
                }
            }
            EditMode::Update | EditMode::Copy => {
                let column = self.stack.active();
                let record = column.records.first();
                let (Some(record), Some(collection), ColumnKind::RecordDetail) =
                    (record, column.collection.clone(), column.kind)
                else {
                    return self.refuse(BrowseError::precondition(format!(
                        "{} needs a loaded record detail",
                        mode.label()
                    )));
                };
                EditSession {
                    mode,
                    buffer: EditBuffer::new(column.items.clone()),
                    collection,
                    original: Some(record.clone()),
                    origin: Some(column.id()),
                    pending: None,
                }
            }
        };

        let mut session = session;
        session
            .buffer
            .set_view_rows(layout::editor_rows(self.viewport));
        self.log.info(format!(
            "Editing {} ({})",
            session.collection,
            session.mode.label()
        ));
        self.editor = Some(session);
        Vec::new()
    }

    fn commit(&mut self) -> Vec<Request> {
        let Some(session) = self.editor.as_ref() else {
            return Vec::new();
        };
        if session.pending.is_some() {
            self.log.warn("A save is already in progress");
            return Vec::new();
        }
        let record = match parse_record(session.buffer.lines()) {
            Ok(record) => record,
            Err(error) => {
                self.log.error(format!("Commit rejected: {error}"));
                return Vec::new();
            }
        };
        let key = match (session.mode, session.original.as_ref()) {
            (EditMode::Update, Some(original)) => match resolve_key(original) {
                Ok(key) => Some(key),
                Err(error) => {
                    self.log.error(format!("Commit rejected: {error}"));
                    return Vec::new();
                }
            },
            (EditMode::Update, None) => {
                self.log
                    .error(format!("Commit rejected: {}", BrowseError::KeyResolution));
                return Vec::new();
            }
            (EditMode::Create | EditMode::Copy, _) => None,
        };
        let (mode, collection) = (session.mode, session.collection.clone());
        let Some(service) = self.connection.clone() else {
            return self.refuse(BrowseError::precondition("No service connected"));
        };

        let ticket = self.issue_ticket();
        if let Some(session) = self.editor.as_mut() {
            session.pending = Some(PendingSave {
                ticket,
                record: record.clone(),
            });
        }
        self.log
            .info(format!("Saving {} in {collection}", mode.label()));
        vec![Request::Save {
            ticket,
            service,
            mode,
            collection,
            key,
            record,
        }]
    }

    fn handle_completion(&mut self, completion: Completion) -> Vec<Request> {
        if let Some(ticket) = completion.ticket() {
            self.in_flight.remove(&ticket);
        }

        match completion {
            Completion::Collections { target, result, .. } => {
                let Some(column) = self.stack.get_mut(target) else {
                    return drop_stale(target);
                };
                match result {
                    Ok(names) => {
                        let count = names.len();
                        let items = if names.is_empty() {
                            vec![NO_COLLECTIONS.to_owned()]
                        } else {
                            names
                        };
                        column.replace_items(items, Vec::new());
                        self.log.info(format!("Loaded {count} collections"));
                    }
                    Err(error) => self.log.error(format!("Loading collections failed: {error}")),
                }
                self.refresh_if_active(target)
            }
            Completion::Records {
                target,
                limit,
                result,
                ..
            } => {
                let Some(column) = self.stack.get_mut(target) else {
                    return drop_stale(target);
                };
                let collection = column.collection.clone().unwrap_or_default();
                match result {
                    Ok(page) => {
                        column.limit = limit;
                        column.replace_items(page_items(&page), page.records.clone());
                        let more = if page.has_more { " (more available)" } else { "" };
                        self.log.info(format!(
                            "Loaded {} records of {collection}{more}",
                            page.records.len()
                        ));
                    }
                    Err(error) => self
                        .log
                        .error(format!("Loading {collection} failed: {error}")),
                }
                self.refresh_if_active(target)
            }
            Completion::Record {
                target,
                key,
                result,
                ..
            } => {
                let Some(column) = self.stack.get_mut(target) else {
                    return drop_stale(target);
                };
                let collection = column.collection.clone().unwrap_or_default();
                match result.and_then(|record| Ok((record_lines(&record)?, record))) {
                    Ok((lines, record)) => {
                        column.replace_items(lines, vec![record]);
                        column.reset_position();
                        self.log.info(format!("Read {collection}({key})"));
                    }
                    Err(error) => self
                        .log
                        .error(format!("Reading {collection}({key}) failed: {error}")),
                }
                self.refresh_if_active(target)
            }
            Completion::Metadata { target, result, .. } => {
                let width = self.column_text_width(target);
                let Some(column) = self.stack.get_mut(target) else {
                    return drop_stale(target);
                };
                match result {
                    Ok(document) => {
                        let mut lines = format_metadata(&document, width);
                        if lines.is_empty() {
                            lines.push(NO_ITEMS.to_owned());
                        }
                        let count = lines.len();
                        column.replace_items(lines, Vec::new());
                        column.reset_position();
                        self.log.info(format!("Loaded metadata ({count} lines)"));
                    }
                    Err(error) => self.log.error(format!("Loading metadata failed: {error}")),
                }
                self.refresh_if_active(target)
            }
            Completion::Preview { serial, result } => {
                let failure = result.as_ref().err().cloned();
                if !self.preview.accept(serial, result) {
                    tracing::debug!(target: "odnav::dispatch", serial = serial.get(), "dropped stale preview");
                } else if let Some(error) = failure {
                    self.log.error(format!("Preview failed: {error}"));
                }
                Vec::new()
            }
            Completion::Saved {
                ticket,
                mode,
                collection,
                result,
            } => self.finish_save(ticket, mode, &collection, result),
        }
    }

    fn finish_save(
        &mut self,
        ticket: Ticket,
        mode: EditMode,
        collection: &str,
        result: Result<(), BrowseError>,
    ) -> Vec<Request> {
        let is_current = self
            .editor
            .as_ref()
            .and_then(|session| session.pending.as_ref())
            .is_some_and(|pending| pending.ticket == ticket);
        if !is_current {
            tracing::debug!(target: "odnav::dispatch", ticket = ticket.get(), "dropped save for closed editor");
            return Vec::new();
        }
        let Some(session) = self.editor.take() else {
            return Vec::new();
        };

        if let Err(error) = result {
            self.log
                .error(format!("Saving {} in {collection} failed: {error}", mode.label()));
            return Vec::new();
        }
        self.log
            .info(format!("Saved {} in {collection}", mode.label()));

        let (Some(origin), Some(pending)) = (session.origin, session.pending) else {
            return Vec::new();
        };
        let Some(column) = self.stack.get_mut(origin) else {
            return Vec::new();
        };
        let lines =
            record_lines(&pending.record).unwrap_or_else(|_| session.buffer.lines().to_vec());
        column.title = display_label(&pending.record);
        column.replace_items(lines, vec![pending.record]);
        column.reset_position();
        self.refresh_if_active(origin)
    }

    fn refresh_if_active(&mut self, target: ColumnId) -> Vec<Request> {
        if self.stack.active().id() == target {
            self.refresh_preview()
        } else {
            Vec::new()
        }
    }

    fn column_text_width(&self, target: ColumnId) -> usize {
        let allocation = layout::allocate(
            self.viewport,
            self.stack.len(),
            self.stack.active_index(),
            self.show_logs,
        );
        self.stack
            .columns()
            .iter()
            .position(|column| column.id() == target)
            .and_then(|index| allocation.column_widths.get(index))
            .map_or(0, |width| usize::from(width.saturating_sub(COLUMN_PADDING)))
    }
}

fn drop_stale(target: ColumnId) -> Vec<Request> {
    tracing::debug!(target: "odnav::dispatch", column = target.get(), "dropped completion for closed column");
    Vec::new()
}

/// Functional form of [`AppState::dispatch`]: consumes one state and
/// returns the next along with the work it asks for.
pub fn reduce(mut state: AppState, event: Event) -> (AppState, Vec<Request>) {
    let requests = state.dispatch(event);
    (state, requests)
}

#[cfg(test)]
mod tests {
    use super::{AppState, Command, Event, Motion, reduce};
    use crate::{
        BrowseError, ColumnKind, Completion, EditMode, PreviewPayload, PreviewQuery, Record,
        RecordPage, Request, ServiceConfig, Ticket,
    };
    use serde_json::json;

    fn services() -> Vec<ServiceConfig> {
        vec![
            ServiceConfig::new("Demo", "http://demo/svc"),
            ServiceConfig::new("Northwind", "http://northwind/svc"),
            ServiceConfig::new("Acme Service", "http://acme/svc"),
        ]
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    fn widget(id: i64) -> Record {
        record(json!({"ID": id, "Name": format!("Widget {id}")}))
    }

    fn input(state: &mut AppState, command: Command) -> Vec<Request> {
        state.dispatch(Event::Input(command))
    }

    fn complete(state: &mut AppState, completion: Completion) -> Vec<Request> {
        state.dispatch(Event::Completed(completion))
    }

    fn structural(requests: &[Request]) -> Option<&Request> {
        requests
            .iter()
            .find(|request| !matches!(request, Request::Preview { .. }))
    }

    fn last_log(state: &AppState) -> String {
        state
            .log
            .last()
            .map(|entry| entry.message.clone())
            .unwrap_or_default()
    }

    /// Drills into "Acme Service" and answers the collection listing.
    fn at_collections(state: &mut AppState, names: &[&str]) {
        input(state, Command::Move(Motion::End));
        let requests = input(state, Command::DrillIn);
        let Some(Request::ListCollections { ticket, target, .. }) = structural(&requests).cloned()
        else {
            panic!("drilling a service should list its collections");
        };
        complete(
            state,
            Completion::Collections {
                ticket,
                target,
                result: Ok(names.iter().map(|name| (*name).to_owned()).collect()),
            },
        );
    }

    /// Opens the collection under the cursor and answers with `records`.
    fn at_records(state: &mut AppState, records: Vec<Record>, has_more: bool) {
        let requests = input(state, Command::DrillIn);
        let Some(Request::ListRecords {
            ticket,
            target,
            limit,
            ..
        }) = structural(&requests).cloned()
        else {
            panic!("drilling a collection should list its records");
        };
        complete(
            state,
            Completion::Records {
                ticket,
                target,
                limit,
                result: Ok(RecordPage { records, has_more }),
            },
        );
    }

    #[test]
    fn start_previews_the_first_service() {
        let mut state = AppState::new(services(), 10);
        let requests = state.start();
        assert!(matches!(
            requests.as_slice(),
            [Request::Preview { service, query: PreviewQuery::Collections, .. }] if service.name == "Demo"
        ));
        assert!(state.preview.loading);
        assert!(!state.loading());
    }

    #[test]
    fn drilling_a_service_loads_its_collections() {
        let mut state = AppState::new(services(), 10);
        state.stack.active_mut().cursor = 2;

        let requests = input(&mut state, Command::DrillIn);
        assert_eq!(state.stack.len(), 2);
        assert_eq!(state.stack.active_index(), 1);
        assert_eq!(state.stack.active().items, vec!["Loading..."]);
        assert_eq!(state.connection().map(|service| service.name.as_str()), Some("Acme Service"));
        assert!(state.loading());

        let Some(Request::ListCollections {
            ticket,
            target,
            service,
        }) = structural(&requests).cloned()
        else {
            panic!("expected a collection listing");
        };
        assert_eq!(service.url, "http://acme/svc");

        complete(
            &mut state,
            Completion::Collections {
                ticket,
                target,
                result: Ok(vec!["Widgets".to_owned(), "Gadgets".to_owned()]),
            },
        );
        assert_eq!(state.stack.active().items, vec!["Widgets", "Gadgets"]);
        assert_eq!(state.stack.active().cursor, 0);
        assert!(!state.loading());
    }

    #[test]
    fn collection_arrival_previews_the_first_collection() {
        let mut state = AppState::new(services(), 7);
        input(&mut state, Command::DrillIn);
        let requests = {
            let target = state.stack.active().id();
            complete(
                &mut state,
                Completion::Collections {
                    ticket: Ticket::new(1),
                    target,
                    result: Ok(vec!["Widgets".to_owned()]),
                },
            )
        };
        assert!(matches!(
            requests.as_slice(),
            [Request::Preview { query: PreviewQuery::Records { collection, limit: 7 }, .. }]
                if collection == "Widgets"
        ));
    }

    #[test]
    fn empty_collection_listing_shows_marker() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &[]);
        assert_eq!(state.stack.active().items, vec!["(No entity sets)"]);
        let requests = input(&mut state, Command::DrillIn);
        assert!(requests.is_empty());
        assert_eq!(state.stack.len(), 2);
    }

    #[test]
    fn truncated_page_gets_a_more_marker() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, (1..=10).map(widget).collect(), true);

        let column = state.stack.active();
        assert_eq!(column.kind, ColumnKind::RecordList);
        assert_eq!(column.items.len(), 11);
        assert_eq!(column.items[10], "[...more items]");
        assert_eq!(column.records.len(), 10);
        assert_eq!(column.items[0], "1 | Widget 1");
    }

    #[test]
    fn drilling_the_more_marker_extends_the_same_column() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, (1..=10).map(widget).collect(), true);
        let list = state.stack.active().id();

        input(&mut state, Command::Move(Motion::End));
        let requests = input(&mut state, Command::DrillIn);
        let Some(Request::ListRecords {
            ticket,
            target,
            limit,
            ..
        }) = structural(&requests).cloned()
        else {
            panic!("expected a larger listing");
        };
        assert_eq!((target, limit), (list, 20));
        assert_eq!(state.stack.len(), 3);

        complete(
            &mut state,
            Completion::Records {
                ticket,
                target,
                limit,
                result: Ok(RecordPage {
                    records: (1..=15).map(widget).collect(),
                    has_more: false,
                }),
            },
        );
        let column = state.stack.active();
        assert_eq!(column.items.len(), 15);
        assert_eq!(column.limit, 20);
        assert_eq!(column.cursor, 10);
    }

    #[test]
    fn record_detail_is_built_synchronously() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(1), widget(2)], false);
        input(&mut state, Command::Move(Motion::Down));

        let requests = input(&mut state, Command::DrillIn);
        assert!(requests.is_empty());
        let column = state.stack.active();
        assert_eq!(column.kind, ColumnKind::RecordDetail);
        assert_eq!(column.title, "2 | Widget 2");
        assert_eq!(column.items, vec!["{", "  \"ID\": 2,", "  \"Name\": \"Widget 2\"", "}"]);
        assert_eq!(column.records, vec![widget(2)]);
        assert_eq!(column.collection.as_deref(), Some("Widgets"));

        assert!(input(&mut state, Command::DrillIn).is_empty());
        assert_eq!(state.stack.len(), 4);
    }

    #[test]
    fn drill_then_back_restores_the_parent() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["A", "B", "C", "D", "E"]);
        input(&mut state, Command::Move(Motion::Down));
        input(&mut state, Command::Move(Motion::Down));
        let before = state.stack.active().clone();

        input(&mut state, Command::DrillIn);
        input(&mut state, Command::Back);

        assert_eq!(state.stack.len(), 2);
        assert_eq!(state.stack.active(), &before);
        assert_eq!(
            state.stack.columns().iter().filter(|column| column.focused).count(),
            1
        );
    }

    #[test]
    fn back_at_root_is_a_noop() {
        let mut state = AppState::new(services(), 10);
        let before = state.stack.clone();
        assert!(input(&mut state, Command::Back).is_empty());
        assert_eq!(state.stack, before);
    }

    #[test]
    fn back_to_root_previews_the_service_again() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        let requests = input(&mut state, Command::Back);
        assert_eq!(state.stack.len(), 1);
        assert!(state.connection().is_none());
        assert!(matches!(
            requests.as_slice(),
            [Request::Preview { service, .. }] if service.name == "Acme Service"
        ));
    }

    #[test]
    fn stale_completion_leaves_columns_untouched() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets", "Gadgets"]);
        let requests = input(&mut state, Command::DrillIn);
        let Some(Request::ListRecords { ticket, target, .. }) = structural(&requests).cloned()
        else {
            panic!("expected a record listing");
        };
        input(&mut state, Command::Back);
        let before = state.stack.clone();

        let follow_up = complete(
            &mut state,
            Completion::Records {
                ticket,
                target,
                limit: 10,
                result: Ok(RecordPage {
                    records: vec![widget(1)],
                    has_more: false,
                }),
            },
        );
        assert!(follow_up.is_empty());
        assert_eq!(state.stack, before);
        assert!(!state.loading());
    }

    #[test]
    fn reopened_collection_ignores_the_first_response() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        let first = input(&mut state, Command::DrillIn);
        input(&mut state, Command::Back);
        input(&mut state, Command::DrillIn);

        let Some(Request::ListRecords { ticket, target, .. }) = structural(&first).cloned() else {
            panic!("expected a record listing");
        };
        complete(
            &mut state,
            Completion::Records {
                ticket,
                target,
                limit: 10,
                result: Ok(RecordPage {
                    records: vec![widget(99)],
                    has_more: false,
                }),
            },
        );
        assert_eq!(state.stack.active().items, vec!["Loading..."]);
        assert!(state.loading());
    }

    #[test]
    fn failed_load_keeps_placeholder_and_logs() {
        let mut state = AppState::new(services(), 10);
        let requests = input(&mut state, Command::DrillIn);
        let Some(Request::ListCollections { ticket, target, .. }) = structural(&requests).cloned()
        else {
            panic!("expected a collection listing");
        };
        complete(
            &mut state,
            Completion::Collections {
                ticket,
                target,
                result: Err(BrowseError::Transport("connection refused".to_owned())),
            },
        );
        assert_eq!(state.stack.active().items, vec!["Loading..."]);
        assert!(!state.loading());
        assert_eq!(
            last_log(&state),
            "Loading collections failed: transport error: connection refused"
        );
    }

    #[test]
    fn cursor_moves_refresh_the_preview() {
        let mut state = AppState::new(services(), 10);
        state.start();
        let requests = input(&mut state, Command::Move(Motion::Down));
        assert!(matches!(
            requests.as_slice(),
            [Request::Preview { service, .. }] if service.name == "Northwind"
        ));
        input(&mut state, Command::Move(Motion::End));
        assert!(input(&mut state, Command::Move(Motion::Down)).is_empty());
    }

    #[test]
    fn only_the_latest_preview_lands() {
        let mut state = AppState::new(services(), 10);
        let first = state.start();
        let second = input(&mut state, Command::Move(Motion::Down));
        let (
            [Request::Preview { serial: old, .. }],
            [Request::Preview { serial: new, .. }],
        ) = (first.as_slice(), second.as_slice())
        else {
            panic!("expected two previews");
        };

        complete(
            &mut state,
            Completion::Preview {
                serial: *new,
                result: Ok(PreviewPayload::Collections(vec!["Orders".to_owned()])),
            },
        );
        complete(
            &mut state,
            Completion::Preview {
                serial: *old,
                result: Ok(PreviewPayload::Collections(vec!["Stale".to_owned()])),
            },
        );
        assert_eq!(state.preview.items, vec!["Orders"]);
        assert!(!state.preview.loading);
    }

    #[test]
    fn function_imports_cannot_be_opened() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["[FUNC] GetTop"]);
        assert!(input(&mut state, Command::DrillIn).is_empty());
        assert_eq!(state.stack.len(), 2);
        assert!(last_log(&state).contains("GetTop is a function import"));
    }

    #[test]
    fn decorated_collection_names_drill_by_bare_name() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets", "Gadgets [SFCU]"]);
        assert_eq!(state.stack.active().items, vec!["Widgets", "Gadgets [SFCU]"]);

        input(&mut state, Command::Move(Motion::Down));
        let requests = input(&mut state, Command::DrillIn);
        let Some(Request::ListRecords { collection, .. }) = structural(&requests).cloned() else {
            panic!("drilling a collection should list its records");
        };
        assert_eq!(collection, "Gadgets");
        assert_eq!(state.stack.active().collection.as_deref(), Some("Gadgets"));
    }

    #[test]
    fn metadata_column_is_filled_and_reflowed() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["$metadata", "Widgets"]);
        let requests = input(&mut state, Command::DrillIn);
        let Some(Request::FetchMetadata { ticket, target, .. }) = structural(&requests).cloned()
        else {
            panic!("expected a metadata fetch");
        };
        assert_eq!(state.stack.active().kind, ColumnKind::Metadata);

        complete(
            &mut state,
            Completion::Metadata {
                ticket,
                target,
                result: Ok("<Schema><EntitySet Name=\"Widgets\"/></Schema>".to_owned()),
            },
        );
        assert_eq!(
            state.stack.active().items,
            vec!["<Schema>", "<EntitySet Name=\"Widgets\"/>", "</Schema>"]
        );
        assert!(input(&mut state, Command::OpenEditor(EditMode::Update)).is_empty());
        assert!(state.editor.is_none());
    }

    #[test]
    fn read_from_list_appends_detail_and_refetches() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(4)], false);

        let requests = input(&mut state, Command::Read);
        let Some(Request::FetchRecord {
            ticket,
            target,
            key,
            collection,
            ..
        }) = structural(&requests).cloned()
        else {
            panic!("expected a record fetch");
        };
        assert_eq!((key.as_str(), collection.as_str()), ("4", "Widgets"));
        assert_eq!(state.stack.active().id(), target);
        assert_eq!(state.stack.active().kind, ColumnKind::RecordDetail);

        let full = record(json!({"ID": 4, "Name": "Widget 4", "Price": 9.5}));
        complete(
            &mut state,
            Completion::Record {
                ticket,
                target,
                key,
                result: Ok(full.clone()),
            },
        );
        assert_eq!(state.stack.active().records, vec![full]);
        assert!(state.stack.active().items.contains(&"  \"Price\": 9.5".to_owned()));
    }

    #[test]
    fn read_on_detail_refetches_in_place() -> anyhow::Result<()> {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(4)], false);
        input(&mut state, Command::DrillIn);
        input(&mut state, Command::Move(Motion::End));
        let detail = state.stack.active().id();
        let depth = state.stack.len();
        assert_eq!(state.stack.active().cursor, 3);

        let requests = input(&mut state, Command::Read);
        let Some(Request::FetchRecord {
            ticket,
            target,
            key,
            ..
        }) = structural(&requests).cloned()
        else {
            panic!("expected a record fetch");
        };
        assert_eq!(target, detail);
        assert_eq!(key, "4");
        assert_eq!(state.stack.len(), depth);

        let full = record(json!({"ID": 4, "Name": "Widget 4", "Stock": 12}));
        complete(
            &mut state,
            Completion::Record {
                ticket,
                target,
                key,
                result: Ok(full.clone()),
            },
        );
        let column = state.stack.active();
        assert_eq!(state.stack.len(), depth);
        assert_eq!((column.cursor, column.scroll_offset), (0, 0));
        assert_eq!(column.items, crate::record::record_lines(&full)?);
        assert_eq!(column.records, vec![full]);
        assert!(!state.loading());
        Ok(())
    }

    #[test]
    fn cross_reference_lines_only_preview() {
        let uri = "http://demo/svc/Widgets(1)/Supplier";
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(
            &mut state,
            vec![record(json!({"ID": 1, "Supplier": {"__deferred": {"uri": uri}}}))],
            false,
        );
        input(&mut state, Command::DrillIn);
        let depth = state.stack.len();
        for _ in 0..3 {
            input(&mut state, Command::Move(Motion::Down));
        }
        assert!(state.stack.active().items[3].contains("__deferred"));

        assert!(input(&mut state, Command::DrillIn).is_empty());
        assert_eq!(state.stack.len(), depth);
        assert_eq!(state.stack.active().kind, ColumnKind::RecordDetail);
        assert!(last_log(&state).contains(uri));
        assert_eq!(state.preview.title, "Navigation");
        assert_eq!(state.preview.items[0], format!("URI: {uri}"));
    }

    #[test]
    fn blank_metadata_document_shows_a_marker() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["$metadata"]);
        let requests = input(&mut state, Command::DrillIn);
        let Some(Request::FetchMetadata { ticket, target, .. }) = structural(&requests).cloned()
        else {
            panic!("expected a metadata fetch");
        };
        complete(
            &mut state,
            Completion::Metadata {
                ticket,
                target,
                result: Ok("   \n".to_owned()),
            },
        );
        assert_eq!(state.stack.active().items, vec![crate::record::NO_ITEMS]);
        assert_eq!(state.stack.active().cursor, 0);
    }

    #[test]
    fn shrinking_the_terminal_keeps_cursors_on_screen() {
        let mut state = AppState::new(services(), 10);
        let names = (0..30).map(|index| format!("Set{index}")).collect::<Vec<_>>();
        let names = names.iter().map(String::as_str).collect::<Vec<_>>();
        at_collections(&mut state, &names);
        input(&mut state, Command::Move(Motion::End));
        assert_eq!(state.stack.active().scroll_offset, 13);

        input(&mut state, Command::Resize { width: 80, height: 12 });
        let column = state.stack.active();
        assert_eq!(column.cursor, 29);
        assert_eq!(column.scroll_offset, 25);
        assert_eq!(state.stack.columns()[0].scroll_offset, 0);

        input(&mut state, Command::ToggleLogs);
        assert_eq!(state.stack.active().scroll_offset, 28);
    }

    #[test]
    fn update_round_trip_replaces_detail() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(7)], false);
        input(&mut state, Command::DrillIn);

        input(&mut state, Command::OpenEditor(EditMode::Update));
        let session = state.editor.as_ref().map(|session| session.buffer.cursor());
        assert_eq!(session, Some((0, 0)));

        // Rename "Widget 7" to "Widget 7b".
        input(&mut state, Command::Move(Motion::Down));
        input(&mut state, Command::Move(Motion::Down));
        input(&mut state, Command::Move(Motion::End));
        input(&mut state, Command::Move(Motion::Left));
        input(&mut state, Command::InsertChar('b'));

        let requests = input(&mut state, Command::Commit);
        let [Request::Save {
            ticket,
            mode,
            collection,
            key,
            record: saved,
            ..
        }] = requests.as_slice()
        else {
            panic!("expected a save");
        };
        assert_eq!(*mode, EditMode::Update);
        assert_eq!(key.as_deref(), Some("7"));
        assert_eq!(saved.get("Name"), Some(&json!("Widget 7b")));
        assert!(state.loading());

        complete(
            &mut state,
            Completion::Saved {
                ticket: *ticket,
                mode: *mode,
                collection: collection.clone(),
                result: Ok(()),
            },
        );
        assert!(state.editor.is_none());
        assert!(!state.loading());
        let detail = state.stack.active();
        assert_eq!(detail.title, "7 | Widget 7b");
        assert!(detail.items.contains(&"  \"Name\": \"Widget 7b\"".to_owned()));
    }

    #[test]
    fn invalid_commit_keeps_buffer_open() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, Vec::new(), false);

        input(&mut state, Command::OpenEditor(EditMode::Create));
        input(&mut state, Command::InsertChar('x'));
        let before = state.editor.clone();

        let requests = input(&mut state, Command::Commit);
        assert!(requests.is_empty());
        assert_eq!(state.editor, before);
        assert!(last_log(&state).starts_with("Commit rejected: invalid record text"));
    }

    #[test]
    fn failed_save_closes_editor_and_logs() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(1)], false);
        input(&mut state, Command::DrillIn);
        input(&mut state, Command::OpenEditor(EditMode::Copy));
        let before = state.stack.clone();

        let requests = input(&mut state, Command::Commit);
        let [Request::Save { ticket, key, .. }] = requests.as_slice() else {
            panic!("expected a save");
        };
        assert!(key.is_none());
        complete(
            &mut state,
            Completion::Saved {
                ticket: *ticket,
                mode: EditMode::Copy,
                collection: "Widgets".to_owned(),
                result: Err(BrowseError::Transport("HTTP 400".to_owned())),
            },
        );
        assert!(state.editor.is_none());
        assert_eq!(state.stack, before);
        assert!(last_log(&state).contains("failed: transport error: HTTP 400"));
    }

    #[test]
    fn editor_requires_a_context() {
        let mut state = AppState::new(services(), 10);
        input(&mut state, Command::OpenEditor(EditMode::Create));
        assert!(state.editor.is_none());

        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(1)], false);
        input(&mut state, Command::OpenEditor(EditMode::Update));
        assert!(state.editor.is_none());

        input(&mut state, Command::OpenEditor(EditMode::Create));
        let session = state.editor.as_ref();
        assert_eq!(session.map(|session| session.collection.as_str()), Some("Widgets"));
        assert_eq!(session.map(|session| session.buffer.cursor()), Some((1, 2)));
    }

    #[test]
    fn editor_swallows_navigation_and_cancel_discards() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(1)], false);
        input(&mut state, Command::OpenEditor(EditMode::Create));
        let stack = state.stack.clone();

        assert!(input(&mut state, Command::DrillIn).is_empty());
        assert!(input(&mut state, Command::Back).is_empty());
        input(&mut state, Command::InsertChar('q'));
        assert_eq!(state.stack, stack);
        assert!(!state.should_quit());

        input(&mut state, Command::Cancel);
        assert!(state.editor.is_none());
        assert_eq!(state.stack, stack);
    }

    #[test]
    fn save_for_cancelled_editor_is_ignored() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        at_records(&mut state, vec![widget(1)], false);
        input(&mut state, Command::DrillIn);
        input(&mut state, Command::OpenEditor(EditMode::Update));
        let requests = input(&mut state, Command::Commit);
        let [Request::Save { ticket, .. }] = requests.as_slice() else {
            panic!("expected a save");
        };
        input(&mut state, Command::Cancel);
        let stack = state.stack.clone();

        complete(
            &mut state,
            Completion::Saved {
                ticket: *ticket,
                mode: EditMode::Update,
                collection: "Widgets".to_owned(),
                result: Ok(()),
            },
        );
        assert_eq!(state.stack, stack);
        assert!(!state.loading());
    }

    #[test]
    fn resize_and_toggle_logs_adjust_paging() {
        let mut state = AppState::new(services(), 10);
        input(&mut state, Command::Resize { width: 120, height: 10 });
        assert_eq!(state.viewport().height, 10);
        input(&mut state, Command::ToggleLogs);
        assert!(state.show_logs);
        input(&mut state, Command::ToggleLogs);
        assert!(!state.show_logs);
    }

    #[test]
    fn active_index_stays_valid_under_mixed_navigation() {
        let mut state = AppState::new(services(), 10);
        at_collections(&mut state, &["Widgets"]);
        let script = [
            Command::DrillIn,
            Command::Back,
            Command::Back,
            Command::Back,
            Command::DrillIn,
            Command::DrillIn,
            Command::Move(Motion::Down),
            Command::Back,
        ];
        for command in script {
            input(&mut state, command);
            assert!(state.stack.active_index() < state.stack.len());
            assert_eq!(
                state.stack.columns().iter().filter(|column| column.focused).count(),
                1
            );
        }
    }

    #[test]
    fn reduce_threads_state_through() {
        let state = AppState::new(services(), 10);
        let (state, requests) = reduce(state, Event::Input(Command::Quit));
        assert!(requests.is_empty());
        assert!(state.should_quit());
    }
}
