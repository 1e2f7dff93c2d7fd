// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The boundary to the remote data service.
//!
//! The state machine never talks to the network. It emits [`Request`]s; a
//! dispatcher runs each one against a [`RemoteService`] off the input path
//! and feeds exactly one [`Completion`] back per request.

use anyhow::Result;

use crate::{BrowseError, ColumnId, EditMode, PreviewSerial, Record, Ticket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub has_more: bool,
}

/// Operations the browser needs from a remote data service.
pub trait RemoteService: Send + Sync {
    fn list_collections(&self, service: &ServiceConfig) -> Result<Vec<String>>;
    fn list_records(
        &self,
        service: &ServiceConfig,
        collection: &str,
        limit: usize,
    ) -> Result<RecordPage>;
    fn get_record(&self, service: &ServiceConfig, collection: &str, key: &str) -> Result<Record>;
    fn create_record(&self, service: &ServiceConfig, collection: &str, record: &Record)
    -> Result<()>;
    fn update_record(
        &self,
        service: &ServiceConfig,
        collection: &str,
        key: &str,
        record: &Record,
    ) -> Result<()>;
    fn fetch_metadata(&self, service: &ServiceConfig) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewQuery {
    Collections,
    Records { collection: String, limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListCollections {
        ticket: Ticket,
        target: ColumnId,
        service: ServiceConfig,
    },
    ListRecords {
        ticket: Ticket,
        target: ColumnId,
        service: ServiceConfig,
        collection: String,
        limit: usize,
    },
    FetchRecord {
        ticket: Ticket,
        target: ColumnId,
        service: ServiceConfig,
        collection: String,
        key: String,
    },
    FetchMetadata {
        ticket: Ticket,
        target: ColumnId,
        service: ServiceConfig,
    },
    Preview {
        serial: PreviewSerial,
        service: ServiceConfig,
        query: PreviewQuery,
    },
    Save {
        ticket: Ticket,
        service: ServiceConfig,
        mode: EditMode,
        collection: String,
        key: Option<String>,
        record: Record,
    },
}

impl Request {
    pub fn describe(&self) -> String {
        match self {
            Self::ListCollections { service, .. } => format!("list collections of {}", service.name),
            Self::ListRecords {
                collection, limit, ..
            } => format!("list {limit} records of {collection}"),
            Self::FetchRecord {
                collection, key, ..
            } => format!("read {collection}({key})"),
            Self::FetchMetadata { service, .. } => format!("read metadata of {}", service.name),
            Self::Preview { query, .. } => match query {
                PreviewQuery::Collections => "preview collections".to_owned(),
                PreviewQuery::Records { collection, .. } => format!("preview {collection}"),
            },
            Self::Save {
                mode, collection, ..
            } => format!("{} record in {collection}", mode.label()),
        }
    }

    /// Runs the request to completion. Blocks; dispatchers call this off the
    /// input path.
    pub fn execute(self, remote: &dyn RemoteService) -> Completion {
        match self {
            Self::ListCollections {
                ticket,
                target,
                service,
            } => Completion::Collections {
                ticket,
                target,
                result: remote
                    .list_collections(&service)
                    .map_err(|error| BrowseError::transport(&error)),
            },
            Self::ListRecords {
                ticket,
                target,
                service,
                collection,
                limit,
            } => Completion::Records {
                ticket,
                target,
                limit,
                result: remote
                    .list_records(&service, &collection, limit)
                    .map_err(|error| BrowseError::transport(&error)),
            },
            Self::FetchRecord {
                ticket,
                target,
                service,
                collection,
                key,
            } => Completion::Record {
                ticket,
                target,
                result: remote
                    .get_record(&service, &collection, &key)
                    .map_err(|error| BrowseError::transport(&error)),
                key,
            },
            Self::FetchMetadata {
                ticket,
                target,
                service,
            } => Completion::Metadata {
                ticket,
                target,
                result: remote
                    .fetch_metadata(&service)
                    .map_err(|error| BrowseError::transport(&error)),
            },
            Self::Preview {
                serial,
                service,
                query,
            } => {
                let result = match &query {
                    PreviewQuery::Collections => remote
                        .list_collections(&service)
                        .map(PreviewPayload::Collections),
                    PreviewQuery::Records { collection, limit } => remote
                        .list_records(&service, collection, *limit)
                        .map(PreviewPayload::Records),
                };
                Completion::Preview {
                    serial,
                    result: result.map_err(|error| BrowseError::transport(&error)),
                }
            }
            Self::Save {
                ticket,
                service,
                mode,
                collection,
                key,
                record,
            } => {
                let result = match (mode, key.as_deref()) {
                    (EditMode::Update, Some(key)) => {
                        remote.update_record(&service, &collection, key, &record)
                    }
                    (EditMode::Update, None) => {
                        Err(anyhow::anyhow!("update of {collection} needs a record key"))
                    }
                    (EditMode::Create | EditMode::Copy, _) => {
                        remote.create_record(&service, &collection, &record)
                    }
                };
                Completion::Saved {
                    ticket,
                    mode,
                    collection,
                    result: result.map_err(|error| BrowseError::transport(&error)),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewPayload {
    Collections(Vec<String>),
    Records(RecordPage),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Collections {
        ticket: Ticket,
        target: ColumnId,
        result: Result<Vec<String>, BrowseError>,
    },
    Records {
        ticket: Ticket,
        target: ColumnId,
        limit: usize,
        result: Result<RecordPage, BrowseError>,
    },
    Record {
        ticket: Ticket,
        target: ColumnId,
        key: String,
        result: Result<Record, BrowseError>,
    },
    Metadata {
        ticket: Ticket,
        target: ColumnId,
        result: Result<String, BrowseError>,
    },
    Preview {
        serial: PreviewSerial,
        result: Result<PreviewPayload, BrowseError>,
    },
    Saved {
        ticket: Ticket,
        mode: EditMode,
        collection: String,
        result: Result<(), BrowseError>,
    },
}

impl Completion {
    pub const fn ticket(&self) -> Option<Ticket> {
        match self {
            Self::Collections { ticket, .. }
            | Self::Records { ticket, .. }
            | Self::Record { ticket, .. }
            | Self::Metadata { ticket, .. }
            | Self::Saved { ticket, .. } => Some(*ticket),
            Self::Preview { .. } => None,
        }
    }
}
