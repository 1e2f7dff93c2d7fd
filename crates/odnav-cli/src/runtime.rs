// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use odnav_app::record::METADATA_ENTRY;
use odnav_app::{Record, RecordPage, RemoteService, ServiceConfig};
use odnav_odata::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves browser requests from OData services. One HTTP client is built
/// per service name on first use and shared by every worker afterwards.
pub struct ODataRuntime {
    timeout: Duration,
    clients: Mutex<HashMap<String, Arc<Client>>>,
}

impl ODataRuntime {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self, service: &ServiceConfig) -> Result<Arc<Client>> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| anyhow!("client cache poisoned"))?;
        if let Some(client) = clients.get(&service.name) {
            return Ok(Arc::clone(client));
        }

        let mut client = Client::new(&service.url, self.timeout)
            .with_context(|| format!("connect to service {}", service.name))?;
        if let (Some(username), Some(password)) = (&service.username, &service.password) {
            client = client.with_basic_auth(username, password);
        }
        tracing::debug!(
            service = %service.name,
            url = %client.base_url(),
            auth = client.has_credentials(),
            "built service client"
        );
        let client = Arc::new(client);
        clients.insert(service.name.clone(), Arc::clone(&client));
        Ok(client)
    }
}

impl RemoteService for ODataRuntime {
    fn list_collections(&self, service: &ServiceConfig) -> Result<Vec<String>> {
        let sets = self.client(service)?.entity_sets()?;
        let mut names = Vec::with_capacity(sets.len() + 1);
        names.push(METADATA_ENTRY.to_owned());
        names.extend(sets);
        Ok(names)
    }

    fn list_records(
        &self,
        service: &ServiceConfig,
        collection: &str,
        limit: usize,
    ) -> Result<RecordPage> {
        let page = self.client(service)?.entities(collection, limit)?;
        Ok(RecordPage {
            records: page.entities,
            has_more: page.has_more,
        })
    }

    fn get_record(&self, service: &ServiceConfig, collection: &str, key: &str) -> Result<Record> {
        self.client(service)?.entity(collection, key)
    }

    fn create_record(&self, service: &ServiceConfig, collection: &str, record: &Record) -> Result<()> {
        self.client(service)?.create_entity(collection, record)
    }

    fn update_record(
        &self,
        service: &ServiceConfig,
        collection: &str,
        key: &str,
        record: &Record,
    ) -> Result<()> {
        self.client(service)?.update_entity(collection, key, record)
    }

    fn fetch_metadata(&self, service: &ServiceConfig) -> Result<String> {
        self.client(service)?.metadata()
    }
}
