// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Fixtures for browser tests: demo services, deterministic sample records
//! and an in-memory remote service.

use anyhow::{Result, anyhow, bail};
use odnav_app::record::resolve_key;
use odnav_app::{Record, RecordPage, RemoteService, ServiceConfig};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Mutex;

const PRODUCT_NOUNS: [&str; 10] = [
    "Widget", "Gadget", "Sprocket", "Gizmo", "Bracket", "Flange", "Valve", "Spindle", "Coupler",
    "Grommet",
];

const PRODUCT_ADJECTIVES: [&str; 8] = [
    "Deluxe", "Compact", "Heavy", "Basic", "Premium", "Tiny", "Rugged", "Classic",
];

const CATEGORIES: [&str; 4] = ["Hardware", "Plumbing", "Electrical", "Garden"];

/// Three services with unreachable local URLs; "Acme Service" sits at index 2.
pub fn demo_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig::new("Demo", "http://127.0.0.1:9/demo.svc"),
        ServiceConfig::new("Northwind", "http://127.0.0.1:9/northwind.svc"),
        ServiceConfig::new("Acme Service", "http://127.0.0.1:9/acme.svc")
            .with_credentials("acme", "secret"),
    ]
}

pub fn fixture_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut record = Record::new();
            record.insert("value".to_owned(), other);
            record
        }
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Generates product-like records in the V2 shape: bookkeeping metadata,
/// scalar fields and one deferred navigation property.
#[derive(Debug, Clone)]
pub struct RecordFaker {
    rng: DeterministicRng,
    base_url: String,
}

impl RecordFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            base_url: "http://127.0.0.1:9/demo.svc".to_owned(),
        }
    }

    fn pick(&mut self, values: &[&'static str]) -> &'static str {
        values[self.rng.int_n(values.len())]
    }

    pub fn product(&mut self, id: i64) -> Record {
        let name = format!(
            "{} {}",
            self.pick(&PRODUCT_ADJECTIVES),
            self.pick(&PRODUCT_NOUNS)
        );
        let price_cents = 100 + self.rng.int_n(99_900) as i64;
        let category = self.pick(&CATEGORIES);
        fixture_record(json!({
            "__metadata": {
                "uri": format!("{}/Products({id})", self.base_url),
                "type": "Demo.Product",
            },
            "ID": id,
            "Name": name,
            "Price": format!("{}.{:02}", price_cents / 100, price_cents % 100),
            "Category": category,
            "Supplier": {
                "__deferred": {"uri": format!("{}/Products({id})/Supplier", self.base_url)}
            },
        }))
    }

    pub fn products(&mut self, count: usize) -> Vec<Record> {
        (1..=count as i64).map(|id| self.product(id)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeWrite {
    Create {
        collection: String,
        record: Record,
    },
    Update {
        collection: String,
        key: String,
        record: Record,
    },
}

/// In-memory [`RemoteService`]. Collections are listed per service name;
/// records are shared across services and addressed by their resolved key.
#[derive(Debug, Default)]
pub struct FakeRemote {
    collections: BTreeMap<String, Vec<String>>,
    metadata: BTreeMap<String, String>,
    records: Mutex<BTreeMap<String, Vec<Record>>>,
    failing: Vec<String>,
    writes: Mutex<Vec<FakeWrite>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collections(mut self, service: &str, names: &[&str]) -> Self {
        self.collections.insert(
            service.to_owned(),
            names.iter().map(|name| (*name).to_owned()).collect(),
        );
        self
    }

    pub fn with_metadata(mut self, service: &str, document: &str) -> Self {
        self.metadata
            .insert(service.to_owned(), document.to_owned());
        self
    }

    pub fn with_records(self, collection: &str, records: Vec<Record>) -> Self {
        if let Ok(mut stored) = self.records.lock() {
            stored.insert(collection.to_owned(), records);
        }
        self
    }

    /// Every call naming `target` (a service or a collection) fails.
    pub fn failing(mut self, target: &str) -> Self {
        self.failing.push(target.to_owned());
        self
    }

    pub fn writes(&self) -> Vec<FakeWrite> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    fn check(&self, target: &str) -> Result<()> {
        if self.failing.iter().any(|failing| failing == target) {
            bail!("{target} is unavailable");
        }
        Ok(())
    }

    fn records_of(&self, collection: &str) -> Result<Vec<Record>> {
        let stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("record store poisoned"))?;
        Ok(stored.get(collection).cloned().unwrap_or_default())
    }

    fn record_writes(&self, write: FakeWrite) -> Result<()> {
        self.writes
            .lock()
            .map_err(|_| anyhow!("write log poisoned"))?
            .push(write);
        Ok(())
    }
}

impl RemoteService for FakeRemote {
    fn list_collections(&self, service: &ServiceConfig) -> Result<Vec<String>> {
        self.check(&service.name)?;
        Ok(self
            .collections
            .get(&service.name)
            .cloned()
            .unwrap_or_default())
    }

    fn list_records(
        &self,
        service: &ServiceConfig,
        collection: &str,
        limit: usize,
    ) -> Result<RecordPage> {
        self.check(&service.name)?;
        self.check(collection)?;
        let mut records = self.records_of(collection)?;
        let has_more = records.len() > limit;
        records.truncate(limit);
        Ok(RecordPage { records, has_more })
    }

    fn get_record(&self, service: &ServiceConfig, collection: &str, key: &str) -> Result<Record> {
        self.check(&service.name)?;
        self.check(collection)?;
        self.records_of(collection)?
            .into_iter()
            .find(|record| resolve_key(record).is_ok_and(|candidate| candidate == key))
            .ok_or_else(|| anyhow!("HTTP 404: {collection}({key}) not found"))
    }

    fn create_record(&self, service: &ServiceConfig, collection: &str, record: &Record) -> Result<()> {
        self.check(&service.name)?;
        self.check(collection)?;
        self.records
            .lock()
            .map_err(|_| anyhow!("record store poisoned"))?
            .entry(collection.to_owned())
            .or_default()
            .push(record.clone());
        self.record_writes(FakeWrite::Create {
            collection: collection.to_owned(),
            record: record.clone(),
        })
    }

    fn update_record(
        &self,
        service: &ServiceConfig,
        collection: &str,
        key: &str,
        record: &Record,
    ) -> Result<()> {
        self.check(&service.name)?;
        self.check(collection)?;
        {
            let mut stored = self
                .records
                .lock()
                .map_err(|_| anyhow!("record store poisoned"))?;
            let rows = stored.entry(collection.to_owned()).or_default();
            let Some(slot) = rows
                .iter_mut()
                .find(|row| resolve_key(row).is_ok_and(|candidate| candidate == key))
            else {
                bail!("HTTP 404: {collection}({key}) not found");
            };
            *slot = record.clone();
        }
        self.record_writes(FakeWrite::Update {
            collection: collection.to_owned(),
            key: key.to_owned(),
            record: record.clone(),
        })
    }

    fn fetch_metadata(&self, service: &ServiceConfig) -> Result<String> {
        self.check(&service.name)?;
        self.metadata
            .get(&service.name)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 404: no metadata for {}", service.name))
    }
}
