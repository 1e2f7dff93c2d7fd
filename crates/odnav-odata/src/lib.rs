// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking client for OData V2/V4 services.

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

pub type Entity = Map<String, Value>;

/// Entity sets of the public OData demo service, used when a service does
/// not publish usable metadata.
pub const FALLBACK_ENTITY_SETS: [&str; 6] = [
    "Categories",
    "Products",
    "Suppliers",
    "Persons",
    "Advertisements",
    "ProductDetails",
];

pub const FUNCTION_PREFIX: &str = "[FUNC] ";

const ENTITY_SET_PATTERN: &str = r#"<EntitySet[^>]+Name="([^"]+)""#;
const FUNCTION_IMPORT_PATTERN: &str = r#"<FunctionImport[^>]+Name="([^"]+)""#;
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("service url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("service url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "service url {base_url:?} must use http or https, not {}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            credentials: None,
            timeout,
            http,
        })
    }

    /// Sends basic auth on every request. Ignored unless both parts are set.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.credentials = (!username.is_empty() && !password.is_empty())
            .then(|| (username.to_owned(), password.to_owned()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn entity_set_url(&self, entity_set: &str) -> String {
        format!("{}/{}", self.base_url, entity_set)
    }

    fn entity_url(&self, entity_set: &str, key: &str) -> String {
        format!("{}/{}({})", self.base_url, entity_set, key)
    }

    /// The raw `$metadata` document.
    pub fn metadata(&self) -> Result<String> {
        let response = self.send(self.http.get(format!("{}/$metadata", self.base_url)))?;
        response.text().context("read service metadata")
    }

    /// Entity sets and function imports (prefixed with [`FUNCTION_PREFIX`])
    /// declared in the service metadata. Falls back to
    /// [`FALLBACK_ENTITY_SETS`] when the metadata cannot be fetched or
    /// declares nothing.
    pub fn entity_sets(&self) -> Result<Vec<String>> {
        let metadata = match self.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::warn!(base_url = %self.base_url, "metadata unavailable, using fallback entity sets: {error:#}");
                return Ok(fallback_entity_sets());
            }
        };
        let names = parse_entity_sets(&metadata)?;
        if names.is_empty() {
            tracing::warn!(base_url = %self.base_url, "metadata lists no entity sets, using fallback");
            return Ok(fallback_entity_sets());
        }
        Ok(names)
    }

    /// Up to `limit` entities of `entity_set`. One extra row is requested so
    /// the page can tell whether more exist.
    pub fn entities(&self, entity_set: &str, limit: usize) -> Result<EntityPage> {
        let limit = limit.max(1);
        let url = format!(
            "{}?$top={}&$format=json",
            self.entity_set_url(entity_set),
            limit + 1
        );
        let response = self.send(self.http.get(url))?;
        let payload: Value = response
            .json()
            .with_context(|| format!("decode {entity_set} listing"))?;
        let mut entities = extract_entities(payload)
            .with_context(|| format!("decode {entity_set} listing"))?;

        let has_more = entities.len() > limit;
        entities.truncate(limit);
        Ok(EntityPage { entities, has_more })
    }

    pub fn entity(&self, entity_set: &str, key: &str) -> Result<Entity> {
        let url = format!("{}?$format=json", self.entity_url(entity_set, key));
        let response = self.send(self.http.get(url))?;
        let payload: Value = response
            .json()
            .with_context(|| format!("decode {entity_set}({key})"))?;
        extract_entity(payload).with_context(|| format!("decode {entity_set}({key})"))
    }

    pub fn create_entity(&self, entity_set: &str, entity: &Entity) -> Result<()> {
        let body = strip_bookkeeping(entity);
        self.send(
            self.http
                .post(self.entity_set_url(entity_set))
                .header("Accept", "application/json")
                .json(&body),
        )
        .with_context(|| format!("create entity in {entity_set}"))?;
        Ok(())
    }

    pub fn update_entity(&self, entity_set: &str, key: &str, entity: &Entity) -> Result<()> {
        let body = strip_bookkeeping(entity);
        self.send(
            self.http
                .put(self.entity_url(entity_set, key))
                .header("Accept", "application/json")
                .json(&body),
        )
        .with_context(|| format!("update {entity_set}({key})"))?;
        Ok(())
    }
}

fn fallback_entity_sets() -> Vec<String> {
    FALLBACK_ENTITY_SETS
        .iter()
        .map(|name| (*name).to_owned())
        .collect()
}

/// Entity set names, then function imports, in document order.
pub fn parse_entity_sets(metadata: &str) -> Result<Vec<String>> {
    let entity_sets = Regex::new(ENTITY_SET_PATTERN).context("compile entity set pattern")?;
    let functions = Regex::new(FUNCTION_IMPORT_PATTERN).context("compile function pattern")?;

    let mut names = entity_sets
        .captures_iter(metadata)
        .map(|captures| captures[1].to_owned())
        .collect::<Vec<_>>();
    names.extend(
        functions
            .captures_iter(metadata)
            .map(|captures| format!("{FUNCTION_PREFIX}{}", &captures[1])),
    );
    Ok(names)
}

/// Drops `__`-prefixed bookkeeping fields (`__metadata`, `__deferred`)
/// that services reject in write bodies.
pub fn strip_bookkeeping(entity: &Entity) -> Entity {
    entity
        .iter()
        .filter(|(name, _)| !name.starts_with("__"))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Accepts `{"d": [...]}`, `{"d": {"results": [...]}}` and `{"value": [...]}`.
fn extract_entities(payload: Value) -> Result<Vec<Entity>> {
    let Value::Object(mut root) = payload else {
        bail!("expected a JSON object");
    };
    let rows = match (root.remove("d"), root.remove("value")) {
        (Some(Value::Array(rows)), _) => rows,
        (Some(Value::Object(mut wrapper)), _) => match wrapper.remove("results") {
            Some(Value::Array(rows)) => rows,
            _ => bail!("\"d\" has no \"results\" array"),
        },
        (_, Some(Value::Array(rows))) => rows,
        _ => bail!("no entity array under \"d\" or \"value\""),
    };
    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Object(entity) => Some(entity),
            _ => None,
        })
        .collect())
}

/// Accepts `{"d": {...}}` or a bare entity object.
fn extract_entity(payload: Value) -> Result<Entity> {
    match payload {
        Value::Object(mut root) => match root.remove("d") {
            Some(Value::Object(entity)) => Ok(entity),
            Some(_) => bail!("\"d\" is not an object"),
            None => Ok(root),
        },
        _ => bail!("expected a JSON object"),
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out -- check the service or raise remote.timeout");
    }
    anyhow!("cannot reach {base_url} -- check the url and your network ({error})")
}

/// Turns an error response into `HTTP <status>: <detail>`, preferring the
/// message from an OData error envelope.
fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    let code = status.as_u16();
    if let Ok(Value::Object(root)) = serde_json::from_str::<Value>(body)
        && let Some(Value::Object(error)) = root.get("error")
    {
        let message = match error.get("message") {
            Some(Value::String(message)) => Some(message.as_str()),
            Some(Value::Object(message)) => message.get("value").and_then(Value::as_str),
            _ => None,
        };
        if let Some(message) = message
            && !message.is_empty()
        {
            return anyhow!("HTTP {code}: {message}");
        }
    }

    let body = body.trim();
    if body.is_empty() {
        return anyhow!("HTTP {code}: {}", status.canonical_reason().unwrap_or("error"));
    }
    let detail = body.chars().take(MAX_ERROR_BODY).collect::<String>();
    if detail.len() < body.len() {
        return anyhow!("HTTP {code}: {detail}...");
    }
    anyhow!("HTTP {code}: {detail}")
}
