// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use odnav_app::ServiceConfig;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "odnav";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 10;
const DEFAULT_TIMEOUT: &str = "30s";

const DEFAULT_SERVICES: [(&str, &str); 3] = [
    (
        "OData.org Demo",
        "https://services.odata.org/V2/OData/OData.svc",
    ),
    (
        "Northwind V3",
        "https://services.odata.org/V3/Northwind/Northwind.svc",
    ),
    (
        "TripPin (V4)",
        "https://services.odata.org/V4/TripPinServiceRW",
    ),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            remote: Remote::default(),
            ui: Ui::default(),
            services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Remote {
    pub page_size: Option<i64>,
    pub timeout: Option<String>,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub show_logs: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            show_logs: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A single ad-hoc service given on the command line or in the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOverride {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ServiceOverride {
    pub fn from_env() -> Self {
        let read = |name: &str| env::var(name).ok().filter(|value| !value.is_empty());
        Self {
            url: read("ODATA_URL"),
            username: read("ODATA_USER"),
            password: read("ODATA_PASS"),
        }
    }

    fn into_service(self, name: &str) -> Option<ServiceConfig> {
        let url = self.url.filter(|url| !url.is_empty())?;
        let mut service = ServiceConfig::new(name, url);
        service.username = self.username.filter(|value| !value.is_empty());
        service.password = self.password.filter(|value| !value.is_empty());
        Some(service)
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ODNAV_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ODNAV_CONFIG_PATH to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put settings under [remote], [ui] and [[services]]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(page_size) = self.remote.page_size
            && page_size <= 0
        {
            bail!(
                "remote.page_size in {} must be positive, got {}",
                path.display(),
                page_size
            );
        }

        if let Some(timeout) = &self.remote.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "remote.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        let mut names = BTreeSet::new();
        for (index, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                bail!(
                    "services[{index}] in {} needs a non-empty name",
                    path.display()
                );
            }
            if !(service.url.starts_with("http://") || service.url.starts_with("https://")) {
                bail!(
                    "service {:?} in {} must have an http(s) url, got {:?}",
                    service.name,
                    path.display(),
                    service.url
                );
            }
            if !names.insert(service.name.as_str()) {
                bail!(
                    "service name {:?} appears more than once in {}",
                    service.name,
                    path.display()
                );
            }
        }

        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.remote
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE as usize)
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.remote.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn show_logs(&self) -> bool {
        self.ui.show_logs.unwrap_or(true)
    }

    /// The services offered at the root, highest priority first: the
    /// command line, then the environment, then the file, then the
    /// built-in demo services.
    pub fn services(&self, cli: ServiceOverride, env: ServiceOverride) -> Vec<ServiceConfig> {
        if let Some(service) = cli.into_service("CLI Service") {
            return vec![service];
        }
        if let Some(service) = env.into_service("Environment Service") {
            return vec![service];
        }
        if !self.services.is_empty() {
            return self
                .services
                .iter()
                .map(|entry| ServiceConfig {
                    name: entry.name.clone(),
                    url: entry.url.clone(),
                    username: entry.username.clone().filter(|value| !value.is_empty()),
                    password: entry.password.clone().filter(|value| !value.is_empty()),
                })
                .collect();
        }
        DEFAULT_SERVICES
            .iter()
            .map(|(name, url)| ServiceConfig::new(*name, *url))
            .collect()
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# odnav config\n# Place this file at: {}\n\nversion = 1\n\n[remote]\n# Records fetched per list request; drilling [...more items] adds another page\npage_size = {}\n# <N>ms, <N>s or <N>m\ntimeout = \"{}\"\n\n[ui]\nshow_logs = true\n\n# Without any [[services]] the public OData demo services are listed.\n[[services]]\nname = \"{}\"\nurl = \"{}\"\n# username = \"optional\"\n# password = \"optional\"\n",
            path.display(),
            DEFAULT_PAGE_SIZE,
            DEFAULT_TIMEOUT,
            DEFAULT_SERVICES[1].0,
            DEFAULT_SERVICES[1].1,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("timeout {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, ServiceOverride, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn url_override(url: &str) -> ServiceOverride {
        ServiceOverride {
            url: Some(url.to_owned()),
            ..ServiceOverride::default()
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.timeout()?, Duration::from_secs(30));
        assert!(config.show_logs());
        let names = config
            .services(ServiceOverride::default(), ServiceOverride::default())
            .into_iter()
            .map(|service| service.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["OData.org Demo", "Northwind V3", "TripPin (V4)"]);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[remote]\npage_size = 5\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[[services]]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[remote]\npage_size = 25\ntimeout = \"500ms\"\n[ui]\nshow_logs = false\n[[services]]\nname = \"Shop\"\nurl = \"https://shop.example/odata\"\nusername = \"clerk\"\npassword = \"hunter2\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 25);
        assert_eq!(config.timeout()?, Duration::from_millis(500));
        assert!(!config.show_logs());
        let services = config.services(ServiceOverride::default(), ServiceOverride::default());
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Shop");
        assert_eq!(services[0].username.as_deref(), Some("clerk"));
        assert_eq!(services[0].password.as_deref(), Some("hunter2"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn remote_limits_are_validated() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[remote]\npage_size = 0\n")?;
        let error = Config::load(&path).expect_err("zero page size should fail");
        assert!(error.to_string().contains("must be positive"));

        let (_temp, path) = write_config("version = 1\n[remote]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn services_are_validated() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[[services]]\nname = \"Shop\"\nurl = \"ftp://shop\"\n")?;
        let error = Config::load(&path).expect_err("ftp url should fail");
        assert!(error.to_string().contains("http(s) url"));

        let (_temp, path) = write_config(
            "version = 1\n[[services]]\nname = \"Shop\"\nurl = \"http://a\"\n[[services]]\nname = \"Shop\"\nurl = \"http://b\"\n",
        )?;
        let error = Config::load(&path).expect_err("duplicate names should fail");
        assert!(error.to_string().contains("more than once"));

        let (_temp, path) =
            write_config("version = 1\n[[services]]\nname = \" \"\nurl = \"http://a\"\n")?;
        let error = Config::load(&path).expect_err("blank name should fail");
        assert!(error.to_string().contains("non-empty name"));
        Ok(())
    }

    #[test]
    fn command_line_beats_environment_beats_file() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[[services]]\nname = \"Shop\"\nurl = \"https://shop\"\n")?;
        let config = Config::load(&path)?;

        let services = config.services(
            ServiceOverride {
                url: Some("https://cli".to_owned()),
                username: Some("me".to_owned()),
                password: Some("pw".to_owned()),
            },
            url_override("https://env"),
        );
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "CLI Service");
        assert_eq!(services[0].url, "https://cli");
        assert_eq!(services[0].username.as_deref(), Some("me"));

        let services = config.services(ServiceOverride::default(), url_override("https://env"));
        assert_eq!(services[0].name, "Environment Service");
        assert_eq!(services[0].username, None);

        let services = config.services(
            ServiceOverride {
                url: Some(String::new()),
                ..ServiceOverride::default()
            },
            ServiceOverride::default(),
        );
        assert_eq!(services[0].name, "Shop");
        Ok(())
    }

    #[test]
    fn environment_override_reads_odata_variables() {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ODATA_URL", "https://env.example/svc");
            std::env::set_var("ODATA_USER", "");
            std::env::set_var("ODATA_PASS", "secret");
        }
        let resolved = ServiceOverride::from_env();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ODATA_URL");
            std::env::remove_var("ODATA_USER");
            std::env::remove_var("ODATA_PASS");
        }
        assert_eq!(
            resolved,
            ServiceOverride {
                url: Some("https://env.example/svc".to_owned()),
                username: None,
                password: Some("secret".to_owned()),
            }
        );
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ODNAV_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ODNAV_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ODNAV_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("odnav/config.toml"));
        Ok(())
    }

    #[test]
    fn timeouts_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn oversized_minute_timeout_is_an_error() -> Result<()> {
        let error = parse_duration("999999999999999999m").expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"));

        let (_temp, path) =
            write_config("version = 1\n[remote]\ntimeout = \"999999999999999999m\"\n")?;
        let error = Config::load(&path).expect_err("oversized timeout should fail");
        assert!(error.to_string().contains("too large"));
        Ok(())
    }

    #[test]
    fn timeouts_reject_invalid_duration() {
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        let message = error.to_string();
        assert!(message.contains("\"oops\""), "unexpected message: {message}");
    }

    #[test]
    fn example_config_loads_back() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[remote]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[[services]]"));

        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.services.len(), 1);
        Ok(())
    }
}
