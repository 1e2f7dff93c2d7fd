// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, ServiceOverride};
use odnav_app::AppState;
use runtime::ODataRuntime;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    init_tracing()?;

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `odnav --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    let timeout = config.timeout()?;
    let page_size = options.page_size.unwrap_or_else(|| config.page_size());
    let services = config.services(options.service_override(), ServiceOverride::from_env());

    for service in &services {
        odnav_odata::Client::new(&service.url, timeout).with_context(|| {
            format!(
                "invalid url for service {:?}; fix --url, ODATA_URL or [[services]] in {}",
                service.name,
                options.config_path.display()
            )
        })?;
    }
    if options.check_only {
        return Ok(());
    }

    tracing::info!(
        services = services.len(),
        page_size,
        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        "starting browser"
    );

    let mut state = AppState::new(services, page_size);
    state.show_logs = config.show_logs();
    let runtime = Arc::new(ODataRuntime::new(timeout));
    odnav_tui::run_app(&mut state, runtime)
}

/// Diagnostics go to `ODNAV_LOG_FILE` when set; the terminal belongs to
/// the UI, so otherwise they are discarded.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("ODNAV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    let installed = match env::var_os("ODNAV_LOG_FILE") {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", PathBuf::from(&path).display()))?;
            builder.with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(io::sink).try_init(),
    };
    installed.map_err(|error| anyhow!("install tracing subscriber: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    url: Option<String>,
    user: Option<String>,
    pass: Option<String>,
    page_size: Option<usize>,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

impl CliOptions {
    fn service_override(&self) -> ServiceOverride {
        ServiceOverride {
            url: self.url.clone(),
            username: self.user.clone(),
            password: self.pass.clone(),
        }
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        url: None,
        user: None,
        pass: None,
        page_size: None,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--url requires a service URL"))?;
                options.url = Some(value.as_ref().to_owned());
            }
            "--user" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--user requires a user name"))?;
                options.user = Some(value.as_ref().to_owned());
            }
            "--pass" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--pass requires a password"))?;
                options.pass = Some(value.as_ref().to_owned());
            }
            "--page-size" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--page-size requires a number"))?;
                let size: usize = value
                    .as_ref()
                    .parse()
                    .with_context(|| format!("invalid --page-size {:?}", value.as_ref()))?;
                if size == 0 {
                    bail!("--page-size must be positive");
                }
                options.page_size = Some(size);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("odnav - browse OData services in the terminal");
    println!("  --config <path>          Use a specific config path");
    println!("  --url <url>              Browse a single service (overrides ODATA_URL)");
    println!("  --user <name>            Basic auth user for --url (overrides ODATA_USER)");
    println!("  --pass <password>        Basic auth password for --url (overrides ODATA_PASS)");
    println!("  --page-size <n>          Records per list request");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and service URLs, then exit");
    println!("  --help                   Show this help");
    println!();
    println!("Set ODNAV_LOG_FILE to write diagnostics to a file, ODNAV_LOG to filter them.");
}
