//! pagewatch-replay: drives the telemetry pipeline against a scripted
//! in-memory page and prints every request it would have sent.
//!
//! Requests go to stdout as JSON lines; logs go to stderr.

mod script;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use pagewatch_core::MonitorOptions;
use pagewatch_web_sdk::{MemoryHost, Monitor};
use tracing::{info, warn};

use crate::script::Script;

#[derive(Parser, Debug)]
#[command(name = "pagewatch-replay")]
#[command(about = "Replay a scripted page session through the telemetry pipeline")]
#[command(version)]
struct Cli {
    /// Replay script (JSON)
    script: PathBuf,

    /// Monitor options file (TOML); PAGEWATCH__* variables layer on top
    #[arg(long, env = "PAGEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Collection endpoint (overrides config)
    #[arg(long, env = "PAGEWATCH__REQUEST_URL")]
    request_url: Option<String>,

    /// Prefer sendBeacon over image requests
    #[arg(long, default_value_t = false)]
    beacon: bool,

    /// Write the per-record console line
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagewatch_replay=info,pagewatch_web_sdk=info".into()),
        )
        .json()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut options = MonitorOptions::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load options, using defaults");
        MonitorOptions::default()
    });

    let text = fs::read_to_string(&cli.script)
        .with_context(|| format!("reading script {}", cli.script.display()))?;
    let script: Script = serde_json::from_str(&text).context("parsing script")?;

    if let Some(script_options) = script.options {
        options = script_options;
    }
    if let Some(request_url) = cli.request_url {
        options.request_url = Some(request_url);
    }
    if cli.beacon {
        options.beacon_tracker = Some(true);
    }
    if cli.debug {
        options.debug = Some(true);
    }

    let host = Rc::new(MemoryHost::new(script.page).with_capabilities(script.capabilities));
    host.set_clock(script.clock);
    let monitor = Monitor::new(host.clone(), options)?;

    info!(steps = script.steps.len(), "replaying script");

    let mut out = io::stdout().lock();
    let mut sent = 0usize;
    for (index, step) in script.steps.into_iter().enumerate() {
        step.apply(&host, &monitor)
            .with_context(|| format!("step {index}"))?;
        for request in host.take_requests() {
            serde_json::to_writer(&mut out, &request)?;
            writeln!(out)?;
            sent += 1;
        }
    }
    for line in host.console_lines() {
        info!(target: "pagewatch_replay::console", "{line}");
    }

    info!(requests = sent, "replay finished");
    Ok(())
}
