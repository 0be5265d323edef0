//! Script Engine CLI entry point.
//!
//! Brings up the engine registry and runs or checks a single function blob.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use script_engine_common::{ConfigFile, LoggingConfig};
use script_engine_core::{EngineRegistry, MemoryReport, RunContext};
use script_engine_host::register_lua_engine;

#[derive(Parser, Debug)]
#[command(name = "script-engine", version, about = "Run user functions through pluggable script engines")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "SCRIPT_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a function and invoke it once, printing the reply as JSON.
    Run {
        /// Source file of the function.
        script: PathBuf,

        /// Key passed to the function (repeatable).
        #[arg(short = 'k', long = "key")]
        keys: Vec<String>,

        /// Argument passed to the function (repeatable).
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        /// Engine to run the function with.
        #[arg(long)]
        engine: Option<String>,
    },

    /// Compile a function without invoking it and report memory figures.
    Check {
        /// Source file of the function.
        script: PathBuf,

        /// Engine to compile the function with.
        #[arg(long)]
        engine: Option<String>,
    },

    /// List registered engines.
    Engines,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    init_tracing(&config.logging);

    let registry = EngineRegistry::new();
    register_lua_engine(&registry, &config.runtime)
        .context("Failed to initialize the Lua engine")?;

    info!(engines = ?registry.names(), "Engines registered");

    let default_engine = config.runtime.engine.name.as_str();

    match cli.command {
        Command::Run {
            script,
            keys,
            args,
            engine,
        } => {
            let source = std::fs::read(&script)
                .with_context(|| format!("Failed to read {}", script.display()))?;
            let descriptor = registry.dispatch(engine.as_deref().unwrap_or(default_engine))?;
            let mut engine = descriptor.lock();

            let handle = engine.create(&source)?;
            let mut run = RunContext::new(uuid::Uuid::new_v4().to_string());
            let result = engine.call(&mut run, handle, &to_bytes(keys), &to_bytes(args));
            engine.free_function(handle)?;
            result?;

            let reply = run
                .reply
                .as_ref()
                .map_or(serde_json::Value::Null, script_engine_core::Reply::to_json);
            println!("{}", serde_json::to_string_pretty(&reply)?);

            info!(
                request_id = %run.request_id,
                logs = run.logs.len(),
                duration_us = run.metrics.duration.map_or(0, |d| d.as_micros()),
                "Function finished"
            );

            Ok(if run.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Check { script, engine } => {
            let source = std::fs::read(&script)
                .with_context(|| format!("Failed to read {}", script.display()))?;
            let descriptor = registry.dispatch(engine.as_deref().unwrap_or(default_engine))?;
            let mut engine = descriptor.lock();

            let before = engine.used_memory();
            let handle = engine.create(&source)?;
            let report = MemoryReport::collect(&**engine, &[handle]);
            engine.free_function(handle)?;

            let summary = serde_json::json!({
                "engine": descriptor.name(),
                "compiled_bytes": report.used_memory.saturating_sub(before),
                "used_memory": report.used_memory,
                "engine_overhead": report.engine_overhead,
                "function_overhead": report.functions_overhead,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);

            Ok(ExitCode::SUCCESS)
        }
        Command::Engines => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.as_str().into());

    // Logs go to stderr so stdout carries only the reply.
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn to_bytes(items: Vec<String>) -> Vec<Vec<u8>> {
    items.into_iter().map(String::into_bytes).collect()
}
