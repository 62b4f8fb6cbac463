//! Portcullis - evaluate resource URLs against a gate built from config.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use portcullis::{Decision, GateConfig, IncomingRequest, ResourceGate};

/// Local resource access gate
#[derive(Parser)]
#[command(name = "portcullis")]
#[command(about = "Decide which local resource loads a rendering surface may perform")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON). Defaults to environment variables.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Deny every file: request
    #[arg(long, global = true)]
    prefer_browser_code_load: bool,

    /// Additional trusted root (repeatable)
    #[arg(long = "root", global = true)]
    roots: Vec<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate URLs and print one decision per line
    Check {
        /// Temporary grant held while the URLs are evaluated (repeatable)
        #[arg(long = "grant")]
        grants: Vec<PathBuf>,

        /// Print decisions as JSON lines
        #[arg(long)]
        json: bool,

        /// URLs to evaluate
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List the authorized roots
    Roots,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<GateConfig> {
    let mut config = match &cli.config {
        Some(path) => GateConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GateConfig::from_env().context("Failed to load config from environment")?,
    };

    if cli.prefer_browser_code_load {
        config.prefer_browser_code_load = true;
    }
    config.roots.extra.extend(cli.roots.iter().cloned());
    config.validate()?;

    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    let gate = ResourceGate::new(&config)?;

    info!(
        policy = %gate.policy(),
        roots = gate.store().len(),
        "Gate ready"
    );

    match cli.command {
        Command::Roots => {
            for root in gate.store().roots() {
                println!("{}", root.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { grants, json, urls } => {
            let manager = gate.grants();
            let handles: Vec<_> = grants.iter().map(|path| manager.grant(path)).collect();

            let mut any_denied = false;
            for url in urls {
                let decision = gate.handle(&IncomingRequest::from_url(url.as_str())).await;
                any_denied |= decision.is_denied();

                if json {
                    let mut line = serde_json::to_value(&decision)?;
                    line["url"] = serde_json::Value::String(url);
                    println!("{line}");
                } else {
                    match &decision {
                        Decision::Serve(resource) => {
                            println!("serve {} {}", url, resource.path.display())
                        }
                        Decision::Deny { code } => println!("deny  {} {}", url, code),
                    }
                }
            }

            for handle in &handles {
                handle.revoke();
            }

            info!(metrics = ?gate.metrics().snapshot(), "Check complete");

            Ok(if any_denied {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
