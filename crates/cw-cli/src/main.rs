//! crew-watch CLI
//!
//! Command-line interface for the crew-watch roster reconciliation
//! service.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use cw_api::{ApiServer, ApiServerConfig, AppState};
use cw_core::{
    CrewService, CrewStatus, FileSnapshotStore, MemorySnapshotStore, Reconciler,
    RefreshScheduler, RosterSource, Snapshot, SnapshotStore, ValidationStatus,
};
use cw_providers::{
    AgencyRosterConfig, AgencyRosterProvider, AuthConfig, HttpClientConfig, OpenNotifyConfig,
    OpenNotifyProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

mod config;

use config::{AppConfig, ProviderConfig};

#[derive(Parser)]
#[command(name = "crew-watch")]
#[command(version)]
#[command(about = "Reconciles who is currently active in orbit from multiple providers", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refresh scheduler and the HTTP API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Snapshot file path (overrides config)
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
    },

    /// Run a single refresh cycle and print the reconciled roster
    Fetch {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate the configuration and exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("crew-watch.yaml"));
    let config = AppConfig::load(&config_path).unwrap_or_else(|_| {
        if cli.verbose {
            eprintln!("using default configuration (no config file found)");
        }
        AppConfig::default()
    });

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config
            .logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    };
    cw_observability::init_logging_with_config(cw_observability::LoggingConfig {
        level,
        json_format: config.logging.json_format,
        ..Default::default()
    });

    match cli.command {
        Commands::Serve {
            host,
            port,
            snapshot,
        } => cmd_serve(config, host, port, snapshot).await,
        Commands::Fetch { json } => cmd_fetch(config, json).await,
        Commands::Config { show_secrets } => cmd_config(config, show_secrets),
        Commands::Validate => cmd_validate(config),
    }
}

/// Instantiates the configured, enabled providers.
fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn RosterSource>>> {
    let mut sources: Vec<Arc<dyn RosterSource>> = Vec::new();

    for (id, provider) in config.enabled_providers() {
        match provider.kind.as_str() {
            "open_notify" => {
                let provider = OpenNotifyProvider::new(OpenNotifyConfig {
                    id: id.clone(),
                    http: http_config(provider, cw_providers::open_notify::DEFAULT_BASE_URL),
                    craft_filter: None,
                })
                .map_err(|e| anyhow!("provider '{}': {}", id, e))?;
                sources.push(Arc::new(provider));
            }
            "agency_roster" => {
                if provider.base_url.is_empty() {
                    return Err(anyhow!("provider '{}' requires a base_url", id));
                }
                let mut agency_config =
                    AgencyRosterConfig::new(id.clone(), provider.base_url.as_str());
                agency_config.http = http_config(provider, &provider.base_url);
                let provider = AgencyRosterProvider::new(agency_config)
                    .map_err(|e| anyhow!("provider '{}': {}", id, e))?;
                sources.push(Arc::new(provider));
            }
            other => return Err(anyhow!("provider '{}' has unknown kind '{}'", id, other)),
        }
    }

    if sources.is_empty() {
        return Err(anyhow!("no enabled providers configured"));
    }
    Ok(sources)
}

fn http_config(provider: &ProviderConfig, default_base_url: &str) -> HttpClientConfig {
    let base_url = if provider.base_url.is_empty() {
        default_base_url.to_string()
    } else {
        provider.base_url.clone()
    };
    let auth = if provider.api_key.is_empty() {
        AuthConfig::None
    } else {
        AuthConfig::BearerToken {
            token: provider.api_key.clone(),
        }
    };
    HttpClientConfig {
        base_url,
        auth,
        timeout_secs: provider.timeout_secs,
        max_retries: provider.max_retries,
    }
}

async fn cmd_serve(
    config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    snapshot: Option<PathBuf>,
) -> Result<()> {
    let report = config.validate();
    print_validation(&report);
    if !report.is_ok() {
        std::process::exit(1);
    }

    let sources = build_sources(&config)?;
    let snapshot_path =
        snapshot.unwrap_or_else(|| PathBuf::from(&config.snapshot_path));
    let store: Arc<dyn SnapshotStore> =
        Arc::new(FileSnapshotStore::open(&snapshot_path).await?);

    let scheduler = Arc::new(RefreshScheduler::new(
        config.scheduler_config(),
        sources,
        Reconciler::new(config.reconciler_config()),
        store.clone(),
    ));
    let service = CrewService::new(store, scheduler.clone());

    let host = host.unwrap_or_else(|| config.api.host.clone());
    let port = port.unwrap_or(config.api.port);
    let bind_address = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", host, port))?;

    println!(
        "{} snapshot: {}, listening on {}",
        "crew-watch serving".green().bold(),
        snapshot_path.display(),
        bind_address
    );

    let runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    let server = ApiServer::new(AppState::new(service), ApiServerConfig { bind_address });
    server.run().await?;

    scheduler.stop();
    let _ = runner.await;
    Ok(())
}

async fn cmd_fetch(config: AppConfig, json: bool) -> Result<()> {
    let sources = build_sources(&config)?;
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let scheduler = RefreshScheduler::new(
        config.scheduler_config(),
        sources,
        Reconciler::new(config.reconciler_config()),
        store.clone(),
    );

    scheduler.run_cycle().await;

    let Some(snapshot) = store.current().await? else {
        println!("{}", "every provider failed; no roster to show".red().bold());
        std::process::exit(1);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        print_roster(&snapshot);
    }
    Ok(())
}

fn print_roster(snapshot: &Snapshot) {
    let view = &snapshot.view;

    let status = match view.status {
        ValidationStatus::Consistent => "consistent".green(),
        ValidationStatus::Partial => "partial".yellow(),
        ValidationStatus::Conflicted => "conflicted".red(),
    };
    println!(
        "{} ({} members, {})",
        "Current roster".bold(),
        view.members.len(),
        status
    );
    println!("──────────────────────────────────────────");

    for member in &view.members {
        let status = match member.status {
            CrewStatus::Active => member.status.to_string().green(),
            CrewStatus::Transitioning => member.status.to_string().yellow(),
            CrewStatus::Unknown => member.status.to_string().red(),
        };
        let location = member
            .attribute(cw_core::ATTR_LOCATION)
            .unwrap_or("unknown location");
        println!(
            "  {} / {} [{}] confidence {:.2} ({})",
            member.display_name().cyan(),
            location,
            status,
            member.confidence,
            member.reported_by.join(", ")
        );
    }

    if !view.transitions.is_empty() {
        println!();
        println!("{}", "Transitions since previous view".bold());
        for transition in &view.transitions {
            println!("  {:?}", transition);
        }
    }

    println!();
    println!(
        "generated {} · next refresh {} · cached fallback: {}",
        snapshot.freshness.generated_at,
        snapshot.freshness.next_refresh_at,
        snapshot.freshness.cached_fallback
    );
}

fn cmd_config(config: AppConfig, show_secrets: bool) -> Result<()> {
    let display = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };
    println!("{}", serde_yaml::to_string(&display)?);
    Ok(())
}

fn cmd_validate(config: AppConfig) -> Result<()> {
    let report = config.validate();
    print_validation(&report);

    if report.is_ok() {
        println!("{}", "Configuration is valid.".green().bold());
        Ok(())
    } else {
        println!("{}", "Configuration validation failed.".red().bold());
        std::process::exit(1);
    }
}

fn print_validation(report: &config::ValidationReport) {
    for error in &report.errors {
        println!("{} {}", "error:".red().bold(), error);
    }
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
}
