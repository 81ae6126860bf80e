//! jobfolder-sync - provisions storage folders for new tracking-system jobs
//!
//! Usage:
//!     jobfolder-sync authorize-url
//!     jobfolder-sync exchange-code --code <CODE> --state <STATE>
//!     jobfolder-sync once
//!     jobfolder-sync run
//!
//! All settings come from the environment; see `ServiceConfig::from_lookup`.
//! The two login commands read only the `WFM_*` variables and
//! `CREDENTIALS_DIR`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_runtime::config::{AuthorizationConfig, ServiceConfig};
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap_desktop, bootstrap_desktop_authorizer, spawn_event_log};
use core_sync::SyncError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "jobfolder-sync", version, about = "Provision team folders for new jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on the configured interval until Ctrl-C
    Run,
    /// Run a single cycle and exit
    Once,
    /// Print the URL an operator opens to authorize the tracking-system client
    AuthorizeUrl,
    /// Exchange the code sent to the redirect URI for the first credential
    ExchangeCode {
        #[arg(long)]
        code: String,
        #[arg(long)]
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::from_env().context("Invalid logging settings")?;
    init_logging(logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::AuthorizeUrl => {
            let authorizer = authorizer()?;
            let url = authorizer.authorization_url().await?;
            println!("{}", url);
        }
        Command::ExchangeCode { code, state } => {
            let authorizer = authorizer()?;
            authorizer.complete_authorization(&code, &state).await?;
            info!("Credential stored");
        }
        Command::Once => {
            let core = service()?;
            let coordinator = core.start_sync().await.context("Startup failed")?;
            match coordinator.run_cycle().await {
                Ok(report) => info!(
                    cycle_id = %report.cycle_id,
                    provisioned = report.provisioned(),
                    skipped = report.skipped(),
                    failed = report.failed(),
                    "Done"
                ),
                Err(SyncError::CycleSkipped(reason)) => warn!(reason = %reason, "Nothing to do"),
                Err(e) => return Err(e).context("Cycle failed"),
            }
        }
        Command::Run => {
            let core = service()?;
            let coordinator = core.start_sync().await.context("Startup failed")?;

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Shutdown requested, finishing current cycle");
                        signal.cancel();
                    }
                    Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });

            coordinator
                .run(core.config().polling.interval, shutdown)
                .await;
        }
    }

    Ok(())
}

fn service() -> Result<core_service::CoreService> {
    let config = ServiceConfig::from_env().context("Invalid configuration")?;
    let core = bootstrap_desktop(config).context("Failed to bootstrap service")?;
    let _event_log = core.spawn_event_log();
    Ok(core)
}

fn authorizer() -> Result<core_service::Authorizer> {
    let config = AuthorizationConfig::from_env().context("Invalid configuration")?;
    let event_bus = EventBus::default();
    let _event_log = spawn_event_log(&event_bus);
    bootstrap_desktop_authorizer(config, event_bus).context("Failed to bootstrap login")
}
