//! CLI for InfoCenter
//!
//! Loads configuration, applies command-line overrides and runs the HTTP
//! server until Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use infocenter::Broker;
use infocenter::config::{Settings, load_config};
use infocenter::transport::serve;
use infocenter::utils::error::ServerError;
use infocenter::utils::{logging, trace};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "infocenter", about = "Topic based pub/sub over Server-Sent Events")]
struct Args {
    /// Enable lifecycle hints (debug logging)
    #[arg(long)]
    debug: bool,

    /// Address to listen on, e.g. localhost:8080
    #[arg(long)]
    url: Option<String>,

    /// Seconds before a subscription is closed
    #[arg(long)]
    idle_timeout: Option<u64>,
}

impl Args {
    fn apply(&self, mut settings: Settings) -> Settings {
        if self.debug {
            settings.broker.debug = true;
        }
        if let Some(secs) = self.idle_timeout {
            settings.broker.idle_timeout_secs = secs;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // no-op when run() already set logging up
            logging::init("info");
            error!("InfoCenter failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let settings = args.apply(load_config()?);

    logging::init(if settings.broker.debug { "debug" } else { "info" });

    let addr = args.url.clone().unwrap_or_else(|| settings.server.addr());
    let broker = Arc::new(Broker::from_settings(
        &settings.broker,
        trace::from_debug_flag(settings.broker.debug),
    ));
    info!(
        "subscriptions close after {}s",
        broker.idle_timeout().as_secs()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received. Exiting gracefully.");
                    shutdown.cancel();
                }
                Err(e) => warn!("cannot listen for Ctrl-C: {e}"),
            }
        }
    });

    serve(&addr, broker, shutdown).await
}
