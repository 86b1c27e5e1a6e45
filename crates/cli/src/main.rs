mod app;
mod config_commands;
mod console;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::{error, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{
    app::App,
    console::{StdoutOutbound, run_console},
};

#[derive(Parser)]
#[command(name = "motifini", about = "Motifini: camera motion notifications over chat")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (overrides discovery of ./motifini.toml and friends).
    #[arg(long, global = true, env = "MOTIFINI_CONFIG")]
    config: Option<PathBuf>,

    /// Subscriber state file (overrides config value).
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read chat commands from stdin (default when no subcommand is provided).
    Run,
    /// Print the subscriber state as JSON.
    State,
    /// Notify everyone subscribed to an event, printing instead of sending.
    Notify {
        event: String,
        /// Message text. Defaults to the event name.
        message: Vec<String>,
    },
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics and the effective settings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for replies and state dumps.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "motifini starting");

    let mut config = motifini_config::load(cli.config.as_deref())?;
    if let Some(path) = cli.state_file.clone() {
        config.state_file = path;
    }

    match cli.command {
        Some(Commands::Check { verbose }) => config_commands::check(config, verbose),
        None | Some(Commands::Run) => {
            let app = App::open(config)?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let result = run_console(&app, stdin, tokio::io::stdout(), shutdown_signal()).await;
            app.save().await;
            result
        },
        Some(Commands::State) => {
            let app = App::open(config)?;
            let doc: serde_json::Value = serde_json::from_str(&app.store.to_json()?)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        },
        Some(Commands::Notify { event, message }) => {
            let app = App::open(config)?;
            let text = if message.is_empty() {
                event.clone()
            } else {
                message.join(" ")
            };
            let notifier = app.notifier(Arc::new(StdoutOutbound));
            let sent = notifier.notify(&event, &text).await;
            println!("{sent} subscriber(s) notified");
            app.store
                .save()
                .context("failed to save state after notifying")?;
            Ok(())
        },
    }
}
