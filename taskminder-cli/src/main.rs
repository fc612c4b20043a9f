use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use taskminder_core::{ChannelNotifier, Engine, TaskStore};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod shell;
mod state;
mod time;

use shell::{Shell, ShellSettings};

#[derive(Parser, Debug)]
#[command(
    name = "taskminder",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TASKMINDER_BUILD_SHA"), ")"),
    about = "Personal task reminder manager"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the reminder engine and an interactive task shell
    Run {
        /// Seconds between reminder scans (minimum 5; default from config)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Seconds before the first scan (default from config)
        #[arg(long)]
        initial_delay_secs: Option<u64>,

        /// IANA timezone for entering and showing due times (default from config)
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Manage ~/.taskminder/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,

    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr and stay quiet by default so they don't interleave with the prompt.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            interval_secs,
            initial_delay_secs,
            timezone,
        } => {
            let mut cfg = config::load_config()?;
            if let Some(s) = interval_secs {
                cfg.engine.interval_secs = s;
            }
            if let Some(s) = initial_delay_secs {
                cfg.engine.initial_delay_secs = s;
            }
            if let Some(tz) = timezone {
                cfg.display.timezone = tz;
            }
            run(cfg).await?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

async fn run(cfg: config::Config) -> Result<()> {
    let tz = time::parse_timezone(&cfg.display.timezone)
        .context("check [display].timezone or --timezone")?;

    let store = Arc::new(TaskStore::new());
    let (notifier, notes) = ChannelNotifier::channel(Arc::clone(store.clock()));
    let engine = Engine::new(store, Arc::new(notifier), cfg.engine.to_engine_config());

    let shell = Shell::new(
        engine,
        ShellSettings {
            tz,
            default_lead_minutes: cfg.display.default_lead_minutes,
            upcoming_window_minutes: cfg.display.upcoming_window_minutes,
        },
    );

    tracing::info!(timezone = %tz, "taskminder starting");
    shell::run(shell, notes).await
}
