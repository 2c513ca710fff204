//! jobmesh - in-process job queue runner
//!
//! Loads a settings file, starts the queue with logging consumers and
//! recurring schedules, and drains it on Ctrl-C.

mod cli;
mod runner;
mod settings;

use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jobmesh_queue::StandardCron;

use crate::cli::{Cli, Commands};
use crate::settings::Settings;

/// Initialize console tracing. `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            info!("Starting jobmesh v{}", env!("CARGO_PKG_VERSION"));
            info!("Settings file: {}", cli.config.display());
            let settings = load_settings(&cli.config)?;
            runner::run(settings).await
        }
        Some(Commands::Validate) => {
            let settings = load_settings(&cli.config)?;
            settings.validate()?;
            println!(
                "{}: ok ({} groups, {} recurring jobs, {} startup jobs)",
                cli.config.display(),
                settings.groups.len(),
                settings.recurring.len(),
                settings.jobs.len()
            );
            Ok(())
        }
        Some(Commands::CronNext { expression, count }) => {
            let schedule = StandardCron::parse(&expression)?;
            for fire in schedule.after(&Utc::now()).take(count) {
                println!("{}", fire.to_rfc3339());
            }
            Ok(())
        }
    }
}

/// Load settings, falling back to defaults when the file does not exist.
fn load_settings(path: &std::path::Path) -> Result<Settings, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(Settings::load(path)?)
    } else {
        info!("{} not found, using default settings", path.display());
        Ok(Settings::default())
    }
}
