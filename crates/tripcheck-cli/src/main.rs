mod report;
mod run;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tripcheck_core::AppConfig;
use tripcheck_engine::{ChromeLauncher, EngineSettings, SessionStore, Verifier};

use crate::session::SessionCommands;

#[derive(Debug, Parser)]
#[command(name = "tripcheck")]
#[command(about = "Verify that affiliate shopping-trip links land on their merchant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Verify every store in a CSV store list
    Run {
        /// Store list: `store_id,store_name,xfas_url,merchant_site_url,network_id`
        #[arg(long, short)]
        input: PathBuf,
        /// Stores verified concurrently (overrides `TRIPCHECK_BATCH_SIZE`)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Open a browser for login first when no session is saved
        #[arg(long)]
        login_if_missing: bool,
    },
    /// Verify a single store
    Check {
        #[arg(long)]
        store_id: String,
        #[arg(long)]
        store_name: String,
        /// Tracking link to test
        #[arg(long)]
        xfas_url: String,
        /// Site the tracking link should land on
        #[arg(long)]
        merchant_url: String,
        #[arg(long)]
        network_id: Option<String>,
    },
    /// Manage the saved login session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Summarize an existing results CSV
    Report {
        /// Path to a `results_*.csv` or `single_result_*.csv` file
        path: PathBuf,
    },
}

fn build_verifier(config: &AppConfig, batch_size: Option<usize>) -> Arc<Verifier> {
    let mut settings = EngineSettings::from_app_config(config);
    if let Some(size) = batch_size {
        settings.batch_size = size.max(1);
    }
    Arc::new(Verifier::new(
        Arc::new(ChromeLauncher::from_config(config)),
        SessionStore::new(&config.session_path),
        settings,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = tripcheck_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            input,
            batch_size,
            login_if_missing,
        }) => {
            let verifier = build_verifier(&config, batch_size);
            run::run_store_list(verifier, &input, login_if_missing).await?;
        }
        Some(Commands::Check {
            store_id,
            store_name,
            xfas_url,
            merchant_url,
            network_id,
        }) => {
            let store = run::store_from_args(store_id, store_name, xfas_url, merchant_url, network_id);
            run::run_single_check(&build_verifier(&config, None), &store).await?;
        }
        Some(Commands::Session { command }) => {
            session::run_session_command(&build_verifier(&config, None), command).await?;
        }
        Some(Commands::Report { path }) => report::run_report(&path)?,
        None => println!("tripcheck: no command given; see `tripcheck --help`"),
    }

    Ok(())
}

#[cfg(test)]
mod tests;
