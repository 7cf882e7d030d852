//! Saved login session commands.

use clap::Subcommand;
use tripcheck_engine::Verifier;

/// Sub-commands available under `session`.
#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// Show whether a session is saved
    Status,
    /// Open a visible browser, wait for a manual login, and save the session
    Login,
    /// Delete the saved session
    Logout,
}

pub(crate) async fn run_session_command(
    verifier: &Verifier,
    command: SessionCommands,
) -> anyhow::Result<()> {
    let path = verifier.sessions().path().display().to_string();
    match command {
        SessionCommands::Status => {
            if verifier.session_status().await {
                println!("Session saved at {path}");
            } else {
                println!("No session saved (expected at {path})");
            }
        }
        SessionCommands::Login => {
            println!(
                "Opening {} for {}s; log in in the browser window...",
                verifier.settings().login_url,
                verifier.settings().login_wait.as_secs()
            );
            verifier.capture_session().await?;
            println!("Session saved to {path}");
        }
        SessionCommands::Logout => {
            if verifier.delete_session().await? {
                println!("Session deleted");
            } else {
                println!("No session to delete");
            }
        }
    }
    Ok(())
}
