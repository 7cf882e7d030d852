mod api;
mod gate;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tripcheck_engine::{ChromeLauncher, EngineSettings, SessionStore, Verifier};

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = tripcheck_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // ServeDir needs the directories to exist before the first request.
    tokio::fs::create_dir_all(&config.screenshot_dir).await?;
    tokio::fs::create_dir_all(&config.results_dir).await?;

    let verifier = Arc::new(Verifier::new(
        Arc::new(ChromeLauncher::from_config(&config)),
        SessionStore::new(&config.session_path),
        EngineSettings::from_app_config(&config),
    ));

    let auth = AuthState::from_config(&config)?;
    let app = build_app(AppState::new(verifier), auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        env = %config.env,
        session = %config.session_path.display(),
        "tripcheck server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
