use std::net::SocketAddr;

use tracing::{info, warn};

use accountable_api::config::Settings;
use accountable_api::email::Mailer;
use accountable_api::routes;
use accountable_api::state::AppStateInner;
use accountable_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accountable_server=debug,accountable_api=debug,accountable_db=debug,tower_http=debug".into()),
        )
        .init();

    let settings = Settings::from_env()?;

    let db = Database::open(&settings.db_path)?;

    // Residue of registrations that died between identity and profile insert.
    match db.purge_orphaned_identities() {
        Ok(0) => {}
        Ok(n) => info!("Removed {} orphaned identity accounts", n),
        Err(e) => warn!("Orphaned identity sweep failed: {:?}", e),
    }

    let mailer = Mailer::from_settings(&settings)?;
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!(
        "{} API listening on {} (public URL {}, frontend {}, email {})",
        settings.app_name,
        addr,
        settings.backend_url,
        settings.frontend_url,
        if mailer.is_enabled() { "on" } else { "off" }
    );

    let app = routes::router(AppStateInner::new(db, settings, mailer));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM ({}), waiting for Ctrl+C", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
