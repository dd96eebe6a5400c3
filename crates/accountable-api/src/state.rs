use std::sync::Arc;

use accountable_db::Database;
use tracing::error;

use crate::config::Settings;
use crate::email::Mailer;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub settings: Settings,
    pub mailer: Mailer,
}

impl AppStateInner {
    pub fn new(db: Database, settings: Settings, mailer: Mailer) -> AppState {
        Arc::new(Self {
            db: Arc::new(db),
            settings,
            mailer,
        })
    }

    /// Run a blocking store call off the async runtime.
    pub async fn db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.into())
            })?
            .map_err(ApiError::Internal)
    }
}
