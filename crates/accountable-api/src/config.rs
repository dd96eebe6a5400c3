use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Outbound mail relay. Absent when `SMTP_SERVER` is unset.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub smtp: Option<SmtpSettings>,
    pub app_name: String,
    pub frontend_url: String,
    pub backend_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("accountable.db"),
            host: "0.0.0.0".into(),
            port: 8000,
            jwt_secret: DEFAULT_JWT_SECRET.into(),
            token_ttl_minutes: 30,
            smtp: None,
            app_name: "AccounTable".into(),
            frontend_url: "http://localhost:3000".into(),
            backend_url: "http://localhost:8000".into(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Self::default();

        if let Some(path) = lookup("ACCOUNTABLE_DB_PATH") {
            s.db_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("ACCOUNTABLE_HOST") {
            s.host = host;
        }
        if let Some(port) = lookup("ACCOUNTABLE_PORT") {
            s.port = port.parse().context("ACCOUNTABLE_PORT must be a port number")?;
        }
        match lookup("ACCOUNTABLE_JWT_SECRET") {
            Some(secret) if !secret.is_empty() => s.jwt_secret = secret,
            _ => warn!("ACCOUNTABLE_JWT_SECRET not set, using the development secret"),
        }
        if let Some(ttl) = lookup("ACCOUNTABLE_TOKEN_TTL_MINUTES") {
            s.token_ttl_minutes = ttl
                .parse()
                .context("ACCOUNTABLE_TOKEN_TTL_MINUTES must be a whole number of minutes")?;
        }
        if let Some(name) = lookup("APP_NAME") {
            s.app_name = name;
        }
        if let Some(url) = lookup("FRONTEND_URL") {
            s.frontend_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("BACKEND_URL") {
            s.backend_url = url.trim_end_matches('/').to_string();
        }

        if let Some(server) = lookup("SMTP_SERVER").filter(|v| !v.is_empty()) {
            let port = match lookup("SMTP_PORT") {
                Some(p) => p.parse().context("SMTP_PORT must be a port number")?,
                None => 587,
            };
            s.smtp = Some(SmtpSettings {
                server,
                port,
                username: lookup("SMTP_USERNAME").unwrap_or_default(),
                password: lookup("SMTP_PASSWORD").unwrap_or_default(),
            });
        }

        Ok(s)
    }
}
