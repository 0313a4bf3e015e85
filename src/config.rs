//! Environment-driven service configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub public_base_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub nats_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .context("PORT must be a number")?;
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));
        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "uploads".to_string())
            .into();
        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
            .parse()
            .context("MAX_UPLOAD_BYTES must be a number")?;

        // Side channels are optional: the service runs without a broker or relay.
        let nats_url = std::env::var("NATS_URL").ok();
        let smtp = match std::env::var("SMTP_RELAY") {
            Ok(relay) => Some(SmtpConfig {
                relay,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM").context("SMTP_FROM is required when SMTP_RELAY is set")?,
            }),
            Err(_) => None,
        };

        Ok(Self { database_url, port, public_base_url, upload_dir, max_upload_bytes, nats_url, smtp })
    }
}
