use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use linkvault_api::VaultConfig;

/// Process-level settings read from the environment at startup.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub vault: VaultConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = VaultConfig::default();

        let max_file_mb: u64 = parse_var("LINKVAULT_MAX_FILE_MB", 10)?;
        let session_ttl_hours: u64 = parse_var("LINKVAULT_SESSION_TTL_HOURS", 168)?; // 7 days
        let sweep_secs: u64 = parse_var("LINKVAULT_SWEEP_INTERVAL_SECS", 300)?;

        Ok(Self {
            host: std::env::var("LINKVAULT_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("LINKVAULT_PORT", 4000)?,
            db_path: std::env::var("LINKVAULT_DB_PATH")
                .unwrap_or_else(|_| "linkvault.db".into())
                .into(),
            upload_dir: std::env::var("LINKVAULT_UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".into())
                .into(),
            vault: VaultConfig {
                public_url: std::env::var("LINKVAULT_PUBLIC_URL")
                    .unwrap_or_else(|_| defaults.public_url.clone()),
                max_file_bytes: max_file_mb * 1024 * 1024,
                default_expiry_minutes: parse_var("LINKVAULT_DEFAULT_EXPIRY_MINUTES", 10)?,
                max_expiry_minutes: parse_var(
                    "LINKVAULT_MAX_EXPIRY_MINUTES",
                    defaults.max_expiry_minutes,
                )?,
                session_ttl: Duration::from_secs(session_ttl_hours * 60 * 60),
                sweep_interval: Duration::from_secs(sweep_secs.max(1)),
                ..defaults
            },
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
