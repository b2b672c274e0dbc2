use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use parley_gateway::HubSettings;

/// Placeholder JWT secrets that only make sense on a developer machine.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub hub: HubSettings,
}

impl Config {
    /// Read `PARLEY_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = HubSettings::default();

        let heartbeat_secs = parse_or(&get, "PARLEY_HEARTBEAT_SECS", defaults.heartbeat_interval.as_secs())?;
        let typing_ms = parse_or(
            &get,
            "PARLEY_TYPING_TIMEOUT_MS",
            defaults.typing_timeout.as_millis() as u64,
        )?;
        anyhow::ensure!(heartbeat_secs > 0, "PARLEY_HEARTBEAT_SECS must be positive");
        anyhow::ensure!(typing_ms > 0, "PARLEY_TYPING_TIMEOUT_MS must be positive");
        let max_frame_bytes = parse_or(&get, "PARLEY_MAX_FRAME_BYTES", defaults.max_frame_bytes)?;
        anyhow::ensure!(max_frame_bytes > 0, "PARLEY_MAX_FRAME_BYTES must be positive");

        Ok(Self {
            host: get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PARLEY_PORT", 3000)?,
            db_path: get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()).into(),
            jwt_secret: get("PARLEY_JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".into()),
            hub: HubSettings {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                typing_timeout: Duration::from_millis(typing_ms),
                max_frame_bytes,
            },
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
