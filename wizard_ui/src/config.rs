use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (`WIZARD_ADDR`).
    pub addr: SocketAddr,
    /// Base URL of the generation service (`WIZARD_GENERATION_URL`).
    pub generation_url: String,
    /// API key sent with every generation call (`WIZARD_GENERATION_API_KEY`).
    pub generation_api_key: String,
    /// Base URL of the account service (`WIZARD_ACCOUNT_URL`).
    pub account_url: String,
    /// Bounded wait for the execution host's readiness handshake
    /// (`WIZARD_READY_TIMEOUT_MS`).
    pub ready_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let addr = match std::env::var("WIZARD_ADDR") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("invalid WIZARD_ADDR {raw:?}, falling back to default");
                default_addr()
            }),
            Err(_) => default_addr(),
        };

        let ready_timeout = std::env::var("WIZARD_READY_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(5));

        Self {
            addr,
            generation_url: env_or("WIZARD_GENERATION_URL", "http://localhost:7070"),
            generation_api_key: env_or("WIZARD_GENERATION_API_KEY", ""),
            account_url: env_or("WIZARD_ACCOUNT_URL", "http://localhost:5000/api"),
            ready_timeout,
        }
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
