//! Runtime configuration
//!
//! Read from the process environment after `dotenvy` has loaded any `.env`
//! file. Every setting has a default except the database URL, whose absence
//! selects the in-memory stores.

use chrono::Duration;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SESSION_TTL_SECS: i64 = 1800;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Portal settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub session_ttl: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            database_url: None,
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => parse("PORT", &raw)?,
            None => defaults.port,
        };
        let session_ttl = match non_empty("KYC_SESSION_TTL_SECS") {
            Some(raw) => {
                let secs: i64 = parse("KYC_SESSION_TTL_SECS", &raw)?;
                if secs <= 0 {
                    return Err(ConfigError::Invalid {
                        name: "KYC_SESSION_TTL_SECS",
                        value: raw,
                    });
                }
                Duration::seconds(secs)
            }
            None => defaults.session_ttl,
        };

        Ok(Self {
            bind_addr: non_empty("KYC_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            database_url: non_empty("DATABASE_URL"),
            session_ttl,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.bind_addr, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: "KYC_BIND_ADDR",
            value: raw,
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

/// Mask the password in a database URL for logging
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let mut masked = parsed.clone();
            if parsed.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        }
        Err(_) if url.len() > 20 => {
            let head: String = url.chars().take(10).collect();
            let tail: String = url.chars().rev().take(10).collect::<Vec<_>>().into_iter().rev().collect();
            format!("{}***{}", head, tail)
        }
        Err(_) => "***".to_string(),
    }
}
