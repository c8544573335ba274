use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::Error;

pub const HTTP_ADDR_VAR: &str = "FORM_RELAY_HTTP_ADDR";
pub const RELAY_ADDR_VAR: &str = "FORM_RELAY_RELAY_ADDR";
pub const DATABASE_URL_VAR: &str = "FORM_RELAY_DATABASE_URL";
pub const STATIC_DIR_VAR: &str = "FORM_RELAY_STATIC_DIR";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub relay_addr: SocketAddr,
    pub database_url: String,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source, falling back to
    /// defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            http_addr: try_load(&lookup, HTTP_ADDR_VAR, "0.0.0.0:3000")?,
            relay_addr: try_load(&lookup, RELAY_ADDR_VAR, "127.0.0.1:5000")?,
            database_url: try_load(&lookup, DATABASE_URL_VAR, "sqlite://messages.db")?,
            static_dir: try_load(&lookup, STATIC_DIR_VAR, "static")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            Error::Config(format!("{key}: {e}"))
        })
}
