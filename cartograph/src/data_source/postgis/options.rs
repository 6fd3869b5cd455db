use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use super::SPATIAL_DB;
use crate::config::ConnectionConfig;
use crate::error::CartographError;

const DEFAULT_FETCH_SIZE: usize = 256;

/// Connection parameters of the `spatial-db` backend, read from a [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub(super) struct PgOptions {
    pub connect: PgConnectOptions,
    pub database: String,
    /// `None` waits as long as the server takes.
    pub connect_timeout: Option<Duration>,
    pub fetch_size: usize,
}

fn invalid(key: &str, value: &str) -> CartographError {
    CartographError::ConnectionFailed {
        backend: SPATIAL_DB.to_owned(),
        reason: format!("invalid value '{value}' for {key}"),
    }
}

fn parse<T: FromStr>(config: &ConnectionConfig, key: &str) -> Result<Option<T>, CartographError> {
    config
        .get(key)
        .map(|value| value.trim().parse::<T>().map_err(|_| invalid(key, value)))
        .transpose()
}

fn require<T: FromStr>(config: &ConnectionConfig, key: &str) -> Result<T, CartographError> {
    let value = config.require(SPATIAL_DB, &[key])?;
    value.trim().parse::<T>().map_err(|_| invalid(key, value))
}

impl PgOptions {
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, CartographError> {
        let host = config.require(SPATIAL_DB, &["PG_HOST", "PG_HOST_ADDR"])?;
        let port: u16 = require(config, "PG_PORT")?;
        let user = config.require(SPATIAL_DB, &["PG_USER"])?;
        let password = config.require(SPATIAL_DB, &["PG_PASSWORD"])?;
        let database = config.require(SPATIAL_DB, &["PG_DB_NAME"])?;
        let timeout_secs: u64 = require(config, "PG_CONNECT_TIMEOUT")?;

        let mut connect = PgConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .database(database)
            .application_name("cartograph");
        if !password.is_empty() {
            connect = connect.password(password);
        }
        if let Some(mode) = parse::<PgSslMode>(config, "PG_SSL_MODE")? {
            connect = connect.ssl_mode(mode);
        }

        let fetch_size = parse::<usize>(config, "PG_FETCH_SIZE")?.unwrap_or(DEFAULT_FETCH_SIZE);
        if fetch_size == 0 {
            return Err(invalid("PG_FETCH_SIZE", "0"));
        }

        Ok(Self {
            connect,
            database: database.to_owned(),
            connect_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            fetch_size,
        })
    }
}
