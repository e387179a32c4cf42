//! Server configuration.
//!
//! Everything is read from `HAUL_*` environment variables (a `.env` file is loaded first by the binary). Malformed
//! values are logged and replaced with the defaults below, so the server always starts with a usable configuration.
use std::env;

use chrono::Duration;
use haul_common::{parse_boolean_flag, Secret};
use haul_engine::DEFAULT_RESPONSE_WINDOW_HOURS;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_HAUL_HOST: &str = "127.0.0.1";
const DEFAULT_HAUL_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/haul_store.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_HIDE_SETTLED_AFTER_HOURS: i64 = 720;
const DEFAULT_WORKER_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header is used for the client address in the access log, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// How long the accused helper has to respond to an incident that requires a response.
    pub helper_response_window: Duration,
    /// How long after settlement an order stays visible in listings.
    pub hide_settled_after: Duration,
    /// Time between housekeeping runs.
    pub worker_interval: std::time::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HAUL_HOST.to_string(),
            port: DEFAULT_HAUL_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            helper_response_window: Duration::hours(DEFAULT_RESPONSE_WINDOW_HOURS),
            hide_settled_after: Duration::hours(DEFAULT_HIDE_SETTLED_AFTER_HOURS),
            worker_interval: std::time::Duration::from_secs(DEFAULT_WORKER_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("HAUL_HOST").ok().unwrap_or_else(|| DEFAULT_HAUL_HOST.into());
        let port = parse_env("HAUL_PORT", DEFAULT_HAUL_PORT);
        let database_url = env::var("HAUL_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ HAUL_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_env("HAUL_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration. {e}. Reverting to the default configuration.");
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("HAUL_USE_X_FORWARDED_FOR").ok(), false);
        let helper_response_window =
            Duration::hours(parse_env("HAUL_HELPER_RESPONSE_WINDOW", DEFAULT_RESPONSE_WINDOW_HOURS));
        let hide_settled_after = Duration::hours(parse_env("HAUL_HIDE_SETTLED_AFTER", DEFAULT_HIDE_SETTLED_AFTER_HOURS));
        let worker_interval =
            std::time::Duration::from_secs(parse_env("HAUL_WORKER_INTERVAL", DEFAULT_WORKER_INTERVAL_SECS).max(1));
        Self {
            host,
            port,
            database_url,
            max_connections,
            auth,
            use_x_forwarded_for,
            helper_response_window,
            hide_settled_after,
            worker_interval,
        }
    }
}

/// Reads `name` from the environment, falling back to `default` (with a log line) if it is missing or malformed.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret that access tokens are signed with.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate in \
             production like this, since every token becomes invalid when the server restarts. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("HAUL_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [HAUL_JWT_SECRET]")))?;
        if secret.len() < 16 {
            return Err(ServerError::ConfigurationError(
                "HAUL_JWT_SECRET must be at least 16 characters long".to_string(),
            ));
        }
        Ok(Self::new(secret))
    }
}
