//! Client configuration
//!
//! Defaults suit a service running on the local machine. Every setting can
//! be overridden through `MINDLINK_*` environment variables; queue sizes
//! below the built-in minimum are raised to it.

use crate::data::DEFAULT_SUBSCRIBER_QUEUE;
use crate::rpc::port::DEFAULT_POLL_INTERVAL;
use std::env;
use std::time::Duration;

pub const DEFAULT_SERVICE_URL: &str = "wss://localhost:6868";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0}: set it on the command line or in the environment")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Upper bound on how long the core thread waits on the socket before
    /// servicing queued requests.
    pub poll_interval: Duration,
    /// Queue length of every event bus subscriber.
    pub subscriber_queue_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: DEFAULT_SERVICE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            subscriber_queue_size: DEFAULT_SUBSCRIBER_QUEUE,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `MINDLINK_URL`, `MINDLINK_POLL_MS` and
    /// `MINDLINK_SUBSCRIBER_BUFSIZE`.
    pub fn from_env() -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Ok(url) = env::var("MINDLINK_URL") {
            config.url = url;
        }
        if let Ok(ms) = env::var("MINDLINK_POLL_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                config.poll_interval = Duration::from_millis(ms.clamp(1, 100));
            }
        }
        config.subscriber_queue_size = Self::get_subscriber_queue_size();
        config
    }

    pub fn get_subscriber_queue_size() -> usize {
        let min_size = DEFAULT_SUBSCRIBER_QUEUE;
        if let Ok(req) = env::var("MINDLINK_SUBSCRIBER_BUFSIZE") {
            std::cmp::max(req.parse().unwrap_or(0), min_size)
        } else {
            min_size
        }
    }
}

pub const DEFAULT_DEBIT: u32 = 10;

/// Application credentials for the device-control service.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub license: Option<String>,
    /// Number of sessions to debit from the license on authorization.
    pub debit: u32,
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials {
            client_id: String::new(),
            client_secret: String::new(),
            license: None,
            debit: DEFAULT_DEBIT,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("license", &self.license.as_ref().map(|_| "<redacted>"))
            .field("debit", &self.debit)
            .finish()
    }
}

impl Credentials {
    /// Reads `MINDLINK_CLIENT_ID`, `MINDLINK_CLIENT_SECRET`, and optionally
    /// `MINDLINK_LICENSE` and `MINDLINK_DEBIT`.
    pub fn from_env() -> Result<Credentials, ConfigError> {
        let client_id =
            env::var("MINDLINK_CLIENT_ID").map_err(|_| ConfigError::Missing("MINDLINK_CLIENT_ID"))?;
        let client_secret = env::var("MINDLINK_CLIENT_SECRET")
            .map_err(|_| ConfigError::Missing("MINDLINK_CLIENT_SECRET"))?;
        let debit = match env::var("MINDLINK_DEBIT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "MINDLINK_DEBIT",
                value: v,
            })?,
            Err(_) => DEFAULT_DEBIT,
        };
        Ok(Credentials {
            client_id,
            client_secret,
            license: env::var("MINDLINK_LICENSE").ok(),
            debit,
        })
    }
}
