use clap::Parser;
use crossterm::style::{Color, StyledContent, Stylize};
use mindlink::config::{ClientConfig, ConfigError, Credentials, DEFAULT_DEBIT};
use mindlink::device::{HeadsetManager, IdentityRegistry, SessionRegistry};
use mindlink::{Client, EventBus};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
pub struct ServiceOpts {
    /// Service address (e.g., wss://localhost:6868). Defaults to MINDLINK_URL
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Application client id. Defaults to MINDLINK_CLIENT_ID
    #[arg(long = "client-id")]
    pub client_id: Option<String>,

    /// Application client secret. Defaults to MINDLINK_CLIENT_SECRET
    #[arg(long = "client-secret")]
    pub client_secret: Option<String>,

    /// License key
    #[arg(long)]
    pub license: Option<String>,

    /// Sessions to debit from the license
    #[arg(long)]
    pub debit: Option<u32>,

    /// Log filter (e.g., debug, mindlink=trace). Overrides RUST_LOG
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl ServiceOpts {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        config
    }

    /// Credentials from the command line, falling back to the environment.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let mut creds = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Credentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
                license: None,
                debit: DEFAULT_DEBIT,
            },
            _ => {
                let mut creds = Credentials::from_env()?;
                if let Some(id) = &self.client_id {
                    creds.client_id = id.clone();
                }
                if let Some(secret) = &self.client_secret {
                    creds.client_secret = secret.clone();
                }
                creds
            }
        };
        if self.license.is_some() {
            creds.license = self.license.clone();
        }
        if let Some(debit) = self.debit {
            creds.debit = debit;
        }
        Ok(creds)
    }

    /// Opens the connection. Nothing is authorized yet.
    pub fn connect(&self) -> anyhow::Result<Client> {
        let config = self.client_config();
        let bus = EventBus::new(config.subscriber_queue_size);
        let client = Client::connect(&config, SessionRegistry::new(), bus)?;
        Ok(client)
    }

    /// Connects and authorizes the application.
    pub fn manager(&self) -> anyhow::Result<HeadsetManager> {
        let creds = self.credentials()?;
        let manager = HeadsetManager::new(self.connect()?, creds);
        futures::executor::block_on(manager.authorize())?;
        Ok(manager)
    }
}

pub fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The device id in its stable display color.
pub fn device_label(ids: &mut IdentityRegistry, device: &str) -> StyledContent<String> {
    let rgb = ids.color(device);
    device.to_string().with(Color::Rgb {
        r: rgb.0,
        g: rgb.1,
        b: rgb.2,
    })
}

/// Paces `SelectionEngine::tick` on wall time, independent of how often
/// events arrive. Service timestamps are extrapolated from the latest frame.
#[derive(Debug)]
pub struct TickClock {
    interval: Duration,
    anchor: Option<(f64, Instant)>,
    last_tick: Option<Instant>,
}

impl TickClock {
    pub fn new(interval: Duration) -> TickClock {
        TickClock {
            interval,
            anchor: None,
            last_tick: None,
        }
    }

    /// Records the service time of a frame received at `at`.
    pub fn observe(&mut self, time: f64, at: Instant) {
        self.anchor = Some((time, at));
        self.last_tick.get_or_insert(at);
    }

    /// The service time to tick at, once per interval.
    pub fn due(&mut self, now: Instant) -> Option<f64> {
        let (time, at) = self.anchor?;
        let last = self.last_tick.get_or_insert(at);
        if now.saturating_duration_since(*last) < self.interval {
            return None;
        }
        *last = now;
        Some(time + now.saturating_duration_since(at).as_secs_f64())
    }
}
