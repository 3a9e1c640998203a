use clap::{Parser, Subcommand};
use crossbeam::channel::RecvTimeoutError;
use futures::{executor::block_on, future::FutureExt, select};
use futures_timer::Delay;
use mindlink::config::Credentials;
use mindlink::data::{Category, Event, TransportEvent};
use mindlink::device::{HeadsetManager, IdentityRegistry};
use mindlink::gesture::{EngineConfig, SelectionEngine, SelectionOutcome};
use mindlink::rpc::StreamKind;
use mindlink_tools::{device_label, init_tracing, ServiceOpts, TickClock};
use serde_json::Value;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "mindlink-tool",
    version,
    about = "EEG headset monitoring and gesture selection tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List headsets known to the service
    Headsets {
        #[command(flatten)]
        service: ServiceOpts,

        /// Ask the service to rescan before listing
        #[arg(long)]
        refresh: bool,
    },

    /// Open sessions on headsets and print their decoded streams
    Monitor {
        #[command(flatten)]
        service: ServiceOpts,

        /// Headset ids (default: every discovered headset)
        headsets: Vec<String>,

        /// Streams to subscribe
        #[arg(
            short = 's',
            long = "streams",
            value_delimiter = ',',
            default_value = "com,mot,met,sys"
        )]
        streams: Vec<StreamKind>,

        /// Stop after this many seconds
        #[arg(short = 'd', long = "duration")]
        duration: Option<u64>,
    },

    /// Run hold-to-confirm and tilt navigation over live headsets
    Select {
        #[command(flatten)]
        service: ServiceOpts,

        /// Headset ids (default: every discovered headset)
        headsets: Vec<String>,

        /// Engine configuration (YAML)
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,

        /// Re-arm a device as soon as it locks a selection
        #[arg(long)]
        repeat: bool,
    },

    /// Issue a raw request and print the result
    Call {
        #[command(flatten)]
        service: ServiceOpts,

        /// Method name
        method: String,

        /// Parameters as a JSON object
        params: Option<String>,

        /// Give up waiting after this many seconds
        #[arg(short = 't', long = "timeout", default_value_t = 10)]
        timeout: u64,
    },
}

const TICK_INTERVAL: Duration = Duration::from_millis(50);

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

fn list_headsets(service: &ServiceOpts, refresh: bool) -> anyhow::Result<()> {
    // Listing needs no authorization.
    let manager = HeadsetManager::new(service.connect()?, Credentials::default());
    if refresh {
        block_on(manager.refresh())?;
        block_on(Delay::new(Duration::from_secs(2)));
    }
    let headsets = block_on(manager.query_headsets())?;
    if headsets.is_empty() {
        println!("no headsets found");
    }
    for headset in headsets {
        println!("{}", headset);
    }
    manager.close();
    Ok(())
}

/// Opens every requested headset, or every discovered one. Headsets that
/// fail to open are reported and skipped.
fn open_headsets(manager: &HeadsetManager, requested: Vec<String>) -> anyhow::Result<Vec<String>> {
    let ids = if requested.is_empty() {
        block_on(manager.query_headsets())?
            .into_iter()
            .map(|h| h.id)
            .collect()
    } else {
        requested
    };
    if ids.is_empty() {
        anyhow::bail!("no headsets to open");
    }
    let mut opened = Vec::new();
    for id in ids {
        match block_on(manager.open(&id)) {
            Ok(session) => {
                tracing::info!(device = %id, %session, "headset ready");
                opened.push(id);
            }
            Err(e) => eprintln!("{}: {}", id, e),
        }
    }
    if opened.is_empty() {
        anyhow::bail!("no headset could be opened");
    }
    Ok(opened)
}

fn monitor(
    service: &ServiceOpts,
    headsets: Vec<String>,
    streams: Vec<StreamKind>,
    duration: Option<u64>,
) -> anyhow::Result<()> {
    let manager = service.manager()?.with_streams(&streams);
    let events = manager.client().bus().subscribe_all();
    let opened = open_headsets(&manager, headsets)?;
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut ids = IdentityRegistry::default();
    for id in &opened {
        println!("{} streaming", device_label(&mut ids, id));
    }

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let event = match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if let Event::Transport(TransportEvent::Closed) = event {
            eprintln!("connection closed");
            return Ok(());
        }
        match event.device() {
            Some(device) => {
                let label = device_label(&mut ids, device);
                println!("{} {} {}", timestamp(), label, event);
            }
            None => println!("{} {}", timestamp(), event),
        }
    }

    for id in &opened {
        block_on(manager.disconnect_headset(id));
    }
    manager.close();
    Ok(())
}

fn select_loop(
    service: &ServiceOpts,
    headsets: Vec<String>,
    config: Option<PathBuf>,
    repeat: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    let mut engine = SelectionEngine::new(config);
    let manager = service
        .manager()?
        .with_streams(&[StreamKind::Command, StreamKind::Motion]);
    let events = manager.client().bus().subscribe(&[
        Category::Command,
        Category::Motion,
        Category::Session,
        Category::Transport,
    ]);
    open_headsets(&manager, headsets)?;
    let mut ids = IdentityRegistry::default();

    let mut ticks = TickClock::new(TICK_INTERVAL);
    loop {
        let mut outcomes: Vec<SelectionOutcome> = match events.recv_timeout(TICK_INTERVAL) {
            Ok(event) => {
                if let Event::Transport(TransportEvent::Closed) = event {
                    eprintln!("connection closed");
                    return Ok(());
                }
                match &event {
                    Event::Command(e) => ticks.observe(e.time, Instant::now()),
                    Event::Motion(e) => ticks.observe(e.time, Instant::now()),
                    _ => {}
                }
                engine.handle_event(&event).into_iter().collect()
            }
            Err(RecvTimeoutError::Timeout) => vec![],
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };
        if let Some(now) = ticks.due(Instant::now()) {
            outcomes.extend(engine.tick(now));
        }

        for outcome in outcomes {
            let label = device_label(&mut ids, outcome.device());
            match &outcome {
                SelectionOutcome::FocusMoved { from, to, .. } => {
                    println!("{} focus {} -> {}", label, from, to)
                }
                SelectionOutcome::HoldStarted { focus, .. } => {
                    println!("{} holding on {}", label, focus)
                }
                SelectionOutcome::HoldProgress { progress, .. } => {
                    println!("{} hold {:>3.0}%", label, progress * 100.0)
                }
                SelectionOutcome::HoldCancelled { .. } => println!("{} hold released", label),
                SelectionOutcome::Locked { device, selection } => {
                    println!("{} SELECTED {}", label, selection);
                    if repeat {
                        engine.reset(device);
                    }
                }
            }
        }
    }
}

fn call(service: &ServiceOpts, method: String, params: Option<String>, timeout: u64) -> anyhow::Result<()> {
    let params: Value = match params {
        Some(text) => serde_json::from_str(&text)?,
        None => Value::Null,
    };
    let client = service.connect()?;
    let pending = client.call(&method, params);
    let request = format!("{} (id {})", pending.method(), pending.id());
    let mut pending = pending.fuse();
    let mut delay = Delay::new(Duration::from_secs(timeout)).fuse();
    let result = block_on(async {
        select! {
            res = pending => Some(res),
            _ = delay => None,
        }
    });
    client.close();
    match result {
        Some(Ok(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => anyhow::bail!("no reply to {} within {}s", request, timeout),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Headsets { service, refresh } => {
            init_tracing(service.log_level.as_deref());
            list_headsets(&service, refresh)
        }
        Commands::Monitor {
            service,
            headsets,
            streams,
            duration,
        } => {
            init_tracing(service.log_level.as_deref());
            monitor(&service, headsets, streams, duration)
        }
        Commands::Select {
            service,
            headsets,
            config,
            repeat,
        } => {
            init_tracing(service.log_level.as_deref());
            select_loop(&service, headsets, config, repeat)
        }
        Commands::Call {
            service,
            method,
            params,
            timeout,
        } => {
            init_tracing(service.log_level.as_deref());
            call(&service, method, params, timeout)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FAILED: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
