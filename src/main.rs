use ble_watcher::registry::parse_duration;
use ble_watcher::source::bluer::{BluerResolver, BluerSource};
use ble_watcher::watcher::{AdvertisementWatcher, BuildError, WatcherError, WatcherEvent};
use ble_watcher::SourceError;
use clap::Parser;
use std::panic::{self, PanicHookInfo};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, about, version)]
struct Options {
    /// Remove devices that are not re-advertised within this window.
    /// Accepts duration with suffix: 30s, 2m, 500ms, 1h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, default_value = "30", value_parser = parse_duration)]
    heartbeat_timeout: Duration,

    /// Print the full device table at this interval (e.g. 10s).
    /// Off when not given; notifications are printed either way.
    #[arg(long, value_parser = parse_duration)]
    list_interval: Option<Duration>,

    /// Record broadcast data only, skipping the per-device metadata lookup
    #[arg(long)]
    broadcast_only: bool,

    /// Verbose output, log per-event diagnostics
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Errors surfaced by the run loop.
#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Watcher(#[from] WatcherError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

fn print_event(event: &WatcherEvent) {
    match event {
        WatcherEvent::Started => println!("Started listening"),
        WatcherEvent::Stopped => println!("Stopped listening"),
        WatcherEvent::NewDevice(device) => println!("New device: {device}"),
        WatcherEvent::NameChanged(device) => println!("Name changed: {device}"),
        WatcherEvent::TimedOut(device) => println!("Timed out: {device}"),
        // Every advertisement repeats this one; too noisy for the console.
        WatcherEvent::Discovered(_) => {}
    }
}

fn print_devices(watcher: &AdvertisementWatcher) {
    let devices = watcher.devices();
    println!("{} device(s)", devices.len());
    for device in &devices {
        println!("  {device}");
    }
}

async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Main application entry point that wires the BlueZ backend into a watcher.
///
/// This function:
/// 1. Builds a watcher over the BlueZ advertisement monitor
/// 2. Optionally attaches the BlueZ device-metadata resolver
/// 3. Prints classified notifications until interrupted
/// 4. Optionally prints the swept device table at a fixed interval
async fn run(options: Options) -> Result<(), RunError> {
    let mut builder = AdvertisementWatcher::builder()
        .source(BluerSource)
        .heartbeat_timeout(options.heartbeat_timeout);
    if !options.broadcast_only {
        builder = builder.resolver(BluerResolver::new().await?);
    }
    let watcher = builder.build()?;

    watcher.subscribe(print_event);
    watcher.start().await?;

    let mut ticker = options.list_interval.map(|period| {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = next_tick(&mut ticker) => print_devices(&watcher),
        }
    }

    watcher.stop().await;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();

    let default_level = if options.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(options).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
