//! # Curtain Guard Binary
//!
//! Light-curtain safety supervisor: latches safety inputs, pauses robot
//! jobs while any input is latched and resumes them once cleared.
//!
//! # Usage
//!
//! ```bash
//! # Run with the simulation platform and default configuration
//! curtain_guard -s
//!
//! # Select a platform driver by name
//! curtain_guard --driver simulation
//!
//! # Service configuration and a custom store location
//! curtain_guard --config config/curtain.toml --store /var/lib/curtain/store.json
//!
//! # Serve JSON requests on stdin, one per line
//! curtain_guard -s --stdin-commands
//! ```

use clap::Parser;
use curtain_common::config::{ConfigError, ConfigLoader, GuardConfig};
use curtain_guard::command::handle_line;
use curtain_guard::{GuardCore, MonitorHandle, PlatformRegistry};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Curtain Guard - light-curtain safety interlock supervisor
#[derive(Parser, Debug)]
#[command(name = "curtain_guard")]
#[command(version)]
#[command(about = "Light-curtain safety interlock supervisor for robot actuators")]
#[command(long_about = None)]
struct Args {
    /// Path to the service configuration (TOML). Defaults apply if missing.
    #[arg(short, long, default_value = "config/curtain.toml")]
    config: PathBuf,

    /// Override the store path from the configuration
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Force the simulation platform (overrides --driver)
    #[arg(short = 's', long)]
    simulate: bool,

    /// Platform driver to load
    #[arg(short, long, default_value = "simulation")]
    driver: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Read newline-delimited JSON requests from stdin, reply on stdout
    #[arg(long)]
    stdin_commands: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Curtain guard failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (mut config, config_note) = match GuardConfig::load(&args.config) {
        Ok(config) => (config, None),
        Err(ConfigError::FileNotFound) => (
            GuardConfig::default(),
            Some(format!("No config at {:?}, using defaults", args.config)),
        ),
        Err(e) => {
            // Tracing is not up yet; report with the default level.
            setup_tracing(&args, &GuardConfig::default());
            return Err(e.into());
        }
    };
    setup_tracing(&args, &config);

    info!("Curtain Guard v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(note) = config_note {
        warn!("{note}");
    }

    if let Some(ref store) = args.store {
        info!("Store path overridden: {:?}", store);
        config.store.path = store.clone();
    }
    config.validate()?;

    let registry = PlatformRegistry::with_builtin();
    let driver = driver_name(&args);
    info!("Platform driver: {} (available: {:?})", driver, registry.list());
    let platform = registry.create(driver, &config.actuators.ids)?;

    let core = Arc::new(GuardCore::new(&config, platform)?);
    if let Err(e) = core.load_configuration() {
        error!("Failed to load stored configuration: {e}. Continuing with defaults.");
    }
    core.bootstrap_actuators();

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let monitor = core.start_monitor()?;

    if args.stdin_commands {
        serve_stdin(&core, &monitor)?;
        monitor.stop();
    } else {
        while core.is_running() && !monitor.is_finished() {
            thread::sleep(Duration::from_millis(100));
        }
    }

    let stats = monitor.join()?;
    info!(
        "Curtain Guard shutdown complete ({} cycles, max {}us, {} overruns)",
        stats.cycle_count, stats.max_cycle_time_us, stats.overruns
    );
    Ok(())
}

/// `-s` wins over `--driver`.
fn driver_name(args: &Args) -> &str {
    if args.simulate {
        info!("Simulation mode forced");
        "simulation"
    } else {
        &args.driver
    }
}

/// Serve requests from stdin until EOF or shutdown.
///
/// Lines are read on a detached thread so a shutdown signal is noticed
/// within one poll period even while stdin is idle.
fn serve_stdin(core: &GuardCore, monitor: &MonitorHandle) -> std::io::Result<()> {
    info!("Serving JSON requests on stdin");
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("curtain-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    let mut stdout = std::io::stdout().lock();
    serve_requests(core, &rx, &mut stdout, || !monitor.is_finished())
}

/// Answer request lines from `rx` until the sender closes, the running
/// flag drops or `alive` reports false.
fn serve_requests<W: Write>(
    core: &GuardCore,
    rx: &Receiver<std::io::Result<String>>,
    out: &mut W,
    alive: impl Fn() -> bool,
) -> std::io::Result<()> {
    while core.is_running() && alive() {
        let line = match rx.recv_timeout(core.poll_period()) {
            Ok(line) => line?,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Request input closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        writeln!(out, "{}", handle_line(core, &line))?;
        out.flush()?;
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and configuration.
fn setup_tracing(args: &Args, config: &GuardConfig) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.shared.log_level.as_directive()))
    };

    // Logs go to stderr; stdout carries command replies.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
