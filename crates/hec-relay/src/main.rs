mod buffers;
mod config;
mod daily_volume;
mod event_loop;
mod exporter;
mod input;
mod queue;
mod schedule;
mod stats;

#[cfg(test)]
mod testing;

use std::fs::{OpenOptions, Permissions};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::sync::Mutex;

use event_loop::EventLoop;
use exporter::HecExporter;
use input::{InputWaiter, TerminationSignals};
use queue::EventQueue;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Startup failure — log and exit.
fn fatal(msg: &str, error: &dyn std::fmt::Display) -> ! {
    error!(%error, "{msg}");
    std::process::exit(1);
}

/// JSON logs to stderr, or appended to `HEC_RELAY_LOG_FILE` when set.
fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("HEC_RELAY_LOG_LEVEL")
        .ok()
        .and_then(|val| {
            val.parse::<LevelFilter>().ok().or_else(|| {
                eprintln!("invalid HEC_RELAY_LOG_LEVEL: {val:?}, defaulting to INFO");
                None
            })
        })
        .unwrap_or(LevelFilter::INFO);

    let writer = match std::env::var("HEC_RELAY_LOG_FILE") {
        Ok(path) if !path.is_empty() => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .mode(0o640)
                .open(&path)
                .and_then(|f| {
                    f.set_permissions(Permissions::from_mode(0o640))?;
                    Ok(f)
                });
            match file {
                Ok(f) => BoxMakeWriter::new(Mutex::new(f)),
                Err(e) => {
                    eprintln!("cannot open HEC_RELAY_LOG_FILE {path:?}: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(writer).with_target(true))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_logging();

    let config = config::Config::from_env().unwrap_or_else(|e| fatal("config error", &e));
    info!(
        url = %config.url,
        batch_size = config.batch_size,
        batch_wait_ms = config.batch_wait.as_millis() as u64,
        stat_period_secs = config.stat_period.as_secs(),
        daily_cap = config.daily_cap,
        state_file = ?config.state_file,
        "starting"
    );

    let exporter =
        HecExporter::new(&config).unwrap_or_else(|e| fatal("failed to build HTTP client", &e));
    let queue = EventQueue::new(exporter, &config)
        .unwrap_or_else(|e| fatal("failed to restore daily volume", &e));
    let signals = TerminationSignals::install()
        .unwrap_or_else(|e| fatal("failed to install signal handlers", &e));
    let input = InputWaiter::new(BufReader::new(tokio::io::stdin()), Some(signals));

    let mut event_loop = EventLoop::new(queue, input);
    let code = match event_loop.run().await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "fatal error, exiting");
            2
        }
    };
    // The stdin reader may still be parked on a blocking read after a signal;
    // exit instead of waiting for the runtime to wind it down.
    std::process::exit(code);
}
