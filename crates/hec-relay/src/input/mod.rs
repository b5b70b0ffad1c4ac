use std::borrow::Cow;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::warn;

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    /// One event line, trailing whitespace removed.
    Line(String),
    /// A line with nothing on it; not an event.
    Blank,
    Timeout,
    EndOfInput,
    Signal(&'static str),
}

/// SIGHUP, SIGINT and SIGTERM all request a graceful shutdown.
pub struct TerminationSignals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
}

impl TerminationSignals {
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

/// Waits for the next input line, a deadline, or a termination signal,
/// whichever comes first.
pub struct InputWaiter<R> {
    reader: R,
    line: Vec<u8>,
    signals: Option<TerminationSignals>,
}

impl<R: AsyncBufRead + Unpin> InputWaiter<R> {
    pub fn new(reader: R, signals: Option<TerminationSignals>) -> Self {
        Self {
            reader,
            line: Vec::new(),
            signals,
        }
    }

    /// Bytes of a partially read line stay in `line` when a timeout or signal
    /// wins the race, and are completed by the next call.
    pub async fn wait(&mut self, timeout: Duration) -> io::Result<Input> {
        let Self {
            reader,
            line,
            signals,
        } = self;
        tokio::select! {
            biased;

            read = reader.read_until(b'\n', line) => {
                if read? == 0 && line.is_empty() {
                    return Ok(Input::EndOfInput);
                }
                let input = decode_line(line);
                line.clear();
                Ok(input)
            }
            name = next_signal(signals) => Ok(Input::Signal(name)),
            _ = tokio::time::sleep(timeout) => Ok(Input::Timeout),
        }
    }
}

/// Invalid UTF-8 is replaced rather than ending the stream.
fn decode_line(raw: &[u8]) -> Input {
    let text = String::from_utf8_lossy(raw);
    let event = text.trim_end();
    if event.is_empty() {
        return Input::Blank;
    }
    if matches!(text, Cow::Owned(_)) {
        warn!(bytes = raw.len(), "input line is not valid UTF-8, replacing invalid bytes");
    }
    Input::Line(event.to_owned())
}

/// Pends forever when signals are not being watched.
async fn next_signal(signals: &mut Option<TerminationSignals>) -> &'static str {
    match signals {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}
