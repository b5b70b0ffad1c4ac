use std::io;
use std::ops::ControlFlow;

use thiserror::Error;
use tokio::io::AsyncBufRead;
use tracing::{debug, error, info};

use crate::exporter::{ExportError, Exporter};
use crate::input::{Input, InputWaiter};
use crate::queue::EventQueue;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("delivery failed: {0}")]
    Delivery(#[from] ExportError),

    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),
}

/// Alternates between waiting for input and feeding the queue.
///
/// Every exit path ends with the queue's final report: the shutdown sequence
/// on end of input or a signal, or a report ahead of the error on a fatal
/// delivery failure.
pub struct EventLoop<R, E: Exporter> {
    queue: EventQueue<E>,
    input: InputWaiter<R>,
}

impl<R: AsyncBufRead + Unpin, E: Exporter> EventLoop<R, E> {
    pub fn new(queue: EventQueue<E>, input: InputWaiter<R>) -> Self {
        Self { queue, input }
    }

    /// Run until end of input, a termination signal, or a fatal error.
    pub async fn run(&mut self) -> Result<(), RelayError> {
        loop {
            match self.tick().await {
                ControlFlow::Break(result) => return result,
                ControlFlow::Continue(()) => {}
            }
        }
    }

    async fn tick(&mut self) -> ControlFlow<Result<(), RelayError>> {
        let timeout = match self.queue.next_wake_delay().await {
            Ok(timeout) => timeout,
            Err(e) => return ControlFlow::Break(Err(self.abort(e.into()))),
        };

        match self.input.wait(timeout).await {
            Ok(Input::Line(event)) => {
                if let Err(e) = self.queue.add(&event).await {
                    return ControlFlow::Break(Err(self.abort(e.into())));
                }
            }
            Ok(Input::Blank) => debug!("skipping blank line"),
            Ok(Input::Timeout) => {}
            Ok(Input::EndOfInput) => {
                info!("end of input, shutting down");
                return ControlFlow::Break(self.shutdown().await);
            }
            Ok(Input::Signal(name)) => {
                info!(signal = name, "received signal, shutting down");
                return ControlFlow::Break(self.shutdown().await);
            }
            Err(e) => {
                error!(error = %e, "failed to read input, shutting down");
                if let Err(flush_err) = self.shutdown().await {
                    error!(error = %flush_err, "final flush failed");
                }
                return ControlFlow::Break(Err(e.into()));
            }
        }
        ControlFlow::Continue(())
    }

    async fn shutdown(&mut self) -> Result<(), RelayError> {
        self.queue.shutdown().await.map_err(RelayError::from)
    }

    /// The queue is not touched again after a fatal error; persist the daily
    /// total and hand the error back.
    fn abort(&mut self, e: RelayError) -> RelayError {
        self.queue.report();
        e
    }
}
