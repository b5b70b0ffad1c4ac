#![allow(clippy::question_mark)] // nanoserde DeJson derive

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nanoserde::{DeJson, SerJson};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write state file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("state file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        source: nanoserde::DeJsonErr,
    },
}

#[derive(DeJson, SerJson)]
struct DailyState {
    total_volume: u64,
}

/// Bytes successfully delivered since local midnight, gated by an optional cap.
#[derive(Debug)]
pub struct DailyVolume {
    total: u64,
    cap: Option<u64>,
    exceeded: bool,
}

impl DailyVolume {
    pub fn new(total: u64, cap: Option<u64>) -> Self {
        Self {
            total,
            cap,
            exceeded: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    #[cfg(test)]
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    /// Whether a batch of `batch_bytes` may be delivered.
    ///
    /// The batch that would reach the cap is itself refused, and so is every
    /// batch after it until [`DailyVolume::reset`].
    pub fn admit(&mut self, batch_bytes: u64) -> bool {
        if self.exceeded {
            return false;
        }
        match self.cap {
            Some(cap) if self.total.saturating_add(batch_bytes) >= cap => {
                self.exceeded = true;
                warn!(
                    cap,
                    total = self.total,
                    batch_bytes,
                    "daily volume cap reached, dropping batches until midnight"
                );
                false
            }
            _ => true,
        }
    }

    pub fn record(&mut self, bytes: u64) {
        self.total = self.total.saturating_add(bytes);
    }

    /// Midnight rollover: zero the total and reopen the gate.
    pub fn reset(&mut self) {
        self.total = 0;
        self.exceeded = false;
    }
}

/// On-disk copy of the daily total, `{"total_volume":N}`.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as zero.
    pub fn load(&self) -> Result<u64, StateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let state = DailyState::deserialize_json(&raw).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(state.total_volume)
    }

    /// Write to a sibling temp file, then rename over the target.
    pub fn store(&self, total_volume: u64) -> Result<(), StateError> {
        let json = DailyState { total_volume }.serialize_json();

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|source| StateError::Write {
                path: self.path.clone(),
                source,
            })
    }
}
