use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use crate::config::Config;
use crate::exporter::{ExportError, Exporter};

/// Accepts every batch and keeps a copy of each payload.
#[derive(Clone, Default)]
pub struct RecordingExporter {
    pub sent: Arc<Mutex<Vec<Bytes>>>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }
}

impl Exporter for RecordingExporter {
    async fn export(&self, payload: Bytes) -> Result<(), ExportError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}

/// Answers every batch like a collector refusing the data (HTTP 400).
#[derive(Clone, Default)]
pub struct RejectingExporter {
    pub attempts: Arc<Mutex<u32>>,
}

impl Exporter for RejectingExporter {
    async fn export(&self, _payload: Bytes) -> Result<(), ExportError> {
        *self.attempts.lock().unwrap() += 1;
        Err(ExportError::Rejected {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"text":"Invalid data format","code":6}"#.into(),
        })
    }
}

/// Answers every batch like an overloaded collector (HTTP 503).
#[derive(Clone, Default)]
pub struct FailingExporter {
    pub attempts: Arc<Mutex<u32>>,
}

impl Exporter for FailingExporter {
    async fn export(&self, _payload: Bytes) -> Result<(), ExportError> {
        *self.attempts.lock().unwrap() += 1;
        Err(ExportError::ServerError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: r#"{"text":"Server is busy","code":9}"#.into(),
        })
    }
}

pub fn dummy_config() -> Config {
    Config {
        url: url::Url::parse("http://127.0.0.1:8088/services/collector/event").unwrap(),
        token: "test-token".into(),
        batch_size: 10,
        batch_wait: Duration::from_millis(100),
        stat_period: Duration::from_secs(15 * 60),
        daily_cap: None,
        state_file: None,
        export_timeout: Duration::from_millis(500),
        export_headers: vec![],
    }
}
