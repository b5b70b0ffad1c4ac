#![allow(clippy::question_mark)] // nanoserde DeJson derive

use std::future::Future;

use bytes::Bytes;
use nanoserde::DeJson;
use reqwest::header::{AUTHORIZATION, CONNECTION};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Delivers one batch to the collector.
pub trait Exporter {
    fn export(&self, payload: Bytes) -> impl Future<Output = Result<(), ExportError>> + Send;
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HEC server error {status}: {body}")]
    ServerError { status: StatusCode, body: String },

    #[error("HEC rejected batch with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("HEC did not acknowledge batch: {body}")]
    NotAcknowledged { body: String },
}

impl ExportError {
    /// Transport failures and 5xx responses stop the relay. Everything else
    /// only costs the current batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExportError::Http(_) | ExportError::ServerError { .. })
    }
}

/// Acknowledgement body, e.g. `{"text":"Success","code":0}`.
#[derive(DeJson)]
struct HecAck {
    text: Option<String>,
}

pub struct HecExporter {
    client: Client,
    url: Url,
    authorization: String,
    headers: Vec<(String, String)>,
}

impl HecExporter {
    pub fn new(config: &Config) -> Result<Self, ExportError> {
        let client = Client::builder().timeout(config.export_timeout).build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            authorization: format!("Splunk {}", config.token),
            headers: config.export_headers.clone(),
        })
    }
}

impl Exporter for HecExporter {
    async fn export(&self, payload: Bytes) -> Result<(), ExportError> {
        let mut req = self
            .client
            .post(self.url.clone())
            .header(AUTHORIZATION, &self.authorization)
            .header(CONNECTION, "Keep-Alive");

        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        let resp = req.body(payload).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        check_response(status, body)
    }
}

fn check_response(status: StatusCode, body: String) -> Result<(), ExportError> {
    if status.is_server_error() {
        return Err(ExportError::ServerError { status, body });
    }
    if status != StatusCode::OK {
        return Err(ExportError::Rejected { status, body });
    }
    if !is_acknowledged(&body) {
        return Err(ExportError::NotAcknowledged { body });
    }
    Ok(())
}

fn is_acknowledged(body: &str) -> bool {
    HecAck::deserialize_json(body)
        .map(|ack| ack.text.as_deref() == Some("Success"))
        .unwrap_or(false)
}
