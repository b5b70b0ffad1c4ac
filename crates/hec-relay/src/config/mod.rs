use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HEC_RELAY_SERVER is required but not set")]
    ServerMissing,

    #[error("HEC_RELAY_TOKEN is required but not set")]
    TokenMissing,

    #[error("HEC URL is not valid: {0}")]
    InvalidUrl(String),

    #[error("{0} has invalid value: {1}")]
    InvalidNumeric(String, String),

    #[error("{0} must be greater than zero, got {1}")]
    NotPositive(String, String),

    #[error("HEC_RELAY_EXPORT_HEADERS has invalid header: {0}")]
    InvalidHeader(String),

    #[error("HEC_RELAY_DAILY_CAP_BYTES is set but HEC_RELAY_STATE_FILE is not")]
    CapWithoutStateFile,
}

#[derive(Debug)]
pub struct Config {
    pub url: Url,
    pub token: String,
    pub batch_size: usize,
    pub batch_wait: Duration,
    pub stat_period: Duration,
    pub daily_cap: Option<u64>,
    pub state_file: Option<PathBuf>,
    pub export_timeout: Duration,
    pub export_headers: Vec<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with("HEC_RELAY_"))
            .collect();
        Self::parse(&vars)
    }

    fn parse(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let url = parse_url(vars)?;
        let token = vars
            .get("HEC_RELAY_TOKEN")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::TokenMissing)?
            .clone();
        let batch_size = parse_batch_size(vars, "HEC_RELAY_BATCH_SIZE", 10)?;
        let batch_wait = parse_duration_secs(vars, "HEC_RELAY_BATCH_WAIT", 0.1)?;
        let stat_period = parse_duration_minutes(vars, "HEC_RELAY_STAT_PERIOD", 15)?;
        let daily_cap = parse_daily_cap(vars, "HEC_RELAY_DAILY_CAP_BYTES")?;
        let state_file = vars
            .get("HEC_RELAY_STATE_FILE")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let export_timeout = parse_duration_ms(vars, "HEC_RELAY_EXPORT_TIMEOUT_MS", 5000)?;
        let export_headers = parse_headers(vars)?;

        if daily_cap.is_some() && state_file.is_none() {
            return Err(ConfigError::CapWithoutStateFile);
        }

        Ok(Self {
            url,
            token,
            batch_size,
            batch_wait,
            stat_period,
            daily_cap,
            state_file,
            export_timeout,
            export_headers,
        })
    }
}

/// Assemble `http://server:port/path`. Only plain HTTP is spoken.
fn parse_url(vars: &HashMap<String, String>) -> Result<Url, ConfigError> {
    let server = vars
        .get("HEC_RELAY_SERVER")
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::ServerMissing)?;
    let port = parse_port(vars, "HEC_RELAY_PORT", 8088)?;
    let path = vars
        .get("HEC_RELAY_ENDPOINT")
        .filter(|s| !s.is_empty())
        .map(|s| s.as_str())
        .unwrap_or("/services/collector/event");

    let raw = if path.starts_with('/') {
        format!("http://{server}:{port}{path}")
    } else {
        format!("http://{server}:{port}/{path}")
    };

    Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw))
}

fn parse_port(
    vars: &HashMap<String, String>,
    name: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match vars.get(name) {
        Some(val) => val
            .parse()
            .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone())),
        None => Ok(default),
    }
}

/// A batch size of zero is coerced to one.
fn parse_batch_size(
    vars: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match vars.get(name) {
        Some(val) => {
            let size: usize = val
                .parse()
                .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
            Ok(size.max(1))
        }
        None => Ok(default),
    }
}

fn parse_duration_secs(
    vars: &HashMap<String, String>,
    name: &str,
    default_secs: f64,
) -> Result<Duration, ConfigError> {
    let Some(val) = vars.get(name) else {
        return Ok(Duration::from_secs_f64(default_secs));
    };
    let secs: f64 = val
        .parse()
        .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
    let wait = Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
    if wait.is_zero() {
        return Err(ConfigError::NotPositive(name.to_owned(), val.clone()));
    }
    Ok(wait)
}

fn parse_duration_minutes(
    vars: &HashMap<String, String>,
    name: &str,
    default_minutes: u64,
) -> Result<Duration, ConfigError> {
    let minutes = match vars.get(name) {
        Some(val) => {
            let minutes: u64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
            if minutes == 0 {
                return Err(ConfigError::NotPositive(name.to_owned(), val.clone()));
            }
            minutes
        }
        None => default_minutes,
    };
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidNumeric(name.to_owned(), minutes.to_string()))
}

fn parse_duration_ms(
    vars: &HashMap<String, String>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match vars.get(name) {
        Some(val) => {
            let ms: u64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
            if ms == 0 {
                return Err(ConfigError::NotPositive(name.to_owned(), val.clone()));
            }
            Ok(Duration::from_millis(ms))
        }
        None => Ok(Duration::from_millis(default_ms)),
    }
}

fn parse_daily_cap(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Option<u64>, ConfigError> {
    match vars.get(name) {
        Some(val) => {
            let bytes: u64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
            if bytes == 0 {
                Ok(None)
            } else {
                Ok(Some(bytes))
            }
        }
        None => Ok(None),
    }
}

fn parse_headers(vars: &HashMap<String, String>) -> Result<Vec<(String, String)>, ConfigError> {
    let Some(raw) = vars
        .get("HEC_RELAY_EXPORT_HEADERS")
        .filter(|s| !s.is_empty())
    else {
        return Ok(Vec::new());
    };

    let mut headers = Vec::new();
    for pair in raw.split(',') {
        let Some((k, v)) = pair.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim();
        if k.is_empty() {
            continue;
        }
        if HeaderName::from_bytes(k.as_bytes()).is_err() || HeaderValue::from_str(v).is_err() {
            return Err(ConfigError::InvalidHeader(pair.trim().to_owned()));
        }
        headers.push((k.to_owned(), v.to_owned()));
    }
    Ok(headers)
}
