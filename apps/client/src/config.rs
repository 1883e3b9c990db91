use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::client::{ReconnectPolicy, StreamOptions};
use crate::errors::{ClientError, ClientResult};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// Client settings resolved from `FLOWFORGE_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base of the REST surface, e.g. `http://localhost:8001/api`
    pub api_url: String,
    /// Base of the event streams, e.g. `ws://localhost:8001/api`
    pub ws_url: String,
    pub request_timeout: Duration,
    /// `None` disables the watchdog
    pub idle_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
    pub download_dir: PathBuf,
}

impl ClientConfig {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> ClientResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("FLOWFORGE_BACKEND_URL").unwrap_or_else(|| {
            tracing::warn!("FLOWFORGE_BACKEND_URL not set, using default");
            DEFAULT_BACKEND_URL.to_string()
        });
        let api_url = api_base(&backend_url)?;
        let ws_url = match lookup("FLOWFORGE_WS_URL") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => websocket_base(&api_url)?,
        };

        let request_timeout = Duration::from_secs(parse_or(&lookup, "FLOWFORGE_REQUEST_TIMEOUT_SECS", 30)?);
        let idle_timeout = match parse_or::<u64, _>(&lookup, "FLOWFORGE_IDLE_TIMEOUT_SECS", 300)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let reconnect = ReconnectPolicy {
            max_attempts: parse_or(&lookup, "FLOWFORGE_RECONNECT_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(parse_or(&lookup, "FLOWFORGE_RECONNECT_BASE_MS", 500)?),
            max_delay: Duration::from_millis(parse_or(&lookup, "FLOWFORGE_RECONNECT_MAX_MS", 8000)?),
        };
        let download_dir = lookup("FLOWFORGE_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            api_url,
            ws_url,
            request_timeout,
            idle_timeout,
            reconnect,
            download_dir,
        })
    }

    /// Points both surfaces at another backend
    pub fn with_backend_url(mut self, backend_url: &str) -> ClientResult<Self> {
        self.api_url = api_base(backend_url)?;
        self.ws_url = websocket_base(&self.api_url)?;
        Ok(self)
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            reconnect: self.reconnect,
            connect_timeout: self.request_timeout,
            idle_timeout: self.idle_timeout,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> ClientResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ClientError::Config(format!("{}={:?} is invalid: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn api_base(backend_url: &str) -> ClientResult<String> {
    let backend_url = backend_url.trim().trim_end_matches('/');
    if !(backend_url.starts_with("http://") || backend_url.starts_with("https://")) {
        return Err(ClientError::Config(format!(
            "Backend URL must start with http:// or https://, got {:?}",
            backend_url
        )));
    }
    Ok(format!("{}/api", backend_url))
}

/// Maps `http(s)://` to `ws(s)://`
fn websocket_base(http_url: &str) -> ClientResult<String> {
    if let Some(rest) = http_url.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else {
        Err(ClientError::Config(format!("Cannot derive a WebSocket URL from {:?}", http_url)))
    }
}
