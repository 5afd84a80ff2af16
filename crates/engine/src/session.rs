//! Per-streamer HTTP session.
//!
//! Every status-check request goes through a single chokepoint
//! ([`HttpSession::request`]) so that low-level transport failures collapse
//! into one [`ConnectionError`] category. That category is the only error
//! the polling loop treats specially: it discards the session's client and
//! rebuilds it from the same configuration before the next cycle.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use tracing::debug;

use crate::config::StreamerConfig;
use crate::error::{ConnectionError, ConnectionKind, Result};

/// HTTP session exclusively owned by one streamer's recorder task.
pub struct HttpSession {
    config: Arc<StreamerConfig>,
    client: Client,
    default_headers: HeaderMap,
}

impl HttpSession {
    pub fn new(config: Arc<StreamerConfig>) -> Result<Self> {
        let default_headers = build_default_headers(&config);
        let client = build_client(&config, &default_headers)?;
        Ok(Self {
            config,
            client,
            default_headers,
        })
    }

    /// Discard the current client and build a fresh one from the same
    /// configuration. Headers, cookies and proxy settings carry forward.
    pub fn rebuild(&mut self) -> Result<()> {
        self.client = build_client(&self.config, &self.default_headers)?;
        debug!("http client rebuilt");
        Ok(())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub async fn get(&self, url: &str) -> Result<Response, ConnectionError> {
        self.request(Method::GET, url).await
    }

    /// The request chokepoint: any failure comes back as a classified
    /// [`ConnectionError`].
    pub async fn request(&self, method: Method, url: &str) -> Result<Response, ConnectionError> {
        self.client
            .request(method, url)
            .send()
            .await
            .map_err(|error| self.classify(error))
    }

    fn classify(&self, error: reqwest::Error) -> ConnectionError {
        if error.is_body() || error.is_decode() {
            ConnectionError::new(
                ConnectionKind::Protocol,
                format!("protocol error in live stream detection request: {error}"),
            )
        } else if self.config.proxy.is_some() && error.is_connect() {
            ConnectionError::new(
                ConnectionKind::Proxy,
                format!("proxy error in live stream detection: {error}"),
            )
        } else {
            ConnectionError::new(
                ConnectionKind::Request,
                format!("error in live stream detection request: {error}"),
            )
        }
    }
}

/// Header map sent on every request: the streamer's configured headers plus
/// a `Cookie` header assembled from the parsed cookie string.
///
/// Invalid header names or values are skipped rather than failing session
/// construction.
pub(crate) fn build_default_headers(config: &StreamerConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.headers {
        match (HeaderName::from_str(key), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => {
                debug!(header = %key, "invalid configured header; skipping");
            }
        }
    }

    let cookies = config.parsed_cookies();
    if !cookies.is_empty() {
        let mut cookie_header = String::with_capacity(
            cookies.iter().map(|(k, v)| k.len() + v.len() + 3).sum(),
        );
        for (name, value) in &cookies {
            if !cookie_header.is_empty() {
                cookie_header.push_str("; ");
            }
            cookie_header.push_str(name);
            cookie_header.push('=');
            cookie_header.push_str(value);
        }
        match HeaderValue::from_str(&cookie_header) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(error) => {
                debug!(error = %error, "failed to build Cookie header; skipping");
            }
        }
    }

    headers
}

/// Detection client tuned to the poll cycle: request timeout equals the poll
/// interval and idle connections expire at twice the interval so keepalive
/// churn never outpaces polling.
fn build_client(config: &StreamerConfig, headers: &HeaderMap) -> Result<Client> {
    let interval = Duration::from_secs(config.interval);

    let mut builder = Client::builder()
        .default_headers(headers.clone())
        .timeout(interval)
        .pool_idle_timeout(interval * 2);

    if let Some(proxy_url) = config.proxy.as_deref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(builder.build()?)
}
