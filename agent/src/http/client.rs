//! HTTP client for the vendor open API

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::errors::{ApiError, EnvelopeError, TransportError};
use crate::models::envelope::Envelope;

/// Deadline applied to every vendor call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client bound to one region's base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client for `base_url`
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom per-request deadline
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Issue a GET with the given signing headers and unwrap the vendor envelope.
    ///
    /// `path_and_query` must start with `/`.
    pub async fn get_signed<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
        headers: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}{}", self.base_url, path_for_log(path_and_query));

        let mut request = self.client.get(&url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_timeout() => {
                return Err(TransportError::Timeout(self.timeout).into());
            }
            Ok(Err(e)) => {
                error!("HTTP GET {} failed: {}", path_for_log(path_and_query), e);
                return Err(TransportError::Request(e).into());
            }
            Err(_) => {
                error!(
                    "HTTP GET {} timed out after {:?}",
                    path_for_log(path_and_query),
                    self.timeout
                );
                return Err(TransportError::Timeout(self.timeout).into());
            }
        };

        if status != StatusCode::OK {
            error!("HTTP GET failed: {} - {}", status, body);
            return Err(EnvelopeError::Status { status, body }.into());
        }

        let envelope = Envelope::parse(&body).map_err(|e| {
            error!("Failed to parse response body: {}", e);
            e
        })?;
        Ok(envelope.into_result()?)
    }
}

/// Token paths embed the refresh token, keep it out of the logs
fn path_for_log(path: &str) -> &str {
    match path.find("/token/") {
        Some(idx) => &path[..idx + "/token/".len()],
        None => path,
    }
}
