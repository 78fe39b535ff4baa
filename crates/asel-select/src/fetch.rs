//! Outbound transport for option queries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::config::SelectConfig;
use crate::error::{FetchError, SelectError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    /// Parsed JSON body of a successful response; `Null` otherwise.
    pub body: Value,
}

impl FetchResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Split into the payload or the error the widget reports.
    pub fn into_payload(self) -> Result<Value, SelectError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(SelectError::Http {
                status: self.status,
            })
        }
    }
}

/// Performs GET requests for option data.
#[async_trait]
pub trait OptionFetcher: Send + Sync {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<T: OptionFetcher + ?Sized> OptionFetcher for Arc<T> {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        (**self).get(request).await
    }
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SelectError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SelectError::Config(format!("http client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Client using the configured request timeout.
    pub fn from_config(config: &SelectConfig) -> Result<Self, SelectError> {
        Self::new(config.request_timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    map.insert(ACCEPT, HeaderValue::from_static("application/json"));
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl OptionFetcher for HttpFetcher {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let headers = header_map(&request.headers)?;
        let builder = self
            .client
            .get(request.url.clone())
            .query(&request.query)
            .headers(headers);

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Ok(FetchResponse::status(status.as_u16()));
            }
            let bytes = response.bytes().await?;
            let body = match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                Err(err) => {
                    tracing::warn!(url = %request.url, "non-JSON option payload: {err}");
                    Value::Null
                }
            };
            Ok::<_, reqwest::Error>(FetchResponse {
                status: status.as_u16(),
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) if err.is_timeout() => Err(FetchError::Timeout),
            Ok(Err(err)) => Err(FetchError::Network(err.to_string())),
            Err(_) => Err(FetchError::Timeout),
        }
    }
}
