//! HTTP transport seam
//!
//! The [`Transport`] trait performs exactly one HTTP exchange and knows nothing
//! about retries or status semantics; those live in the executor.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::credentials::Credentials;
use super::error::TransportError;

/// HTTP methods used against the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
}

impl Method {
    /// Reads whose empty success (204) is treated as anomalous
    pub fn expects_body(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
        };
        write!(f, "{}", s)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
        }
    }
}

/// Request body source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(Vec<u8>),
    /// Streamed from disk on every attempt
    File(PathBuf),
}

/// Where a successful response body goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSink {
    Memory,
    /// Streamed to disk; the in-memory body stays empty
    File(PathBuf),
}

/// A single HTTP request description
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
    pub sink: ResponseSink,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: RequestBody::Empty,
            headers: Vec::new(),
            sink: ResponseSink::Memory,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn head(url: Url) -> Self {
        Self::new(Method::Head, url)
    }

    pub fn put_json(url: Url, body: Vec<u8>) -> Self {
        Self {
            body: RequestBody::Json(body),
            ..Self::new(Method::Put, url)
        }
        .header("Content-Type", "application/json")
    }

    pub fn upload(url: Url, path: impl Into<PathBuf>) -> Self {
        Self {
            body: RequestBody::File(path.into()),
            ..Self::new(Method::Put, url)
        }
    }

    pub fn download(url: Url, path: impl Into<PathBuf>) -> Self {
        Self {
            sink: ResponseSink::File(path.into()),
            ..Self::new(Method::Get, url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status and (possibly empty) body of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// One HTTP exchange with basic auth
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest, credentials: &Credentials) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        debug!(?timeout, "ReqwestTransport::new: called");
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("securityimport/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest, credentials: &Credentials) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "ReqwestTransport::send: called");
        let mut builder = self
            .http
            .request(request.method.into(), request.url.clone())
            .basic_auth(&credentials.username, Some(&credentials.password));

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes.clone()),
            RequestBody::File(path) => {
                debug!(path = %path.display(), "ReqwestTransport::send: streaming upload");
                let file = tokio::fs::File::open(path).await?;
                builder.body(reqwest::Body::from(file))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        debug!(status, "ReqwestTransport::send: response received");

        match &request.sink {
            ResponseSink::File(path) if response.status().is_success() => {
                debug!(path = %path.display(), "ReqwestTransport::send: streaming download");
                let mut out = tokio::fs::File::create(path).await?;
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    out.write_all(&chunk?).await?;
                }
                out.flush().await?;
                Ok(HttpResponse::new(status, Vec::new()))
            }
            _ => {
                let body = response.bytes().await?;
                Ok(HttpResponse::new(status, body.to_vec()))
            }
        }
    }
}
