//! The I/O seam between request building and response classification.
//!
//! A `Transport` turns an `HttpRequest` into an `HttpResponse`. Any status
//! code the server sends, 4xx and 5xx included, is a successful round-trip
//! and comes back as a response; `TransportError` is reserved for failing to
//! get a response at all.

use async_trait::async_trait;
use reqwest::Method;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `Transport` over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if let Some(status) = err.status() {
        return TransportError::Status(status.as_u16());
    }
    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }
    TransportError::Io(err.to_string())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
