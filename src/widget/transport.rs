use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use std::pin::Pin;
use thiserror::Error;
use url::Url;

use crate::models::chat::{ ChatRequest, ErrorBody };

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("connection dropped: {0}")]
    Dropped(String),
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Posts one chat request. Resolves with the body stream once the relay
    /// has answered with a success status.
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}

pub struct RelayClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl RelayClient {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: Url::parse(endpoint)?,
        })
    }
}

#[async_trait]
impl RelayTransport for RelayClient {
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let resp = self.http.post(self.endpoint.clone()).json(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = match resp.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => "Failed to get response".to_string(),
            };
            return Err(TransportError::Status { status: status.as_u16(), message });
        }

        Ok(
            Box::pin(
                resp
                    .bytes_stream()
                    .map(|chunk|
                        chunk.map(|b| b.to_vec()).map_err(|e| TransportError::Dropped(e.to_string()))
                    )
            )
        )
    }
}
