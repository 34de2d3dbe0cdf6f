pub mod gemini;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use log::{ debug, warn };
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::LlmConfig;
use self::gemini::GeminiChatClient;
use crate::models::chat::UpstreamSession;

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("upstream API key is not configured")]
    MissingApiKey,
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("could not decode upstream payload: {0}")]
    Decode(String),
    #[error("upstream reported an error: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens one upstream session. Resolves once the provider has accepted the
    /// request, so failures before the first fragment surface here and not in
    /// the returned stream.
    async fn stream_chat(&self, session: &UpstreamSession) -> Result<TextStream, ChatError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> TextStream
    where
        F: FnOnce(mpsc::Sender<Result<String, ChatError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client = GeminiChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

/// Splits a byte stream into lines. Bytes after the last newline are held
/// until more input arrives, so a line cut across two network chunks comes
/// out whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    // bytes of `pending` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ChatError> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            self.scanned = 0;
            lines.push(decode_line(&raw[..raw.len() - 1])?);
        }
        self.scanned = self.pending.len();
        Ok(lines)
    }

    pub fn finish(self) -> Result<Option<String>, ChatError> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        decode_line(&self.pending).map(Some)
    }
}

fn decode_line(raw: &[u8]) -> Result<String, ChatError> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8(raw.to_vec()).map_err(|e| ChatError::Decode(e.to_string()))
}

/// Pumps an accepted upstream response through `line_parser` and forwards
/// every fragment in order. The pump stops as soon as the receiving side is
/// dropped, even while upstream is stalled between chunks, which releases the
/// upstream connection when the caller goes away.
pub fn http_stream_lines(
    resp: reqwest::Response,
    line_parser: fn(&str) -> Result<Vec<String>, ChatError>
) -> TextStream {
    create_streaming_response(move |tx| async move {
        let mut bytes = resp.bytes_stream();
        let mut buffer = LineBuffer::default();

        loop {
            let chunk = tokio::select! {
                _ = tx.closed() => {
                    debug!("Stream receiver dropped; abandoning upstream read");
                    return;
                }
                chunk = bytes.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let lines = match chunk.map_err(ChatError::from).and_then(|buf| buffer.push(&buf)) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!("Upstream stream failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if !forward_lines(&tx, lines, line_parser).await {
                return;
            }
        }

        match buffer.finish() {
            Ok(Some(line)) => {
                forward_lines(&tx, vec![line], line_parser).await;
            }
            Ok(None) => {}
            Err(e) => {
                let _ = tx.send(Err(e)).await;
            }
        }
    })
}

async fn forward_lines(
    tx: &mpsc::Sender<Result<String, ChatError>>,
    lines: Vec<String>,
    line_parser: fn(&str) -> Result<Vec<String>, ChatError>
) -> bool {
    for line in lines {
        match line_parser(&line) {
            Ok(fragments) => {
                for fragment in fragments {
                    if tx.send(Ok(fragment)).await.is_err() {
                        debug!("Stream receiver dropped; abandoning upstream read");
                        return false;
                    }
                }
            }
            Err(e) => {
                warn!("Upstream stream failed: {}", e);
                let _ = tx.send(Err(e)).await;
                return false;
            }
        }
    }
    true
}
