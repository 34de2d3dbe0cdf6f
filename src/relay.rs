use axum::{
    body::{ Body, Bytes },
    http::{ header, StatusCode },
    response::{ IntoResponse, Response },
    Json,
};
use futures::StreamExt;
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use log::{ error, info, warn };
use serde_json::Value as JsonValue;
use std::io;
use std::num::NonZeroU32;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::context::StaticContext;
use crate::llm::chat::{ ChatClient, ChatError, TextStream };
use crate::models::chat::{ ChatMessage, ChatRequest, ErrorBody, Role, UpstreamSession };

pub const CREDENTIAL_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid messages format: {0}")]
    InvalidRequest(String),
    #[error("{} is not configured", CREDENTIAL_VAR)]
    MissingCredential,
    #[error("too many chat requests")]
    RateLimited,
    #[error("upstream call failed: {0}")]
    Upstream(#[from] ChatError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing body. Upstream details stay in the server log.
    pub fn body(&self) -> ErrorBody {
        match self {
            RelayError::InvalidRequest(reason) =>
                ErrorBody::new("Invalid messages format").with_details(reason.clone()),
            RelayError::MissingCredential =>
                ErrorBody::new(
                    format!(
                        "API key not configured. Please add {} to environment variables.",
                        CREDENTIAL_VAR
                    )
                ),
            RelayError::RateLimited => ErrorBody::new("Too many requests, please slow down"),
            RelayError::Upstream(_) => ErrorBody::new("Failed to process chat request"),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// A request that passed validation: never empty, newest turn from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidChat {
    pub history: Vec<ChatMessage>,
    pub latest: ChatMessage,
    pub context: Option<String>,
}

pub fn validate_request(body: &[u8]) -> Result<ValidChat, RelayError> {
    let value: JsonValue = serde_json
        ::from_slice(body)
        .map_err(|e| RelayError::InvalidRequest(format!("body is not valid JSON: {}", e)))?;

    match value.get("messages") {
        Some(JsonValue::Array(items)) if items.is_empty() => {
            return Err(RelayError::InvalidRequest("`messages` must not be empty".into()));
        }
        Some(JsonValue::Array(_)) => {}
        _ => {
            return Err(RelayError::InvalidRequest("`messages` must be an array".into()));
        }
    }

    let request: ChatRequest = serde_json
        ::from_value(value)
        .map_err(|e| RelayError::InvalidRequest(format!("malformed request: {}", e)))?;

    let mut history = request.messages;
    let latest = match history.pop() {
        Some(msg) if msg.role == Role::User => msg,
        _ => {
            return Err(
                RelayError::InvalidRequest("the newest message must come from the user".into())
            );
        }
    };

    Ok(ValidChat { history, latest, context: request.context })
}

pub fn live_prompt(context: &str, user_message: &str) -> String {
    format!("{}\n\nUser: {}", context, user_message)
}

pub fn build_session(chat: ValidChat, fallback: &StaticContext) -> UpstreamSession {
    let context = chat.context.as_deref().unwrap_or_else(|| fallback.as_str());
    UpstreamSession {
        prompt: live_prompt(context, &chat.latest.content),
        history: chat.history,
    }
}

/// Turns upstream fragments into a chunked body. An upstream failure becomes
/// a body error, which makes hyper abort the response instead of finishing
/// it cleanly; whatever was already flushed stays with the client.
pub fn reply_body(stream: TextStream, request_id: Uuid) -> Body {
    let body_stream = stream.map(move |item| {
        match item {
            Ok(fragment) => Ok(Bytes::from(fragment)),
            Err(e) => {
                error!("[{}] Streaming error: {}", request_id, e);
                Err(io::Error::other(e.to_string()))
            }
        }
    });
    Body::from_stream(body_stream)
}

#[derive(Clone)]
pub struct Relay {
    client: Option<Arc<dyn ChatClient>>,
    context: StaticContext,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl Relay {
    pub fn new(
        client: Option<Arc<dyn ChatClient>>,
        context: StaticContext,
        requests_per_second: u32
    ) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        if client.is_none() {
            warn!("{} is not set in environment variables", CREDENTIAL_VAR);
        }
        Self {
            client,
            context,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Runs every check that can reject the request, then opens the upstream
    /// session. Nothing reaches the provider unless all checks pass.
    pub async fn open_stream(&self, body: &[u8], request_id: Uuid) -> Result<TextStream, RelayError> {
        let chat = validate_request(body)?;
        let client = self.client.as_ref().ok_or(RelayError::MissingCredential)?;

        // Only requests that would reach the provider spend a token.
        if self.limiter.check().is_err() {
            warn!("[{}] Chat rate limit exceeded", request_id);
            return Err(RelayError::RateLimited);
        }

        let session = build_session(chat, &self.context);
        info!(
            "[{}] Relaying chat: history_len={} prompt_len={} model={}",
            request_id,
            session.history.len(),
            session.prompt.len(),
            client.get_model()
        );

        Ok(client.stream_chat(&session).await?)
    }

    pub async fn respond(&self, body: Bytes) -> Response {
        let request_id = Uuid::new_v4();
        match self.open_stream(&body, request_id).await {
            Ok(stream) =>
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                        (header::CACHE_CONTROL, "no-cache"),
                    ],
                    reply_body(stream, request_id),
                ).into_response(),
            Err(e) => {
                match &e {
                    RelayError::Upstream(inner) => {
                        error!("[{}] Chat API error: {}", request_id, inner);
                    }
                    other => {
                        warn!("[{}] Rejected chat request: {}", request_id, other);
                    }
                }
                e.into_response()
            }
        }
    }
}
