use async_trait::async_trait;
use log::info;
use serde::{ Deserialize, Serialize };

use super::{ http_stream_lines, ChatClient, ChatError, TextStream };
use crate::llm::LlmConfig;
use crate::models::chat::{ ChatMessage, Role, UpstreamSession };

#[derive(Serialize)]
struct GeminiStreamRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GoogleChunk {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    error: Option<GoogleError>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

fn content_of(role: Role, text: &str) -> GeminiContent {
    GeminiContent {
        role: role_name(role),
        parts: vec![GeminiPart { text: text.to_string() }],
    }
}

fn build_payload(session: &UpstreamSession) -> GeminiStreamRequest {
    let mut contents: Vec<GeminiContent> = session.history
        .iter()
        .map(|ChatMessage { role, content }| content_of(*role, content))
        .collect();
    contents.push(content_of(Role::User, &session.prompt));
    GeminiStreamRequest { contents }
}

/// Parses one line of the `alt=sse` response. Only `data:` lines carry
/// payload; event names, ids, comments and blank separators yield nothing.
pub fn parse_gemini_line(line: &str) -> Result<Vec<String>, ChatError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(Vec::new());
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(Vec::new());
    }

    let chunk: GoogleChunk = serde_json
        ::from_str(data)
        .map_err(|e| ChatError::Decode(format!("invalid Gemini chunk: {}", e)))?;

    if let Some(err) = chunk.error {
        return Err(ChatError::Upstream(err.message));
    }

    Ok(
        chunk.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .filter(|t| !t.is_empty())
            .collect()
    )
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        if !config.has_api_key() {
            return Err(ChatError::MissingApiKey);
        }
        let api_key = config.api_key.clone().unwrap_or_default();
        Ok(Self::new(api_key, config.model(), config.base_url()))
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn stream_chat(&self, session: &UpstreamSession) -> Result<TextStream, ChatError> {
        info!(
            "GeminiChatClient::stream_chat() → model={} history_len={}",
            self.model,
            session.history.len()
        );

        let resp = self.http
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_payload(session))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status { status: status.as_u16(), body });
        }

        Ok(http_stream_lines(resp, parse_gemini_line))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
