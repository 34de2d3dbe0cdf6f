use serde::{ Deserialize, Serialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self { role: Role::Model, content: content.into() }
    }
}

/// Body of `POST /api/chat`. `context` is optional on the wire; the relay
/// falls back to its own static context when the caller omits it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One upstream call: prior turns as primer plus the live prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamSession {
    pub history: Vec<ChatMessage>,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::model("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"model","content":"hi"}"#);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed = serde_json::from_str::<ChatMessage>(r#"{"role":"assistant","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn context_is_optional() {
        let req: ChatRequest = serde_json
            ::from_str(r#"{"messages":[{"role":"user","content":"hey"}]}"#)
            .unwrap();
        assert_eq!(req.context, None);
        assert_eq!(req.messages, vec![ChatMessage::user("hey")]);
    }

    #[test]
    fn error_body_omits_missing_details() {
        let json = serde_json::to_string(&ErrorBody::new("nope")).unwrap();
        assert_eq!(json, r#"{"error":"nope"}"#);
    }
}
