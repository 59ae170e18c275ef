use crate::models::chat::{ Identity, Message, MessageStatus, Reference, Role, SessionId };
use chrono::{ DateTime, NaiveDateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct LoginForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Debug)]
pub struct SignupRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub user_name: String,
    pub user_email: String,
}

/// Token and identity returned by a successful login or signup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub identity: Identity,
}

impl From<TokenResponse> for AuthGrant {
    fn from(resp: TokenResponse) -> Self {
        Self {
            token: resp.access_token,
            identity: Identity {
                name: resp.user_name,
                email: resp.user_email,
            },
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RagRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a SessionId>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum SourceDto {
    Plain(String),
    Cited {
        title: String,
        #[serde(default)]
        url: Option<String>,
    },
}

impl From<SourceDto> for Reference {
    fn from(src: SourceDto) -> Self {
        match src {
            SourceDto::Plain(title) => Reference { title, url: None },
            SourceDto::Cited { title, url } => Reference { title, url },
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct RagResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<SourceDto>>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// A complete answer to one query.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub references: Vec<Reference>,
    pub session_id: Option<SessionId>,
}

impl From<RagResponse> for ChatReply {
    fn from(resp: RagResponse) -> Self {
        Self {
            answer: resp.answer,
            references: resp.sources
                .unwrap_or_default()
                .into_iter()
                .map(Reference::from)
                .collect(),
            session_id: resp.session_id,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CreateSessionRequest<'a> {
    pub title: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum MessageIdDto {
    Number(i64),
    Text(String),
}

#[derive(Deserialize, Debug)]
pub struct SessionMessageDto {
    #[serde(default)]
    pub id: Option<MessageIdDto>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<SessionMessageDto> for Message {
    fn from(dto: SessionMessageDto) -> Self {
        let id = match dto.id {
            Some(MessageIdDto::Number(n)) => n.to_string(),
            Some(MessageIdDto::Text(s)) => s,
            None => Uuid::new_v4().to_string(),
        };
        Message {
            id,
            role: dto.role,
            content: dto.content,
            references: Vec::new(),
            timestamp: dto.created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            status: MessageStatus::Final,
        }
    }
}

/// Accepts RFC 3339 as well as the naive UTC timestamps the backend stores.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_response_accepts_string_and_object_sources() {
        let raw = r#"{
            "answer": "Article 21 protects life and personal liberty.",
            "sources": ["Constitution of India, Art. 21", {"title": "Maneka Gandhi v. UoI", "url": "https://example.org/mg"}],
            "session_id": 42,
            "confidence": 90
        }"#;
        let reply: ChatReply = serde_json::from_str::<RagResponse>(raw).unwrap().into();
        assert_eq!(reply.references.len(), 2);
        assert_eq!(reply.references[0].url, None);
        assert_eq!(reply.references[1].url.as_deref(), Some("https://example.org/mg"));
        assert_eq!(reply.session_id, Some(SessionId::Number(42)));
    }

    #[test]
    fn rag_request_omits_missing_session() {
        let body = serde_json::to_value(RagRequest { query: "hi", session_id: None }).unwrap();
        assert_eq!(body, serde_json::json!({ "query": "hi" }));
    }

    #[test]
    fn session_message_uses_backend_fields() {
        let raw = r#"{"id": 7, "role": "ai", "content": "Hello", "created_at": "2025-01-02T03:04:05.123456"}"#;
        let msg: Message = serde_json::from_str::<SessionMessageDto>(raw).unwrap().into();
        assert_eq!(msg.id, "7");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.status, MessageStatus::Final);
        assert_eq!(msg.timestamp.to_rfc3339(), "2025-01-02T03:04:05.123456+00:00");
    }

    #[test]
    fn error_body_prefers_string_detail() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail": "Session not found"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("Session not found"));
        let empty: ErrorBody = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(empty.message(), None);
    }
}
