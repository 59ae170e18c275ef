use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use std::fmt;
use uuid::Uuid;

pub const WELCOME_MESSAGE_ID: &str = "welcome";

pub const WELCOME_TEXT: &str =
    "Namaste! 🙏 I am SATYAM AI, your legal assistant powered by Indian constitutional values.

I can help you with:
• Understanding Indian laws and rights
• Constitutional provisions
• Legal procedures and processes
• Case law references

How may I assist you today?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "ai")]
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Final,
    Errored,
}

/// A citation attached to an assistant answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            references: Vec::new(),
            timestamp: Utc::now(),
            status: MessageStatus::Final,
        }
    }

    /// Empty assistant message that receives streamed slices.
    pub fn placeholder() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: String::new(),
            references: Vec::new(),
            timestamp: Utc::now(),
            status: MessageStatus::Pending,
        }
    }

    pub fn welcome() -> Self {
        Self {
            id: WELCOME_MESSAGE_ID.to_string(),
            role: Role::Assistant,
            content: WELCOME_TEXT.to_string(),
            references: Vec::new(),
            timestamp: Utc::now(),
            status: MessageStatus::Final,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

/// Partial update applied by `MessageStore::update_by_id`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub append: Option<String>,
    pub references: Option<Vec<Reference>>,
    pub status: Option<MessageStatus>,
}

impl MessagePatch {
    pub fn append(slice: impl Into<String>) -> Self {
        Self { append: Some(slice.into()), ..Self::default() }
    }

    pub fn status(status: MessageStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }
}

/// Server-side session identifier, kept exactly as the backend sent it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    Number(i64),
    Text(String),
}

impl SessionId {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => SessionId::Number(n),
            Err(_) => SessionId::Text(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Number(n) => write!(f, "{}", n),
            SessionId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for SessionId {
    fn from(n: i64) -> Self {
        SessionId::Number(n)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}
