pub mod http;

use crate::chat::stream::{ Delivery, ReplyStream };
use crate::models::api::{ AuthGrant, ChatReply };
use crate::models::chat::{ Message, SessionId, SessionSummary };
use async_trait::async_trait;
use thiserror::Error;

/// Failure half of every gateway call. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")] Unauthorized(String),
    #[error("{message}")] Backend {
        status: u16,
        message: String,
    },
    #[error("{0}")] Transport(String),
    #[error("{0}")] Decode(String),
    #[error("Invalid gateway configuration: {0}")] Config(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// One method per backend capability.
///
/// Implementations never panic past this boundary: transport faults, non-2xx
/// statuses and malformed bodies all come back as `GatewayError`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> GatewayResult<AuthGrant>;

    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str
    ) -> GatewayResult<AuthGrant>;

    async fn send_message(
        &self,
        query: &str,
        session_id: Option<&SessionId>
    ) -> GatewayResult<ChatReply>;

    async fn list_sessions(&self) -> GatewayResult<Vec<SessionSummary>>;

    async fn create_session(&self, title: Option<&str>) -> GatewayResult<SessionSummary>;

    async fn fetch_session_messages(&self, session_id: &SessionId) -> GatewayResult<Vec<Message>>;

    async fn delete_session(&self, session_id: &SessionId) -> GatewayResult<()>;

    /// Answer delivered as a stream of text slices.
    ///
    /// The backend only returns complete answers today, so the default replays
    /// `send_message` locally. A backend with incremental transport overrides
    /// this and reports `supports_native_streaming`.
    async fn stream_message(
        &self,
        query: &str,
        session_id: Option<&SessionId>,
        delivery: &Delivery
    ) -> GatewayResult<ReplyStream> {
        let reply = self.send_message(query, session_id).await?;
        Ok(ReplyStream::replay(reply, delivery))
    }

    fn supports_native_streaming(&self) -> bool {
        false
    }
}
