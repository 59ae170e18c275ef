use crate::chat::stream::Delivery;
use crate::chat::transcript::export_transcript;
use crate::gateway::{ ChatBackend, GatewayError };
use crate::models::chat::{ Message, MessagePatch, SessionId, SessionSummary };
use crate::store::settings::{ Language, ResponseMode };
use crate::store::{ ChatAction, ChatState, ChatStore, ExchangeOutcome };
use futures::StreamExt;
use log::{ debug, info, warn };
use serde_json::{ Map, Value };
use std::sync::{ Arc, Mutex };
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const LOAD_SESSION_ERROR: &str = "Failed to load session";
pub const DELETE_SESSION_ERROR: &str = "Failed to delete chat";

struct ActiveExchange {
    message_id: String,
    token: CancellationToken,
}

/// Drives one conversation: sends, replays answers into the message store and
/// keeps the session directory in step with the backend.
pub struct ConversationController {
    backend: Arc<dyn ChatBackend>,
    store: Arc<ChatStore>,
    delivery: Delivery,
    active: Mutex<Option<ActiveExchange>>,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn ChatBackend>, delivery: Delivery) -> Self {
        Self::with_store(backend, delivery, Arc::new(ChatStore::default()))
    }

    pub fn with_store(backend: Arc<dyn ChatBackend>, delivery: Delivery, store: Arc<ChatStore>) -> Self {
        Self {
            backend,
            store,
            delivery,
            active: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> ChatState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.store.subscribe()
    }

    /// Starts an exchange for `text`.
    ///
    /// Returns `None` without touching state when `text` is blank or another
    /// exchange is still in flight.
    pub async fn send(&self, text: &str) -> Option<ExchangeOutcome> {
        if text.trim().is_empty() {
            debug!("Ignoring empty message");
            return None;
        }

        let placeholder = Message::placeholder();
        let message_id = placeholder.id.clone();
        let token = match self.begin(text, placeholder) {
            Some(token) => token,
            None => {
                debug!("Exchange already in flight, ignoring send");
                return None;
            }
        };
        let session_id = self.store.snapshot().session_id;

        let (outcome, new_session) = self.run_exchange(
            text,
            session_id.as_ref(),
            &message_id,
            &token
        ).await;

        self.store.dispatch(ChatAction::FinishExchange {
            message_id: message_id.clone(),
            outcome: outcome.clone(),
        });
        self.disarm(&message_id);

        match &outcome {
            ExchangeOutcome::Completed => debug!("Exchange {} completed", message_id),
            ExchangeOutcome::Cancelled => info!("Generation stopped by user"),
            ExchangeOutcome::Failed { error } => warn!("Exchange {} failed: {}", message_id, error),
        }

        if new_session {
            self.refresh_sessions().await;
        }
        Some(outcome)
    }

    async fn run_exchange(
        &self,
        text: &str,
        session_id: Option<&SessionId>,
        message_id: &str,
        token: &CancellationToken
    ) -> (ExchangeOutcome, bool) {
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return (ExchangeOutcome::Cancelled, false),
            r = self.backend.stream_message(text, session_id, &self.delivery) => r,
        };

        let reply = match response {
            Ok(reply) => reply,
            Err(e) => {
                return (ExchangeOutcome::Failed { error: e.to_string() }, false);
            }
        };

        let mut new_session = false;
        if let Some(returned) = reply.session_id {
            if session_id != Some(&returned) {
                info!("Backend opened session {}", returned);
                new_session = self.store.dispatch(ChatAction::AdoptSession {
                    message_id: message_id.to_string(),
                    session_id: returned,
                });
            }
        }

        if !reply.references.is_empty() {
            self.store.dispatch(ChatAction::UpdateMessage {
                id: message_id.to_string(),
                patch: MessagePatch { references: Some(reply.references), ..MessagePatch::default() },
            });
        }

        let mut chunks = reply.chunks;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return (ExchangeOutcome::Cancelled, new_session),
                next = chunks.next() => next,
            };
            match next {
                Some(slice) => {
                    if token.is_cancelled() {
                        return (ExchangeOutcome::Cancelled, new_session);
                    }
                    self.store.dispatch(ChatAction::UpdateMessage {
                        id: message_id.to_string(),
                        patch: MessagePatch::append(slice),
                    });
                }
                None => {
                    break;
                }
            }
        }
        (ExchangeOutcome::Completed, new_session)
    }

    /// Opens the exchange and installs its token, superseding any older one.
    ///
    /// Holding `active` across the dispatch keeps `stop` from slipping in
    /// between the two.
    fn begin(&self, text: &str, placeholder: Message) -> Option<CancellationToken> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let message_id = placeholder.id.clone();
        let accepted = self.store.dispatch(ChatAction::BeginExchange {
            user: Message::user(text),
            placeholder,
        });
        if !accepted {
            return None;
        }
        let token = CancellationToken::new();
        let previous = active.replace(ActiveExchange {
            message_id,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        Some(token)
    }

    fn disarm(&self, message_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map_or(false, |a| a.message_id == message_id) {
            *active = None;
        }
    }

    /// Cancels the in-flight exchange, if any, and settles its message as final.
    pub fn stop(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
        match active {
            Some(exchange) => {
                exchange.token.cancel();
                self.store.dispatch(ChatAction::FinishExchange {
                    message_id: exchange.message_id,
                    outcome: ExchangeOutcome::Cancelled,
                });
                true
            }
            None => false,
        }
    }

    pub fn new_conversation(&self) {
        self.stop();
        self.store.dispatch(ChatAction::ResetConversation);
    }

    /// Conversation and directory teardown used on logout and forced sign-out.
    pub fn reset_for_sign_out(&self) {
        self.new_conversation();
        self.store.dispatch(ChatAction::SetSessions(Vec::new()));
    }

    pub async fn refresh_sessions(&self) {
        match self.backend.list_sessions().await {
            Ok(sessions) => {
                debug!("Session directory refreshed ({} sessions)", sessions.len());
                self.store.dispatch(ChatAction::SetSessions(sessions));
            }
            Err(e) => warn!("Failed to refresh sessions: {}", e),
        }
    }

    /// Replaces the conversation with the stored messages of `session_id`.
    ///
    /// The conversation reports loading until the fetch settles, and no exchange
    /// can start meanwhile. Returns `false` when another load is still running.
    pub async fn load_session(&self, session_id: SessionId) -> bool {
        self.stop();
        if !self.store.dispatch(ChatAction::BeginLoad(session_id.clone())) {
            debug!("Conversation busy, not loading session {}", session_id);
            return false;
        }

        let result = match self.backend.fetch_session_messages(&session_id).await {
            Ok(messages) => {
                info!("Loaded session {} ({} messages)", session_id, messages.len());
                Ok(messages)
            }
            Err(e) => {
                warn!("Failed to load session {}: {}", session_id, e);
                Err(LOAD_SESSION_ERROR.to_string())
            }
        };
        let loaded = result.is_ok();
        let applied = self.store.dispatch(ChatAction::FinishLoad { session_id, result });
        // A reset while fetching discards the result.
        loaded && applied
    }

    /// Creates a session on the backend and makes it the active, empty conversation.
    pub async fn create_session(&self, title: Option<&str>) -> Result<SessionSummary, GatewayError> {
        let created = self.backend.create_session(title).await?;
        info!("Created session {} ({})", created.id, created.title);
        self.new_conversation();
        self.store.dispatch(ChatAction::SetSession(Some(created.id.clone())));
        self.refresh_sessions().await;
        Ok(created)
    }

    /// Removes `session_id` from the directory before the backend confirms.
    ///
    /// On failure the directory is re-fetched rather than patched back.
    pub async fn delete_session(&self, session_id: &SessionId) -> bool {
        self.store.dispatch(ChatAction::RemoveSession(session_id.clone()));
        if self.store.snapshot().session_id.as_ref() == Some(session_id) {
            self.new_conversation();
        }

        match self.backend.delete_session(session_id).await {
            Ok(()) => {
                info!("Deleted session {}", session_id);
                true
            }
            Err(e) => {
                warn!("Failed to delete session {}: {}", session_id, e);
                self.refresh_sessions().await;
                self.store.dispatch(ChatAction::SetError(Some(DELETE_SESSION_ERROR.to_string())));
                false
            }
        }
    }

    pub fn update_settings(&self, partial: Map<String, Value>) {
        self.store.dispatch(ChatAction::UpdateSettings(partial));
    }

    pub fn change_language(&self, language: Language) {
        let mut partial = Map::new();
        partial.insert("language".into(), serde_json::to_value(language).unwrap_or(Value::Null));
        self.update_settings(partial);
    }

    pub fn change_mode(&self, mode: ResponseMode) {
        let mut partial = Map::new();
        partial.insert("mode".into(), serde_json::to_value(mode).unwrap_or(Value::Null));
        self.update_settings(partial);
    }

    pub fn clear_error(&self) {
        self.store.dispatch(ChatAction::SetError(None));
    }

    pub fn export_transcript(&self) -> String {
        export_transcript(self.snapshot().messages.iter())
    }
}
