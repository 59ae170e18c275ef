pub mod messages;
pub mod sessions;
pub mod settings;

use crate::models::chat::{ Message, MessagePatch, MessageStatus, SessionId, SessionSummary };
use messages::MessageStore;
use serde_json::{ Map, Value };
use sessions::SessionDirectory;
use settings::Settings;
use tokio::sync::watch;

pub const APOLOGY_TEXT: &str = "I apologize, but I encountered an error. Please try again.";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExchangePhase {
    #[default]
    Idle,
    /// An exchange is in flight; `message_id` names its pending assistant message.
    AwaitingResponse {
        message_id: String,
    },
    /// Stored messages of `session_id` are being fetched.
    LoadingSession {
        session_id: SessionId,
    },
}

/// How an exchange ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Failed {
        error: String,
    },
    Cancelled,
}

/// The single active conversation plus the caches attached to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatState {
    pub messages: MessageStore,
    pub session_id: Option<SessionId>,
    pub phase: ExchangePhase,
    pub error: Option<String>,
    pub sessions: SessionDirectory,
    pub settings: Settings,
}

impl ChatState {
    pub fn is_loading(&self) -> bool {
        self.phase != ExchangePhase::Idle
    }

    pub fn pending_message_id(&self) -> Option<&str> {
        match &self.phase {
            ExchangePhase::AwaitingResponse { message_id } => Some(message_id),
            _ => None,
        }
    }

    fn is_loading_session(&self, id: &SessionId) -> bool {
        matches!(&self.phase, ExchangePhase::LoadingSession { session_id } if session_id == id)
    }

    fn owns_exchange(&self, id: &str) -> bool {
        self.pending_message_id() == Some(id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatAction {
    UpdateMessage {
        id: String,
        patch: MessagePatch,
    },
    /// Rejected unless the conversation is idle.
    BeginExchange {
        user: Message,
        placeholder: Message,
    },
    /// Ignored unless `message_id` still owns the active exchange.
    AdoptSession {
        message_id: String,
        session_id: SessionId,
    },
    /// Ignored unless `message_id` still owns the active exchange.
    FinishExchange {
        message_id: String,
        outcome: ExchangeOutcome,
    },
    /// Rejected unless the conversation is idle.
    BeginLoad(SessionId),
    /// Ignored unless the load of `session_id` is still the active phase.
    FinishLoad {
        session_id: SessionId,
        result: Result<Vec<Message>, String>,
    },
    SetSession(Option<SessionId>),
    SetError(Option<String>),
    SetSessions(Vec<SessionSummary>),
    RemoveSession(SessionId),
    UpdateSettings(Map<String, Value>),
    ResetConversation,
}

pub fn reduce(state: ChatState, action: ChatAction) -> ChatState {
    let mut state = state;
    match action {
        ChatAction::UpdateMessage { id, patch } => {
            state.messages = state.messages.update_by_id(&id, &patch);
        }
        ChatAction::BeginExchange { user, placeholder } => {
            if state.is_loading() || state.messages.pending_count() > 0 {
                return state;
            }
            state.phase = ExchangePhase::AwaitingResponse {
                message_id: placeholder.id.clone(),
            };
            state.error = None;
            state.messages = state.messages.append(user).append(placeholder);
        }
        ChatAction::AdoptSession { message_id, session_id } => {
            if state.owns_exchange(&message_id) {
                state.session_id = Some(session_id);
            }
        }
        ChatAction::FinishExchange { message_id, outcome } => {
            if !state.owns_exchange(&message_id) {
                return state;
            }
            let patch = match outcome {
                ExchangeOutcome::Completed | ExchangeOutcome::Cancelled =>
                    MessagePatch::status(MessageStatus::Final),
                ExchangeOutcome::Failed { error } => {
                    state.error = Some(error);
                    MessagePatch {
                        content: Some(APOLOGY_TEXT.to_string()),
                        status: Some(MessageStatus::Errored),
                        ..MessagePatch::default()
                    }
                }
            };
            state.messages = state.messages.update_by_id(&message_id, &patch);
            state.phase = ExchangePhase::Idle;
        }
        ChatAction::BeginLoad(session_id) => {
            if state.is_loading() || state.messages.pending_count() > 0 {
                return state;
            }
            state.phase = ExchangePhase::LoadingSession { session_id };
        }
        ChatAction::FinishLoad { session_id, result } => {
            if !state.is_loading_session(&session_id) {
                return state;
            }
            match result {
                Ok(messages) => {
                    state.messages = state.messages.replace(messages);
                    state.session_id = Some(session_id);
                    state.error = None;
                }
                Err(error) => {
                    state.error = Some(error);
                }
            }
            state.phase = ExchangePhase::Idle;
        }
        ChatAction::SetSession(session_id) => {
            state.session_id = session_id;
        }
        ChatAction::SetError(error) => {
            state.error = error;
        }
        ChatAction::SetSessions(sessions) => {
            state.sessions = state.sessions.set_all(sessions);
        }
        ChatAction::RemoveSession(id) => {
            state.sessions = state.sessions.remove_by_id(&id);
        }
        ChatAction::UpdateSettings(partial) => {
            state.settings = state.settings.update(&partial);
        }
        ChatAction::ResetConversation => {
            state.messages = state.messages.reset_to_welcome();
            state.session_id = None;
            state.error = None;
            state.phase = ExchangePhase::Idle;
        }
    }
    state
}

/// Holds the current `ChatState` and publishes every change to subscribers.
pub struct ChatStore {
    tx: watch::Sender<ChatState>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new(ChatState::default())
    }
}

impl ChatStore {
    pub fn new(initial: ChatState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Applies `action` atomically. Returns `false` when the state did not change.
    pub fn dispatch(&self, action: ChatAction) -> bool {
        self.tx.send_if_modified(|state| {
            let next = reduce(state.clone(), action);
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    pub fn snapshot(&self) -> ChatState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.tx.subscribe()
    }
}
