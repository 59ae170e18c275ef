use crate::models::chat::{ Message, MessageStatus, Role, SessionId, SessionSummary };
use crate::store::ChatState;

/// Tracks how much of the exchange's assistant message has been printed.
#[derive(Debug, Default)]
pub struct StreamRenderer {
    message_id: Option<String>,
    printed: String,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to print so the terminal catches up with `state`.
    pub fn delta(&mut self, state: &ChatState) -> Option<String> {
        if self.message_id.is_none() {
            self.message_id = state.pending_message_id().map(str::to_string);
        }
        let id = self.message_id.as_deref()?;
        let message = state.messages.get(id)?;

        if let Some(rest) = message.content.strip_prefix(self.printed.as_str()) {
            if rest.is_empty() {
                return None;
            }
            let rest = rest.to_string();
            self.printed.push_str(&rest);
            return Some(rest);
        }
        // Content was replaced (e.g. by the apology text): start a fresh line.
        self.printed = message.content.clone();
        Some(format!("\n{}", message.content))
    }

    /// Follows the last message when the exchange ended before it was seen pending.
    pub fn track_last(&mut self, state: &ChatState) {
        if self.message_id.is_none() {
            self.message_id = state.messages.last().map(|m| m.id.clone());
        }
    }

    pub fn message<'a>(&self, state: &'a ChatState) -> Option<&'a Message> {
        state.messages.get(self.message_id.as_deref()?)
    }
}

pub fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Satyam AI",
    }
}

pub fn format_message(message: &Message) -> String {
    let mut out = format!("{}: {}", speaker(message.role), message.content);
    if message.status == MessageStatus::Errored {
        out.push_str(" [error]");
    }
    out.push_str(&format_references(message));
    out
}

pub fn format_references(message: &Message) -> String {
    let mut out = String::new();
    for (i, reference) in message.references.iter().enumerate() {
        match &reference.url {
            Some(url) => out.push_str(&format!("\n  [{}] {} <{}>", i + 1, reference.title, url)),
            None => out.push_str(&format!("\n  [{}] {}", i + 1, reference.title)),
        }
    }
    out
}

pub fn format_sessions<'a>(
    sessions: impl IntoIterator<Item = &'a SessionSummary>,
    active: Option<&SessionId>
) -> String {
    let lines: Vec<String> = sessions
        .into_iter()
        .map(|s| {
            let marker = if Some(&s.id) == active { "*" } else { " " };
            format!("{} {:>6}  {}", marker, s.id, s.title)
        })
        .collect();
    if lines.is_empty() {
        "No saved sessions.".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn error_banner(error: &str) -> String {
    format!("! {} (/dismiss to clear)", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ MessagePatch, Reference };
    use crate::store::{ ChatAction, ChatStore, ExchangeOutcome, APOLOGY_TEXT };

    #[test]
    fn prints_only_new_text() {
        let store = ChatStore::default();
        let placeholder = Message::placeholder();
        let id = placeholder.id.clone();
        store.dispatch(ChatAction::BeginExchange { user: Message::user("q"), placeholder });

        let mut renderer = StreamRenderer::new();
        assert_eq!(renderer.delta(&store.snapshot()), None);

        store.dispatch(ChatAction::UpdateMessage { id: id.clone(), patch: MessagePatch::append("Arti") });
        assert_eq!(renderer.delta(&store.snapshot()).as_deref(), Some("Arti"));
        store.dispatch(ChatAction::UpdateMessage { id: id.clone(), patch: MessagePatch::append("cle 21") });
        assert_eq!(renderer.delta(&store.snapshot()).as_deref(), Some("cle 21"));
        assert_eq!(renderer.delta(&store.snapshot()), None);
    }

    #[test]
    fn replaced_content_is_reprinted() {
        let store = ChatStore::default();
        let placeholder = Message::placeholder();
        let id = placeholder.id.clone();
        store.dispatch(ChatAction::BeginExchange { user: Message::user("q"), placeholder });

        store.dispatch(ChatAction::UpdateMessage { id: id.clone(), patch: MessagePatch::append("Partial") });
        let mut renderer = StreamRenderer::new();
        assert_eq!(renderer.delta(&store.snapshot()).as_deref(), Some("Partial"));

        store.dispatch(ChatAction::FinishExchange {
            message_id: id,
            outcome: ExchangeOutcome::Failed { error: "down".into() },
        });
        assert_eq!(renderer.delta(&store.snapshot()), Some(format!("\n{}", APOLOGY_TEXT)));
        assert_eq!(renderer.delta(&store.snapshot()), None);
    }

    #[test]
    fn references_are_numbered() {
        let mut message = Message::welcome();
        message.references = vec![
            Reference { title: "Art. 21".into(), url: None },
            Reference { title: "RTI Act".into(), url: Some("https://rti.gov.in".into()) },
        ];
        assert_eq!(format_references(&message), "\n  [1] Art. 21\n  [2] RTI Act <https://rti.gov.in>");
    }
}
