use crate::models::chat::{ Message, MessagePatch, MessageStatus };

/// Ordered, append-only log of conversation messages.
///
/// Every operation consumes the current snapshot and returns the next one, so a
/// reducer can apply it without touching state held by subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::welcome()
    }
}

impl MessageStore {
    pub fn welcome() -> Self {
        Self { messages: vec![Message::welcome()] }
    }

    pub fn append(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn replace(self, messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Applies `patch` to the message with `id`.
    ///
    /// Unknown ids and messages that already reached a terminal status are left
    /// untouched.
    pub fn update_by_id(mut self, id: &str, patch: &MessagePatch) -> Self {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            if msg.status != MessageStatus::Pending {
                return self;
            }
            if let Some(content) = &patch.content {
                msg.content = content.clone();
            }
            if let Some(slice) = &patch.append {
                msg.content.push_str(slice);
            }
            if let Some(references) = &patch.references {
                msg.references = references.clone();
            }
            if let Some(status) = patch.status {
                msg.status = status;
            }
        }
        self
    }

    pub fn reset_to_welcome(self) -> Self {
        Self::welcome()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn pending_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.is_pending())
            .count()
    }
}
