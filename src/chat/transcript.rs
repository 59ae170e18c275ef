use crate::models::chat::{ Message, Role };
use chrono::{ DateTime, Utc };

const ASSISTANT_LABEL: &str = "Satyam AI";
const USER_LABEL: &str = "You";

/// Plain-text export of a conversation, one block per message.
pub fn export_transcript<'a>(messages: impl IntoIterator<Item = &'a Message>) -> String {
    messages
        .into_iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => USER_LABEL,
                Role::Assistant => ASSISTANT_LABEL,
            };
            format!("{} ({}):\n{}\n", speaker, m.timestamp.format("%Y-%m-%d %H:%M:%S UTC"), m.content)
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

pub fn default_export_file_name(now: DateTime<Utc>) -> String {
    format!("satyam-ai-chat-{}.txt", now.format("%Y-%m-%d"))
}
