pub mod controller;
pub mod stream;
pub mod transcript;

pub use controller::ConversationController;

/// Starter questions offered on an empty conversation.
pub const CHAT_SUGGESTIONS: [&str; 3] = [
    "What are my fundamental rights?",
    "Explain Article 21",
    "How to file an RTI?",
];
