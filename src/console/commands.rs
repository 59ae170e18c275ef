use crate::models::chat::SessionId;
use crate::store::settings::{ Language, ResponseMode };
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(String),
    New,
    Sessions,
    Open(SessionId),
    Create(Option<String>),
    Delete(SessionId),
    Language(Language),
    Mode(ResponseMode),
    Set(String, Value),
    Export(Option<PathBuf>),
    Suggest(usize),
    ClearError,
    Logout,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "Commands:
  <text>                 ask a question
  /new                   start a new conversation
  /sessions              list saved sessions
  /open <id>             load a saved session
  /create [title]        create a new saved session
  /delete <id>           delete a saved session
  /suggest <n>           ask suggestion n
  /lang <en|hi>          answer language
  /mode <simple|professional>
  /set <key>=<value>     change any setting
  /export [path]         save the transcript as text
  /dismiss               clear the error banner
  /logout                sign out
  /quit                  exit
Press Ctrl-C while an answer is being typed to stop it, or at a prompt to exit.";

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Send(line.to_string());
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name {
        "/new" => Command::New,
        "/sessions" => Command::Sessions,
        "/open" => with_session_id(rest, Command::Open, "/open <id>"),
        "/delete" => with_session_id(rest, Command::Delete, "/delete <id>"),
        "/create" => Command::Create(Some(rest.to_string()).filter(|t| !t.is_empty())),
        "/lang" =>
            match rest.parse::<Language>() {
                Ok(language) => Command::Language(language),
                Err(e) => Command::Invalid(e.to_string()),
            }
        "/mode" =>
            match rest.parse::<ResponseMode>() {
                Ok(mode) => Command::Mode(mode),
                Err(e) => Command::Invalid(e.to_string()),
            }
        "/set" =>
            match rest.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    let value = value.trim();
                    // Bare words are taken as strings, anything else as JSON.
                    let parsed = serde_json
                        ::from_str::<Value>(value)
                        .unwrap_or_else(|_| Value::String(value.to_string()));
                    Command::Set(key.trim().to_string(), parsed)
                }
                _ => Command::Invalid("usage: /set <key>=<value>".into()),
            }
        "/export" => Command::Export(Some(rest).filter(|p| !p.is_empty()).map(PathBuf::from)),
        "/suggest" =>
            match rest.parse::<usize>() {
                Ok(n) if n >= 1 => Command::Suggest(n),
                _ => Command::Invalid("usage: /suggest <n>".into()),
            }
        "/dismiss" => Command::ClearError,
        "/logout" => Command::Logout,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Invalid(format!("Unknown command '{}', try /help", other)),
    }
}

fn with_session_id(raw: &str, build: fn(SessionId) -> Command, usage: &str) -> Command {
    if raw.is_empty() {
        Command::Invalid(format!("usage: {}", usage))
    } else {
        build(SessionId::parse(raw))
    }
}
