pub mod commands;
pub mod render;

use crate::auth::{ AuthContext, AuthStatus };
use crate::chat::transcript::default_export_file_name;
use crate::chat::{ ConversationController, CHAT_SUGGESTIONS };
use crate::gateway::ChatBackend;
use crate::store::ExchangeOutcome;
use chrono::Utc;
use commands::{ parse_command, Command, HELP };
use log::{ error, info };
use render::{ error_banner, format_message, format_references, format_sessions, StreamRenderer };
use serde_json::Map;
use std::io::{ self, Write };
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, Lines };
use tokio::sync::mpsc::{ self, error::TrySendError };
use tokio::sync::watch;

enum Flow {
    Quit,
    SignedOut,
}

/// Forwards every Ctrl-C for the life of the process.
///
/// Once tokio listens for SIGINT the default handler never comes back, so a
/// single listener serves both stopping an answer and leaving the prompt.
pub fn ctrl_c_interrupts() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                break;
            }
            if let Err(TrySendError::Closed(())) = tx.try_send(()) {
                break;
            }
        }
    });
    rx
}

/// Line-oriented front end: login prompt, then the chat loop until logout or EOF.
pub struct Console<R> {
    auth: Arc<AuthContext>,
    backend: Arc<dyn ChatBackend>,
    controller: Arc<ConversationController>,
    lines: Lines<R>,
    interrupts: mpsc::Receiver<()>,
    shown_error: Option<String>,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(
        auth: Arc<AuthContext>,
        backend: Arc<dyn ChatBackend>,
        controller: Arc<ConversationController>,
        input: R,
        interrupts: mpsc::Receiver<()>
    ) -> Self {
        Self {
            auth,
            backend,
            controller,
            lines: input.lines(),
            interrupts,
            shown_error: None,
        }
    }

    pub async fn run(mut self) -> io::Result<()> {
        let mut auth_rx = self.auth.subscribe();
        loop {
            if !self.auth.is_authenticated() && !self.sign_in().await? {
                return Ok(());
            }
            auth_rx.borrow_and_update();
            self.greet().await;

            match self.chat_loop(&mut auth_rx).await? {
                Flow::Quit => {
                    return Ok(());
                }
                Flow::SignedOut => {
                    self.controller.reset_for_sign_out();
                    self.shown_error = None;
                    println!("Signed out.");
                }
            }
        }
    }

    /// Returns `false` when input ends before a credential is obtained.
    async fn sign_in(&mut self) -> io::Result<bool> {
        loop {
            let choice = match self.prompt("Sign in [1] or create an account [2]: ").await? {
                Some(choice) => choice,
                None => {
                    return Ok(false);
                }
            };

            let result = if choice == "2" {
                let Some(name) = self.prompt("Name: ").await? else {
                    return Ok(false);
                };
                let Some(email) = self.prompt("Email: ").await? else {
                    return Ok(false);
                };
                let Some(password) = self.prompt("Password: ").await? else {
                    return Ok(false);
                };
                self.backend.register(&name, &email, &password).await
            } else {
                let Some(email) = self.prompt("Email: ").await? else {
                    return Ok(false);
                };
                let Some(password) = self.prompt("Password: ").await? else {
                    return Ok(false);
                };
                self.backend.authenticate(&email, &password).await
            };

            match result {
                Ok(grant) =>
                    match self.auth.sign_in(grant) {
                        Ok(()) => {
                            return Ok(true);
                        }
                        Err(e) => {
                            error!("Failed to persist credentials: {}", e);
                            println!("! Could not save your login: {}", e);
                        }
                    }
                Err(e) => println!("! {}", e),
            }
        }
    }

    async fn greet(&mut self) {
        if let Some(identity) = self.auth.identity() {
            println!("Signed in as {} <{}>", identity.name, identity.email);
        }
        self.controller.refresh_sessions().await;

        let state = self.controller.snapshot();
        for message in state.messages.iter() {
            println!("{}", format_message(message));
        }
        if state.messages.len() <= 1 {
            println!("Try asking:");
            for (i, suggestion) in CHAT_SUGGESTIONS.iter().enumerate() {
                println!("  /suggest {}  {}", i + 1, suggestion);
            }
        }
        println!("Type /help for commands.");
    }

    async fn chat_loop(&mut self, auth_rx: &mut watch::Receiver<AuthStatus>) -> io::Result<Flow> {
        loop {
            if !self.auth.is_authenticated() {
                return Ok(Flow::SignedOut);
            }
            self.show_error();
            print!("> ");
            io::stdout().flush()?;

            let line = tokio::select! {
                line = self.lines.next_line() => line?,
                Some(()) = self.interrupts.recv() => {
                    println!();
                    return Ok(Flow::Quit);
                }
                Ok(()) = auth_rx.changed() => {
                    if *auth_rx.borrow_and_update() == AuthStatus::SignedOut {
                        println!();
                        return Ok(Flow::SignedOut);
                    }
                    continue;
                }
            };
            let Some(line) = line else {
                return Ok(Flow::Quit);
            };

            match parse_command(&line) {
                Command::Send(text) => {
                    if !text.is_empty() {
                        self.ask(text).await;
                    }
                }
                Command::Suggest(n) =>
                    match CHAT_SUGGESTIONS.get(n - 1) {
                        Some(suggestion) => {
                            println!("You: {}", suggestion);
                            self.ask(suggestion.to_string()).await;
                        }
                        None => println!("There are {} suggestions.", CHAT_SUGGESTIONS.len()),
                    }
                Command::New => {
                    self.controller.new_conversation();
                    for message in self.controller.snapshot().messages.iter() {
                        println!("{}", format_message(message));
                    }
                }
                Command::Sessions => {
                    self.controller.refresh_sessions().await;
                    let state = self.controller.snapshot();
                    println!("{}", format_sessions(state.sessions.iter(), state.session_id.as_ref()));
                }
                Command::Open(session_id) => {
                    if self.controller.load_session(session_id).await {
                        for message in self.controller.snapshot().messages.iter() {
                            println!("{}", format_message(message));
                        }
                    }
                }
                Command::Create(title) =>
                    match self.controller.create_session(title.as_deref()).await {
                        Ok(created) => println!("Created session {} ({})", created.id, created.title),
                        Err(e) => println!("! {}", e),
                    }
                Command::Delete(session_id) => {
                    if self.controller.delete_session(&session_id).await {
                        println!("Deleted session {}", session_id);
                    }
                }
                Command::Language(language) => {
                    self.controller.change_language(language);
                    println!("Language set to {}", language);
                }
                Command::Mode(mode) => {
                    self.controller.change_mode(mode);
                    println!("Mode set to {}", mode);
                }
                Command::Set(key, value) => {
                    let mut partial = Map::new();
                    partial.insert(key, value);
                    self.controller.update_settings(partial);
                    let settings = self.controller.snapshot().settings;
                    match serde_json::to_string(&settings) {
                        Ok(json) => println!("Settings: {}", json),
                        Err(e) => error!("Failed to render settings: {}", e),
                    }
                }
                Command::Export(path) => self.export(path).await,
                Command::ClearError => self.controller.clear_error(),
                Command::Logout => {
                    self.auth.sign_out();
                    return Ok(Flow::SignedOut);
                }
                Command::Help => println!("{}", HELP),
                Command::Quit => {
                    return Ok(Flow::Quit);
                }
                Command::Invalid(message) => println!("{}", message),
            }
        }
    }

    /// Runs one exchange, printing the answer as it grows. Ctrl-C stops it.
    async fn ask(&mut self, text: String) {
        let mut rx = self.controller.subscribe();
        rx.borrow_and_update();

        let controller = Arc::clone(&self.controller);
        let mut task = tokio::spawn(async move { controller.send(&text).await });
        let mut renderer = StreamRenderer::new();

        print!("Satyam AI: ");
        let _ = io::stdout().flush();

        let joined = loop {
            tokio::select! {
                joined = &mut task => break joined,
                Some(()) = self.interrupts.recv() => {
                    if self.controller.stop() {
                        print!(" [stopped]");
                    }
                }
                Ok(()) = rx.changed() => {
                    let state = rx.borrow_and_update().clone();
                    if let Some(delta) = renderer.delta(&state) {
                        print!("{}", delta);
                        let _ = io::stdout().flush();
                    }
                }
            }
        };

        match joined {
            Ok(Some(outcome)) => {
                let state = self.controller.snapshot();
                renderer.track_last(&state);
                if let Some(delta) = renderer.delta(&state) {
                    print!("{}", delta);
                }
                println!();
                if let Some(message) = renderer.message(&state) {
                    let references = format_references(message);
                    if !references.is_empty() {
                        println!("Sources:{}", references);
                    }
                }
                if outcome == ExchangeOutcome::Cancelled {
                    info!("Answer stopped before completion");
                }
            }
            Ok(None) => println!("\nPlease wait for the current answer to finish."),
            Err(e) => {
                println!();
                error!("Exchange task failed: {}", e);
            }
        }
    }

    async fn export(&self, path: Option<PathBuf>) {
        let path = path.unwrap_or_else(|| PathBuf::from(default_export_file_name(Utc::now())));
        match tokio::fs::write(&path, self.controller.export_transcript()).await {
            Ok(()) => println!("Transcript saved to {}", path.display()),
            Err(e) => {
                error!("Failed to write transcript to {}: {}", path.display(), e);
                println!("! Could not save transcript: {}", e);
            }
        }
    }

    /// Prints the error banner once per distinct error.
    fn show_error(&mut self) {
        let error = self.controller.snapshot().error;
        if error != self.shown_error {
            if let Some(message) = &error {
                println!("{}", error_banner(message));
            }
            self.shown_error = error;
        }
    }

    async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        print!("{}", label);
        io::stdout().flush()?;
        tokio::select! {
            line = self.lines.next_line() => Ok(line?.map(|line| line.trim().to_string())),
            Some(()) = self.interrupts.recv() => {
                println!();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;
    use crate::chat::stream::Delivery;
    use crate::gateway::{ GatewayError, GatewayResult };
    use crate::models::api::{ AuthGrant, ChatReply };
    use crate::models::chat::{ Identity, Message, MessageStatus, Role, SessionId, SessionSummary };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{ AsyncWriteExt, BufReader };
    use tokio::sync::Notify;

    #[derive(Default)]
    struct ScriptedBackend {
        queries: Mutex<Vec<String>>,
        /// Answers are refused with 401 and the credential dropped, as the HTTP gateway does.
        expire: Option<Arc<AuthContext>>,
        /// Holds answers back until notified.
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn authenticate(&self, username: &str, _password: &str) -> GatewayResult<AuthGrant> {
            Ok(AuthGrant {
                token: "jwt".into(),
                identity: Identity { name: "Ravi".into(), email: username.into() },
            })
        }

        async fn register(&self, name: &str, email: &str, _password: &str) -> GatewayResult<AuthGrant> {
            Ok(AuthGrant {
                token: "jwt".into(),
                identity: Identity { name: name.into(), email: email.into() },
            })
        }

        async fn send_message(&self, query: &str, _session_id: Option<&SessionId>) -> GatewayResult<ChatReply> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(auth) = &self.expire {
                auth.sign_out();
                return Err(GatewayError::Unauthorized("Session expired".into()));
            }
            Ok(ChatReply {
                answer: "Article 21 protects life and personal liberty.".into(),
                references: Vec::new(),
                session_id: Some(SessionId::Number(7)),
            })
        }

        async fn list_sessions(&self) -> GatewayResult<Vec<SessionSummary>> {
            Ok(vec![SessionSummary { id: SessionId::Number(7), title: "Article 21".into() }])
        }

        async fn create_session(&self, title: Option<&str>) -> GatewayResult<SessionSummary> {
            Ok(SessionSummary { id: SessionId::Number(8), title: title.unwrap_or("New Chat").into() })
        }

        async fn fetch_session_messages(&self, _session_id: &SessionId) -> GatewayResult<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn delete_session(&self, _session_id: &SessionId) -> GatewayResult<()> {
            Ok(())
        }
    }

    fn console(
        backend: Arc<ScriptedBackend>,
        auth: Arc<AuthContext>,
        script: &'static str
    ) -> (Console<&'static [u8]>, Arc<ConversationController>) {
        let controller = Arc::new(ConversationController::new(backend.clone(), Delivery::Whole));
        // No interrupts: the sender is dropped right away.
        let (_, interrupts) = mpsc::channel(1);
        let console = Console::new(auth, backend, Arc::clone(&controller), script.as_bytes(), interrupts);
        (console, controller)
    }

    #[tokio::test]
    async fn login_then_ask_then_quit() {
        let backend = Arc::new(ScriptedBackend::default());
        let auth = Arc::new(AuthContext::init_from_storage(Arc::new(MemoryCredentialStore::default())));
        let (console, controller) = console(
            backend.clone(),
            auth.clone(),
            "1\nravi@example.in\nsecret\nExplain Article 21\n/quit\n"
        );

        console.run().await.unwrap();

        assert!(auth.is_authenticated());
        assert_eq!(backend.queries.lock().unwrap().as_slice(), ["Explain Article 21"]);
        let state = controller.snapshot();
        assert_eq!(state.messages.len(), 3);
        let answer = state.messages.last().unwrap();
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.status, MessageStatus::Final);
        assert_eq!(state.session_id, Some(SessionId::Number(7)));
    }

    #[tokio::test]
    async fn logout_returns_to_login_and_clears_conversation() {
        let backend = Arc::new(ScriptedBackend::default());
        let auth = Arc::new(AuthContext::init_from_storage(Arc::new(MemoryCredentialStore::default())));
        let (console, controller) = console(
            backend.clone(),
            auth.clone(),
            "2\nRavi\nravi@example.in\nsecret\n/suggest 2\n/logout\n"
        );

        // Input ends at the login prompt after logging out.
        console.run().await.unwrap();

        assert!(!auth.is_authenticated());
        assert_eq!(backend.queries.lock().unwrap().as_slice(), ["Explain Article 21"]);
        let state = controller.snapshot();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.session_id, None);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_answer_forces_login() {
        let auth = Arc::new(AuthContext::init_from_storage(Arc::new(MemoryCredentialStore::default())));
        let backend = Arc::new(ScriptedBackend { expire: Some(auth.clone()), ..Default::default() });
        let (console, controller) = console(
            backend.clone(),
            auth.clone(),
            "1\nravi@example.in\nsecret\nhello\n/quit\n"
        );

        // "/quit" lands on the login prompt, which then runs out of input.
        console.run().await.unwrap();

        assert!(!auth.is_authenticated());
        assert_eq!(backend.queries.lock().unwrap().as_slice(), ["hello"]);
        assert_eq!(controller.snapshot().messages.len(), 1);
    }

    #[tokio::test]
    async fn interrupt_at_login_prompt_exits() {
        let backend = Arc::new(ScriptedBackend::default());
        let auth = Arc::new(AuthContext::init_from_storage(Arc::new(MemoryCredentialStore::default())));
        let controller = Arc::new(ConversationController::new(backend.clone(), Delivery::Whole));
        let (_writer, reader) = tokio::io::duplex(64);
        let (tx, interrupts) = mpsc::channel(4);
        let console = Console::new(auth.clone(), backend, controller, BufReader::new(reader), interrupts);

        tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), console.run()).await.unwrap().unwrap();
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn interrupt_stops_answer_and_later_exits_prompt() {
        let backend = Arc::new(ScriptedBackend {
            gate: Some(Arc::new(Notify::new())),
            ..Default::default()
        });
        let auth = Arc::new(AuthContext::init_from_storage(Arc::new(MemoryCredentialStore::default())));
        let controller = Arc::new(ConversationController::new(backend.clone(), Delivery::Whole));
        let (mut writer, reader) = tokio::io::duplex(1024);
        writer.write_all(b"1\nravi@example.in\nsecret\nExplain Article 21\n").await.unwrap();
        let (tx, interrupts) = mpsc::channel(4);
        let console = Console::new(
            auth.clone(),
            backend.clone(),
            Arc::clone(&controller),
            BufReader::new(reader),
            interrupts
        );

        let mut rx = controller.subscribe();
        let presses = async {
            while !rx.borrow_and_update().is_loading() {
                rx.changed().await.unwrap();
            }
            // First press stops the answer; the ones after it reach the prompt.
            loop {
                let _ = tx.try_send(());
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };

        tokio::time
            ::timeout(Duration::from_secs(5), async {
                tokio::select! {
                    result = console.run() => result.unwrap(),
                    _ = presses => {}
                }
            }).await
            .unwrap();

        assert!(auth.is_authenticated());
        assert_eq!(backend.queries.lock().unwrap().as_slice(), ["Explain Article 21"]);
        let state = controller.snapshot();
        assert!(!state.is_loading());
        let answer = state.messages.last().unwrap();
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.status, MessageStatus::Final);
        assert_eq!(answer.content, "");
        drop(writer);
    }
}
