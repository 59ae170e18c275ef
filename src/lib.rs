pub mod auth;
pub mod chat;
pub mod cli;
pub mod console;
pub mod gateway;
pub mod models;
pub mod store;

use auth::store::FileCredentialStore;
use auth::AuthContext;
use chat::ConversationController;
use cli::Args;
use console::{ ctrl_c_interrupts, Console };
use gateway::http::HttpGateway;
use gateway::ChatBackend;
use log::info;
use std::error::Error;
use std::sync::Arc;
use tokio::io::BufReader;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let credentials_path = args.resolved_credentials_path();

    info!("--- Core Configuration ---");
    info!("API Base URL: {}", args.api_base_url);
    info!("Request Timeout: {}s", args.timeout_secs);
    info!("Credentials Path: {}", credentials_path.display());
    info!("Language: {}", args.language);
    info!("Response Mode: {}", args.mode);
    info!("Typewriter: {}", !args.no_typewriter);
    if !args.no_typewriter {
        info!("Typing Delay: {}-{}ms", args.typing_min_delay_ms, args.typing_max_delay_ms);
    }
    info!("-------------------------");

    let storage = Arc::new(FileCredentialStore::new(credentials_path));
    let auth = Arc::new(AuthContext::init_from_storage(storage));
    let backend: Arc<dyn ChatBackend> = Arc::new(
        HttpGateway::new(&args.api_base_url, args.timeout(), Arc::clone(&auth))?
    );
    info!("Native Streaming: {}", backend.supports_native_streaming());
    let controller = Arc::new(ConversationController::new(Arc::clone(&backend), args.delivery()));
    controller.change_language(args.language);
    controller.change_mode(args.mode);

    let console = Console::new(
        auth,
        backend,
        controller,
        BufReader::new(tokio::io::stdin()),
        ctrl_c_interrupts()
    );
    console.run().await?;

    Ok(())
}
