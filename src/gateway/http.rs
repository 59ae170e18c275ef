use super::{ ChatBackend, GatewayError, GatewayResult };
use crate::auth::AuthContext;
use crate::models::api::{
    AuthGrant,
    ChatReply,
    CreateSessionRequest,
    ErrorBody,
    LoginForm,
    RagRequest,
    RagResponse,
    SessionMessageDto,
    SignupRequest,
    TokenResponse,
};
use crate::models::chat::{ Message, SessionId, SessionSummary };
use async_trait::async_trait;
use log::{ debug, error, warn };
use reqwest::{ Client as HttpClient, RequestBuilder, Response, StatusCode };
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CHAT_ENDPOINT: &str = "rag";
const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// `ChatBackend` over the backend's REST API.
pub struct HttpGateway {
    http: HttpClient,
    base_url: Url,
    auth: Arc<AuthContext>,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration, auth: Arc<AuthContext>) -> GatewayResult<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e|
            GatewayError::Config(format!("bad base URL '{}': {}", base_url, e))
        )?;
        // `Url::join` replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self { http, base_url, auth })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, route: &str) -> GatewayResult<Url> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map_err(|e| GatewayError::Config(format!("bad route '{}': {}", route, e)))
    }

    async fn dispatch(&self, req: RequestBuilder, fallback: &str) -> GatewayResult<Response> {
        let req = match self.auth.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let resp = req.send().await.map_err(|e| {
            error!("Network error - no response received: {}", e);
            let message = e.to_string();
            GatewayError::Transport(if message.is_empty() { fallback.to_string() } else { message })
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let detail = error_detail(resp).await;
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("Unauthorized access, clearing stored credentials");
                self.auth.sign_out();
                return Err(GatewayError::Unauthorized(detail.unwrap_or_else(|| "Unauthorized".into())));
            }
            StatusCode::FORBIDDEN => error!("Forbidden"),
            StatusCode::NOT_FOUND => error!("Resource not found"),
            s if s.is_server_error() => error!("Server error: {}", s),
            s => error!("Request failed with status {}", s),
        }
        Err(GatewayError::Backend {
            status: status.as_u16(),
            message: detail.unwrap_or_else(|| fallback.to_string()),
        })
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        fallback: &str
    ) -> GatewayResult<T> {
        let resp = self.dispatch(req, fallback).await?;
        resp.json::<T>().await.map_err(|e| {
            error!("Malformed response body: {}", e);
            GatewayError::Decode(format!("{}: {}", fallback, e))
        })
    }
}

async fn error_detail(resp: Response) -> Option<String> {
    let body = resp.text().await.ok()?;
    serde_json
        ::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message())
}

#[async_trait]
impl ChatBackend for HttpGateway {
    async fn authenticate(&self, username: &str, password: &str) -> GatewayResult<AuthGrant> {
        let req = self.http.post(self.url("auth/login")?).form(&(LoginForm { username, password }));
        let token: TokenResponse = self.fetch_json(req, "Login failed").await?;
        Ok(token.into())
    }

    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str
    ) -> GatewayResult<AuthGrant> {
        let req = self.http
            .post(self.url("auth/signup")?)
            .json(&(SignupRequest { name, email, password }));
        let token: TokenResponse = self.fetch_json(req, "Signup failed").await?;
        Ok(token.into())
    }

    async fn send_message(
        &self,
        query: &str,
        session_id: Option<&SessionId>
    ) -> GatewayResult<ChatReply> {
        debug!("POST {} (session: {:?})", CHAT_ENDPOINT, session_id);
        let req = self.http.post(self.url(CHAT_ENDPOINT)?).json(&(RagRequest { query, session_id }));
        let resp: RagResponse = self.fetch_json(req, "Failed to send message").await?;
        Ok(resp.into())
    }

    async fn list_sessions(&self) -> GatewayResult<Vec<SessionSummary>> {
        let req = self.http.get(self.url("chat/history")?);
        self.fetch_json(req, "Failed to list sessions").await
    }

    async fn create_session(&self, title: Option<&str>) -> GatewayResult<SessionSummary> {
        let title = title.unwrap_or(DEFAULT_SESSION_TITLE);
        let req = self.http.post(self.url("chat/session")?).json(&(CreateSessionRequest { title }));
        self.fetch_json(req, "Failed to create session").await
    }

    async fn fetch_session_messages(&self, session_id: &SessionId) -> GatewayResult<Vec<Message>> {
        let req = self.http.get(self.url(&format!("chat/session/{}", session_id))?);
        let dtos: Vec<SessionMessageDto> = self.fetch_json(
            req,
            "Failed to fetch chat messages"
        ).await?;
        Ok(dtos.into_iter().map(Message::from).collect())
    }

    async fn delete_session(&self, session_id: &SessionId) -> GatewayResult<()> {
        let req = self.http.delete(self.url(&format!("chat/session/{}", session_id))?);
        self.dispatch(req, "Failed to delete session").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;

    fn gateway(base: &str) -> GatewayResult<HttpGateway> {
        let auth = Arc::new(AuthContext::init_from_storage(Arc::new(MemoryCredentialStore::default())));
        HttpGateway::new(base, DEFAULT_TIMEOUT, auth)
    }

    #[test]
    fn routes_join_under_base_path() {
        let gw = gateway("http://localhost:8000/api").unwrap();
        assert_eq!(gw.url("rag").unwrap().as_str(), "http://localhost:8000/api/rag");
        assert_eq!(
            gw.url("/chat/session/42").unwrap().as_str(),
            "http://localhost:8000/api/chat/session/42"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(matches!(gateway("not a url"), Err(GatewayError::Config(_))));
    }
}
