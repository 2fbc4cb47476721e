//! Interactive login for the brokerage source.
//!
//! A short-lived local HTTP endpoint sends the user to the vendor login page,
//! receives the redirect carrying the one-time authorization code, exchanges
//! it for an access token and hands the token back to the waiting caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::store::mask_token;
use crate::config::UpstoxConfig;
use crate::errors::AuthorizeError;

/// How long a stopped callback endpoint may take to finish in-flight responses.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Obtains a fresh access token.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<String, AuthorizeError>;
}

/// Trades a one-time authorization code for an access token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<String, AuthorizeError>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    grant_type: &'static str,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Token exchange against the vendor OAuth endpoint.
pub struct UpstoxTokenExchange {
    client: reqwest::Client,
    token_url: String,
    api_key: String,
    api_secret: String,
    redirect_uri: String,
}

impl UpstoxTokenExchange {
    pub fn new(
        client: reqwest::Client,
        config: &UpstoxConfig,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: format!("{}/index/oauth/token", config.base_url),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

#[async_trait]
impl TokenExchange for UpstoxTokenExchange {
    async fn exchange(&self, code: &str) -> Result<String, AuthorizeError> {
        let body = TokenRequest {
            code,
            grant_type: "authorization_code",
            redirect_uri: &self.redirect_uri,
        };

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthorizeError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthorizeError::Exchange(format!("HTTP {}: {}", status, text)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthorizeError::Exchange(format!("unexpected token payload: {}", e)))?;
        Ok(token.access_token)
    }
}

/// Shared state of the callback endpoint.
pub struct CallbackState {
    login_url: String,
    exchange: Arc<dyn TokenExchange>,
    sender: Mutex<Option<oneshot::Sender<Result<String, AuthorizeError>>>>,
}

impl CallbackState {
    pub fn new(
        login_url: impl Into<String>,
        exchange: Arc<dyn TokenExchange>,
        sender: oneshot::Sender<Result<String, AuthorizeError>>,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            exchange,
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Hand the outcome to the waiting caller. Only the first outcome counts.
    fn deliver(&self, outcome: Result<String, AuthorizeError>) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// Routes served while waiting for the user to log in.
pub fn callback_router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route("/", get(start_login))
        .route("/callback", get(callback))
        .route("/shutdown", get(shutdown))
        .with_state(state)
}

async fn start_login(State(state): State<Arc<CallbackState>>) -> Redirect {
    Redirect::to(&state.login_url)
}

async fn callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(code) = params.code.filter(|code| !code.is_empty()) else {
        warn!("Login callback without an authorization code");
        return (StatusCode::BAD_REQUEST, "Missing authorization code").into_response();
    };

    match state.exchange.exchange(&code).await {
        Ok(token) => {
            let page = format!(
                "<p>Access token {} received. Go back to the terminal now!</p>",
                mask_token(&token)
            );
            if !state.deliver(Ok(token)) {
                debug!("Access token received after the caller stopped waiting");
            }
            Html(page).into_response()
        }
        Err(e) => {
            error!("Token exchange failed: {}", e);
            let message = e.to_string();
            state.deliver(Err(e));
            (StatusCode::BAD_GATEWAY, message).into_response()
        }
    }
}

async fn shutdown(State(state): State<Arc<CallbackState>>) -> &'static str {
    state.deliver(Err(AuthorizeError::ChannelClosed));
    "Server shutting down..."
}

/// Opens a URL for the user, normally in the default browser.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

fn system_browser() -> BrowserLauncher {
    Arc::new(|url: &str| webbrowser::open(url))
}

/// Interactive authorizer backed by a temporary local HTTP endpoint.
pub struct UpstoxAuthorizer {
    auth_page: String,
    login_url: String,
    exchange: Arc<dyn TokenExchange>,
    timeout: Option<Duration>,
    launcher: BrowserLauncher,
}

impl UpstoxAuthorizer {
    pub fn new(
        config: &UpstoxConfig,
        api_key: &str,
        exchange: Arc<dyn TokenExchange>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            auth_page: config.auth_page.clone(),
            login_url: config.login_url(api_key),
            exchange,
            timeout,
            launcher: system_browser(),
        }
    }

    /// Replace how the login page is opened.
    pub fn with_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Open the local login page. Failure is not fatal: the user can still
    /// open the logged URL by hand.
    async fn open_login_page(&self) {
        let launcher = self.launcher.clone();
        let page = self.auth_page.clone();
        let opened = tokio::task::spawn_blocking(move || launcher(&page)).await;

        match opened {
            Ok(Ok(())) => info!("Opened {} in the browser to log in", self.auth_page),
            Ok(Err(e)) => {
                warn!("Could not open a browser: {}", e);
                info!("Open {} in a browser to log in", self.auth_page);
            }
            Err(e) => {
                warn!("Browser launch task failed: {}", e);
                info!("Open {} in a browser to log in", self.auth_page);
            }
        }
    }

    fn bind_target(&self) -> Result<(String, u16), AuthorizeError> {
        let invalid = || AuthorizeError::InvalidAuthPage(self.auth_page.clone());
        let url = Url::parse(&self.auth_page).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?.to_string();
        let port = url.port_or_known_default().ok_or_else(invalid)?;
        Ok((host, port))
    }

    async fn wait_for_token(
        &self,
        receiver: oneshot::Receiver<Result<String, AuthorizeError>>,
    ) -> Result<String, AuthorizeError> {
        let received = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, receiver)
                .await
                .map_err(|_| AuthorizeError::TimedOut(limit))?,
            None => receiver.await,
        };
        received.map_err(|_| AuthorizeError::ChannelClosed)?
    }
}

#[async_trait]
impl Authorizer for UpstoxAuthorizer {
    async fn authorize(&self) -> Result<String, AuthorizeError> {
        let (host, port) = self.bind_target()?;
        let listener = TcpListener::bind((host.as_str(), port)).await?;

        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(CallbackState::new(
            self.login_url.clone(),
            self.exchange.clone(),
            sender,
        ));

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, callback_router(state))
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                })
                .await
        });

        self.open_login_page().await;
        let outcome = self.wait_for_token(receiver).await;

        let _ = stop.send(());
        let abort = server.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => debug!("Callback endpoint stopped"),
            Ok(Ok(Err(e))) => warn!("Callback endpoint failed: {}", e),
            Ok(Err(e)) => warn!("Callback endpoint task failed: {}", e),
            Err(_) => {
                debug!("Callback endpoint still draining connections, aborting");
                abort.abort();
            }
        }

        if let Ok(token) = &outcome {
            info!("Received access token {}", mask_token(token));
        }
        outcome
    }
}
