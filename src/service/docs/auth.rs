//! Google OAuth2 for installed (desktop) apps.
//!
//! The token is cached as JSON next to the client secrets. An expired token is
//! refreshed when a refresh token is available; otherwise the loopback flow
//! runs: a one-shot local listener receives the authorization code after the
//! user approves access in a browser. The wait for that redirect is bounded,
//! so an unattended start gives up instead of hanging.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use axum::{Router, extract::Query, response::Html, routing::get};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tracing::{info, instrument, warn};

use crate::base::types::{Res, Void};

/// Read-only access to Drive files and Docs content.
pub const SCOPES: [&str; 2] = ["https://www.googleapis.com/auth/drive.readonly", "https://www.googleapis.com/auth/documents.readonly"];

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

// Types.

/// OAuth client secrets downloaded from the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a console download (`{"installed": {...}}` or `{"web": {...}}`).
    pub fn parse(json: &str) -> Res<Self> {
        let file: CredentialsFile = serde_json::from_str(json)?;

        file.installed
            .or(file.web)
            .ok_or_else(|| anyhow::anyhow!("Credentials file has neither an `installed` nor a `web` client."))
    }

    pub fn from_file(path: &Path) -> Res<Self> {
        let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        Self::parse(&json)
    }
}

/// An access token as cached on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether the token must be refreshed before use at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }

    /// Load a cached token; `None` when the file does not exist.
    pub fn load(path: &Path) -> Res<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(path)?;

        match serde_json::from_str(&json) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                warn!("Ignoring unreadable token cache {}: {err}", path.display());
                Ok(None)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Void {
        std::fs::write(path, serde_json::to_string_pretty(self)?).with_context(|| format!("Failed to write token cache {}", path.display()))?;
        Ok(())
    }

    fn from_response(response: TokenResponse, previous_refresh_token: Option<String>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expires_at: response.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

// Structs.

/// Supplies (and refreshes) bearer tokens for Google APIs.
pub struct GoogleAuth {
    http: reqwest::Client,
    secrets: Option<ClientSecrets>,
    token: Mutex<StoredToken>,
    token_file: Option<PathBuf>,
}

impl GoogleAuth {
    /// Authorize using the cached token, refreshing it or running the loopback flow as needed.
    ///
    /// The loopback flow waits at most `consent_timeout` for the browser redirect.
    #[instrument(name = "GoogleAuth::authorize", skip_all)]
    pub async fn authorize(credentials_file: &Path, token_file: &Path, consent_timeout: std::time::Duration) -> Res<Self> {
        let http = reqwest::Client::new();
        let secrets = if credentials_file.exists() { Some(ClientSecrets::from_file(credentials_file)?) } else { None };
        let cached = StoredToken::load(token_file)?;

        let usable = cached.filter(|token| !token.is_expired_at(Utc::now()) || (token.refresh_token.is_some() && secrets.is_some()));

        let token = match (usable, &secrets) {
            (Some(token), _) => token,
            (None, Some(secrets)) => {
                let token = run_loopback_flow(&http, secrets, consent_timeout).await?;
                token.save(token_file)?;
                token
            }
            (None, None) => {
                return Err(anyhow::anyhow!(
                    "Credentials file not found: {}\nPlease download OAuth2 credentials from Google Cloud Console.",
                    credentials_file.display()
                ));
            }
        };

        let auth = Self {
            http,
            secrets,
            token: Mutex::new(token),
            token_file: Some(token_file.to_path_buf()),
        };

        // A stale cached token is refreshed here, before the first API call.
        auth.access_token().await?;

        Ok(auth)
    }

    /// Build from known parts (no disk cache).
    pub fn from_parts(secrets: Option<ClientSecrets>, token: StoredToken) -> Self {
        Self {
            http: reqwest::Client::new(),
            secrets,
            token: Mutex::new(token),
            token_file: None,
        }
    }

    /// A valid access token, refreshed if needed.
    pub async fn access_token(&self) -> Res<String> {
        let mut token = self.token.lock().await;

        if token.is_expired_at(Utc::now()) {
            let refreshed = self.refresh(&token).await?;

            if let Some(path) = &self.token_file {
                refreshed.save(path)?;
            }

            *token = refreshed;
        }

        Ok(token.access_token.clone())
    }

    #[instrument(name = "GoogleAuth::refresh", skip_all)]
    async fn refresh(&self, token: &StoredToken) -> Res<StoredToken> {
        let (Some(secrets), Some(refresh_token)) = (&self.secrets, &token.refresh_token) else {
            return Err(anyhow::anyhow!("Google token expired and cannot be refreshed; delete the token cache and re-authorize."));
        };

        let response = self
            .http
            .post(&secrets.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
            ])
            .send()
            .await?;

        let response = parse_token_response(response).await?;
        info!("Refreshed Google access token.");

        Ok(StoredToken::from_response(response, token.refresh_token.clone()))
    }
}

/// Build the consent URL for the loopback flow.
pub fn consent_url(secrets: &ClientSecrets, redirect_uri: &str, state: &str) -> Res<reqwest::Url> {
    let scope = SCOPES.join(" ");

    Ok(reqwest::Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )?)
}

/// Run the installed-app flow against a one-shot local listener.
#[instrument(skip_all)]
async fn run_loopback_flow(http: &reqwest::Client, secrets: &ClientSecrets, consent_timeout: std::time::Duration) -> Res<StoredToken> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
    let expected_state = uuid::Uuid::new_v4().to_string();

    let url = consent_url(secrets, &redirect_uri, &expected_state)?;
    info!("Open this URL in a browser to grant Google Drive access:\n\n{url}\n");

    let (code_tx, code_rx) = oneshot::channel::<Result<String, String>>();
    let code_tx = Arc::new(Mutex::new(Some(code_tx)));

    let app = Router::new().route(
        "/",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let code_tx = code_tx.clone();
            let expected_state = expected_state.clone();

            async move {
                let result = match (params.get("error"), params.get("state"), params.get("code")) {
                    (Some(error), _, _) => Err(error.clone()),
                    (None, Some(state), Some(code)) if *state == expected_state => Ok(code.clone()),
                    (None, Some(_), Some(_)) => Err("state mismatch".to_string()),
                    _ => Err("missing authorization code".to_string()),
                };

                let page = if result.is_ok() { "Authorization complete. You can close this window." } else { "Authorization failed. Check the helios logs." };

                if let Some(tx) = code_tx.lock().await.take() {
                    let _ = tx.send(result);
                }

                Html(page)
            }
        }),
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let code = match tokio::time::timeout(consent_timeout, code_rx).await {
        Ok(received) => received.map_err(|_| anyhow::anyhow!("OAuth callback listener closed")),
        Err(_) => Err(anyhow::anyhow!(
            "Google authorization was not completed within {}s; run `helios ask` from a terminal once to authorize",
            consent_timeout.as_secs()
        )),
    };
    let _ = shutdown_tx.send(());
    let _ = server.await;

    let code = code?.map_err(|err| anyhow::anyhow!("Google authorization failed: {err}"))?;

    let response = http
        .post(&secrets.token_uri)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .send()
        .await?;

    let response = parse_token_response(response).await?;
    info!("Google authorization complete.");

    Ok(StoredToken::from_response(response, None))
}

async fn parse_token_response(response: reqwest::Response) -> Res<TokenResponse> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(anyhow::anyhow!("Google token endpoint returned {status}: {text}"));
    }

    Ok(serde_json::from_str(&text)?)
}

// Tests.
