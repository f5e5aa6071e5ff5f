//! OAuth token lifecycle for the desktop (installed app) flow
//!
//! The persisted credential is re-read on every call so that a logout or a
//! refresh performed by another process is picked up by the next request.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::auth::credential::{Credential, CredentialState};
use crate::auth::store::CredentialStore;
use crate::auth::{AuthState, AuthStatus};
use crate::config::{AuthMode, OAuthClient};
use crate::error::{AuthError, GmailBridgeError, Result, UpstreamError};

/// Token response from OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    #[serde(default)]
    scope: String,
}

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

impl TokenResponse {
    fn expires_at(&self) -> DateTime<Utc> {
        let secs = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Utc::now() + Duration::seconds(secs)
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Callback query parameters delivered by Google after consent
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Validate the callback against the state we issued and return the code
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(AuthError::CallbackError { message: error }.into());
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(AuthError::StateMismatch.into());
        }
        self.code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::NoAuthCode.into())
    }
}

/// Random value for the OAuth `state` parameter
pub fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Manages the stored OAuth credential: validity checks, refresh and logout
pub struct TokenManager {
    client: OAuthClient,
    scopes: Vec<String>,
    store: Arc<dyn CredentialStore>,
    http_client: reqwest::Client,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(client: OAuthClient, scopes: Vec<String>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            scopes,
            store,
            http_client: reqwest::Client::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current stored credential; unreadable files count as absent
    pub fn credential(&self) -> Option<Credential> {
        match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("Ignoring unreadable credential: {}", e);
                None
            }
        }
    }

    pub fn state(&self) -> AuthState {
        state_of(self.credential().as_ref())
    }

    /// Report authentication status without touching the network
    pub fn status(&self) -> AuthStatus {
        let credential = self.credential();
        AuthStatus::new(
            AuthMode::OAuth,
            state_of(credential.as_ref()),
            credential.and_then(|c| c.expires_at),
        )
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn access_token(&self) -> Result<String> {
        let credential = self.credential().ok_or(AuthError::NotAuthenticated)?;

        match credential.state(Utc::now()) {
            CredentialState::Valid => Ok(credential.access_token),
            CredentialState::Refreshable => {
                let _guard = self.refresh_lock.lock().await;

                // Another task may have refreshed while we waited for the lock
                let credential = self.credential().ok_or(AuthError::NotAuthenticated)?;
                match credential.state(Utc::now()) {
                    CredentialState::Valid => Ok(credential.access_token),
                    CredentialState::Refreshable => {
                        Ok(self.refresh(credential).await?.access_token)
                    }
                    CredentialState::Dead => Err(AuthError::CredentialExpired.into()),
                }
            }
            CredentialState::Dead => Err(AuthError::CredentialExpired.into()),
        }
    }

    /// Refresh regardless of the recorded expiry (used after Gmail rejects a token)
    pub async fn force_refresh(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        let credential = self.credential().ok_or(AuthError::NotAuthenticated)?;
        Ok(self.refresh(credential).await?.access_token)
    }

    /// Exchange the refresh token for a new access token and persist it
    async fn refresh(&self, credential: Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or(AuthError::CredentialExpired)?;

        let params = [
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&self.client.token_uri)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Refresh token rejected ({}), clearing stored credential", status);
            self.store.clear()?;
            return Err(AuthError::RefreshRejected { message: text }.into());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GmailBridgeError::Upstream(UpstreamError::RequestFailed {
                status: status.as_u16(),
                message: format!("token refresh failed: {}", text),
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        let scopes = if token_response.scope.is_empty() {
            credential.scopes
        } else {
            split_scopes(&token_response.scope)
        };

        let expires_at = token_response.expires_at();
        let refreshed = Credential {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token.or(Some(refresh_token)),
            token_type: token_response.token_type,
            expires_at: Some(expires_at),
            scopes,
        };

        self.store.save(&refreshed)?;
        tracing::info!("Refreshed Gmail access token");

        Ok(refreshed)
    }

    /// Generate the authorization URL
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.client.auth_uri,
            urlencoding::encode(&self.client.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    /// Exchange authorization code for tokens and persist them
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Credential> {
        let params = [
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(&self.client.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed { message: text }.into());
        }

        let token_response: TokenResponse = response.json().await?;

        let expires_at = token_response.expires_at();
        let credential = Credential {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_type: token_response.token_type,
            expires_at: Some(expires_at),
            scopes: if token_response.scope.is_empty() {
                self.scopes.clone()
            } else {
                split_scopes(&token_response.scope)
            },
        };

        self.store.save(&credential)?;
        tracing::info!("Stored new Gmail credential");

        Ok(credential)
    }

    /// Forget the stored credential
    pub fn logout(&self) -> Result<()> {
        self.store.clear()
    }
}

fn state_of(credential: Option<&Credential>) -> AuthState {
    match credential.map(|c| c.state(Utc::now())) {
        Some(CredentialState::Valid) => AuthState::Authenticated,
        Some(CredentialState::Refreshable) => AuthState::Expired,
        Some(CredentialState::Dead) | None => AuthState::Unauthenticated,
    }
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}
