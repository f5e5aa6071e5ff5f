//! Authentication for the Gmail API
//!
//! Two token sources are supported:
//! - the desktop OAuth flow, with a persisted and refreshable [`Credential`]
//! - a service account impersonating a single mailbox

pub mod credential;
pub mod desktop;
pub mod oauth;
pub mod service_account;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{AuthMode, Config};
use crate::error::{AuthError, Result};

pub use credential::{Credential, CredentialState};
pub use oauth::TokenManager;
pub use service_account::ServiceAccountAuth;
pub use store::{CredentialStore, FileCredentialStore};

/// Authentication state as seen by the façade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthState {
    #[serde(rename = "not_connected")]
    Unauthenticated,
    #[serde(rename = "ready")]
    Authenticated,
    #[serde(rename = "expired")]
    Expired,
}

/// Result of an auth status check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub status: AuthState,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthStatus {
    pub fn new(mode: AuthMode, state: AuthState, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            authenticated: state == AuthState::Authenticated,
            status: state,
            mode: mode.as_str(),
            expiry,
        }
    }
}

/// Token source used by the Gmail client
pub enum Authenticator {
    OAuth(TokenManager),
    ServiceAccount(ServiceAccountAuth),
}

impl Authenticator {
    /// Build the authenticator selected by the configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.auth_mode {
            AuthMode::OAuth => {
                let client = config.require_oauth_client()?.clone();
                let store = Arc::new(FileCredentialStore::new(config.token_path.clone()));
                Ok(Authenticator::OAuth(TokenManager::new(
                    client,
                    config.scopes.clone(),
                    store,
                )))
            }
            AuthMode::ServiceAccount => {
                let service_account = config
                    .service_account
                    .as_ref()
                    .ok_or(AuthError::MissingDelegatedUser)?;
                Ok(Authenticator::ServiceAccount(
                    ServiceAccountAuth::new(service_account, config.scopes.clone()).await?,
                ))
            }
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Authenticator::OAuth(_) => AuthMode::OAuth,
            Authenticator::ServiceAccount(_) => AuthMode::ServiceAccount,
        }
    }

    /// The OAuth token manager, when running in OAuth mode
    pub fn token_manager(&self) -> Option<&TokenManager> {
        match self {
            Authenticator::OAuth(manager) => Some(manager),
            Authenticator::ServiceAccount(_) => None,
        }
    }

    /// Get a valid access token
    pub async fn access_token(&self) -> Result<String> {
        match self {
            Authenticator::OAuth(manager) => manager.access_token().await,
            Authenticator::ServiceAccount(auth) => auth.access_token().await,
        }
    }

    /// Get a new access token after the current one was rejected
    pub async fn force_refresh(&self) -> Result<String> {
        match self {
            Authenticator::OAuth(manager) => manager.force_refresh().await,
            Authenticator::ServiceAccount(auth) => auth.access_token().await,
        }
    }

    /// Report authentication status; never fails
    pub async fn status(&self) -> AuthStatus {
        match self {
            Authenticator::OAuth(manager) => manager.status(),
            Authenticator::ServiceAccount(auth) => auth.status().await,
        }
    }

    /// Discard the local credential
    pub fn logout(&self) -> Result<()> {
        match self {
            Authenticator::OAuth(manager) => manager.logout(),
            Authenticator::ServiceAccount(_) => {
                tracing::debug!("Logout requested in service account mode; nothing stored");
                Ok(())
            }
        }
    }
}
