//! Service account authentication with domain-wide delegation
//!
//! Tokens are minted and cached by yup-oauth2; nothing is written to disk.

use chrono::{DateTime, Utc};
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::hyper::client::HttpConnector;
use yup_oauth2::hyper_rustls::HttpsConnector;

use crate::auth::{AuthState, AuthStatus};
use crate::config::{AuthMode, ServiceAccountConfig};
use crate::error::{AuthError, Result};

/// Access tokens for a service account impersonating one mailbox
pub struct ServiceAccountAuth {
    authenticator: Authenticator<HttpsConnector<HttpConnector>>,
    scopes: Vec<String>,
    user_email: String,
}

impl ServiceAccountAuth {
    pub async fn new(config: &ServiceAccountConfig, scopes: Vec<String>) -> Result<Self> {
        if config.user_email.trim().is_empty() {
            return Err(AuthError::MissingDelegatedUser.into());
        }

        let key = yup_oauth2::parse_service_account_key(&config.key_json).map_err(|e| {
            AuthError::InvalidServiceAccount {
                message: e.to_string(),
            }
        })?;

        let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .subject(config.user_email.clone())
            .build()
            .await
            .map_err(|e| AuthError::InvalidServiceAccount {
                message: e.to_string(),
            })?;

        tracing::info!("Using service account delegated to {}", config.user_email);

        Ok(Self {
            authenticator,
            scopes,
            user_email: config.user_email.clone(),
        })
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub async fn access_token(&self) -> Result<String> {
        let token = self.authenticator.token(&self.scopes).await?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| AuthError::OAuth2("token endpoint returned no access token".to_string()).into())
    }

    /// Probe the token endpoint; failures are reported, never returned
    pub async fn status(&self) -> AuthStatus {
        match self.authenticator.token(&self.scopes).await {
            Ok(token) if token.token().is_some() => {
                let expiry = token
                    .expiration_time()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.unix_timestamp(), 0));
                AuthStatus::new(AuthMode::ServiceAccount, AuthState::Authenticated, expiry)
            }
            Ok(_) => AuthStatus::new(AuthMode::ServiceAccount, AuthState::Unauthenticated, None),
            Err(e) => {
                tracing::warn!("Service account token unavailable: {}", e);
                AuthStatus::new(AuthMode::ServiceAccount, AuthState::Unauthenticated, None)
            }
        }
    }
}
