//! Persisted OAuth credential and its lifecycle states

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens expiring within this window are treated as already expired
const EXPIRY_SKEW_SECS: i64 = 300;

/// Stored credential (tokens)
///
/// Field aliases accept the `token.json` layout written by Google's Python
/// client libraries, so an existing token file keeps working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token
    #[serde(alias = "token")]
    pub access_token: String,

    /// Refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiry timestamp
    #[serde(default, alias = "expiry", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Usability of a credential at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Unexpired access token
    Valid,
    /// Expired, but a refresh token is available
    Refreshable,
    /// Expired with no way to refresh
    Dead,
}

impl Credential {
    /// Whether the access token is expired (or about to be) at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now < Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> CredentialState {
        if !self.is_expired(now) {
            CredentialState::Valid
        } else if self.refresh_token.is_some() {
            CredentialState::Refreshable
        } else {
            CredentialState::Dead
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_in_secs: Option<i64>, refresh: bool) -> Credential {
        Credential {
            access_token: "access".to_string(),
            refresh_token: refresh.then(|| "refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: expires_in_secs.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: vec![],
        }
    }

    #[test]
    fn test_states() {
        let now = Utc::now();
        assert_eq!(credential(Some(3600), false).state(now), CredentialState::Valid);
        assert_eq!(credential(None, false).state(now), CredentialState::Valid);
        assert_eq!(
            credential(Some(-10), true).state(now),
            CredentialState::Refreshable
        );
        assert_eq!(credential(Some(-10), false).state(now), CredentialState::Dead);
    }

    #[test]
    fn test_expiry_skew() {
        let now = Utc::now();
        assert!(credential(Some(60), true).is_expired(now));
        assert!(!credential(Some(600), true).is_expired(now));
    }

    #[test]
    fn test_reads_python_token_file() {
        let json = r#"{
            "token": "ya29.abc",
            "refresh_token": "1//refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
            "expiry": "2024-05-01T12:00:00.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token, "ya29.abc");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(credential.token_type, "Bearer");
        assert_eq!(credential.scopes.len(), 1);
        assert!(credential.expires_at.is_some());
    }
}
