//! Configuration management for the Gmail bridge
//!
//! Handles paths, environment variables, and OAuth client loading.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AuthError, ConfigError, GmailBridgeError, Result};

/// Gmail API scopes requested by the bridge
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.compose",
];

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// How the bridge obtains access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Desktop OAuth flow with a persisted, refreshable credential
    OAuth,
    /// Service account with domain-wide delegation
    ServiceAccount,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::OAuth => "oauth",
            AuthMode::ServiceAccount => "service_account",
        }
    }
}

/// OAuth client credentials
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Auth URI
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    /// Token URI
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// OAuth keys file format (can be "installed" or "web")
#[derive(Debug, Deserialize)]
struct OAuthKeysFile {
    #[serde(alias = "web")]
    installed: Option<OAuthClient>,
}

/// Service account settings
#[derive(Debug, Clone)]
pub struct ServiceAccountConfig {
    /// Raw service account key JSON
    pub key_json: String,

    /// Mailbox to impersonate
    pub user_email: String,
}

/// Configuration for the Gmail bridge
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to OAuth keys file (client credentials), used when env vars are absent
    pub oauth_path: PathBuf,

    /// Path to the persisted credential
    pub token_path: PathBuf,

    /// OAuth client, if configured
    pub oauth_client: Option<OAuthClient>,

    /// Service account, if configured
    pub service_account: Option<ServiceAccountConfig>,

    /// Selected authentication mode
    pub auth_mode: AuthMode,

    /// Gmail API scopes
    pub scopes: Vec<String>,

    /// Gmail API base URL
    pub api_base_url: String,

    /// Desktop OAuth callback port (0 lets the OS choose)
    pub oauth_callback_port: u16,

    /// Web UI port
    pub web_port: u16,

    /// MCP HTTP transport port
    pub mcp_port: u16,

    /// Public base URL of the web UI (`DEPLOYMENT_URL`); localhost when unset
    pub deployment_url: Option<String>,
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Self::from_lookup(&home.join(".gmail-bridge"), |key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(config_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let oauth_path = var("GMAIL_OAUTH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("gcp-oauth.keys.json"));

        let token_path = var("GMAIL_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("token.json"));

        let oauth_client = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(OAuthClient {
                client_id,
                client_secret,
                auth_uri: default_auth_uri(),
                token_uri: var("GOOGLE_TOKEN_URI").unwrap_or_else(default_token_uri),
            }),
            _ if oauth_path.exists() => Some(load_oauth_keys(&oauth_path)?),
            _ => None,
        };

        let service_account = load_service_account(&var)?;

        let auth_mode = match var("GMAIL_AUTH_MODE").as_deref() {
            Some("oauth") => AuthMode::OAuth,
            Some("service_account") => AuthMode::ServiceAccount,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "GMAIL_AUTH_MODE".to_string(),
                    value: other.to_string(),
                }
                .into())
            }
            None if service_account.is_some() => AuthMode::ServiceAccount,
            None => AuthMode::OAuth,
        };

        let oauth_callback_port = parse_port(&var, "GMAIL_OAUTH_PORT", 0)?;
        let web_port = parse_port(&var, "PORT", 5000)?;
        let mcp_port = parse_port(&var, "MCP_PORT", 8001)?;

        let deployment_url = var("DEPLOYMENT_URL").map(|url| url.trim_end_matches('/').to_string());

        Ok(Self {
            oauth_path,
            token_path,
            oauth_client,
            service_account,
            auth_mode,
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            api_base_url: var("GMAIL_API_BASE_URL")
                .unwrap_or_else(|| gmail::API_BASE_URL.to_string()),
            oauth_callback_port,
            web_port,
            mcp_port,
            deployment_url,
        })
    }

    /// The OAuth client, or an error explaining how to configure one
    pub fn require_oauth_client(&self) -> Result<&OAuthClient> {
        self.oauth_client.as_ref().ok_or_else(|| {
            GmailBridgeError::Auth(AuthError::MissingClientCredentials {
                path: self.oauth_path.display().to_string(),
            })
        })
    }

    /// Redirect URI used by the web OAuth flow
    pub fn web_redirect_uri(&self) -> String {
        match &self.deployment_url {
            Some(base) => format!("{}/auth/gmail/callback", base),
            None => format!("http://localhost:{}/auth/gmail/callback", self.web_port),
        }
    }
}

/// Load OAuth keys from a Google Cloud console download
fn load_oauth_keys(path: &Path) -> Result<OAuthClient> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let keys_file: OAuthKeysFile = serde_json::from_str(&content)?;

    keys_file
        .installed
        .ok_or_else(|| GmailBridgeError::Auth(AuthError::InvalidKeysFormat))
}

fn load_service_account<F>(var: &F) -> Result<Option<ServiceAccountConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let key_json = match var("GOOGLE_SERVICE_ACCOUNT_JSON") {
        Some(json) => Some(json),
        None => match var("GOOGLE_SERVICE_ACCOUNT_FILE") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                ConfigError::Unreadable {
                    path,
                    message: e.to_string(),
                }
            })?),
            None => None,
        },
    };

    Ok(match (key_json, var("GMAIL_USER_EMAIL")) {
        (Some(key_json), Some(user_email)) => Some(ServiceAccountConfig {
            key_json,
            user_email,
        }),
        (Some(_), None) => {
            tracing::warn!("Service account key found but GMAIL_USER_EMAIL is not set");
            None
        }
        _ => None,
    })
}

fn parse_port<F>(var: &F, key: &str, default: u16) -> Result<u16>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value.trim().parse().map_err(|_| {
            GmailBridgeError::Config(ConfigError::InvalidValue {
                var: key.to_string(),
                value,
            })
        }),
        None => Ok(default),
    }
}

/// Gmail API constants
pub mod gmail {
    /// Base URL for Gmail API
    pub const API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

    /// User ID for the authenticated user
    pub const USER_ID: &str = "me";
}
