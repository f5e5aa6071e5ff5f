//! Error types for the Gmail bridge
//!
//! Three families matter to callers: authentication, validation and upstream
//! (Gmail API) failures. Adapters use [`GmailBridgeError::kind`] to map them
//! onto HTTP status codes or MCP tool errors.

use thiserror::Error;

/// Main error type for the Gmail bridge
#[derive(Error, Debug)]
pub enum GmailBridgeError {
    /// OAuth / credential errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Gmail API errors
    #[error("Gmail API error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by the front-end adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Validation,
    Upstream,
    Internal,
}

impl GmailBridgeError {
    /// Classify this error for adapters
    pub fn kind(&self) -> ErrorKind {
        match self {
            GmailBridgeError::Auth(_) => ErrorKind::Auth,
            GmailBridgeError::Validation(_) => ErrorKind::Validation,
            GmailBridgeError::Upstream(_) => ErrorKind::Upstream,
            _ => ErrorKind::Internal,
        }
    }
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated: no stored credential (run `gmail-bridge auth`)")]
    NotAuthenticated,

    #[error("Credential expired and has no refresh token")]
    CredentialExpired,

    #[error("Refresh token rejected by provider: {message}")]
    RefreshRejected { message: String },

    #[error("Access token rejected by Gmail: {message}")]
    Rejected { message: String },

    #[error("OAuth client credentials missing: set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET or provide {path}")]
    MissingClientCredentials { path: String },

    #[error("Invalid OAuth keys format: expected 'installed' or 'web' credentials")]
    InvalidKeysFormat,

    #[error("Invalid service account key: {message}")]
    InvalidServiceAccount { message: String },

    #[error("GMAIL_USER_EMAIL must be set for service account authentication")]
    MissingDelegatedUser,

    #[error("Operation not supported in {mode} mode")]
    UnsupportedMode { mode: String },

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },

    #[error("No authorization code provided")]
    NoAuthCode,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    #[error("OAuth2 error: {0}")]
    OAuth2(String),
}

/// Gmail API errors
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("API request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Rate limited by Gmail: {message}")]
    RateLimited { message: String },

    #[error("Insufficient permissions: {message}")]
    InsufficientPermissions { message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },

    #[error("Failed to read {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid parameter: {name} - {message}")]
    InvalidParameter { name: String, message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },
}

/// Result type alias for Gmail bridge operations
pub type Result<T> = std::result::Result<T, GmailBridgeError>;

impl From<reqwest::Error> for GmailBridgeError {
    fn from(err: reqwest::Error) -> Self {
        GmailBridgeError::Upstream(UpstreamError::Http(err))
    }
}

/// Convert yup-oauth2 errors to our AuthError
impl From<yup_oauth2::Error> for AuthError {
    fn from(err: yup_oauth2::Error) -> Self {
        AuthError::OAuth2(err.to_string())
    }
}

impl From<yup_oauth2::Error> for GmailBridgeError {
    fn from(err: yup_oauth2::Error) -> Self {
        GmailBridgeError::Auth(AuthError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::RefreshRejected {
            message: "invalid_grant".to_string(),
        };
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn test_error_conversion() {
        let err: GmailBridgeError = AuthError::NotAuthenticated.into();
        assert!(matches!(err, GmailBridgeError::Auth(_)));
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_error_kinds() {
        let validation: GmailBridgeError = ValidationError::MissingField {
            field: "to".to_string(),
        }
        .into();
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let upstream: GmailBridgeError = UpstreamError::RateLimited {
            message: "slow down".to_string(),
        }
        .into();
        assert_eq!(upstream.kind(), ErrorKind::Upstream);

        let io: GmailBridgeError = std::io::Error::other("disk").into();
        assert_eq!(io.kind(), ErrorKind::Internal);
    }
}
